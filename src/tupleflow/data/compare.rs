//! Total ordering, SQL equality and group-key hashing over [`Value`].
//!
//! Ordering and equality are deliberately different relations: `ORDER BY`
//! sorts by variant tag first, so `Int(1)` sorts before `Float(1.0)`, while
//! SQL predicates compare numerics by value, so the same two values are
//! equal. The two must never be unified.

use super::value::Value;
use crate::tupleflow::error::BqlError;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Rank of each variant tag in the total order
fn tag_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Float(_) => 3,
        Value::String(_) => 4,
        Value::Blob(_) => 5,
        Value::Timestamp(_) => 6,
        Value::Array(_) => 7,
        Value::Map(_) => 8,
    }
}

/// Compare two floats under the total order: NaN is greater than every
/// finite value and equal to other NaN
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Deterministic total order across all value variants.
///
/// Variant tags compare first in the fixed order
/// Null < Bool < Int < Float < String < Blob < Timestamp < Array < Map;
/// within a tag, values compare naturally. Arrays compare lexicographically
/// by element; maps compare by their key-sorted sequence of pairs.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (tag_rank(a), tag_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => compare_floats(*x, *y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Blob(x), Value::Blob(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let ord = compare(ex, ey);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Map(x), Value::Map(y)) => {
            let mut kx: Vec<&String> = x.keys().collect();
            let mut ky: Vec<&String> = y.keys().collect();
            kx.sort();
            ky.sort();
            for (a_key, b_key) in kx.iter().zip(ky.iter()) {
                let ord = a_key.cmp(b_key);
                if ord != Ordering::Equal {
                    return ord;
                }
                let ord = compare(&x[*a_key], &y[*b_key]);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            kx.len().cmp(&ky.len())
        }
        // Ranks were equal, so the variants match; unreachable pairs remain
        _ => Ordering::Equal,
    }
}

/// SQL equality: the relation used by predicates and grouping.
///
/// Numerically mixed `Int` and `Float` are equal when they denote the same
/// number; everything else requires matching variants. NaN equals NaN so
/// the relation stays reflexive.
pub fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        (Value::Float(x), Value::Float(y)) => {
            (x.is_nan() && y.is_nan()) || x == y
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(ex, ey)| equal(ex, ey))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, vx)| match y.get(k) {
                    Some(vy) => equal(vx, vy),
                    None => false,
                })
        }
        _ => tag_rank(a) == tag_rank(b) && compare(a, b) == Ordering::Equal,
    }
}

fn hash_into(v: &Value, state: &mut DefaultHasher) -> Result<(), BqlError> {
    match v {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        // Ints and integral floats must collide because they are equal
        // under the grouping relation
        Value::Int(i) => {
            2u8.hash(state);
            i.hash(state);
        }
        Value::Float(f) => {
            if f.is_nan() {
                return Err(BqlError::value_error("NaN is not a valid group key"));
            }
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                2u8.hash(state);
                (*f as i64).hash(state);
            } else {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
        }
        Value::String(s) => {
            4u8.hash(state);
            s.hash(state);
        }
        Value::Blob(b) => {
            5u8.hash(state);
            b.hash(state);
        }
        Value::Timestamp(t) => {
            6u8.hash(state);
            t.timestamp().hash(state);
            t.timestamp_subsec_nanos().hash(state);
        }
        Value::Array(arr) => {
            7u8.hash(state);
            arr.len().hash(state);
            for elem in arr {
                hash_into(elem, state)?;
            }
        }
        Value::Map(map) => {
            8u8.hash(state);
            // Sort keys for deterministic hashing
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.len().hash(state);
            for key in keys {
                key.hash(state);
                hash_into(&map[key], state)?;
            }
        }
    }
    Ok(())
}

/// Hash a value for use as a group key.
///
/// The hash is consistent with [`equal`] for the variants grouping uses;
/// NaN is rejected because it cannot be a group key.
pub fn hash_value(v: &Value) -> Result<u64, BqlError> {
    let mut state = DefaultHasher::new();
    hash_into(v, &mut state)?;
    Ok(state.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_order_comes_first() {
        assert_eq!(compare(&Value::Null, &Value::Bool(false)), Ordering::Less);
        assert_eq!(
            compare(&Value::Int(1), &Value::Float(1.0)),
            Ordering::Less
        );
        assert_eq!(
            compare(&Value::Float(9.0), &Value::String("a".into())),
            Ordering::Less
        );
    }

    #[test]
    fn nan_is_greatest_float_and_self_equal() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(compare(&nan, &Value::Float(f64::INFINITY)), Ordering::Greater);
        assert_eq!(compare(&nan, &nan), Ordering::Equal);
    }

    #[test]
    fn equality_mixes_numerics() {
        assert!(equal(&Value::Int(1), &Value::Float(1.0)));
        assert!(!equal(&Value::Int(1), &Value::Float(1.5)));
        assert!(!equal(&Value::Int(1), &Value::String("1".into())));
    }

    #[test]
    fn mixed_numeric_group_keys_hash_alike() {
        let hi = hash_value(&Value::Int(4)).unwrap();
        let hf = hash_value(&Value::Float(4.0)).unwrap();
        assert_eq!(hi, hf);
        assert!(hash_value(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn arrays_compare_lexicographically() {
        let a = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::Array(vec![Value::Int(1), Value::Int(3)]);
        let c = Value::Array(vec![Value::Int(1)]);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&c, &a), Ordering::Less);
    }
}
