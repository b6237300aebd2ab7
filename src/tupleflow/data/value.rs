//! Core dynamic value type for tuples flowing through the engine.
//!
//! A [`Value`] is what every tuple field holds and what every BQL expression
//! evaluates to. The type carries its variant tag at all times; readers
//! dispatch on the tag rather than assume a shape. Conversions between
//! variants follow a fixed admitted-set table and fail with a typed error
//! outside it - `Null` propagates through conversions as an error, never as
//! a silent zero.

use crate::tupleflow::error::BqlError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A value in a tuple field
///
/// This enum represents all value shapes the engine knows. It supports both
/// simple scalars (integers, strings, booleans) and nested containers
/// (arrays, maps). Arrays may be heterogeneous; map keys are unique strings.
/// A key present with value `Null` is distinct from a missing key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Singleton absence
    Null,
    /// Boolean value (true/false)
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// IEEE-754 64-bit floating point; NaN is permitted
    Float(f64),
    /// Unicode string
    String(String),
    /// Arbitrary octet sequence
    Blob(Vec<u8>),
    /// Instant with nanosecond resolution, normalized to UTC
    Timestamp(DateTime<Utc>),
    /// Ordered, possibly heterogeneous sequence of values
    Array(Vec<Value>),
    /// String-keyed mapping; iteration order is not part of the contract
    Map(HashMap<String, Value>),
}

/// The variant tags of [`Value`], used as cast targets and result-type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Blob,
    Timestamp,
    Array,
    Map,
}

impl ValueType {
    /// Type name for error messages and diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Null => "null",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Blob => "blob",
            ValueType::Timestamp => "timestamp",
            ValueType::Array => "array",
            ValueType::Map => "map",
        }
    }

    /// Look up a type by its BQL name, case-insensitively
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name.to_ascii_lowercase().as_str() {
            "bool" => Some(ValueType::Bool),
            "int" => Some(ValueType::Int),
            "float" => Some(ValueType::Float),
            "string" => Some(ValueType::String),
            "blob" => Some(ValueType::Blob),
            "timestamp" => Some(ValueType::Timestamp),
            "array" => Some(ValueType::Array),
            "map" => Some(ValueType::Map),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::String(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "{}", BASE64.encode(b)),
            Value::Timestamp(t) => {
                write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                // Sort keys so the rendering is deterministic
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, map[*k])?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Custom Serialize implementation for Value
///
/// Serialization targets the JSON rendering used by the String conversion
/// lattice entries and diagnostic output:
/// - Blob -> base64 string
/// - Timestamp -> RFC3339 string with nanoseconds
impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_str(&BASE64.encode(b)),
            Value::Timestamp(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            Value::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for elem in arr {
                    seq.serialize_element(elem)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                // Deterministic key order for the diagnostic rendering
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    m.serialize_entry(k, &map[k])?;
                }
                m.end()
            }
        }
    }
}

/// Render a float the way the surface language prints them: the shortest
/// round-tripping digits, switching to exponent notation with a signed
/// two-digit exponent when the decimal exponent is below -4 or at least 6
/// (`1e+20`, `2.5e+06`, `1e-07`). Non-finite values render as `NaN`,
/// `+Inf` and `-Inf`.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        };
    }
    if f == 0.0 {
        return if f.is_sign_negative() {
            "-0".to_string()
        } else {
            "0".to_string()
        };
    }
    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => match e.parse::<i32>() {
            Ok(exp) => (m, exp),
            Err(_) => return sci,
        },
        None => return sci,
    };
    if exp < -4 || exp >= 6 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.unsigned_abs());
    }
    let (neg, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    // Digits in front of the decimal point once the exponent is applied
    let point = exp + 1;
    let body = if point >= digits.len() as i32 {
        let zeros = point as usize - digits.len();
        format!("{}{}", digits, "0".repeat(zeros))
    } else if point > 0 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else {
        format!("0.{}{}", "0".repeat(point.unsigned_abs() as usize), digits)
    };
    format!("{}{}", neg, body)
}

/// Parse a decimal literal into `Int` when it fits in 64 bits, `Float` when
/// it does not or contains a fractional part, and an error otherwise.
pub fn parse_number(s: &str) -> Result<Value, BqlError> {
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    match s.parse::<f64>() {
        Ok(f) => Ok(Value::Float(f)),
        Err(_) => Err(BqlError::type_error(
            "numeric literal",
            "string",
            Some(s.to_string()),
        )),
    }
}

/// Build a map value from JSON text. Used by the String -> Map cast.
fn map_from_json(s: &str) -> Result<Value, BqlError> {
    let parsed: serde_json::Value = serde_json::from_str(s).map_err(|e| {
        BqlError::type_error("JSON document", "string", Some(format!("{}: {}", s, e)))
    })?;
    let v = from_json(&parsed);
    match v {
        Value::Map(_) => Ok(v),
        other => Err(BqlError::type_error("JSON object", other.type_name(), None)),
    }
}

/// Build an array value from JSON text. Used by the String -> Array cast.
fn array_from_json(s: &str) -> Result<Value, BqlError> {
    let parsed: serde_json::Value = serde_json::from_str(s).map_err(|e| {
        BqlError::type_error("JSON document", "string", Some(format!("{}: {}", s, e)))
    })?;
    let v = from_json(&parsed);
    match v {
        Value::Array(_) => Ok(v),
        other => Err(BqlError::type_error("JSON array", other.type_name(), None)),
    }
}

/// Convert a parsed JSON tree into a [`Value`] tree
pub fn from_json(j: &serde_json::Value) -> Value {
    match j {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(arr) => Value::Array(arr.iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => Value::Map(
            obj.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

impl Value {
    /// Get the type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Blob(_) => ValueType::Blob,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Array(_) => ValueType::Array,
            Value::Map(_) => ValueType::Map,
        }
    }

    /// Get the type name for error messages and debugging
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Check if this value is a numeric type usable in arithmetic
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    fn access_error(&self, expected: &str) -> BqlError {
        BqlError::type_error(expected, self.type_name(), Some(self.to_string()))
    }

    // Strict accessors. These succeed only on the exact variant; use the
    // to_* conversions for the lenient lattice.

    pub fn as_bool(&self) -> Result<bool, BqlError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.access_error("bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64, BqlError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.access_error("int")),
        }
    }

    pub fn as_float(&self) -> Result<f64, BqlError> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(other.access_error("float")),
        }
    }

    pub fn as_string(&self) -> Result<&str, BqlError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.access_error("string")),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8], BqlError> {
        match self {
            Value::Blob(b) => Ok(b),
            other => Err(other.access_error("blob")),
        }
    }

    pub fn as_timestamp(&self) -> Result<DateTime<Utc>, BqlError> {
        match self {
            Value::Timestamp(t) => Ok(*t),
            other => Err(other.access_error("timestamp")),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], BqlError> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.access_error("array")),
        }
    }

    pub fn as_map(&self) -> Result<&HashMap<String, Value>, BqlError> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(other.access_error("map")),
        }
    }

    /// Convert this value to a boolean following the conversion table.
    ///
    /// Numbers convert by non-zero-ness (NaN is false-inadmissible and
    /// fails); strings must spell "true" or "false" case-insensitively.
    pub fn to_bool(&self) -> Result<bool, BqlError> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0 && !f.is_nan()),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(self.access_error("'true' or 'false'")),
            },
            other => Err(other.access_error("bool-convertible value")),
        }
    }

    /// Convert this value to an integer following the conversion table.
    ///
    /// Floats are truncated when finite and representable; timestamps
    /// convert to unix microseconds.
    pub fn to_int(&self) -> Result<i64, BqlError> {
        match self {
            Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
            Value::Int(i) => Ok(*i),
            Value::Float(f) => {
                if f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Ok(*f as i64)
                } else {
                    Err(self.access_error("int-representable float"))
                }
            }
            Value::String(s) => s
                .parse::<i64>()
                .map_err(|_| self.access_error("decimal integer string")),
            Value::Timestamp(t) => Ok(t.timestamp_micros()),
            other => Err(other.access_error("int-convertible value")),
        }
    }

    /// Convert this value to a float following the conversion table.
    pub fn to_float(&self) -> Result<f64, BqlError> {
        match self {
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|_| self.access_error("numeric string")),
            Value::Timestamp(t) => Ok(t.timestamp_micros() as f64 / 1e6),
            other => Err(other.access_error("float-convertible value")),
        }
    }

    /// Convert this value to a string following the conversion table.
    ///
    /// Floats use the engine's exponent-switching rendering; blobs become
    /// base64; timestamps become RFC3339 with nanoseconds; arrays and maps
    /// become their JSON rendering.
    pub fn to_string_value(&self) -> Result<String, BqlError> {
        match self {
            Value::Bool(b) => Ok(b.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::String(s) => Ok(s.clone()),
            Value::Blob(b) => Ok(BASE64.encode(b)),
            Value::Timestamp(t) => Ok(t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            Value::Array(_) | Value::Map(_) => serde_json::to_string(self).map_err(|e| {
                BqlError::value_error(format!("cannot render {} as JSON: {}", self.type_name(), e))
            }),
            Value::Null => Err(self.access_error("string-convertible value")),
        }
    }

    /// Convert this value to a timestamp following the conversion table.
    ///
    /// Integers are unix microseconds; strings are parsed as RFC3339.
    pub fn to_timestamp(&self) -> Result<DateTime<Utc>, BqlError> {
        match self {
            Value::Timestamp(t) => Ok(*t),
            Value::Int(i) => match Utc.timestamp_micros(*i) {
                chrono::offset::LocalResult::Single(t) => Ok(t),
                _ => Err(BqlError::value_error(format!(
                    "microsecond timestamp {} is out of range",
                    i
                ))),
            },
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| self.access_error("RFC3339 timestamp string")),
            other => Err(other.access_error("timestamp-convertible value")),
        }
    }

    /// Cast this value to the given target type.
    ///
    /// This is what the `::` operator and `CAST(... AS ...)` evaluate to.
    /// Casting to map or array requires the source to be a JSON string.
    pub fn cast_to(&self, target: ValueType) -> Result<Value, BqlError> {
        if self.value_type() == target {
            return Ok(self.clone());
        }
        match target {
            ValueType::Bool => self.to_bool().map(Value::Bool),
            ValueType::Int => self.to_int().map(Value::Int),
            ValueType::Float => self.to_float().map(Value::Float),
            ValueType::String => self.to_string_value().map(Value::String),
            ValueType::Timestamp => self.to_timestamp().map(Value::Timestamp),
            ValueType::Map => match self {
                Value::String(s) => map_from_json(s),
                other => Err(other.access_error("JSON string")),
            },
            ValueType::Array => match self {
                Value::String(s) => array_from_json(s),
                other => Err(other.access_error("JSON string")),
            },
            ValueType::Blob | ValueType::Null => Err(BqlError::type_error(
                target.name(),
                self.type_name(),
                Some(self.to_string()),
            )),
        }
    }
}

fn arithmetic_operands(op: &str, a: &Value, b: &Value) -> BqlError {
    BqlError::type_error(
        "numeric operands",
        format!("{} {} {}", a.type_name(), op, b.type_name()),
        None,
    )
}

/// Add two values with numeric promotion.
///
/// Int + Int stays Int unless it overflows, in which case the result is
/// promoted to Float with permitted loss of precision. Any mixed Int/Float
/// operation produces Float.
pub fn add_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_add(*y) {
            Some(v) => Value::Int(v),
            None => Value::Float(*x as f64 + *y as f64),
        }),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x + y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 + y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x + *y as f64)),
        _ => Err(arithmetic_operands("+", a, b)),
    }
}

/// Subtract two values with numeric promotion
pub fn sub_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_sub(*y) {
            Some(v) => Value::Int(v),
            None => Value::Float(*x as f64 - *y as f64),
        }),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x - y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 - y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x - *y as f64)),
        _ => Err(arithmetic_operands("-", a, b)),
    }
}

/// Multiply two values with numeric promotion
pub fn mul_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match x.checked_mul(*y) {
            Some(v) => Value::Int(v),
            None => Value::Float(*x as f64 * *y as f64),
        }),
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x * y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 * y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x * *y as f64)),
        _ => Err(arithmetic_operands("*", a, b)),
    }
}

/// Divide two values.
///
/// Integer division truncates and fails on a zero divisor; any float
/// operand makes the division IEEE-754, where division by zero yields
/// an infinity (or NaN for 0/0).
pub fn div_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            if *y == 0 {
                Err(BqlError::value_error("integer division by zero"))
            } else {
                Ok(Value::Int(x / y))
            }
        }
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x / y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 / y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x / *y as f64)),
        _ => Err(arithmetic_operands("/", a, b)),
    }
}

/// Take the remainder of two values, with the same zero-divisor policy
/// as division
pub fn rem_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => {
            if *y == 0 {
                Err(BqlError::value_error("integer modulo by zero"))
            } else {
                Ok(Value::Int(x % y))
            }
        }
        (Value::Float(x), Value::Float(y)) => Ok(Value::Float(x % y)),
        (Value::Int(x), Value::Float(y)) => Ok(Value::Float(*x as f64 % y)),
        (Value::Float(x), Value::Int(y)) => Ok(Value::Float(x % *y as f64)),
        _ => Err(arithmetic_operands("%", a, b)),
    }
}

/// Concatenate two string values.
///
/// The `||` operator performs no implicit conversion; both sides must
/// already be strings.
pub fn concat_values(a: &Value, b: &Value) -> Result<Value, BqlError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            let mut s = String::with_capacity(x.len() + y.len());
            s.push_str(x);
            s.push_str(y);
            Ok(Value::String(s))
        }
        _ => Err(BqlError::type_error(
            "string operands",
            format!("{} || {}", a.type_name(), b.type_name()),
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_prefers_int() {
        assert_eq!(parse_number("42").unwrap(), Value::Int(42));
        assert_eq!(parse_number("-7").unwrap(), Value::Int(-7));
        assert_eq!(parse_number("3.25").unwrap(), Value::Float(3.25));
        // Does not fit in 64 bits, falls back to float
        assert_eq!(
            parse_number("9223372036854775808").unwrap(),
            Value::Float(9223372036854775808.0)
        );
        assert!(parse_number("x12").is_err());
    }

    #[test]
    fn int_overflow_promotes_to_float() {
        let r = add_values(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert_eq!(r, Value::Float(i64::MAX as f64 + 1.0));
    }

    #[test]
    fn integer_division_by_zero_fails() {
        assert!(div_values(&Value::Int(1), &Value::Int(0)).is_err());
        let inf = div_values(&Value::Float(1.0), &Value::Float(0.0)).unwrap();
        assert_eq!(inf, Value::Float(f64::INFINITY));
        match div_values(&Value::Float(0.0), &Value::Float(0.0)).unwrap() {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn concat_requires_strings() {
        let r = concat_values(
            &Value::String("a".into()),
            &Value::String("b".into()),
        )
        .unwrap();
        assert_eq!(r, Value::String("ab".into()));
        assert!(concat_values(&Value::String("a".into()), &Value::Int(1)).is_err());
    }

    #[test]
    fn float_strings_switch_notation() {
        assert_eq!(Value::Float(1.5).to_string_value().unwrap(), "1.5");
        assert_eq!(Value::Float(1e20).to_string_value().unwrap(), "1e+20");
        assert_eq!(Value::Float(0.0000001).to_string_value().unwrap(), "1e-07");
        assert_eq!(format!("{}", Value::Float(2500000.0)), "2.5e+06");
        assert_eq!(format!("{}", Value::Float(-0.5)), "-0.5");
    }

    #[test]
    fn null_does_not_convert_silently() {
        assert!(Value::Null.to_bool().is_err());
        assert!(Value::Null.to_int().is_err());
        assert!(Value::Null.to_string_value().is_err());
    }

    #[test]
    fn timestamp_numeric_conversions_use_microseconds() {
        let t = Utc.timestamp_micros(1_500_000).unwrap();
        assert_eq!(Value::Timestamp(t).to_int().unwrap(), 1_500_000);
        assert_eq!(Value::Timestamp(t).to_float().unwrap(), 1.5);
        assert_eq!(
            Value::Int(1_500_000).to_timestamp().unwrap(),
            t
        );
    }

    #[test]
    fn string_to_map_cast_parses_json() {
        let m = Value::String(r#"{"a": 1}"#.into())
            .cast_to(ValueType::Map)
            .unwrap();
        match m {
            Value::Map(map) => assert_eq!(map["a"], Value::Int(1)),
            other => panic!("expected map, got {:?}", other),
        }
        assert!(Value::Int(3).cast_to(ValueType::Map).is_err());
    }
}
