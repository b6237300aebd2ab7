//! Compiled navigation paths over nested values.
//!
//! A path selects into maps and arrays: `store.book[0]['title']`,
//! `..price`, `items[1:3]`, `values[*]`. Compiled paths are immutable and
//! reusable across threads; compile failures carry the offset into the
//! source string.

use super::value::Value;
use crate::tupleflow::error::BqlError;
use std::collections::HashMap;
use std::fmt;

/// One step of a compiled path
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Descend into a map by key
    MapKey(String),
    /// Descend into any nested map by key, collecting all matches
    RecursiveMapKey(String),
    /// Select an array element; negative counts from the end
    ArrayIndex(i64),
    /// Half-open array slice with optional bounds and step
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    /// All values at the current level
    Wildcard,
}

/// A compiled, immutable path expression
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    selectors: Vec<Selector>,
    raw: String,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Character-level compiler for the path mini-language
struct PathCompiler {
    chars: Vec<char>,
    pos: usize,
}

impl PathCompiler {
    fn new(text: &str) -> Self {
        PathCompiler {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> BqlError {
        BqlError::path_error(message, self.pos)
    }

    /// Identifiers are ASCII letters/digits/underscore starting with a
    /// letter. A backslash escapes the following character verbatim, so a
    /// literal `.` or `[` can appear in a bare segment (`store\.name`).
    /// A trailing backslash is dropped, matching the original scanner.
    fn parse_ident(&mut self) -> Result<String, BqlError> {
        match self.peek() {
            Some('\\') => {}
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return Err(self.error("expected identifier")),
        }
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    if let Some(c) = self.peek() {
                        out.push(c);
                        self.pos += 1;
                    }
                }
                Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                    out.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if out.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    /// Single-quoted key with `''` as the embedded escape
    fn parse_quoted(&mut self) -> Result<String, BqlError> {
        if self.peek() != Some('\'') {
            return Err(self.error("expected quoted key"));
        }
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.pos += 1;
                    if self.peek() == Some('\'') {
                        out.push('\'');
                        self.pos += 1;
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated quoted key")),
            }
        }
    }

    fn parse_int(&mut self) -> Result<i64, BqlError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == digits_start {
            self.pos = start;
            return Err(self.error("expected integer"));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>()
            .map_err(|_| BqlError::path_error("integer out of range", start))
    }

    fn try_parse_int(&mut self) -> Option<i64> {
        let save = self.pos;
        match self.parse_int() {
            Ok(i) => Some(i),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    /// Everything that can appear between `[` and `]`: a quoted key, the
    /// wildcard, an index or a slice
    fn parse_bracket(&mut self) -> Result<Selector, BqlError> {
        // Opening bracket is already consumed
        if self.peek() == Some('\'') {
            let key = self.parse_quoted()?;
            self.expect(']')?;
            return Ok(Selector::MapKey(key));
        }
        if self.peek() == Some('*') {
            self.pos += 1;
            self.expect(']')?;
            return Ok(Selector::Wildcard);
        }
        let first = self.try_parse_int();
        if self.peek() == Some(':') {
            self.pos += 1;
            let end = self.try_parse_int();
            let mut step = None;
            if self.peek() == Some(':') {
                self.pos += 1;
                let step_pos = self.pos;
                step = self.try_parse_int();
                if step == Some(0) {
                    return Err(BqlError::path_error("slice step must not be zero", step_pos));
                }
            }
            self.expect(']')?;
            return Ok(Selector::Slice {
                start: first,
                end,
                step,
            });
        }
        match first {
            Some(i) => {
                self.expect(']')?;
                Ok(Selector::ArrayIndex(i))
            }
            None => Err(self.error("expected key, index, slice or wildcard")),
        }
    }

    fn expect(&mut self, c: char) -> Result<(), BqlError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", c)))
        }
    }

    fn compile(&mut self) -> Result<Vec<Selector>, BqlError> {
        let mut selectors = Vec::new();

        // Head: bare identifier or ['quoted']
        match self.peek() {
            Some('[') => {
                self.pos += 1;
                let key = self.parse_quoted()?;
                self.expect(']')?;
                selectors.push(Selector::MapKey(key));
            }
            _ => selectors.push(Selector::MapKey(self.parse_ident()?)),
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.peek() == Some('.') {
                        self.pos += 1;
                        selectors.push(Selector::RecursiveMapKey(self.parse_ident()?));
                    } else {
                        selectors.push(Selector::MapKey(self.parse_ident()?));
                    }
                }
                '[' => {
                    self.pos += 1;
                    selectors.push(self.parse_bracket()?);
                }
                _ => return Err(self.error("unexpected character in path")),
            }
        }
        Ok(selectors)
    }
}

/// Collect every value reachable under `key` in any nested map, maps in
/// sorted key order, arrays left to right
fn collect_recursive(v: &Value, key: &str, out: &mut Vec<Value>) {
    match v {
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                let child = &map[k];
                if k == key {
                    out.push(child.clone());
                }
                collect_recursive(child, key, out);
            }
        }
        Value::Array(arr) => {
            for elem in arr {
                collect_recursive(elem, key, out);
            }
        }
        _ => {}
    }
}

/// Apply python-style slice semantics; out-of-range bounds clamp instead
/// of failing
fn slice_array(arr: &[Value], start: Option<i64>, end: Option<i64>, step: Option<i64>) -> Vec<Value> {
    let len = arr.len() as i64;
    let step = step.unwrap_or(1);
    let clamp = |idx: i64, upper: i64| -> i64 { idx.max(0).min(upper) };
    let normalize = |idx: i64| -> i64 {
        if idx < 0 {
            idx + len
        } else {
            idx
        }
    };
    let mut out = Vec::new();
    if step > 0 {
        let lo = clamp(normalize(start.unwrap_or(0)), len);
        let hi = clamp(normalize(end.unwrap_or(len)), len);
        let mut i = lo;
        while i < hi {
            out.push(arr[i as usize].clone());
            i += step;
        }
    } else {
        let lo = clamp(normalize(start.unwrap_or(len - 1)), len - 1);
        let hi = normalize(end.unwrap_or(-len - 1)).max(-1);
        let mut i = lo;
        while i > hi {
            out.push(arr[i as usize].clone());
            i += step;
        }
    }
    out
}

impl Path {
    /// Compile a path expression.
    ///
    /// Errors carry the offset of the rejected character in the source
    /// string.
    pub fn compile(text: &str) -> Result<Path, BqlError> {
        let mut compiler = PathCompiler::new(text);
        let selectors = compiler.compile()?;
        Ok(Path {
            selectors,
            raw: text.to_string(),
        })
    }

    /// The selector sequence of this path
    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Evaluate this path against a value, returning the selected value.
    ///
    /// A map key that is not present fails with an error, not `Null`;
    /// null-coalescing is a layer above. Slicing past the end of an array
    /// yields a possibly empty sub-array.
    pub fn evaluate(&self, v: &Value) -> Result<Value, BqlError> {
        let mut current = v.clone();
        for sel in &self.selectors {
            current = apply_selector(sel, &current)?;
        }
        Ok(current)
    }

    /// Return a new value with the selected location replaced by `new`.
    ///
    /// Missing intermediate maps are created; missing array indices fail,
    /// and indices must be non-negative on write. Recursive, slice and
    /// wildcard selectors cannot be written through.
    pub fn set(&self, v: &Value, new: Value) -> Result<Value, BqlError> {
        set_rec(v, &self.selectors, new)
    }
}

fn apply_selector(sel: &Selector, current: &Value) -> Result<Value, BqlError> {
    match sel {
        Selector::MapKey(key) => match current {
            Value::Map(map) => map
                .get(key)
                .cloned()
                .ok_or_else(|| BqlError::value_error(format!("key '{}' not found", key))),
            other => Err(BqlError::type_error(
                "map",
                other.type_name(),
                Some(other.to_string()),
            )),
        },
        Selector::RecursiveMapKey(key) => {
            let mut out = Vec::new();
            collect_recursive(current, key, &mut out);
            Ok(Value::Array(out))
        }
        Selector::ArrayIndex(i) => match current {
            Value::Array(arr) => {
                let len = arr.len() as i64;
                let idx = if *i < 0 { i + len } else { *i };
                if idx < 0 || idx >= len {
                    Err(BqlError::value_error(format!(
                        "index {} out of range for array of length {}",
                        i,
                        arr.len()
                    )))
                } else {
                    Ok(arr[idx as usize].clone())
                }
            }
            other => Err(BqlError::type_error(
                "array",
                other.type_name(),
                Some(other.to_string()),
            )),
        },
        Selector::Slice { start, end, step } => match current {
            Value::Array(arr) => Ok(Value::Array(slice_array(arr, *start, *end, *step))),
            other => Err(BqlError::type_error(
                "array",
                other.type_name(),
                Some(other.to_string()),
            )),
        },
        Selector::Wildcard => match current {
            Value::Array(arr) => Ok(Value::Array(arr.clone())),
            Value::Map(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                Ok(Value::Array(keys.iter().map(|k| map[*k].clone()).collect()))
            }
            other => Err(BqlError::type_error(
                "array or map",
                other.type_name(),
                Some(other.to_string()),
            )),
        },
    }
}

fn set_rec(current: &Value, selectors: &[Selector], new: Value) -> Result<Value, BqlError> {
    let (sel, rest) = match selectors.split_first() {
        Some(pair) => pair,
        None => return Ok(new),
    };
    match sel {
        Selector::MapKey(key) => {
            let map = match current {
                Value::Map(m) => m.clone(),
                other => {
                    return Err(BqlError::type_error(
                        "map",
                        other.type_name(),
                        Some(other.to_string()),
                    ))
                }
            };
            let replacement = match map.get(key) {
                Some(child) => set_rec(child, rest, new)?,
                None => match rest.first() {
                    None => new,
                    // Only maps are materialized on the way down
                    Some(Selector::MapKey(_)) => {
                        set_rec(&Value::Map(HashMap::new()), rest, new)?
                    }
                    Some(_) => {
                        return Err(BqlError::value_error(format!(
                            "key '{}' not found while writing",
                            key
                        )))
                    }
                },
            };
            let mut map = map;
            map.insert(key.clone(), replacement);
            Ok(Value::Map(map))
        }
        Selector::ArrayIndex(i) => {
            if *i < 0 {
                return Err(BqlError::value_error(
                    "array indices must be non-negative when writing",
                ));
            }
            let arr = match current {
                Value::Array(a) => a,
                other => {
                    return Err(BqlError::type_error(
                        "array",
                        other.type_name(),
                        Some(other.to_string()),
                    ))
                }
            };
            let idx = *i as usize;
            if idx >= arr.len() {
                return Err(BqlError::value_error(format!(
                    "index {} out of range for array of length {} while writing",
                    i,
                    arr.len()
                )));
            }
            let mut arr = arr.clone();
            arr[idx] = set_rec(&arr[idx], rest, new)?;
            Ok(Value::Array(arr))
        }
        Selector::RecursiveMapKey(_) | Selector::Slice { .. } | Selector::Wildcard => {
            Err(BqlError::value_error(
                "recursive, slice and wildcard selectors cannot be written through",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn backslash_escapes_structural_characters() {
        let p = Path::compile(r"store\.name").unwrap();
        assert_eq!(p.selectors(), &[Selector::MapKey("store.name".into())]);
        let p = Path::compile(r"a\[0.b").unwrap();
        assert_eq!(
            p.selectors(),
            &[Selector::MapKey("a[0".into()), Selector::MapKey("b".into())]
        );
        // A trailing backslash is dropped, as the original scanner does
        let p = Path::compile(r"a\").unwrap();
        assert_eq!(p.selectors(), &[Selector::MapKey("a".into())]);
    }

    #[test]
    fn compiles_mixed_selectors() {
        let p = Path::compile("store.book[0]['title']").unwrap();
        assert_eq!(
            p.selectors(),
            &[
                Selector::MapKey("store".into()),
                Selector::MapKey("book".into()),
                Selector::ArrayIndex(0),
                Selector::MapKey("title".into()),
            ]
        );
    }

    #[test]
    fn rejects_zero_step_at_compile_time() {
        let err = Path::compile("a[1:5:0]").unwrap_err();
        match err {
            BqlError::PathError { offset, .. } => assert_eq!(offset, 6),
            other => panic!("expected path error, got {:?}", other),
        }
    }

    #[test]
    fn missing_key_is_not_null() {
        let p = Path::compile("a").unwrap();
        let v = map(&[("b", Value::Int(1))]);
        assert!(p.evaluate(&v).is_err());
    }

    #[test]
    fn slicing_past_the_end_is_empty_not_an_error() {
        let p = Path::compile("a[5:9]").unwrap();
        let v = map(&[("a", Value::Array(vec![Value::Int(1), Value::Int(2)]))]);
        assert_eq!(p.evaluate(&v).unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn set_creates_missing_intermediate_maps() {
        let p = Path::compile("a.b.c").unwrap();
        let v = map(&[]);
        let out = p.set(&v, Value::Int(7)).unwrap();
        let read = Path::compile("a.b.c").unwrap().evaluate(&out).unwrap();
        assert_eq!(read, Value::Int(7));
    }

    #[test]
    fn set_round_trips_single_value_paths() {
        let v = map(&[
            ("store", map(&[("book", Value::Array(vec![map(&[("title", Value::String("x".into()))])]))])),
        ]);
        let p = Path::compile("store.book[0]['title']").unwrap();
        let selected = p.evaluate(&v).unwrap();
        assert_eq!(selected, Value::String("x".into()));
        let replaced = p.set(&v, selected).unwrap();
        assert_eq!(replaced, v);
    }

    #[test]
    fn recursive_descent_is_deterministic() {
        let v = map(&[
            ("b", map(&[("price", Value::Int(2))])),
            ("a", map(&[("price", Value::Int(1))])),
        ]);
        let p = Path::compile("x..price").unwrap();
        let root = map(&[("x", v)]);
        assert_eq!(
            p.evaluate(&root).unwrap(),
            Value::Array(vec![Value::Int(1), Value::Int(2)])
        );
    }
}
