//! Tests for the path mini-language: compilation, evaluation and writes.

use std::collections::HashMap;
use tupleflow::tupleflow::data::{Path, Selector, Value};
use tupleflow::BqlError;

fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

fn store_sample() -> Value {
    map(vec![(
        "store",
        map(vec![(
            "book",
            Value::Array(vec![
                map(vec![
                    ("title", Value::String("x".into())),
                    ("price", Value::Int(10)),
                ]),
                map(vec![
                    ("title", Value::String("y".into())),
                    ("price", Value::Int(20)),
                ]),
            ]),
        )]),
    )])
}

#[test]
fn test_compile_selector_shapes() {
    let p = Path::compile("a..b['k'][0][1:2][:][*]").unwrap();
    assert_eq!(
        p.selectors(),
        &[
            Selector::MapKey("a".into()),
            Selector::RecursiveMapKey("b".into()),
            Selector::MapKey("k".into()),
            Selector::ArrayIndex(0),
            Selector::Slice {
                start: Some(1),
                end: Some(2),
                step: None
            },
            Selector::Slice {
                start: None,
                end: None,
                step: None
            },
            Selector::Wildcard,
        ]
    );
}

#[test]
fn test_compile_quoted_head() {
    let p = Path::compile("['odd key']").unwrap();
    assert_eq!(p.selectors(), &[Selector::MapKey("odd key".into())]);
    // '' is the embedded quote escape
    let p = Path::compile("['it''s']").unwrap();
    assert_eq!(p.selectors(), &[Selector::MapKey("it's".into())]);
}

#[test]
fn test_compile_errors_carry_offsets() {
    match Path::compile("a.").unwrap_err() {
        BqlError::PathError { offset, .. } => assert_eq!(offset, 2),
        other => panic!("expected path error, got {:?}", other),
    }
    match Path::compile("a[1:2:0]").unwrap_err() {
        BqlError::PathError { offset, .. } => assert_eq!(offset, 6),
        other => panic!("expected path error, got {:?}", other),
    }
    assert!(Path::compile("1abc").is_err());
    assert!(Path::compile("a[]").is_err());
}

#[test]
fn test_escaped_segments_select_literal_keys() {
    // A backslash escapes structural characters in bare segments
    let p = Path::compile(r"store\.name").unwrap();
    assert_eq!(p.selectors(), &[Selector::MapKey("store.name".into())]);

    let v = map(vec![
        ("store.name", Value::String("corner shop".into())),
        ("store", map(vec![("name", Value::String("nested".into()))])),
    ]);
    assert_eq!(
        p.evaluate(&v).unwrap(),
        Value::String("corner shop".into())
    );
    // The unescaped path still descends
    assert_eq!(
        Path::compile("store.name").unwrap().evaluate(&v).unwrap(),
        Value::String("nested".into())
    );

    // Escaped brackets and writes through escaped keys work the same way
    let p = Path::compile(r"a\[0").unwrap();
    let v = map(vec![("a[0", Value::Int(1))]);
    assert_eq!(p.evaluate(&v).unwrap(), Value::Int(1));
    let updated = p.set(&v, Value::Int(2)).unwrap();
    assert_eq!(p.evaluate(&updated).unwrap(), Value::Int(2));
}

#[test]
fn test_evaluate_book_title() {
    // store.book[0]['title'] on the nested sample yields "x"
    let p = Path::compile("store.book[0]['title']").unwrap();
    assert_eq!(
        p.evaluate(&store_sample()).unwrap(),
        Value::String("x".into())
    );
}

#[test]
fn test_evaluate_negative_index() {
    let p = Path::compile("store.book[-1].price").unwrap();
    assert_eq!(p.evaluate(&store_sample()).unwrap(), Value::Int(20));
    let p = Path::compile("store.book[-3]").unwrap();
    assert!(p.evaluate(&store_sample()).is_err());
}

#[test]
fn test_missing_key_fails_instead_of_null() {
    let p = Path::compile("store.magazine").unwrap();
    assert!(p.evaluate(&store_sample()).is_err());
}

#[test]
fn test_slices_clamp() {
    let v = map(vec![(
        "a",
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    )]);
    let eval = |path: &str| Path::compile(path).unwrap().evaluate(&v).unwrap();
    assert_eq!(eval("a[1:]"), Value::Array(vec![Value::Int(2), Value::Int(3)]));
    assert_eq!(eval("a[:2]"), Value::Array(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(
        eval("a[0:10]"),
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(eval("a[5:10]"), Value::Array(vec![]));
    assert_eq!(eval("a[0:3:2]"), Value::Array(vec![Value::Int(1), Value::Int(3)]));
}

#[test]
fn test_recursive_descent_collects_all_matches() {
    let p = Path::compile("store..price").unwrap();
    assert_eq!(
        p.evaluate(&store_sample()).unwrap(),
        Value::Array(vec![Value::Int(10), Value::Int(20)])
    );
}

#[test]
fn test_wildcard_is_deterministic_over_maps() {
    let v = map(vec![(
        "m",
        map(vec![
            ("b", Value::Int(2)),
            ("a", Value::Int(1)),
            ("c", Value::Int(3)),
        ]),
    )]);
    let p = Path::compile("m[*]").unwrap();
    assert_eq!(
        p.evaluate(&v).unwrap(),
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_set_replaces_nested_value() {
    let p = Path::compile("store.book[1].price").unwrap();
    let updated = p.set(&store_sample(), Value::Int(25)).unwrap();
    assert_eq!(p.evaluate(&updated).unwrap(), Value::Int(25));
    // The original shape is untouched elsewhere
    let title = Path::compile("store.book[1].title").unwrap();
    assert_eq!(
        title.evaluate(&updated).unwrap(),
        Value::String("y".into())
    );
}

#[test]
fn test_set_creates_missing_maps_but_not_indices() {
    let empty = Value::Map(HashMap::new());
    let p = Path::compile("a.b.c").unwrap();
    let updated = p.set(&empty, Value::Bool(true)).unwrap();
    assert_eq!(p.evaluate(&updated).unwrap(), Value::Bool(true));

    let p = Path::compile("a[0]").unwrap();
    assert!(p.set(&empty, Value::Int(1)).is_err());
}

#[test]
fn test_set_rejects_negative_indices() {
    let v = map(vec![("a", Value::Array(vec![Value::Int(1)]))]);
    let p = Path::compile("a[-1]").unwrap();
    assert!(p.set(&v, Value::Int(9)).is_err());
}

#[test]
fn test_set_get_round_trip() {
    // For any single-value path, writing back what was read is a no-op
    let sample = store_sample();
    for path in [
        "store",
        "store.book",
        "store.book[0]",
        "store.book[0]['title']",
        "store.book[1].price",
    ] {
        let p = Path::compile(path).unwrap();
        let selected = p.evaluate(&sample).unwrap();
        assert_eq!(p.set(&sample, selected).unwrap(), sample, "path {}", path);
    }
}

#[test]
fn test_paths_are_reusable() {
    let p = Path::compile("store.book[0].price").unwrap();
    let sample = store_sample();
    assert_eq!(p.evaluate(&sample).unwrap(), Value::Int(10));
    assert_eq!(p.evaluate(&sample).unwrap(), Value::Int(10));
    assert_eq!(format!("{}", p), "store.book[0].price");
}
