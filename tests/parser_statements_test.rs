//! Tests for the non-SELECT statement surface: sources, sinks, streams,
//! state and EVAL.

use std::collections::HashMap;
use tupleflow::tupleflow::bql::ast::*;
use tupleflow::tupleflow::data::Value;
use tupleflow::BqlParser;

fn parse_one(input: &str) -> Statement {
    BqlParser::new()
        .parse_stmt(input)
        .unwrap_or_else(|e| panic!("parse failed for {:?}: {}", input, e))
        .0
}

fn param(key: &str, value: Value) -> SourceSinkParam {
    SourceSinkParam {
        key: key.to_string(),
        value,
    }
}

#[test]
fn test_create_paused_source_with_params() {
    // CREATE PAUSED SOURCE src TYPE http WITH url = 'http://x', retry = 3
    let stmt = parse_one("CREATE PAUSED SOURCE src TYPE http WITH url = 'http://x', retry = 3;");
    assert_eq!(
        stmt,
        Statement::CreateSource {
            paused: BinaryKeyword::Yes,
            name: "src".to_string(),
            source_type: "http".to_string(),
            params: vec![
                param("url", Value::String("http://x".to_string())),
                param("retry", Value::Int(3)),
            ],
        }
    );
}

#[test]
fn test_create_source_paused_keywords() {
    for (text, expected) in [
        ("CREATE SOURCE s TYPE t;", BinaryKeyword::Unspecified),
        ("CREATE PAUSED SOURCE s TYPE t;", BinaryKeyword::Yes),
        ("CREATE UNPAUSED SOURCE s TYPE t;", BinaryKeyword::No),
    ] {
        match parse_one(text) {
            Statement::CreateSource { paused, .. } => assert_eq!(paused, expected, "{}", text),
            other => panic!("expected CREATE SOURCE, got {:?}", other),
        }
    }
}

#[test]
fn test_param_values_can_nest() {
    let stmt = parse_one(
        "CREATE SINK snk TYPE file WITH tags = ['a', 'b', ], meta = {'depth': 2, 'flag': true}, offset = -1;",
    );
    let mut meta = HashMap::new();
    meta.insert("depth".to_string(), Value::Int(2));
    meta.insert("flag".to_string(), Value::Bool(true));
    assert_eq!(
        stmt,
        Statement::CreateSink {
            name: "snk".to_string(),
            sink_type: "file".to_string(),
            params: vec![
                param(
                    "tags",
                    Value::Array(vec![
                        Value::String("a".to_string()),
                        Value::String("b".to_string()),
                    ])
                ),
                param("meta", Value::Map(meta)),
                param("offset", Value::Int(-1)),
            ],
        }
    );
}

#[test]
fn test_update_statements() {
    assert_eq!(
        parse_one("UPDATE SOURCE src SET retry = 5;"),
        Statement::UpdateSource {
            name: "src".to_string(),
            params: vec![param("retry", Value::Int(5))],
        }
    );
    assert_eq!(
        parse_one("UPDATE SINK snk SET path = '/tmp/out';"),
        Statement::UpdateSink {
            name: "snk".to_string(),
            params: vec![param("path", Value::String("/tmp/out".to_string()))],
        }
    );
    assert_eq!(
        parse_one("UPDATE STATE st SET threshold = 0.5;"),
        Statement::UpdateState {
            name: "st".to_string(),
            params: vec![param("threshold", Value::Float(0.5))],
        }
    );
}

#[test]
fn test_source_lifecycle_statements() {
    assert_eq!(
        parse_one("PAUSE SOURCE src;"),
        Statement::PauseSource {
            source: "src".to_string()
        }
    );
    assert_eq!(
        parse_one("RESUME SOURCE src;"),
        Statement::ResumeSource {
            source: "src".to_string()
        }
    );
    assert_eq!(
        parse_one("REWIND SOURCE src;"),
        Statement::RewindSource {
            source: "src".to_string()
        }
    );
}

#[test]
fn test_drop_statements() {
    assert_eq!(
        parse_one("DROP SOURCE a;"),
        Statement::DropSource {
            source: "a".to_string()
        }
    );
    assert_eq!(
        parse_one("DROP STREAM b;"),
        Statement::DropStream {
            stream: "b".to_string()
        }
    );
    assert_eq!(
        parse_one("DROP SINK c;"),
        Statement::DropSink {
            sink: "c".to_string()
        }
    );
    assert_eq!(
        parse_one("DROP STATE d;"),
        Statement::DropState {
            state: "d".to_string()
        }
    );
}

#[test]
fn test_create_stream_as_select() {
    let stmt = parse_one("CREATE STREAM out AS SELECT RSTREAM a FROM s [RANGE 1 TUPLES];");
    match stmt {
        Statement::CreateStreamAsSelect { name, select } => {
            assert_eq!(name, "out");
            assert_eq!(select.emitter.kind, EmitterKind::Rstream);
        }
        other => panic!("expected CREATE STREAM AS SELECT, got {:?}", other),
    }
}

#[test]
fn test_create_stream_as_select_union() {
    let stmt = parse_one(
        "CREATE STREAM out AS SELECT RSTREAM a FROM s [RANGE 1 TUPLES] \
         UNION ALL SELECT RSTREAM b FROM t [RANGE 1 TUPLES];",
    );
    match stmt {
        Statement::CreateStreamAsSelectUnion { name, select } => {
            assert_eq!(name, "out");
            assert_eq!(select.selects.len(), 2);
        }
        other => panic!("expected CREATE STREAM AS SELECT UNION, got {:?}", other),
    }
}

#[test]
fn test_insert_statements() {
    match parse_one("INSERT INTO snk SELECT RSTREAM a FROM s [RANGE 1 TUPLES];") {
        Statement::InsertIntoSelect { sink, .. } => assert_eq!(sink, "snk"),
        other => panic!("expected INSERT INTO SELECT, got {:?}", other),
    }
    assert_eq!(
        parse_one("INSERT INTO snk FROM str;"),
        Statement::InsertIntoFrom {
            sink: "snk".to_string(),
            input: "str".to_string(),
        }
    );
}

#[test]
fn test_state_statements() {
    assert_eq!(
        parse_one("CREATE STATE counters TYPE kv WITH persist = true;"),
        Statement::CreateState {
            name: "counters".to_string(),
            state_type: "kv".to_string(),
            params: vec![param("persist", Value::Bool(true))],
        }
    );
    assert_eq!(
        parse_one("SAVE STATE counters;"),
        Statement::SaveState {
            name: "counters".to_string(),
            tag: None,
        }
    );
    assert_eq!(
        parse_one("SAVE STATE counters TAG nightly;"),
        Statement::SaveState {
            name: "counters".to_string(),
            tag: Some("nightly".to_string()),
        }
    );
}

#[test]
fn test_load_state_variants() {
    assert_eq!(
        parse_one("LOAD STATE counters TYPE kv;"),
        Statement::LoadState(LoadStateStmt {
            name: "counters".to_string(),
            state_type: "kv".to_string(),
            tag: None,
            set_params: vec![],
        })
    );
    assert_eq!(
        parse_one("LOAD STATE counters TYPE kv TAG nightly SET mode = 'ro';"),
        Statement::LoadState(LoadStateStmt {
            name: "counters".to_string(),
            state_type: "kv".to_string(),
            tag: Some("nightly".to_string()),
            set_params: vec![param("mode", Value::String("ro".to_string()))],
        })
    );
    assert_eq!(
        parse_one("LOAD STATE counters TYPE kv OR CREATE IF NOT EXISTS WITH persist = true;"),
        Statement::LoadStateOrCreate {
            load: LoadStateStmt {
                name: "counters".to_string(),
                state_type: "kv".to_string(),
                tag: None,
                set_params: vec![],
            },
            create_params: vec![param("persist", Value::Bool(true))],
        }
    );
    assert_eq!(
        parse_one("LOAD STATE counters TYPE kv OR CREATE IF NOT EXISTS;"),
        Statement::LoadStateOrCreate {
            load: LoadStateStmt {
                name: "counters".to_string(),
                state_type: "kv".to_string(),
                tag: None,
                set_params: vec![],
            },
            create_params: vec![],
        }
    );
}

#[test]
fn test_eval_with_input_row() {
    // EVAL a + b ON {'a':1,'b':2}
    let stmt = parse_one("EVAL a + b ON {'a':1,'b':2};");
    assert_eq!(
        stmt,
        Statement::Eval {
            expr: Expression::BinaryOp {
                op: BinaryOperator::Plus,
                left: Box::new(Expression::RowValue {
                    relation: None,
                    column: "a".to_string(),
                }),
                right: Box::new(Expression::RowValue {
                    relation: None,
                    column: "b".to_string(),
                }),
            },
            input: Some(Expression::MapExpr(vec![
                ("a".to_string(), Expression::Literal(Value::Int(1))),
                ("b".to_string(), Expression::Literal(Value::Int(2))),
            ])),
        }
    );
}

#[test]
fn test_eval_without_input() {
    assert_eq!(
        parse_one("EVAL 1 + 2;"),
        Statement::Eval {
            expr: Expression::BinaryOp {
                op: BinaryOperator::Plus,
                left: Box::new(Expression::Literal(Value::Int(1))),
                right: Box::new(Expression::Literal(Value::Int(2))),
            },
            input: None,
        }
    );
}

#[test]
fn test_statement_kind_names() {
    assert_eq!(parse_one("DROP STREAM x;").kind(), "DROP STREAM");
    assert_eq!(parse_one("EVAL 1;").kind(), "EVAL");
    assert_eq!(
        parse_one("LOAD STATE s TYPE t OR CREATE IF NOT EXISTS;").kind(),
        "LOAD STATE OR CREATE"
    );
}
