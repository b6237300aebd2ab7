//! Tests for name/type resolution: alias inference, ambiguity reporting,
//! grouping legality, clause range checks and error accumulation.

use tupleflow::tupleflow::bql::ast::*;
use tupleflow::tupleflow::bql::registry::{FunctionKind, InMemoryRegistry};
use tupleflow::tupleflow::bql::resolver::Resolver;
use tupleflow::tupleflow::data::ValueType;
use tupleflow::{BqlError, BqlParser};

fn registry() -> InMemoryRegistry {
    let mut r = InMemoryRegistry::with_defaults();
    r.register("f", Some(1), FunctionKind::Scalar);
    r.register("series", Some(2), FunctionKind::Stream);
    r
}

fn resolve(input: &str) -> Result<tupleflow::ResolvedStatement, Vec<BqlError>> {
    let stmt = BqlParser::new()
        .parse_stmt(input)
        .unwrap_or_else(|e| panic!("parse failed for {:?}: {}", input, e))
        .0;
    let reg = registry();
    Resolver::new(&reg).resolve(stmt)
}

fn resolve_select(input: &str) -> (SelectStmt, Vec<tupleflow::ProjectionInfo>) {
    let resolved = resolve(input).unwrap_or_else(|e| panic!("resolve failed: {:?}", e));
    match resolved.statement {
        Statement::Select(s) => (s, resolved.projections),
        other => panic!("expected SELECT, got {:?}", other),
    }
}

#[test]
fn test_single_stream_qualifies_bare_references() {
    let (s, _) = resolve_select("SELECT RSTREAM a FROM s [RANGE 1 TUPLES] WHERE b > 1;");
    assert_eq!(
        s.projections[0],
        Expression::RowValue {
            relation: Some("s".to_string()),
            column: "a".to_string(),
        }
    );
    match s.filter.unwrap() {
        Expression::BinaryOp { left, .. } => assert_eq!(
            *left,
            Expression::RowValue {
                relation: Some("s".to_string()),
                column: "b".to_string(),
            }
        ),
        other => panic!("expected comparison, got {:?}", other),
    }
}

#[test]
fn test_alias_binds_instead_of_stream_name() {
    let (s, _) = resolve_select("SELECT RSTREAM a FROM s [RANGE 1 TUPLES] AS w;");
    assert_eq!(
        s.projections[0],
        Expression::RowValue {
            relation: Some("w".to_string()),
            column: "a".to_string(),
        }
    );
    // The stream's own name no longer binds
    let err = resolve("SELECT RSTREAM s:a FROM s [RANGE 1 TUPLES] AS w;").unwrap_err();
    assert!(err.iter().any(|e| matches!(e, BqlError::ResolveError { .. })));
}

#[test]
fn test_two_streams_require_qualification() {
    let err =
        resolve("SELECT RSTREAM a FROM s [RANGE 1 TUPLES], t [RANGE 1 TUPLES];").unwrap_err();
    match &err[0] {
        BqlError::ResolveError { clause, message } => {
            assert_eq!(clause, "projection");
            assert!(message.contains("s"), "message: {}", message);
            assert!(message.contains("t"), "message: {}", message);
        }
        other => panic!("expected resolve error, got {:?}", other),
    }

    // Qualified references are fine
    let (s, _) =
        resolve_select("SELECT RSTREAM s:a, t:b FROM s [RANGE 1 TUPLES], t [RANGE 1 TUPLES];");
    assert_eq!(s.projections.len(), 2);
}

#[test]
fn test_stateless_select_rejects_row_references() {
    assert!(resolve("SELECT RSTREAM a;").is_err());
    assert!(resolve("SELECT RSTREAM *;").is_err());
    // Pure literals need no input stream
    assert!(resolve("SELECT RSTREAM 1 + 2;").is_ok());
}

#[test]
fn test_unknown_alias_is_reported() {
    let err = resolve("SELECT RSTREAM x:a FROM s [RANGE 1 TUPLES];").unwrap_err();
    match &err[0] {
        BqlError::ResolveError { message, .. } => {
            assert!(message.contains("x"), "message: {}", message)
        }
        other => panic!("expected resolve error, got {:?}", other),
    }
}

#[test]
fn test_having_rewrites_projection_alias() {
    // HAVING c refers to the projection alias, not to an input column
    let (s, infos) = resolve_select(
        "SELECT RSTREAM count(*) AS c FROM s [RANGE 100 TUPLES] GROUP BY a HAVING c > 10;",
    );
    match s.having.unwrap() {
        Expression::BinaryOp { left, .. } => assert_eq!(
            *left,
            Expression::RowValue {
                relation: None,
                column: "c".to_string(),
            }
        ),
        other => panic!("expected comparison, got {:?}", other),
    }
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].alias, "c");
    assert!(infos[0].aggregate);
    // Grouping keys are qualified as usual
    assert_eq!(
        s.grouping[0],
        Expression::RowValue {
            relation: Some("s".to_string()),
            column: "a".to_string(),
        }
    );
}

#[test]
fn test_ungrouped_projection_is_rejected() {
    let err = resolve(
        "SELECT RSTREAM a, b FROM s [RANGE 1 TUPLES] GROUP BY a;",
    )
    .unwrap_err();
    assert!(err.iter().any(|e| match e {
        BqlError::ResolveError { message, .. } => message.contains("b"),
        _ => false,
    }));

    // Grouped column and aggregates are fine
    assert!(resolve(
        "SELECT RSTREAM a, count(*) FROM s [RANGE 1 TUPLES] GROUP BY a;"
    )
    .is_ok());
}

#[test]
fn test_aggregates_not_allowed_in_group_by() {
    let err = resolve("SELECT RSTREAM a FROM s [RANGE 1 TUPLES] GROUP BY count(a);").unwrap_err();
    assert!(err.iter().any(|e| match e {
        BqlError::ResolveError { clause, .. } => clause == "grouping",
        _ => false,
    }));
}

#[test]
fn test_window_and_emitter_range_checks() {
    assert!(resolve("SELECT RSTREAM a FROM s [RANGE 0 TUPLES];").is_err());
    assert!(resolve("SELECT RSTREAM [LIMIT 0] a FROM s [RANGE 1 TUPLES];").is_err());
    assert!(resolve("SELECT RSTREAM [SAMPLE 101%] a FROM s [RANGE 1 TUPLES];").is_err());
    assert!(resolve("SELECT RSTREAM [SAMPLE 100%] a FROM s [RANGE 1 TUPLES];").is_ok());
    assert!(resolve("SELECT RSTREAM [EVERY 1ST TUPLE] a FROM s [RANGE 1 TUPLES];").is_ok());
}

#[test]
fn test_udsf_resolution_in_from() {
    assert!(resolve("SELECT RSTREAM a FROM series(1, 5) [RANGE 1 TUPLES];").is_ok());
    // Wrong arity means the registry does not know the function
    assert!(resolve("SELECT RSTREAM a FROM series(1) [RANGE 1 TUPLES];").is_err());
    // Scalar functions cannot act as stream-likes
    assert!(resolve("SELECT RSTREAM a FROM f(1) [RANGE 1 TUPLES];").is_err());
    // Stream functions cannot appear in expressions
    assert!(resolve("SELECT RSTREAM series(1, 5) FROM s [RANGE 1 TUPLES];").is_err());
}

#[test]
fn test_unknown_function_is_reported() {
    let err = resolve("SELECT RSTREAM nope(a) FROM s [RANGE 1 TUPLES];").unwrap_err();
    assert!(err.iter().any(|e| match e {
        BqlError::ResolveError { message, .. } => message.contains("nope"),
        _ => false,
    }));
}

#[test]
fn test_cast_targets_for_containers_need_strings() {
    // A literal int can never become a map
    assert!(resolve("SELECT RSTREAM 1 :: map;").is_err());
    // String sources and unknown-typed sources are allowed
    assert!(resolve("SELECT RSTREAM '{}' :: map;").is_ok());
    assert!(resolve("SELECT RSTREAM a :: map FROM s [RANGE 1 TUPLES];").is_ok());
}

#[test]
fn test_errors_accumulate_instead_of_stopping() {
    let err = resolve(
        "SELECT RSTREAM [LIMIT 0] x:a, nope(b) FROM s [RANGE 0 TUPLES];",
    )
    .unwrap_err();
    assert!(err.len() >= 3, "expected several errors, got {:?}", err);
}

#[test]
fn test_projection_annotations() {
    let (_, infos) = resolve_select(
        "SELECT RSTREAM a, count(*) AS n, 'x' AS tag, a = 1 AS is_one FROM s [RANGE 1 TUPLES] GROUP BY a;",
    );
    assert_eq!(infos.len(), 4);
    assert_eq!(infos[0].alias, "a");
    assert_eq!(infos[0].result_type, None);
    assert!(!infos[0].aggregate);
    assert_eq!(infos[1].alias, "n");
    assert!(infos[1].aggregate);
    assert_eq!(infos[2].alias, "tag");
    assert_eq!(infos[2].result_type, Some(ValueType::String));
    assert_eq!(infos[3].alias, "is_one");
    assert_eq!(infos[3].result_type, Some(ValueType::Bool));
}

#[test]
fn test_union_branches_must_align() {
    let err = resolve(
        "SELECT RSTREAM a FROM s [RANGE 1 TUPLES] \
         UNION ALL SELECT RSTREAM a, b FROM t [RANGE 1 TUPLES];",
    )
    .unwrap_err();
    assert!(err.iter().any(|e| match e {
        BqlError::ResolveError { message, .. } => message.contains("column counts"),
        _ => false,
    }));
}

#[test]
fn test_duplicate_with_params_rejected() {
    let err = resolve("CREATE SOURCE s TYPE t WITH a = 1, a = 2;").unwrap_err();
    assert_eq!(err.len(), 1);
    match &err[0] {
        BqlError::ResolveError { clause, .. } => assert_eq!(clause, "with"),
        other => panic!("expected resolve error, got {:?}", other),
    }
}

#[test]
fn test_eval_statement_resolution() {
    assert!(resolve("EVAL a + b ON {'a': 1, 'b': 2};").is_ok());
    // Duplicate keys in the inline row are rejected
    let err = resolve("EVAL a ON {'a': 1, 'a': 2};").unwrap_err();
    assert!(err.iter().any(|e| match e {
        BqlError::ResolveError { message, .. } => message.contains("duplicate"),
        _ => false,
    }));
}

#[test]
fn test_pass_through_statements_resolve_cleanly() {
    for stmt in [
        "DROP STREAM x;",
        "PAUSE SOURCE s;",
        "SAVE STATE st TAG snap;",
        "LOAD STATE st TYPE kv OR CREATE IF NOT EXISTS WITH a = 1;",
    ] {
        assert!(resolve(stmt).is_ok(), "statement failed: {}", stmt);
    }
}
