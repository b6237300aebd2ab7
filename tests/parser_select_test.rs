//! Tests for SELECT parsing: emitters, windows, clauses and the
//! recognizer/assembler contract properties.

use tupleflow::tupleflow::bql::ast::*;
use tupleflow::tupleflow::data::Value;
use tupleflow::BqlParser;

fn parse_one(input: &str) -> Statement {
    BqlParser::new()
        .parse_stmt(input)
        .unwrap_or_else(|e| panic!("parse failed for {:?}: {}", input, e))
        .0
}

fn parse_select(input: &str) -> SelectStmt {
    match parse_one(input) {
        Statement::Select(s) => s,
        other => panic!("expected SELECT, got {:?}", other),
    }
}

fn row(relation: Option<&str>, column: &str) -> Expression {
    Expression::RowValue {
        relation: relation.map(|s| s.to_string()),
        column: column.to_string(),
    }
}

#[test]
fn test_windowed_select_with_filter() {
    // SELECT ISTREAM a, b FROM s [RANGE 5 SECONDS] WHERE a > 3
    let s = parse_select("SELECT ISTREAM a, b FROM s [RANGE 5 SECONDS] WHERE a > 3;");
    assert_eq!(s.emitter.kind, EmitterKind::Istream);
    assert_eq!(s.emitter.limit, None);
    assert_eq!(s.emitter.sampling, None);
    assert_eq!(s.projections, vec![row(None, "a"), row(None, "b")]);
    assert_eq!(
        s.from,
        vec![AliasedStreamWindow {
            window: StreamWindow {
                stream: Expression::Stream("s".to_string()),
                interval: Interval::Time {
                    value: 5.0,
                    unit: TimeUnit::Seconds,
                },
            },
            alias: None,
        }]
    );
    assert_eq!(
        s.filter,
        Some(Expression::BinaryOp {
            op: BinaryOperator::Greater,
            left: Box::new(row(None, "a")),
            right: Box::new(Expression::Literal(Value::Int(3))),
        })
    );
    assert!(s.grouping.is_empty());
    assert_eq!(s.having, None);
}

#[test]
fn test_grouped_select_with_aliased_aggregate() {
    // SELECT RSTREAM count(*) AS c FROM s [RANGE 100 TUPLES] GROUP BY a HAVING c > 10
    let s = parse_select(
        "SELECT RSTREAM count(*) AS c FROM s [RANGE 100 TUPLES] GROUP BY a HAVING c > 10;",
    );
    assert_eq!(s.emitter.kind, EmitterKind::Rstream);
    assert_eq!(
        s.projections,
        vec![Expression::Alias {
            expr: Box::new(Expression::FuncApp {
                name: "count".to_string(),
                args: vec![Expression::Wildcard { relation: None }],
                order_by: None,
            }),
            alias: "c".to_string(),
        }]
    );
    assert_eq!(
        s.from[0].window.interval,
        Interval::Tuples(100)
    );
    assert_eq!(s.grouping, vec![row(None, "a")]);
    assert_eq!(
        s.having,
        Some(Expression::BinaryOp {
            op: BinaryOperator::Greater,
            left: Box::new(row(None, "c")),
            right: Box::new(Expression::Literal(Value::Int(10))),
        })
    );
}

#[test]
fn test_emitter_kinds() {
    for (text, kind) in [
        ("ISTREAM", EmitterKind::Istream),
        ("DSTREAM", EmitterKind::Dstream),
        ("RSTREAM", EmitterKind::Rstream),
    ] {
        let s = parse_select(&format!("SELECT {} 1;", text));
        assert_eq!(s.emitter.kind, kind);
    }
}

#[test]
fn test_emitter_limit_and_sampling() {
    let s = parse_select("SELECT ISTREAM [LIMIT 10] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(s.emitter.limit, Some(10));
    assert_eq!(s.emitter.sampling, None);

    let s = parse_select("SELECT ISTREAM [EVERY 3RD TUPLE] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(s.emitter.sampling, Some(EmitterSampling::Count { nth: 3 }));

    let s = parse_select("SELECT ISTREAM [EVERY 1ST TUPLE LIMIT 7] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(s.emitter.sampling, Some(EmitterSampling::Count { nth: 1 }));
    assert_eq!(s.emitter.limit, Some(7));

    let s = parse_select("SELECT ISTREAM [SAMPLE 25%] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(
        s.emitter.sampling,
        Some(EmitterSampling::Random { probability: 25.0 })
    );

    let s = parse_select("SELECT ISTREAM [EVERY 0.5 SECONDS] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(
        s.emitter.sampling,
        Some(EmitterSampling::Time { seconds: 0.5 })
    );

    let s = parse_select("SELECT ISTREAM [EVERY 500 MILLISECONDS] a FROM s [RANGE 1 TUPLES];");
    assert_eq!(
        s.emitter.sampling,
        Some(EmitterSampling::Time {
            seconds: 500.0 * 0.001
        })
    );
}

#[test]
fn test_window_ranges() {
    let s = parse_select("SELECT RSTREAM a FROM s [RANGE 100 TUPLES];");
    assert_eq!(s.from[0].window.interval, Interval::Tuples(100));

    let s = parse_select("SELECT RSTREAM a FROM s [RANGE 250 MILLISECONDS];");
    assert_eq!(
        s.from[0].window.interval,
        Interval::Time {
            value: 250.0,
            unit: TimeUnit::Milliseconds,
        }
    );

    let s = parse_select("SELECT RSTREAM a FROM s [RANGE 2.5 SECONDS];");
    assert_eq!(
        s.from[0].window.interval,
        Interval::Time {
            value: 2.5,
            unit: TimeUnit::Seconds,
        }
    );
}

#[test]
fn test_from_aliases_and_multiple_relations() {
    let s = parse_select(
        "SELECT RSTREAM l:a, r:b FROM left_in [RANGE 1 TUPLES] AS l, right_in [RANGE 1 TUPLES] AS r;",
    );
    assert_eq!(s.from.len(), 2);
    assert_eq!(s.from[0].alias.as_deref(), Some("l"));
    assert_eq!(s.from[1].alias.as_deref(), Some("r"));
    assert_eq!(s.projections[0], row(Some("l"), "a"));
    assert_eq!(s.projections[1], row(Some("r"), "b"));
}

#[test]
fn test_udsf_in_from() {
    let s = parse_select("SELECT RSTREAM a FROM series(1, 10) [RANGE 5 TUPLES];");
    assert_eq!(
        s.from[0].window.stream,
        Expression::FuncApp {
            name: "series".to_string(),
            args: vec![
                Expression::Literal(Value::Int(1)),
                Expression::Literal(Value::Int(10)),
            ],
            order_by: None,
        }
    );
}

#[test]
fn test_wildcard_projections() {
    let s = parse_select("SELECT RSTREAM * FROM s [RANGE 1 TUPLES];");
    assert_eq!(s.projections, vec![Expression::Wildcard { relation: None }]);

    let s = parse_select("SELECT RSTREAM s:* FROM s [RANGE 1 TUPLES];");
    assert_eq!(
        s.projections,
        vec![Expression::Wildcard {
            relation: Some("s".to_string())
        }]
    );
}

#[test]
fn test_union_all() {
    let stmt = parse_one(
        "SELECT RSTREAM a FROM s [RANGE 1 TUPLES] \
         UNION ALL SELECT RSTREAM b FROM t [RANGE 1 TUPLES] \
         UNION ALL SELECT RSTREAM c FROM u [RANGE 1 TUPLES];",
    );
    match stmt {
        Statement::SelectUnion(u) => {
            assert_eq!(u.selects.len(), 3);
            assert_eq!(u.selects[0].projections, vec![row(None, "a")]);
            assert_eq!(u.selects[2].projections, vec![row(None, "c")]);
        }
        other => panic!("expected SELECT UNION, got {:?}", other),
    }
}

#[test]
fn test_keywords_are_case_insensitive() {
    let upper = parse_one("SELECT RSTREAM a FROM s [RANGE 5 SECONDS] WHERE a > 3;");
    let lower = parse_one("select rstream a from s [range 5 seconds] where a > 3;");
    let mixed = parse_one("SeLeCt RsTrEaM a FrOm s [RaNgE 5 SeCoNdS] wHeRe a > 3;");
    assert_eq!(upper, lower);
    assert_eq!(upper, mixed);
}

#[test]
fn test_comments_are_invisible() {
    let plain = parse_one("SELECT RSTREAM a, b FROM s [RANGE 1 TUPLES];");
    let commented = parse_one(
        "SELECT -- emitter next\n RSTREAM a, -- second column\n b FROM s -- window\n [RANGE 1 TUPLES];",
    );
    assert_eq!(plain, commented);

    // A trailing comment with no newline is fine
    let tail = parse_one("SELECT RSTREAM a FROM s [RANGE 1 TUPLES] -- done");
    let bare = parse_one("SELECT RSTREAM a FROM s [RANGE 1 TUPLES]");
    assert_eq!(tail, bare);
}

#[test]
fn test_parser_determinism() {
    let input = "SELECT RSTREAM count(*) AS c FROM s [RANGE 100 TUPLES] GROUP BY a HAVING c > 10;";
    let parser = BqlParser::new();
    let first = parser.parse_tokens(input).unwrap();
    let second = parser.parse_tokens(input).unwrap();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn test_assembler_idempotence() {
    let input = "SELECT ISTREAM [EVERY 2ND TUPLE] a, f(b) FROM s [RANGE 3 SECONDS] GROUP BY a;";
    let first = parse_one(input);
    let second = parse_one(input);
    assert_eq!(first, second);
}

#[test]
fn test_statement_piping_returns_remainder() {
    let parser = BqlParser::new();
    let input = "SELECT RSTREAM 1; SELECT RSTREAM 2;";
    let (first, rest) = parser.parse_stmt(input).unwrap();
    assert_eq!(rest, " SELECT RSTREAM 2;");
    match first {
        Statement::Select(s) => {
            assert_eq!(s.projections, vec![Expression::Literal(Value::Int(1))])
        }
        other => panic!("expected SELECT, got {:?}", other),
    }
    let (second, rest) = parser.parse_stmt(rest).unwrap();
    assert_eq!(rest, "");
    match second {
        Statement::Select(s) => {
            assert_eq!(s.projections, vec![Expression::Literal(Value::Int(2))])
        }
        other => panic!("expected SELECT, got {:?}", other),
    }
}

#[test]
fn test_parse_script() {
    let stmts = BqlParser::new()
        .parse("CREATE SOURCE src TYPE dummy; SELECT RSTREAM a FROM src [RANGE 1 TUPLES]; -- end\n")
        .unwrap();
    assert_eq!(stmts.len(), 2);
}

#[test]
fn test_missing_semicolon_between_statements_fails() {
    assert!(BqlParser::new()
        .parse("SELECT RSTREAM 1 SELECT RSTREAM 2;")
        .is_err());
}

#[test]
fn test_syntax_errors_carry_line_and_column() {
    let err = BqlParser::new()
        .parse_stmt("SELECT ISTREAM a FROM\n  [RANGE 5 SECONDS];")
        .unwrap_err();
    match err {
        tupleflow::BqlError::ParseError { line, .. } => assert!(line >= 1),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_trailing_whitespace_span_is_recorded() {
    let (stmt, _) = BqlParser::new()
        .parse_stmt("SELECT RSTREAM a FROM s [RANGE 1 TUPLES]   ;")
        .unwrap();
    match stmt {
        Statement::Select(s) => {
            assert_eq!(s.trailing.end - s.trailing.begin, 3);
        }
        other => panic!("expected SELECT, got {:?}", other),
    }
}
