//! Type and name resolution over assembled statements.
//!
//! The resolver takes a statement fresh out of the assembler and produces
//! the same shape with every row reference fully qualified, plus
//! per-projection annotations (output alias, result-type tag,
//! aggregate/scalar classification) for the topology builder.
//!
//! Unlike the parser, the resolver does not stop at the first problem: it
//! accumulates every error it finds into a vector so a REPL can show all
//! of them at once.

use super::ast::*;
use super::registry::{FunctionKind, FunctionRegistry};
use crate::tupleflow::data::ValueType;
use crate::tupleflow::error::BqlError;
use log::warn;

/// Resolver annotations for one projected expression
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionInfo {
    /// Output column name the projection binds in emitted tuples
    pub alias: String,
    /// Result-type tag; `None` when the type is only known at runtime
    pub result_type: Option<ValueType>,
    /// Whether the projection aggregates over the group or window
    pub aggregate: bool,
}

/// A statement that passed resolution, with its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStatement {
    pub statement: Statement,
    /// Annotations for select-like statements; empty otherwise
    pub projections: Vec<ProjectionInfo>,
}

/// Name and type resolver.
///
/// Holds a reference to the engine's function registry; statement
/// resolution never mutates shared state, so one resolver may serve many
/// threads.
pub struct Resolver<'a> {
    registry: &'a dyn FunctionRegistry,
}

struct SelectContext {
    bindings: Vec<String>,
    projection_aliases: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a dyn FunctionRegistry) -> Self {
        Resolver { registry }
    }

    /// Resolve a statement, returning either the annotated statement or
    /// every error found
    pub fn resolve(&self, statement: Statement) -> Result<ResolvedStatement, Vec<BqlError>> {
        let mut errors = Vec::new();
        let mut statement = statement;
        let projections = match &mut statement {
            Statement::Select(select) => self.resolve_select(select, &mut errors),
            Statement::SelectUnion(union) => self.resolve_select_union(union, &mut errors),
            Statement::CreateStreamAsSelect { select, .. } => {
                self.resolve_select(select, &mut errors)
            }
            Statement::CreateStreamAsSelectUnion { select, .. } => {
                self.resolve_select_union(select, &mut errors)
            }
            Statement::InsertIntoSelect { select, .. } => self.resolve_select(select, &mut errors),
            Statement::Eval { expr, input } => {
                self.validate_expr(expr, "eval", &mut errors);
                if let Some(input) = input {
                    self.validate_expr(input, "eval input", &mut errors);
                    if !matches!(input, Expression::MapExpr(_)) {
                        errors.push(BqlError::resolve_error(
                            "eval input",
                            "ON requires a map literal",
                        ));
                    }
                }
                Vec::new()
            }
            Statement::CreateSource { params, .. }
            | Statement::CreateSink { params, .. }
            | Statement::CreateState { params, .. }
            | Statement::UpdateState { params, .. }
            | Statement::UpdateSource { params, .. }
            | Statement::UpdateSink { params, .. } => {
                check_duplicate_params(params, &mut errors);
                Vec::new()
            }
            Statement::LoadState(load) => {
                check_duplicate_params(&load.set_params, &mut errors);
                Vec::new()
            }
            Statement::LoadStateOrCreate { load, create_params } => {
                check_duplicate_params(&load.set_params, &mut errors);
                check_duplicate_params(create_params, &mut errors);
                Vec::new()
            }
            _ => Vec::new(),
        };
        if errors.is_empty() {
            Ok(ResolvedStatement {
                statement,
                projections,
            })
        } else {
            warn!("resolver rejected statement with {} errors", errors.len());
            Err(errors)
        }
    }

    fn resolve_select_union(
        &self,
        union: &mut SelectUnionStmt,
        errors: &mut Vec<BqlError>,
    ) -> Vec<ProjectionInfo> {
        let mut first = Vec::new();
        let mut widths = Vec::new();
        for (i, select) in union.selects.iter_mut().enumerate() {
            let infos = self.resolve_select(select, errors);
            widths.push(select.projections.len());
            if i == 0 {
                first = infos;
            }
        }
        if widths.windows(2).any(|w| w[0] != w[1]) {
            errors.push(BqlError::resolve_error(
                "projection",
                "UNION ALL branches project different column counts",
            ));
        }
        first
    }

    fn resolve_select(
        &self,
        select: &mut SelectStmt,
        errors: &mut Vec<BqlError>,
    ) -> Vec<ProjectionInfo> {
        // FROM bindings and window legality
        let mut bindings = Vec::new();
        for window in &select.from {
            let name = window.binding_name().to_string();
            if bindings.contains(&name) {
                errors.push(BqlError::resolve_error(
                    "from",
                    format!("duplicate stream alias '{}'", name),
                ));
            } else {
                bindings.push(name);
            }
            self.check_stream_window(window, errors);
        }

        self.check_emitter(&select.emitter, errors);

        // Output aliases are computed before qualification so HAVING can
        // refer to them
        let projection_aliases: Vec<String> = select
            .projections
            .iter()
            .enumerate()
            .map(|(i, p)| output_name(p, i))
            .collect();

        let ctx = SelectContext {
            bindings,
            projection_aliases,
        };

        for projection in &mut select.projections {
            self.qualify(projection, &ctx, "projection", false, errors);
        }
        if let Some(filter) = &mut select.filter {
            self.qualify(filter, &ctx, "filter", false, errors);
        }
        for key in &mut select.grouping {
            self.qualify(key, &ctx, "grouping", false, errors);
        }
        if let Some(having) = &mut select.having {
            self.qualify(having, &ctx, "having", true, errors);
        }

        // Function and cast legality over every clause
        for projection in &select.projections {
            self.validate_expr(projection, "projection", errors);
        }
        if let Some(filter) = &select.filter {
            self.validate_expr(filter, "filter", errors);
        }
        for key in &select.grouping {
            self.validate_expr(key, "grouping", errors);
        }
        if let Some(having) = &select.having {
            self.validate_expr(having, "having", errors);
        }

        // Grouping legality
        if !select.grouping.is_empty() {
            for key in &select.grouping {
                if self.contains_aggregate(key) {
                    errors.push(BqlError::resolve_error(
                        "grouping",
                        "aggregate functions are not allowed in GROUP BY keys",
                    ));
                }
            }
            for projection in &select.projections {
                self.check_grouped_projection(strip_alias(projection), &select.grouping, errors);
            }
        }

        select
            .projections
            .iter()
            .zip(ctx.projection_aliases.iter())
            .map(|(projection, alias)| ProjectionInfo {
                alias: alias.clone(),
                result_type: self.infer_type(projection),
                aggregate: self.contains_aggregate(projection),
            })
            .collect()
    }

    fn check_stream_window(&self, window: &AliasedStreamWindow, errors: &mut Vec<BqlError>) {
        match &window.window.interval {
            Interval::Tuples(n) if *n <= 0 => errors.push(BqlError::resolve_error(
                "window",
                format!("tuple window size must be positive, got {}", n),
            )),
            Interval::Time { value, .. } if *value <= 0.0 => errors.push(
                BqlError::resolve_error(
                    "window",
                    format!("time window size must be positive, got {}", value),
                ),
            ),
            _ => {}
        }
        match &window.window.stream {
            Expression::Stream(_) => {}
            Expression::FuncApp { name, args, order_by } => {
                if order_by.is_some() {
                    errors.push(BqlError::resolve_error(
                        "from",
                        format!("stream function '{}' cannot take ORDER BY", name),
                    ));
                }
                match self.registry.lookup(name, args.len()) {
                    Some(f) if f.kind == FunctionKind::Stream => {}
                    Some(_) => errors.push(BqlError::resolve_error(
                        "from",
                        format!("function '{}' is not a stream function", name),
                    )),
                    None => errors.push(BqlError::resolve_error(
                        "from",
                        format!(
                            "unknown stream function '{}' with {} arguments",
                            name,
                            args.len()
                        ),
                    )),
                }
            }
            other => errors.push(BqlError::resolve_error(
                "from",
                format!("invalid stream-like in FROM: {:?}", other),
            )),
        }
    }

    fn check_emitter(&self, emitter: &Emitter, errors: &mut Vec<BqlError>) {
        if let Some(limit) = emitter.limit {
            if limit <= 0 {
                errors.push(BqlError::resolve_error(
                    "emitter",
                    format!("LIMIT must be a positive integer, got {}", limit),
                ));
            }
        }
        match &emitter.sampling {
            Some(EmitterSampling::Count { nth }) if *nth <= 0 => {
                errors.push(BqlError::resolve_error(
                    "emitter",
                    format!("sampling interval must be positive, got {}", nth),
                ));
            }
            Some(EmitterSampling::Random { probability })
                if !(*probability > 0.0 && *probability <= 100.0) =>
            {
                errors.push(BqlError::resolve_error(
                    "emitter",
                    format!("sampling percentage must be in (0, 100], got {}", probability),
                ));
            }
            Some(EmitterSampling::Time { seconds }) if *seconds <= 0.0 => {
                errors.push(BqlError::resolve_error(
                    "emitter",
                    format!("sampling period must be positive, got {}s", seconds),
                ));
            }
            _ => {}
        }
    }

    /// Fill in the relation of every unqualified row reference, or report
    /// why that is impossible
    fn qualify(
        &self,
        expr: &mut Expression,
        ctx: &SelectContext,
        clause: &str,
        allow_alias_refs: bool,
        errors: &mut Vec<BqlError>,
    ) {
        match expr {
            Expression::RowValue { relation, column } => {
                if allow_alias_refs
                    && relation.is_none()
                    && is_plain_ident(column)
                    && ctx.projection_aliases.iter().any(|a| a == column)
                {
                    // Reference to a projection alias; stays unqualified
                    return;
                }
                self.qualify_relation(relation, ctx, clause, errors);
            }
            Expression::RowMeta { relation, .. } => {
                self.qualify_relation(relation, ctx, clause, errors);
            }
            Expression::Wildcard { relation } => {
                self.qualify_relation(relation, ctx, clause, errors);
            }
            Expression::Stream(_) | Expression::Literal(_) => {}
            Expression::FuncApp { args, order_by, .. } => {
                for arg in args {
                    self.qualify(arg, ctx, clause, allow_alias_refs, errors);
                }
                if let Some(sorted) = order_by {
                    for s in sorted {
                        self.qualify(&mut s.expr, ctx, clause, allow_alias_refs, errors);
                    }
                }
            }
            Expression::UnaryOp { expr, .. } => {
                self.qualify(expr, ctx, clause, allow_alias_refs, errors)
            }
            Expression::BinaryOp { left, right, .. } => {
                self.qualify(left, ctx, clause, allow_alias_refs, errors);
                self.qualify(right, ctx, clause, allow_alias_refs, errors);
            }
            Expression::TypeCast { expr, .. } => {
                self.qualify(expr, ctx, clause, allow_alias_refs, errors)
            }
            Expression::ArrayExpr(elems) => {
                for e in elems {
                    self.qualify(e, ctx, clause, allow_alias_refs, errors);
                }
            }
            Expression::MapExpr(pairs) => {
                for (_, e) in pairs {
                    self.qualify(e, ctx, clause, allow_alias_refs, errors);
                }
            }
            Expression::Alias { expr, .. } => {
                self.qualify(expr, ctx, clause, allow_alias_refs, errors)
            }
        }
    }

    fn qualify_relation(
        &self,
        relation: &mut Option<String>,
        ctx: &SelectContext,
        clause: &str,
        errors: &mut Vec<BqlError>,
    ) {
        match relation {
            Some(name) => {
                if !ctx.bindings.iter().any(|b| b == name) {
                    errors.push(BqlError::resolve_error(
                        clause,
                        format!("unknown stream alias '{}'", name),
                    ));
                }
            }
            None => match ctx.bindings.len() {
                0 => errors.push(BqlError::resolve_error(
                    clause,
                    "row reference without an input stream in scope",
                )),
                1 => *relation = Some(ctx.bindings[0].clone()),
                _ => errors.push(BqlError::resolve_error(
                    clause,
                    format!(
                        "ambiguous row reference, candidates: {}",
                        ctx.bindings.join(", ")
                    ),
                )),
            },
        }
    }

    /// Function existence/kind and cast-target legality, recursively
    fn validate_expr(&self, expr: &Expression, clause: &str, errors: &mut Vec<BqlError>) {
        match expr {
            Expression::FuncApp { name, args, order_by } => {
                match self.registry.lookup(name, args.len()) {
                    Some(f) if f.kind == FunctionKind::Stream => {
                        errors.push(BqlError::resolve_error(
                            clause,
                            format!("stream function '{}' is not allowed in expressions", name),
                        ));
                    }
                    Some(_) => {}
                    None => errors.push(BqlError::resolve_error(
                        clause,
                        format!("unknown function '{}' with {} arguments", name, args.len()),
                    )),
                }
                for arg in args {
                    self.validate_expr(arg, clause, errors);
                }
                if let Some(sorted) = order_by {
                    for s in sorted {
                        self.validate_expr(&s.expr, clause, errors);
                    }
                }
            }
            Expression::TypeCast { expr, target } => {
                if matches!(target, ValueType::Map | ValueType::Array) {
                    match self.infer_type(expr) {
                        None | Some(ValueType::String) => {}
                        Some(t) => errors.push(BqlError::resolve_error(
                            clause,
                            format!("cannot cast {} to {}; only JSON strings convert", t, target),
                        )),
                    }
                }
                self.validate_expr(expr, clause, errors);
            }
            Expression::UnaryOp { expr, .. } => self.validate_expr(expr, clause, errors),
            Expression::BinaryOp { left, right, .. } => {
                self.validate_expr(left, clause, errors);
                self.validate_expr(right, clause, errors);
            }
            Expression::ArrayExpr(elems) => {
                for e in elems {
                    self.validate_expr(e, clause, errors);
                }
            }
            Expression::MapExpr(pairs) => {
                check_duplicate_keys(pairs, clause, errors);
                for (_, e) in pairs {
                    self.validate_expr(e, clause, errors);
                }
            }
            Expression::Alias { expr, .. } => self.validate_expr(expr, clause, errors),
            Expression::RowValue { .. }
            | Expression::RowMeta { .. }
            | Expression::Stream(_)
            | Expression::Wildcard { .. }
            | Expression::Literal(_) => {}
        }
    }

    /// Every column reference outside an aggregate call must itself be a
    /// grouping key. The comparison is structural over the qualified AST
    /// nodes, not semantic.
    fn check_grouped_projection(
        &self,
        expr: &Expression,
        grouping: &[Expression],
        errors: &mut Vec<BqlError>,
    ) {
        match expr {
            Expression::RowValue { column, .. } => {
                if !grouping.iter().any(|key| key == expr) {
                    errors.push(BqlError::resolve_error(
                        "projection",
                        format!("ungrouped column '{}' must appear in GROUP BY", column),
                    ));
                }
            }
            Expression::RowMeta { .. } => {
                if !grouping.iter().any(|key| key == expr) {
                    errors.push(BqlError::resolve_error(
                        "projection",
                        "ungrouped row metadata must appear in GROUP BY",
                    ));
                }
            }
            Expression::Wildcard { .. } => {
                errors.push(BqlError::resolve_error(
                    "projection",
                    "wildcard projection is not allowed in a grouped query",
                ));
            }
            Expression::FuncApp { name, args, order_by } => {
                let is_aggregate = self
                    .registry
                    .lookup(name, args.len())
                    .map(|f| f.kind == FunctionKind::Aggregate)
                    .unwrap_or(false);
                if is_aggregate {
                    // Aggregate arguments may reference any input column
                    return;
                }
                for arg in args {
                    self.check_grouped_projection(arg, grouping, errors);
                }
                if let Some(sorted) = order_by {
                    for s in sorted {
                        self.check_grouped_projection(&s.expr, grouping, errors);
                    }
                }
            }
            Expression::UnaryOp { expr, .. } => {
                self.check_grouped_projection(expr, grouping, errors)
            }
            Expression::BinaryOp { left, right, .. } => {
                self.check_grouped_projection(left, grouping, errors);
                self.check_grouped_projection(right, grouping, errors);
            }
            Expression::TypeCast { expr, .. } => {
                self.check_grouped_projection(expr, grouping, errors)
            }
            Expression::ArrayExpr(elems) => {
                for e in elems {
                    self.check_grouped_projection(e, grouping, errors);
                }
            }
            Expression::MapExpr(pairs) => {
                for (_, e) in pairs {
                    self.check_grouped_projection(e, grouping, errors);
                }
            }
            Expression::Alias { expr, .. } => {
                self.check_grouped_projection(expr, grouping, errors)
            }
            Expression::Stream(_) | Expression::Literal(_) => {}
        }
    }

    fn contains_aggregate(&self, expr: &Expression) -> bool {
        match expr {
            Expression::FuncApp { name, args, order_by } => {
                if let Some(f) = self.registry.lookup(name, args.len()) {
                    if f.kind == FunctionKind::Aggregate {
                        return true;
                    }
                }
                args.iter().any(|a| self.contains_aggregate(a))
                    || order_by
                        .as_ref()
                        .map(|s| s.iter().any(|e| self.contains_aggregate(&e.expr)))
                        .unwrap_or(false)
            }
            Expression::UnaryOp { expr, .. } => self.contains_aggregate(expr),
            Expression::BinaryOp { left, right, .. } => {
                self.contains_aggregate(left) || self.contains_aggregate(right)
            }
            Expression::TypeCast { expr, .. } => self.contains_aggregate(expr),
            Expression::ArrayExpr(elems) => elems.iter().any(|e| self.contains_aggregate(e)),
            Expression::MapExpr(pairs) => pairs.iter().any(|(_, e)| self.contains_aggregate(e)),
            Expression::Alias { expr, .. } => self.contains_aggregate(expr),
            _ => false,
        }
    }

    /// Static result-type tag; `None` means only the runtime knows
    fn infer_type(&self, expr: &Expression) -> Option<ValueType> {
        match expr {
            Expression::Literal(v) => Some(v.value_type()),
            Expression::RowValue { .. } => None,
            Expression::RowMeta { .. } => Some(ValueType::Timestamp),
            Expression::Stream(_) => None,
            Expression::Wildcard { .. } => Some(ValueType::Map),
            Expression::FuncApp { .. } => None,
            Expression::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => Some(ValueType::Bool),
                UnaryOperator::Minus => match self.infer_type(expr) {
                    Some(ValueType::Int) => Some(ValueType::Int),
                    Some(ValueType::Float) => Some(ValueType::Float),
                    _ => None,
                },
            },
            Expression::BinaryOp { op, left, right } => match op {
                BinaryOperator::Or
                | BinaryOperator::And
                | BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::Less
                | BinaryOperator::LessOrEqual
                | BinaryOperator::Greater
                | BinaryOperator::GreaterOrEqual
                | BinaryOperator::Is
                | BinaryOperator::IsNot => Some(ValueType::Bool),
                BinaryOperator::Concat => Some(ValueType::String),
                BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo => {
                    match (self.infer_type(left), self.infer_type(right)) {
                        (Some(ValueType::Int), Some(ValueType::Int)) => Some(ValueType::Int),
                        (Some(ValueType::Float), Some(t)) | (Some(t), Some(ValueType::Float))
                            if matches!(t, ValueType::Int | ValueType::Float) =>
                        {
                            Some(ValueType::Float)
                        }
                        _ => None,
                    }
                }
            },
            Expression::TypeCast { target, .. } => Some(*target),
            Expression::ArrayExpr(_) => Some(ValueType::Array),
            Expression::MapExpr(_) => Some(ValueType::Map),
            Expression::Alias { expr, .. } => self.infer_type(expr),
        }
    }
}

fn strip_alias(expr: &Expression) -> &Expression {
    match expr {
        Expression::Alias { expr, .. } => expr,
        other => other,
    }
}

fn is_plain_ident(column: &str) -> bool {
    !column.is_empty()
        && column.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false)
        && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Output column name a projection binds in emitted tuples
fn output_name(projection: &Expression, index: usize) -> String {
    match projection {
        Expression::Alias { alias, .. } => alias.clone(),
        Expression::RowValue { column, .. } => column.clone(),
        Expression::RowMeta { .. } => "ts".to_string(),
        Expression::Wildcard { .. } => "*".to_string(),
        Expression::FuncApp { name, .. } => name.clone(),
        _ => format!("col_{}", index),
    }
}

fn check_duplicate_params(params: &[SourceSinkParam], errors: &mut Vec<BqlError>) {
    for (i, param) in params.iter().enumerate() {
        if params[..i].iter().any(|p| p.key == param.key) {
            errors.push(BqlError::resolve_error(
                "with",
                format!("duplicate parameter '{}'", param.key),
            ));
        }
    }
}

fn check_duplicate_keys(
    pairs: &[(String, Expression)],
    clause: &str,
    errors: &mut Vec<BqlError>,
) {
    for (i, (key, _)) in pairs.iter().enumerate() {
        if pairs[..i].iter().any(|(k, _)| k == key) {
            errors.push(BqlError::resolve_error(
                clause,
                format!("duplicate map key '{}'", key),
            ));
        }
    }
}
