//! AST assembly over the recognizer's token stream.
//!
//! The assembler walks the ordered token forest and executes exactly one
//! semantic verb per token against a LIFO working stack. Stack items carry
//! the span of the text they came from, which is how list-valued verbs
//! (projections, group lists, parameter blocks) know how far down to
//! collect: everything of the expected component kind pushed at or after
//! the list's begin offset belongs to the list. The kind check matters:
//! absent optional clauses leave zero-width slot components at the same
//! offset the next clause starts at, and those must never be swept into a
//! neighbouring list.
//!
//! A verb that finds the wrong thing on the stack is a programmer error in
//! the grammar/assembler pairing, not a user error; it aborts with a
//! diagnostic naming the action and the stack depth at the time.

use super::peg::Recognition;
use super::tokens::{ParseToken, Rule};
use crate::tupleflow::bql::ast::*;
use crate::tupleflow::data::value::{parse_number, Value, ValueType};
use crate::tupleflow::error::BqlError;
use std::collections::HashMap;

/// Items the working stack can hold while a statement is being built
#[derive(Debug)]
enum Component {
    Expr(Expression),
    ExprList(Vec<Expression>),
    Sorted(SortedExpression),
    SortedList(Vec<SortedExpression>),
    SortDir(SortDirection),
    Ident(String),
    FuncName(String),
    BinOp(BinaryOperator),
    UnOp(UnaryOperator),
    Type(ValueType),
    Kind(EmitterKind),
    Limit(i64),
    Sampling(EmitterSampling),
    EmitterOpts {
        limit: Option<i64>,
        sampling: Option<EmitterSampling>,
    },
    EmitterNode(Emitter),
    Paused(BinaryKeyword),
    Interval(Interval),
    Window(StreamWindow),
    AliasedWindow(AliasedStreamWindow),
    From(Vec<AliasedStreamWindow>),
    Filter(Option<Expression>),
    Grouping(Vec<Expression>),
    Having(Option<Expression>),
    Projections(Vec<Expression>),
    Param(SourceSinkParam),
    Specs(Vec<SourceSinkParam>),
    Tag(Option<String>),
    KeyValue(String, Expression),
    EvalInput(Option<Expression>),
    Stmt(Statement),
}

#[derive(Debug)]
struct StackItem {
    begin: usize,
    comp: Component,
}

pub(crate) struct Assembler<'a> {
    runes: &'a [char],
    stack: Vec<StackItem>,
}

/// Build the statement a successful recognition describes
pub(crate) fn assemble(recognition: &Recognition) -> Result<Statement, BqlError> {
    let mut assembler = Assembler {
        runes: &recognition.runes,
        stack: Vec::with_capacity(16),
    };
    for token in &recognition.tokens {
        assembler.dispatch(*token)?;
    }
    assembler.finish()
}

impl<'a> Assembler<'a> {
    fn text(&self, begin: usize, end: usize) -> String {
        self.runes[begin..end].iter().collect()
    }

    fn bug(&self, action: &str, message: impl Into<String>) -> BqlError {
        BqlError::assembly_error(action, self.stack.len(), message)
    }

    fn push(&mut self, token: ParseToken, comp: Component) {
        self.stack.push(StackItem {
            begin: token.begin,
            comp,
        });
    }

    fn pop(&mut self, action: &str) -> Result<StackItem, BqlError> {
        self.stack
            .pop()
            .ok_or_else(|| self.bug(action, "working stack is empty"))
    }

    /// Pop every item of the expected kind pushed at or after `begin`,
    /// restoring text order
    fn collect_matching<F>(&mut self, begin: usize, accepts: F) -> Vec<StackItem>
    where
        F: Fn(&Component) -> bool,
    {
        let mut items = Vec::new();
        while let Some(top) = self.stack.last() {
            if top.begin >= begin && accepts(&top.comp) {
                items.push(self.stack.pop().unwrap());
            } else {
                break;
            }
        }
        items.reverse();
        items
    }

    fn collect_exprs(&mut self, begin: usize) -> Vec<Expression> {
        self.collect_matching(begin, |c| matches!(c, Component::Expr(_)))
            .into_iter()
            .map(|item| match item.comp {
                Component::Expr(e) => e,
                _ => unreachable!(),
            })
            .collect()
    }

    fn pop_expr(&mut self, action: &str) -> Result<Expression, BqlError> {
        match self.pop(action)?.comp {
            Component::Expr(e) => Ok(e),
            other => Err(self.bug(action, format!("expected expression, found {:?}", other))),
        }
    }

    fn pop_ident(&mut self, action: &str) -> Result<String, BqlError> {
        match self.pop(action)?.comp {
            Component::Ident(s) => Ok(s),
            other => Err(self.bug(action, format!("expected identifier, found {:?}", other))),
        }
    }

    fn pop_specs(&mut self, action: &str) -> Result<Vec<SourceSinkParam>, BqlError> {
        match self.pop(action)?.comp {
            Component::Specs(s) => Ok(s),
            other => Err(self.bug(action, format!("expected parameter block, found {:?}", other))),
        }
    }

    fn pop_tag(&mut self, action: &str) -> Result<Option<String>, BqlError> {
        match self.pop(action)?.comp {
            Component::Tag(t) => Ok(t),
            other => Err(self.bug(action, format!("expected state tag, found {:?}", other))),
        }
    }

    fn pop_select(&mut self, action: &str) -> Result<SelectStmt, BqlError> {
        match self.pop(action)?.comp {
            Component::Stmt(Statement::Select(s)) => Ok(s),
            other => Err(self.bug(action, format!("expected SELECT, found {:?}", other))),
        }
    }

    fn pop_literal_int(&mut self, action: &str) -> Result<i64, BqlError> {
        match self.pop_expr(action)? {
            Expression::Literal(Value::Int(i)) => Ok(i),
            other => Err(self.bug(action, format!("expected integer literal, found {:?}", other))),
        }
    }

    fn pop_literal_number(&mut self, action: &str) -> Result<f64, BqlError> {
        match self.pop_expr(action)? {
            Expression::Literal(Value::Int(i)) => Ok(i as f64),
            Expression::Literal(Value::Float(f)) => Ok(f),
            other => Err(self.bug(action, format!("expected numeric literal, found {:?}", other))),
        }
    }

    /// Split an optional `relation:` prefix off a row reference's span text
    fn split_relation(text: &str) -> (Option<String>, String) {
        let mut prefix_len = 0;
        for (i, c) in text.char_indices() {
            if i == 0 {
                if !c.is_ascii_alphabetic() {
                    return (None, text.to_string());
                }
                prefix_len = c.len_utf8();
            } else if c.is_ascii_alphanumeric() || c == '_' {
                prefix_len = i + c.len_utf8();
            } else {
                break;
            }
        }
        match text[prefix_len..].strip_prefix(':') {
            Some(rest) => (Some(text[..prefix_len].to_string()), rest.to_string()),
            None => (None, text.to_string()),
        }
    }

    /// Strip the surrounding quotes of a string literal span and undo the
    /// `''` escape
    fn unquote(text: &str) -> String {
        let inner = &text[1..text.len() - 1];
        inner.replace("''", "'")
    }

    /// Fold a parameter value expression into a plain value. The grammar
    /// only admits literal shapes here.
    fn expr_to_value(&self, action: &str, expr: Expression) -> Result<Value, BqlError> {
        match expr {
            Expression::Literal(v) => Ok(v),
            Expression::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match self.expr_to_value(action, *expr)? {
                Value::Int(i) => Ok(Value::Int(-i)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(self.bug(
                    action,
                    format!("cannot negate parameter value {:?}", other),
                )),
            },
            Expression::ArrayExpr(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.expr_to_value(action, e)?);
                }
                Ok(Value::Array(values))
            }
            Expression::MapExpr(pairs) => {
                let mut map = HashMap::with_capacity(pairs.len());
                for (k, v) in pairs {
                    map.insert(k, self.expr_to_value(action, v)?);
                }
                Ok(Value::Map(map))
            }
            other => Err(self.bug(
                action,
                format!("parameter value is not a literal: {:?}", other),
            )),
        }
    }

    /// Left-fold a span of alternating operands and operators into a
    /// binary-operation tree; a single operand passes through unchanged
    fn assemble_binary_chain(&mut self, action: &str, token: ParseToken) -> Result<(), BqlError> {
        let items = self.collect_matching(token.begin, |c| {
            matches!(c, Component::Expr(_) | Component::BinOp(_))
        });
        if items.is_empty() {
            return Err(self.bug(action, "no operands in span"));
        }
        if items.len() == 1 {
            self.stack.push(items.into_iter().next().unwrap());
            return Ok(());
        }
        let mut iter = items.into_iter();
        let mut acc = match iter.next().unwrap().comp {
            Component::Expr(e) => e,
            other => return Err(self.bug(action, format!("expected expression, found {:?}", other))),
        };
        while let Some(op_item) = iter.next() {
            let op = match op_item.comp {
                Component::BinOp(op) => op,
                other => {
                    return Err(self.bug(action, format!("expected operator, found {:?}", other)))
                }
            };
            let right = match iter.next() {
                Some(item) => match item.comp {
                    Component::Expr(e) => e,
                    other => {
                        return Err(
                            self.bug(action, format!("expected expression, found {:?}", other))
                        )
                    }
                },
                None => return Err(self.bug(action, "operator without right operand")),
            };
            acc = Expression::BinaryOp {
                op,
                left: Box::new(acc),
                right: Box::new(right),
            };
        }
        self.push(token, Component::Expr(acc));
        Ok(())
    }

    /// Wrap a span of `[operator, operand]` into a unary operation; a bare
    /// operand passes through unchanged
    fn assemble_unary_prefix(&mut self, action: &str, token: ParseToken) -> Result<(), BqlError> {
        let mut items = self.collect_matching(token.begin, |c| {
            matches!(c, Component::Expr(_) | Component::UnOp(_))
        });
        match items.len() {
            1 => {
                self.stack.push(items.pop().unwrap());
                Ok(())
            }
            2 => {
                let expr = match items.pop().unwrap().comp {
                    Component::Expr(e) => e,
                    other => {
                        return Err(
                            self.bug(action, format!("expected expression, found {:?}", other))
                        )
                    }
                };
                let op = match items.pop().unwrap().comp {
                    Component::UnOp(op) => op,
                    other => {
                        return Err(self.bug(action, format!("expected operator, found {:?}", other)))
                    }
                };
                self.push(
                    token,
                    Component::Expr(Expression::UnaryOp {
                        op,
                        expr: Box::new(expr),
                    }),
                );
                Ok(())
            }
            n => Err(self.bug(action, format!("unary span holds {} items", n))),
        }
    }

    /// Wrap a span of `[expr, type]` into a cast; a bare expression passes
    /// through when the cast suffix was absent
    fn assemble_type_cast(
        &mut self,
        action: &str,
        token: ParseToken,
        require_type: bool,
    ) -> Result<(), BqlError> {
        let mut items = self.collect_matching(token.begin, |c| {
            matches!(c, Component::Expr(_) | Component::Type(_))
        });
        match items.len() {
            1 if !require_type => {
                self.stack.push(items.pop().unwrap());
                Ok(())
            }
            2 => {
                let target = match items.pop().unwrap().comp {
                    Component::Type(t) => t,
                    other => {
                        return Err(self.bug(action, format!("expected type, found {:?}", other)))
                    }
                };
                let expr = match items.pop().unwrap().comp {
                    Component::Expr(e) => e,
                    other => {
                        return Err(
                            self.bug(action, format!("expected expression, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::Expr(Expression::TypeCast {
                        expr: Box::new(expr),
                        target,
                    }),
                );
                Ok(())
            }
            n => Err(self.bug(action, format!("cast span holds {} items", n))),
        }
    }

    fn dispatch(&mut self, token: ParseToken) -> Result<(), BqlError> {
        let rule = token.rule;
        let action = rule.name();
        let span_empty = token.begin >= token.end;
        match rule {
            // ---------------------------------------------------------- leaves
            Rule::Identifier | Rule::TargetIdentifier => {
                let text = self.text(token.begin, token.end);
                self.push(token, Component::Ident(text));
            }
            Rule::Function => {
                let text = self.text(token.begin, token.end);
                self.push(token, Component::FuncName(text));
            }
            Rule::Stream => {
                let text = self.text(token.begin, token.end);
                self.push(token, Component::Expr(Expression::Stream(text)));
            }
            Rule::RowValue => {
                let text = self.text(token.begin, token.end);
                let (relation, column) = Self::split_relation(&text);
                self.push(token, Component::Expr(Expression::RowValue { relation, column }));
            }
            Rule::RowTimestamp => {
                let text = self.text(token.begin, token.end);
                let (relation, _) = Self::split_relation(&text);
                self.push(
                    token,
                    Component::Expr(Expression::RowMeta {
                        relation,
                        meta: RowMetaKind::Timestamp,
                    }),
                );
            }
            Rule::Wildcard => {
                let text = self.text(token.begin, token.end);
                let (relation, _) = Self::split_relation(&text);
                self.push(token, Component::Expr(Expression::Wildcard { relation }));
            }
            Rule::NumericLiteral => {
                let text = self.text(token.begin, token.end);
                let value = parse_number(&text)
                    .map_err(|e| self.bug(action, format!("bad numeric literal: {}", e)))?;
                self.push(token, Component::Expr(Expression::Literal(value)));
            }
            Rule::FloatLiteral => {
                let text = self.text(token.begin, token.end);
                let value = text
                    .parse::<f64>()
                    .map_err(|e| self.bug(action, format!("bad float literal: {}", e)))?;
                self.push(token, Component::Expr(Expression::Literal(Value::Float(value))));
            }
            Rule::StringLiteral => {
                let text = self.text(token.begin, token.end);
                self.push(
                    token,
                    Component::Expr(Expression::Literal(Value::String(Self::unquote(&text)))),
                );
            }
            Rule::NullLiteral => {
                self.push(token, Component::Expr(Expression::Literal(Value::Null)));
            }
            Rule::TrueLiteral => {
                self.push(token, Component::Expr(Expression::Literal(Value::Bool(true))));
            }
            Rule::FalseLiteral => {
                self.push(token, Component::Expr(Expression::Literal(Value::Bool(false))));
            }
            Rule::Type => {
                let text = self.text(token.begin, token.end);
                let t = ValueType::from_name(&text)
                    .ok_or_else(|| self.bug(action, format!("unknown type name '{}'", text)))?;
                self.push(token, Component::Type(t));
            }

            // ------------------------------------------------------- operators
            Rule::Or => self.push(token, Component::BinOp(BinaryOperator::Or)),
            Rule::And => self.push(token, Component::BinOp(BinaryOperator::And)),
            Rule::NotOp => self.push(token, Component::UnOp(UnaryOperator::Not)),
            Rule::UnaryMinus => self.push(token, Component::UnOp(UnaryOperator::Minus)),
            Rule::ComparisonOp => {
                let text = self.text(token.begin, token.end);
                let op = match text.as_str() {
                    "=" => BinaryOperator::Equal,
                    "!=" | "<>" => BinaryOperator::NotEqual,
                    "<" => BinaryOperator::Less,
                    "<=" => BinaryOperator::LessOrEqual,
                    ">" => BinaryOperator::Greater,
                    ">=" => BinaryOperator::GreaterOrEqual,
                    other => {
                        return Err(self.bug(action, format!("unknown comparison '{}'", other)))
                    }
                };
                self.push(token, Component::BinOp(op));
            }
            Rule::OtherOp => self.push(token, Component::BinOp(BinaryOperator::Concat)),
            Rule::IsOp => {
                let text = self.text(token.begin, token.end).to_ascii_uppercase();
                let op = if text.contains("NOT") {
                    BinaryOperator::IsNot
                } else {
                    BinaryOperator::Is
                };
                self.push(token, Component::BinOp(op));
            }
            Rule::PlusMinusOp => {
                let text = self.text(token.begin, token.end);
                let op = if text == "+" {
                    BinaryOperator::Plus
                } else {
                    BinaryOperator::Minus
                };
                self.push(token, Component::BinOp(op));
            }
            Rule::MultDivOp => {
                let text = self.text(token.begin, token.end);
                let op = match text.as_str() {
                    "*" => BinaryOperator::Multiply,
                    "/" => BinaryOperator::Divide,
                    "%" => BinaryOperator::Modulo,
                    other => return Err(self.bug(action, format!("unknown operator '{}'", other))),
                };
                self.push(token, Component::BinOp(op));
            }

            // ----------------------------------------------------- expressions
            Rule::OrExpr
            | Rule::AndExpr
            | Rule::ComparisonExpr
            | Rule::OtherOpExpr
            | Rule::IsExpr
            | Rule::TermExpr
            | Rule::ProductExpr => self.assemble_binary_chain(action, token)?,
            Rule::NotExpr | Rule::MinusExpr => self.assemble_unary_prefix(action, token)?,
            Rule::CastExpr => self.assemble_type_cast(action, token, false)?,
            Rule::FuncTypeCast => self.assemble_type_cast(action, token, true)?,
            Rule::FuncParams => {
                let exprs = self.collect_exprs(token.begin);
                self.push(token, Component::ExprList(exprs));
            }
            Rule::FuncAppWithoutOrderBy => {
                let args = match self.pop(action)?.comp {
                    Component::ExprList(list) => list,
                    other => {
                        return Err(
                            self.bug(action, format!("expected parameter list, found {:?}", other))
                        )
                    }
                };
                let name = match self.pop(action)?.comp {
                    Component::FuncName(name) => name,
                    other => {
                        return Err(
                            self.bug(action, format!("expected function name, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::Expr(Expression::FuncApp {
                        name,
                        args,
                        order_by: None,
                    }),
                );
            }
            Rule::FuncAppWithOrderBy => {
                let sorted = match self.pop(action)?.comp {
                    Component::SortedList(list) => list,
                    other => {
                        return Err(
                            self.bug(action, format!("expected ORDER BY list, found {:?}", other))
                        )
                    }
                };
                let args = match self.pop(action)?.comp {
                    Component::ExprList(list) => list,
                    other => {
                        return Err(
                            self.bug(action, format!("expected parameter list, found {:?}", other))
                        )
                    }
                };
                let name = match self.pop(action)?.comp {
                    Component::FuncName(name) => name,
                    other => {
                        return Err(
                            self.bug(action, format!("expected function name, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::Expr(Expression::FuncApp {
                        name,
                        args,
                        order_by: Some(sorted),
                    }),
                );
            }
            Rule::ParamsOrder => {
                let items =
                    self.collect_matching(token.begin, |c| matches!(c, Component::Sorted(_)));
                let sorted = items
                    .into_iter()
                    .map(|item| match item.comp {
                        Component::Sorted(s) => s,
                        _ => unreachable!(),
                    })
                    .collect();
                self.push(token, Component::SortedList(sorted));
            }
            Rule::SortedExpression => {
                let has_direction = matches!(
                    self.stack.last(),
                    Some(StackItem {
                        comp: Component::SortDir(_),
                        ..
                    })
                );
                let direction = if has_direction {
                    match self.pop(action)?.comp {
                        Component::SortDir(d) => d,
                        _ => unreachable!(),
                    }
                } else {
                    SortDirection::Ascending
                };
                let expr = self.pop_expr(action)?;
                self.push(token, Component::Sorted(SortedExpression { expr, direction }));
            }
            Rule::Ascending => self.push(token, Component::SortDir(SortDirection::Ascending)),
            Rule::Descending => self.push(token, Component::SortDir(SortDirection::Descending)),
            Rule::ArrayExpr => {
                let exprs = self.collect_exprs(token.begin);
                self.push(token, Component::Expr(Expression::ArrayExpr(exprs)));
            }
            Rule::MapExpr => {
                let items =
                    self.collect_matching(token.begin, |c| matches!(c, Component::KeyValue(..)));
                let pairs = items
                    .into_iter()
                    .map(|item| match item.comp {
                        Component::KeyValue(k, v) => (k, v),
                        _ => unreachable!(),
                    })
                    .collect();
                self.push(token, Component::Expr(Expression::MapExpr(pairs)));
            }
            Rule::KeyValuePair => {
                let value = self.pop_expr(action)?;
                let key = match self.pop_expr(action)? {
                    Expression::Literal(Value::String(s)) => s,
                    other => {
                        return Err(
                            self.bug(action, format!("expected string key, found {:?}", other))
                        )
                    }
                };
                self.push(token, Component::KeyValue(key, value));
            }

            // -------------------------------------------------------- emitters
            Rule::Istream => self.push(token, Component::Kind(EmitterKind::Istream)),
            Rule::Dstream => self.push(token, Component::Kind(EmitterKind::Dstream)),
            Rule::Rstream => self.push(token, Component::Kind(EmitterKind::Rstream)),
            Rule::EmitterLimit => {
                let n = self.pop_literal_int(action)?;
                self.push(token, Component::Limit(n));
            }
            Rule::CountBasedSampling => {
                let n = self.pop_literal_int(action)?;
                self.push(token, Component::Sampling(EmitterSampling::Count { nth: n }));
            }
            Rule::RandomizedSampling => {
                let p = self.pop_literal_number(action)?;
                self.push(
                    token,
                    Component::Sampling(EmitterSampling::Random { probability: p }),
                );
            }
            Rule::TimeBasedSamplingSeconds => {
                let v = self.pop_literal_number(action)?;
                self.push(
                    token,
                    Component::Sampling(EmitterSampling::Time {
                        seconds: v * TimeUnit::Seconds.factor(),
                    }),
                );
            }
            Rule::TimeBasedSamplingMilliseconds => {
                let v = self.pop_literal_number(action)?;
                self.push(
                    token,
                    Component::Sampling(EmitterSampling::Time {
                        seconds: v * TimeUnit::Milliseconds.factor(),
                    }),
                );
            }
            Rule::EmitterOptions => {
                let mut limit = None;
                let mut sampling = None;
                if !span_empty {
                    let items = self.collect_matching(token.begin, |c| {
                        matches!(c, Component::Limit(_) | Component::Sampling(_))
                    });
                    for item in items {
                        match item.comp {
                            Component::Limit(n) => limit = Some(n),
                            Component::Sampling(s) => sampling = Some(s),
                            _ => unreachable!(),
                        }
                    }
                }
                self.push(token, Component::EmitterOpts { limit, sampling });
            }
            Rule::Emitter => {
                let (limit, sampling) = match self.pop(action)?.comp {
                    Component::EmitterOpts { limit, sampling } => (limit, sampling),
                    other => {
                        return Err(
                            self.bug(action, format!("expected emitter options, found {:?}", other))
                        )
                    }
                };
                let kind = match self.pop(action)?.comp {
                    Component::Kind(k) => k,
                    other => {
                        return Err(
                            self.bug(action, format!("expected emitter kind, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::EmitterNode(Emitter {
                        kind,
                        limit,
                        sampling,
                    }),
                );
            }

            // -------------------------------------------------- SELECT clauses
            Rule::Projections => {
                let exprs = self.collect_exprs(token.begin);
                if exprs.is_empty() {
                    return Err(self.bug(action, "no projections in span"));
                }
                self.push(token, Component::Projections(exprs));
            }
            Rule::AliasExpression => {
                let alias = self.pop_ident(action)?;
                let expr = self.pop_expr(action)?;
                self.push(
                    token,
                    Component::Expr(Expression::Alias {
                        expr: Box::new(expr),
                        alias,
                    }),
                );
            }
            Rule::TuplesInterval => {
                let n = self.pop_literal_int(action)?;
                self.push(token, Component::Interval(Interval::Tuples(n)));
            }
            Rule::TimeIntervalSeconds => {
                let v = self.pop_literal_number(action)?;
                self.push(
                    token,
                    Component::Interval(Interval::Time {
                        value: v,
                        unit: TimeUnit::Seconds,
                    }),
                );
            }
            Rule::TimeIntervalMilliseconds => {
                let v = self.pop_literal_number(action)?;
                self.push(
                    token,
                    Component::Interval(Interval::Time {
                        value: v,
                        unit: TimeUnit::Milliseconds,
                    }),
                );
            }
            Rule::StreamWindow => {
                let interval = match self.pop(action)?.comp {
                    Component::Interval(i) => i,
                    other => {
                        return Err(self.bug(action, format!("expected interval, found {:?}", other)))
                    }
                };
                let stream = self.pop_expr(action)?;
                self.push(token, Component::Window(StreamWindow { stream, interval }));
            }
            Rule::AliasedStreamWindow => {
                let alias = self.pop_ident(action)?;
                let window = match self.pop(action)?.comp {
                    Component::Window(w) => w,
                    other => {
                        return Err(
                            self.bug(action, format!("expected stream window, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::AliasedWindow(AliasedStreamWindow {
                        window,
                        alias: Some(alias),
                    }),
                );
            }
            Rule::WindowedFrom => {
                let mut from = Vec::new();
                if !span_empty {
                    let items = self.collect_matching(token.begin, |c| {
                        matches!(c, Component::Window(_) | Component::AliasedWindow(_))
                    });
                    for item in items {
                        match item.comp {
                            Component::AliasedWindow(w) => from.push(w),
                            // A window without AS binds under its own name
                            Component::Window(w) => from.push(AliasedStreamWindow {
                                window: w,
                                alias: None,
                            }),
                            _ => unreachable!(),
                        }
                    }
                }
                self.push(token, Component::From(from));
            }
            Rule::Filter => {
                let filter = if span_empty {
                    None
                } else {
                    Some(self.pop_expr(action)?)
                };
                self.push(token, Component::Filter(filter));
            }
            Rule::Grouping => {
                let keys = if span_empty {
                    Vec::new()
                } else {
                    let keys = self.collect_exprs(token.begin);
                    if keys.is_empty() {
                        return Err(self.bug(action, "no grouping keys in span"));
                    }
                    keys
                };
                self.push(token, Component::Grouping(keys));
            }
            Rule::Having => {
                let having = if span_empty {
                    None
                } else {
                    Some(self.pop_expr(action)?)
                };
                self.push(token, Component::Having(having));
            }
            Rule::TrailingWhitespace => {
                if let Some(StackItem {
                    comp: Component::Stmt(Statement::Select(select)),
                    ..
                }) = self.stack.last_mut()
                {
                    select.trailing = Span::new(token.begin, token.end);
                }
            }

            // ------------------------------------------- WITH/SET param blocks
            Rule::SourceSinkParam => {
                let value_expr = self.pop_expr(action)?;
                let value = self.expr_to_value(action, value_expr)?;
                let key = self.pop_ident(action)?;
                self.push(token, Component::Param(SourceSinkParam { key, value }));
            }
            Rule::SourceSinkSpecs | Rule::UpdateSourceSinkSpecs | Rule::SetOptSpecs => {
                let mut params = Vec::new();
                if !span_empty {
                    let items =
                        self.collect_matching(token.begin, |c| matches!(c, Component::Param(_)));
                    for item in items {
                        match item.comp {
                            Component::Param(p) => params.push(p),
                            _ => unreachable!(),
                        }
                    }
                }
                self.push(token, Component::Specs(params));
            }
            Rule::StateTagOpt => {
                let tag = if span_empty {
                    None
                } else {
                    Some(self.pop_ident(action)?)
                };
                self.push(token, Component::Tag(tag));
            }
            Rule::Paused => self.push(token, Component::Paused(BinaryKeyword::Yes)),
            Rule::Unpaused => self.push(token, Component::Paused(BinaryKeyword::No)),
            Rule::PausedOpt => {
                let keyword = if span_empty {
                    BinaryKeyword::Unspecified
                } else {
                    match self.pop(action)?.comp {
                        Component::Paused(k) => k,
                        other => {
                            return Err(
                                self.bug(action, format!("expected PAUSED keyword, found {:?}", other))
                            )
                        }
                    }
                };
                self.push(token, Component::Paused(keyword));
            }
            Rule::EvalInput => {
                let input = if span_empty {
                    None
                } else {
                    Some(self.pop_expr(action)?)
                };
                self.push(token, Component::EvalInput(input));
            }

            // ------------------------------------------------------ statements
            Rule::SelectStmt => {
                let having = match self.pop(action)?.comp {
                    Component::Having(h) => h,
                    other => {
                        return Err(self.bug(action, format!("expected HAVING slot, found {:?}", other)))
                    }
                };
                let grouping = match self.pop(action)?.comp {
                    Component::Grouping(g) => g,
                    other => {
                        return Err(self.bug(action, format!("expected GROUP BY slot, found {:?}", other)))
                    }
                };
                let filter = match self.pop(action)?.comp {
                    Component::Filter(f) => f,
                    other => {
                        return Err(self.bug(action, format!("expected WHERE slot, found {:?}", other)))
                    }
                };
                let from = match self.pop(action)?.comp {
                    Component::From(f) => f,
                    other => {
                        return Err(self.bug(action, format!("expected FROM slot, found {:?}", other)))
                    }
                };
                let projections = match self.pop(action)?.comp {
                    Component::Projections(p) => p,
                    other => {
                        return Err(
                            self.bug(action, format!("expected projections, found {:?}", other))
                        )
                    }
                };
                let emitter = match self.pop(action)?.comp {
                    Component::EmitterNode(e) => e,
                    other => {
                        return Err(self.bug(action, format!("expected emitter, found {:?}", other)))
                    }
                };
                self.push(
                    token,
                    Component::Stmt(Statement::Select(SelectStmt {
                        emitter,
                        projections,
                        from,
                        filter,
                        grouping,
                        having,
                        trailing: Span::default(),
                    })),
                );
            }
            Rule::SelectUnionStmt => {
                let items = self.collect_matching(token.begin, |c| {
                    matches!(c, Component::Stmt(Statement::Select(_)))
                });
                let selects = items
                    .into_iter()
                    .map(|item| match item.comp {
                        Component::Stmt(Statement::Select(s)) => s,
                        _ => unreachable!(),
                    })
                    .collect();
                self.push(
                    token,
                    Component::Stmt(Statement::SelectUnion(SelectUnionStmt { selects })),
                );
            }
            Rule::CreateStreamAsSelectStmt => {
                let select = self.pop_select(action)?;
                let name = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::CreateStreamAsSelect { name, select }),
                );
            }
            Rule::CreateStreamAsSelectUnionStmt => {
                let select = match self.pop(action)?.comp {
                    Component::Stmt(Statement::SelectUnion(u)) => u,
                    other => {
                        return Err(self.bug(action, format!("expected SELECT UNION, found {:?}", other)))
                    }
                };
                let name = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::CreateStreamAsSelectUnion { name, select }),
                );
            }
            Rule::CreateSourceStmt => {
                let params = self.pop_specs(action)?;
                let source_type = self.pop_ident(action)?;
                let name = self.pop_ident(action)?;
                let paused = match self.pop(action)?.comp {
                    Component::Paused(k) => k,
                    other => {
                        return Err(
                            self.bug(action, format!("expected PAUSED keyword, found {:?}", other))
                        )
                    }
                };
                self.push(
                    token,
                    Component::Stmt(Statement::CreateSource {
                        paused,
                        name,
                        source_type,
                        params,
                    }),
                );
            }
            Rule::CreateSinkStmt => {
                let params = self.pop_specs(action)?;
                let sink_type = self.pop_ident(action)?;
                let name = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::CreateSink {
                        name,
                        sink_type,
                        params,
                    }),
                );
            }
            Rule::CreateStateStmt => {
                let params = self.pop_specs(action)?;
                let state_type = self.pop_ident(action)?;
                let name = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::CreateState {
                        name,
                        state_type,
                        params,
                    }),
                );
            }
            Rule::UpdateStateStmt => {
                let params = self.pop_specs(action)?;
                let name = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::UpdateState { name, params }));
            }
            Rule::UpdateSourceStmt => {
                let params = self.pop_specs(action)?;
                let name = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::UpdateSource { name, params }));
            }
            Rule::UpdateSinkStmt => {
                let params = self.pop_specs(action)?;
                let name = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::UpdateSink { name, params }));
            }
            Rule::InsertIntoSelectStmt => {
                let select = self.pop_select(action)?;
                let sink = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::InsertIntoSelect { sink, select }),
                );
            }
            Rule::InsertIntoFromStmt => {
                let input = self.pop_ident(action)?;
                let sink = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::InsertIntoFrom { sink, input }));
            }
            Rule::PauseSourceStmt => {
                let source = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::PauseSource { source }));
            }
            Rule::ResumeSourceStmt => {
                let source = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::ResumeSource { source }));
            }
            Rule::RewindSourceStmt => {
                let source = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::RewindSource { source }));
            }
            Rule::DropSourceStmt => {
                let source = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::DropSource { source }));
            }
            Rule::DropStreamStmt => {
                let stream = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::DropStream { stream }));
            }
            Rule::DropSinkStmt => {
                let sink = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::DropSink { sink }));
            }
            Rule::DropStateStmt => {
                let state = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::DropState { state }));
            }
            Rule::LoadStateStmt => {
                let set_params = self.pop_specs(action)?;
                let tag = self.pop_tag(action)?;
                let state_type = self.pop_ident(action)?;
                let name = self.pop_ident(action)?;
                self.push(
                    token,
                    Component::Stmt(Statement::LoadState(LoadStateStmt {
                        name,
                        state_type,
                        tag,
                        set_params,
                    })),
                );
            }
            Rule::LoadStateOrCreateStmt => {
                let create_params = self.pop_specs(action)?;
                let load = match self.pop(action)?.comp {
                    Component::Stmt(Statement::LoadState(l)) => l,
                    other => {
                        return Err(self.bug(action, format!("expected LOAD STATE, found {:?}", other)))
                    }
                };
                self.push(
                    token,
                    Component::Stmt(Statement::LoadStateOrCreate { load, create_params }),
                );
            }
            Rule::SaveStateStmt => {
                let tag = self.pop_tag(action)?;
                let name = self.pop_ident(action)?;
                self.push(token, Component::Stmt(Statement::SaveState { name, tag }));
            }
            Rule::EvalStmt => {
                let input = match self.pop(action)?.comp {
                    Component::EvalInput(i) => i,
                    other => {
                        return Err(self.bug(action, format!("expected eval input, found {:?}", other)))
                    }
                };
                let expr = self.pop_expr(action)?;
                self.push(token, Component::Stmt(Statement::Eval { expr, input }));
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Statement, BqlError> {
        let item = self.pop("Finalize")?;
        if !self.stack.is_empty() {
            return Err(self.bug(
                "Finalize",
                format!("{} unconsumed items on the working stack", self.stack.len() + 1),
            ));
        }
        match item.comp {
            Component::Stmt(stmt) => Ok(stmt),
            other => Err(self.bug("Finalize", format!("expected statement, found {:?}", other))),
        }
    }
}
