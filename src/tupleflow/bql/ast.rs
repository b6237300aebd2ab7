//! BQL abstract syntax tree for continuous queries.
//!
//! Statements and expressions are closed variant sets. ASTs are created by
//! the assembler, read by the resolver, handed to the topology builder, and
//! immutable for the life of the installed query. Serialization produces
//! the deterministic diagnostic JSON rendering; source spans are omitted
//! from it.

use crate::tupleflow::data::Value;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A half-open `[begin, end)` span of rune offsets in the parsed input.
///
/// Spans are parser bookkeeping, not part of the statement's semantic
/// identity, and are skipped in the diagnostic rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Span { begin, end }
    }

    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }
}

/// A complete BQL statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Select(SelectStmt),
    SelectUnion(SelectUnionStmt),
    CreateStreamAsSelect {
        name: String,
        select: SelectStmt,
    },
    CreateStreamAsSelectUnion {
        name: String,
        select: SelectUnionStmt,
    },
    CreateSource {
        paused: BinaryKeyword,
        name: String,
        source_type: String,
        params: Vec<SourceSinkParam>,
    },
    CreateSink {
        name: String,
        sink_type: String,
        params: Vec<SourceSinkParam>,
    },
    CreateState {
        name: String,
        state_type: String,
        params: Vec<SourceSinkParam>,
    },
    UpdateState {
        name: String,
        params: Vec<SourceSinkParam>,
    },
    UpdateSource {
        name: String,
        params: Vec<SourceSinkParam>,
    },
    UpdateSink {
        name: String,
        params: Vec<SourceSinkParam>,
    },
    InsertIntoSelect {
        sink: String,
        select: SelectStmt,
    },
    InsertIntoFrom {
        sink: String,
        input: String,
    },
    PauseSource {
        source: String,
    },
    ResumeSource {
        source: String,
    },
    RewindSource {
        source: String,
    },
    DropSource {
        source: String,
    },
    DropStream {
        stream: String,
    },
    DropSink {
        sink: String,
    },
    DropState {
        state: String,
    },
    LoadState(LoadStateStmt),
    LoadStateOrCreate {
        load: LoadStateStmt,
        create_params: Vec<SourceSinkParam>,
    },
    SaveState {
        name: String,
        tag: Option<String>,
    },
    Eval {
        expr: Expression,
        input: Option<Expression>,
    },
}

impl Statement {
    /// Short statement-kind name for logging and diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::SelectUnion(_) => "SELECT UNION",
            Statement::CreateStreamAsSelect { .. } => "CREATE STREAM AS SELECT",
            Statement::CreateStreamAsSelectUnion { .. } => "CREATE STREAM AS SELECT UNION",
            Statement::CreateSource { .. } => "CREATE SOURCE",
            Statement::CreateSink { .. } => "CREATE SINK",
            Statement::CreateState { .. } => "CREATE STATE",
            Statement::UpdateState { .. } => "UPDATE STATE",
            Statement::UpdateSource { .. } => "UPDATE SOURCE",
            Statement::UpdateSink { .. } => "UPDATE SINK",
            Statement::InsertIntoSelect { .. } => "INSERT INTO SELECT",
            Statement::InsertIntoFrom { .. } => "INSERT INTO FROM",
            Statement::PauseSource { .. } => "PAUSE SOURCE",
            Statement::ResumeSource { .. } => "RESUME SOURCE",
            Statement::RewindSource { .. } => "REWIND SOURCE",
            Statement::DropSource { .. } => "DROP SOURCE",
            Statement::DropStream { .. } => "DROP STREAM",
            Statement::DropSink { .. } => "DROP SINK",
            Statement::DropState { .. } => "DROP STATE",
            Statement::LoadState(_) => "LOAD STATE",
            Statement::LoadStateOrCreate { .. } => "LOAD STATE OR CREATE",
            Statement::SaveState { .. } => "SAVE STATE",
            Statement::Eval { .. } => "EVAL",
        }
    }
}

/// A continuous SELECT query
#[derive(Debug, Clone, Serialize)]
pub struct SelectStmt {
    pub emitter: Emitter,
    pub projections: Vec<Expression>,
    /// Windowed FROM list; empty for a stateless SELECT
    pub from: Vec<AliasedStreamWindow>,
    pub filter: Option<Expression>,
    pub grouping: Vec<Expression>,
    pub having: Option<Expression>,
    /// Whitespace and comments consumed between the last clause and the
    /// statement terminator
    #[serde(skip)]
    pub trailing: Span,
}

/// Equality is semantic: the trailing span is parser bookkeeping and two
/// queries differing only in consumed trailing whitespace are the same
/// query
impl PartialEq for SelectStmt {
    fn eq(&self, other: &Self) -> bool {
        self.emitter == other.emitter
            && self.projections == other.projections
            && self.from == other.from
            && self.filter == other.filter
            && self.grouping == other.grouping
            && self.having == other.having
    }
}

/// Two or more SELECTs joined by UNION ALL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectUnionStmt {
    pub selects: Vec<SelectStmt>,
}

/// LOAD STATE with its optional tag and SET parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadStateStmt {
    pub name: String,
    pub state_type: String,
    pub tag: Option<String>,
    pub set_params: Vec<SourceSinkParam>,
}

/// The relation-to-stream operator of a continuous query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmitterKind {
    /// Emit insertions only
    Istream,
    /// Emit deletions only
    Dstream,
    /// Emit the full current relation
    Rstream,
}

impl fmt::Display for EmitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterKind::Istream => write!(f, "ISTREAM"),
            EmitterKind::Dstream => write!(f, "DSTREAM"),
            EmitterKind::Rstream => write!(f, "RSTREAM"),
        }
    }
}

/// Emitter with its bracketed options
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emitter {
    pub kind: EmitterKind,
    pub limit: Option<i64>,
    pub sampling: Option<EmitterSampling>,
}

impl Emitter {
    pub fn new(kind: EmitterKind) -> Self {
        Emitter {
            kind,
            limit: None,
            sampling: None,
        }
    }
}

/// Output sampling attached to an emitter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EmitterSampling {
    /// EVERY n-TH TUPLE
    Count { nth: i64 },
    /// SAMPLE p% - Bernoulli sampling
    Random { probability: f64 },
    /// EVERY t SECONDS or MILLISECONDS, held canonically in seconds
    Time { seconds: f64 },
}

/// Window size specification over a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Interval {
    /// Last n tuples
    Tuples(i64),
    /// Time-bounded window
    Time { value: f64, unit: TimeUnit },
}

/// Units a time window can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Seconds per unit
    pub fn factor(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Milliseconds => 0.001,
        }
    }
}

impl Interval {
    /// Duration of a time interval; `None` for tuple-count windows
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            Interval::Tuples(_) => None,
            Interval::Time { value, unit } => Some(Duration::from_secs_f64(value * unit.factor())),
        }
    }
}

/// A stream-like with its window: `s [RANGE 5 SECONDS]`.
///
/// The stream-like is either a named stream or a user-defined stream
/// function application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamWindow {
    pub stream: Expression,
    pub interval: Interval,
}

/// A windowed stream with its optional alias from `AS`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasedStreamWindow {
    pub window: StreamWindow,
    pub alias: Option<String>,
}

impl AliasedStreamWindow {
    /// The name row references resolve against: the alias when present,
    /// otherwise the stream or function name itself
    pub fn binding_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.window.stream {
            Expression::Stream(name) => name,
            Expression::FuncApp { name, .. } => name,
            _ => "",
        }
    }
}

/// Whether CREATE SOURCE asked for an initial pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryKeyword {
    Yes,
    No,
    Unspecified,
}

/// One `key = value` entry of a WITH or SET block.
///
/// Parameter values are restricted to literals by the grammar, so they are
/// carried as plain values rather than expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSinkParam {
    pub key: String,
    pub value: Value,
}

/// Row metadata kinds; the only one today is the tuple timestamp, `ts()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowMetaKind {
    Timestamp,
}

impl fmt::Display for RowMetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowMetaKind::Timestamp => write!(f, "ts()"),
        }
    }
}

/// Sort direction of an ORDER BY entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// An expression with its sort direction, as used in ORDER BY suffixes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortedExpression {
    pub expr: Expression,
    pub direction: SortDirection,
}

/// A BQL expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    /// Reference into the current row: `alias:path` or a bare path.
    /// The column holds the raw path text; consumers compile it with
    /// the path engine when they evaluate.
    RowValue {
        relation: Option<String>,
        column: String,
    },
    /// Row metadata access such as `ts()`
    RowMeta {
        relation: Option<String>,
        meta: RowMetaKind,
    },
    /// A named stream, used as a stream-like in FROM
    Stream(String),
    /// `*` or `alias:*`
    Wildcard { relation: Option<String> },
    /// A literal value
    Literal(Value),
    /// Function application with an optional ORDER BY suffix
    FuncApp {
        name: String,
        args: Vec<Expression>,
        order_by: Option<Vec<SortedExpression>>,
    },
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `expr :: Type` or `CAST(expr AS Type)`
    TypeCast {
        expr: Box<Expression>,
        target: crate::tupleflow::data::ValueType,
    },
    ArrayExpr(Vec<Expression>),
    MapExpr(Vec<(String, Expression)>),
    /// A projection with an explicit output name
    Alias {
        expr: Box<Expression>,
        alias: String,
    },
}

impl Expression {
    /// Collect every row reference (row values, row metadata and
    /// wildcards) reachable from this expression, in evaluation order
    pub fn row_references(&self) -> Vec<&Expression> {
        let mut out = Vec::new();
        self.collect_row_references(&mut out);
        out
    }

    fn collect_row_references<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        match self {
            Expression::RowValue { .. }
            | Expression::RowMeta { .. }
            | Expression::Wildcard { .. } => out.push(self),
            Expression::Stream(_) | Expression::Literal(_) => {}
            Expression::FuncApp { args, order_by, .. } => {
                for arg in args {
                    arg.collect_row_references(out);
                }
                if let Some(sorted) = order_by {
                    for s in sorted {
                        s.expr.collect_row_references(out);
                    }
                }
            }
            Expression::UnaryOp { expr, .. } => expr.collect_row_references(out),
            Expression::BinaryOp { left, right, .. } => {
                left.collect_row_references(out);
                right.collect_row_references(out);
            }
            Expression::TypeCast { expr, .. } => expr.collect_row_references(out),
            Expression::ArrayExpr(elems) => {
                for e in elems {
                    e.collect_row_references(out);
                }
            }
            Expression::MapExpr(pairs) => {
                for (_, e) in pairs {
                    e.collect_row_references(out);
                }
            }
            Expression::Alias { expr, .. } => expr.collect_row_references(out),
        }
    }
}

/// Binary operators, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Concat,
    Is,
    IsNot,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Or => "OR",
            BinaryOperator::And => "AND",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Concat => "||",
            BinaryOperator::Is => "IS",
            BinaryOperator::IsNot => "IS NOT",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "NOT"),
            UnaryOperator::Minus => write!(f, "-"),
        }
    }
}
