//! Parse-tree tokens produced by the PEG recognizer.
//!
//! Recognition and tree-building are separated: rule functions only record
//! which rules matched where, as an ordered forest of
//! `(rule, begin, end, depth)` tokens. The assembler walks the tokens in
//! order and executes one semantic action per token against its working
//! stack. Rules with no semantic action never emit tokens; they exist for
//! diagnostics only.

/// Rule identifiers carried by parse tokens.
///
/// Every variant maps to exactly one semantic action in the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    // Statement assembly
    SelectStmt,
    SelectUnionStmt,
    CreateStreamAsSelectStmt,
    CreateStreamAsSelectUnionStmt,
    CreateSourceStmt,
    CreateSinkStmt,
    CreateStateStmt,
    UpdateStateStmt,
    UpdateSourceStmt,
    UpdateSinkStmt,
    InsertIntoSelectStmt,
    InsertIntoFromStmt,
    PauseSourceStmt,
    ResumeSourceStmt,
    RewindSourceStmt,
    DropSourceStmt,
    DropStreamStmt,
    DropSinkStmt,
    DropStateStmt,
    LoadStateStmt,
    LoadStateOrCreateStmt,
    SaveStateStmt,
    EvalStmt,

    // Emitter and its options
    Emitter,
    EmitterOptions,
    EmitterLimit,
    CountBasedSampling,
    RandomizedSampling,
    TimeBasedSamplingSeconds,
    TimeBasedSamplingMilliseconds,
    Istream,
    Dstream,
    Rstream,

    // SELECT clauses
    Projections,
    AliasExpression,
    WindowedFrom,
    StreamWindow,
    AliasedStreamWindow,
    TuplesInterval,
    TimeIntervalSeconds,
    TimeIntervalMilliseconds,
    Filter,
    Grouping,
    Having,
    TrailingWhitespace,

    // Source/sink/state clauses
    SourceSinkSpecs,
    UpdateSourceSinkSpecs,
    SetOptSpecs,
    SourceSinkParam,
    StateTagOpt,
    PausedOpt,
    Paused,
    Unpaused,
    EvalInput,

    // Expression levels
    OrExpr,
    AndExpr,
    NotExpr,
    ComparisonExpr,
    OtherOpExpr,
    IsExpr,
    TermExpr,
    ProductExpr,
    MinusExpr,
    CastExpr,
    FuncTypeCast,
    FuncAppWithOrderBy,
    FuncAppWithoutOrderBy,
    FuncParams,
    ParamsOrder,
    SortedExpression,
    Ascending,
    Descending,
    ArrayExpr,
    MapExpr,
    KeyValuePair,

    // Operators
    Or,
    And,
    NotOp,
    ComparisonOp,
    OtherOp,
    IsOp,
    PlusMinusOp,
    MultDivOp,
    UnaryMinus,

    // Leaves
    Stream,
    RowValue,
    RowTimestamp,
    Wildcard,
    NumericLiteral,
    FloatLiteral,
    StringLiteral,
    NullLiteral,
    TrueLiteral,
    FalseLiteral,
    Function,
    Identifier,
    TargetIdentifier,
    Type,
}

impl Rule {
    /// Grammar-rule name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Rule::SelectStmt => "SelectStmt",
            Rule::SelectUnionStmt => "SelectUnionStmt",
            Rule::CreateStreamAsSelectStmt => "CreateStreamAsSelectStmt",
            Rule::CreateStreamAsSelectUnionStmt => "CreateStreamAsSelectUnionStmt",
            Rule::CreateSourceStmt => "CreateSourceStmt",
            Rule::CreateSinkStmt => "CreateSinkStmt",
            Rule::CreateStateStmt => "CreateStateStmt",
            Rule::UpdateStateStmt => "UpdateStateStmt",
            Rule::UpdateSourceStmt => "UpdateSourceStmt",
            Rule::UpdateSinkStmt => "UpdateSinkStmt",
            Rule::InsertIntoSelectStmt => "InsertIntoSelectStmt",
            Rule::InsertIntoFromStmt => "InsertIntoFromStmt",
            Rule::PauseSourceStmt => "PauseSourceStmt",
            Rule::ResumeSourceStmt => "ResumeSourceStmt",
            Rule::RewindSourceStmt => "RewindSourceStmt",
            Rule::DropSourceStmt => "DropSourceStmt",
            Rule::DropStreamStmt => "DropStreamStmt",
            Rule::DropSinkStmt => "DropSinkStmt",
            Rule::DropStateStmt => "DropStateStmt",
            Rule::LoadStateStmt => "LoadStateStmt",
            Rule::LoadStateOrCreateStmt => "LoadStateOrCreateStmt",
            Rule::SaveStateStmt => "SaveStateStmt",
            Rule::EvalStmt => "EvalStmt",
            Rule::Emitter => "Emitter",
            Rule::EmitterOptions => "EmitterOptions",
            Rule::EmitterLimit => "EmitterLimit",
            Rule::CountBasedSampling => "CountBasedSampling",
            Rule::RandomizedSampling => "RandomizedSampling",
            Rule::TimeBasedSamplingSeconds => "TimeBasedSamplingSeconds",
            Rule::TimeBasedSamplingMilliseconds => "TimeBasedSamplingMilliseconds",
            Rule::Istream => "ISTREAM",
            Rule::Dstream => "DSTREAM",
            Rule::Rstream => "RSTREAM",
            Rule::Projections => "Projections",
            Rule::AliasExpression => "AliasExpression",
            Rule::WindowedFrom => "WindowedFrom",
            Rule::StreamWindow => "StreamWindow",
            Rule::AliasedStreamWindow => "AliasedStreamWindow",
            Rule::TuplesInterval => "TuplesInterval",
            Rule::TimeIntervalSeconds => "TimeIntervalSeconds",
            Rule::TimeIntervalMilliseconds => "TimeIntervalMilliseconds",
            Rule::Filter => "Filter",
            Rule::Grouping => "Grouping",
            Rule::Having => "Having",
            Rule::TrailingWhitespace => "TrailingWhitespace",
            Rule::SourceSinkSpecs => "SourceSinkSpecs",
            Rule::UpdateSourceSinkSpecs => "UpdateSourceSinkSpecs",
            Rule::SetOptSpecs => "SetOptSpecs",
            Rule::SourceSinkParam => "SourceSinkParam",
            Rule::StateTagOpt => "StateTagOpt",
            Rule::PausedOpt => "PausedOpt",
            Rule::Paused => "PAUSED",
            Rule::Unpaused => "UNPAUSED",
            Rule::EvalInput => "EvalInput",
            Rule::OrExpr => "orExpr",
            Rule::AndExpr => "andExpr",
            Rule::NotExpr => "notExpr",
            Rule::ComparisonExpr => "comparisonExpr",
            Rule::OtherOpExpr => "otherOpExpr",
            Rule::IsExpr => "isExpr",
            Rule::TermExpr => "termExpr",
            Rule::ProductExpr => "productExpr",
            Rule::MinusExpr => "minusExpr",
            Rule::CastExpr => "castExpr",
            Rule::FuncTypeCast => "FuncTypeCast",
            Rule::FuncAppWithOrderBy => "FuncAppWithOrderBy",
            Rule::FuncAppWithoutOrderBy => "FuncAppWithoutOrderBy",
            Rule::FuncParams => "FuncParams",
            Rule::ParamsOrder => "ParamsOrder",
            Rule::SortedExpression => "SortedExpression",
            Rule::Ascending => "Ascending",
            Rule::Descending => "Descending",
            Rule::ArrayExpr => "ArrayExpr",
            Rule::MapExpr => "MapExpr",
            Rule::KeyValuePair => "KeyValuePair",
            Rule::Or => "Or",
            Rule::And => "And",
            Rule::NotOp => "Not",
            Rule::ComparisonOp => "ComparisonOp",
            Rule::OtherOp => "OtherOp",
            Rule::IsOp => "IsOp",
            Rule::PlusMinusOp => "PlusMinusOp",
            Rule::MultDivOp => "MultDivOp",
            Rule::UnaryMinus => "UnaryMinus",
            Rule::Stream => "Stream",
            Rule::RowValue => "RowValue",
            Rule::RowTimestamp => "RowTimestamp",
            Rule::Wildcard => "Wildcard",
            Rule::NumericLiteral => "NumericLiteral",
            Rule::FloatLiteral => "FloatLiteral",
            Rule::StringLiteral => "StringLiteral",
            Rule::NullLiteral => "NullLiteral",
            Rule::TrueLiteral => "TrueLiteral",
            Rule::FalseLiteral => "FalseLiteral",
            Rule::Function => "Function",
            Rule::Identifier => "Identifier",
            Rule::TargetIdentifier => "TargetIdentifier",
            Rule::Type => "Type",
        }
    }
}

/// One recorded rule match.
///
/// `begin` and `end` are rune offsets into the parsed input; `depth` is the
/// pre-order nesting depth of the rule invocation that emitted the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseToken {
    pub rule: Rule,
    pub begin: usize,
    pub end: usize,
    pub depth: u32,
}
