// BQL language front-end for tupleflow
// Parses statement text into immutable ASTs and resolves names and types

pub mod ast;
pub mod parser;
pub mod registry;
pub mod resolver;

// Re-export main API
pub use ast::{
    AliasedStreamWindow, BinaryKeyword, BinaryOperator, Emitter, EmitterKind, EmitterSampling,
    Expression, Interval, LoadStateStmt, RowMetaKind, SelectStmt, SelectUnionStmt, SortDirection,
    SortedExpression, SourceSinkParam, Span, Statement, StreamWindow, TimeUnit, UnaryOperator,
};
pub use parser::{BqlParser, ParseToken, Rule};
pub use registry::{Function, FunctionKind, FunctionRegistry, InMemoryRegistry};
pub use resolver::{ProjectionInfo, ResolvedStatement, Resolver};

// Version and feature info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const FEATURES: &[&str] = &[
    "continuous_select",    // SELECT with ISTREAM/DSTREAM/RSTREAM emitters
    "windowing",            // [RANGE n TUPLES | n SECONDS | n MILLISECONDS]
    "emitter_sampling",     // EVERY n-TH TUPLE, SAMPLE p%, EVERY t SECONDS
    "union_all",            // SELECT ... UNION ALL SELECT ...
    "stream_management",    // CREATE STREAM AS SELECT, INSERT INTO, DROP STREAM
    "source_management",    // CREATE/UPDATE/PAUSE/RESUME/REWIND/DROP SOURCE
    "sink_management",      // CREATE/UPDATE/DROP SINK
    "state_management",     // CREATE/UPDATE/DROP/SAVE/LOAD STATE with tags
    "eval_repl",            // EVAL expr ON {...}
    "json_paths",           // nested row access with slices and recursion
    "type_casts",           // expr :: Type and CAST(expr AS Type)
    "udf_udsf_resolution",  // registry-backed function classification
];
