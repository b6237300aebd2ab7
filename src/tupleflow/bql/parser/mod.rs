/*!
# BQL Parser

This module turns BQL text into statement ASTs in two strictly separated
phases:

1. **Recognition**: a deterministic PEG recognizer ([`peg`]) matches the
   input and records an ordered forest of `(rule, begin, end, depth)`
   tokens. No tree is built during recognition, which keeps backtracking
   trivially correct: failed alternatives just truncate the token vector.
2. **Assembly**: the assembler ([`stack`]) walks the token stream in order
   and executes one semantic action per token against a LIFO working
   stack whose final element is the finished statement.

The split mirrors the engine's testing strategy: the recognizer can be
tested purely on token streams and the assembler purely on stack
discipline.

## Examples

```rust,no_run
use tupleflow::BqlParser;

let parser = BqlParser::new();

// A windowed aggregation
let stmts = parser.parse(
    "SELECT RSTREAM count(*) AS c FROM s [RANGE 100 TUPLES] GROUP BY a HAVING c > 10;"
)?;

// REPL-style piping: parse one statement, keep the rest
let (stmt, rest) = parser.parse_stmt("SELECT RSTREAM a FROM s [RANGE 1 TUPLES]; SELECT ...")?;
# Ok::<(), tupleflow::BqlError>(())
```
*/

pub mod peg;
pub mod stack;
pub mod tokens;

pub use peg::Recognition;
pub use tokens::{ParseToken, Rule};

use crate::tupleflow::bql::ast::Statement;
use crate::tupleflow::error::BqlError;
use log::debug;

/// Main parser for BQL statements.
///
/// The parser is stateless and cheap to construct; independent instances
/// may parse concurrently. Parsed statements are immutable and can be
/// shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct BqlParser;

impl BqlParser {
    pub fn new() -> Self {
        BqlParser
    }

    /// Parse a single statement and return it together with the input
    /// remaining after its terminator, for REPL-style piping.
    ///
    /// The statement must end with `;` (arbitrary text may follow) or at
    /// end of input.
    pub fn parse_stmt<'a>(&self, input: &'a str) -> Result<(Statement, &'a str), BqlError> {
        let recognition = peg::PegRecognizer::new(input).recognize()?;
        let statement = stack::assemble(&recognition)?;
        debug!(
            "parsed {} statement ({} parse tokens)",
            statement.kind(),
            recognition.tokens.len()
        );
        Ok((statement, &input[recognition.rest..]))
    }

    /// Parse a complete script of `;`-separated statements.
    ///
    /// Trailing whitespace and comments after the final statement are
    /// permitted.
    pub fn parse(&self, input: &str) -> Result<Vec<Statement>, BqlError> {
        let mut statements = Vec::new();
        let mut remaining = input;
        while !is_blank(remaining) {
            let (statement, rest) = self.parse_stmt(remaining)?;
            statements.push(statement);
            remaining = rest;
        }
        Ok(statements)
    }

    /// Run recognition only, returning the raw token stream.
    ///
    /// Mostly useful for tooling and for asserting recognizer determinism.
    pub fn parse_tokens(&self, input: &str) -> Result<Vec<ParseToken>, BqlError> {
        let recognition = peg::PegRecognizer::new(input).recognize()?;
        Ok(recognition.tokens)
    }
}

/// True when the input holds only whitespace and `--` comments
fn is_blank(input: &str) -> bool {
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {}
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => return false,
        }
    }
    true
}
