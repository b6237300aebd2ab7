//! Deterministic PEG recognizer for BQL.
//!
//! The recognizer operates on a vector of Unicode scalars with an appended
//! sentinel so every lookahead is safe. Rules are methods returning `bool`;
//! on failure each rule restores the `(position, token_index, depth)`
//! snapshot taken on entry, so ordered choice backtracks cleanly and the
//! emitted token stream only ever reflects successful matches.
//!
//! Keywords are matched as case-insensitive character sequences against the
//! original runes; the input is never lowercased, so spans always point at
//! the user's own text. Whitespace is space, tab, CR, LF or a `--` line
//! comment (a comment ending at end of input is fine).
//!
//! Semantic actions never fire during recognition. Every rule with an
//! action emits a `(rule, begin, end, depth)` token instead; the assembler
//! walks the tokens afterwards.

use super::tokens::{ParseToken, Rule};
use crate::tupleflow::error::BqlError;

/// Sentinel appended to the rune vector; never matches any rule
const EOF_RUNE: char = '\u{0}';

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Result of a successful recognition
pub struct Recognition {
    /// Ordered token forest for the assembler
    pub tokens: Vec<ParseToken>,
    /// The parsed input as runes (with the sentinel still attached)
    pub runes: Vec<char>,
    /// Byte offset into the original input where the unconsumed remainder
    /// begins, for REPL-style piping of the rest to a next parse
    pub rest: usize,
}

/// Snapshot of the mutable recognizer state, restored on rule failure
#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    token_index: usize,
    depth: u32,
}

pub struct PegRecognizer {
    runes: Vec<char>,
    byte_offsets: Vec<usize>,
    pos: usize,
    depth: u32,
    tokens: Vec<ParseToken>,
    deepest_pos: usize,
    deepest_rule: &'static str,
}

impl PegRecognizer {
    pub fn new(input: &str) -> Self {
        let mut runes = Vec::with_capacity(input.len() + 1);
        let mut byte_offsets = Vec::with_capacity(input.len() + 1);
        for (off, c) in input.char_indices() {
            byte_offsets.push(off);
            runes.push(c);
        }
        byte_offsets.push(input.len());
        runes.push(EOF_RUNE);
        PegRecognizer {
            runes,
            byte_offsets,
            pos: 0,
            depth: 0,
            tokens: Vec::with_capacity(64),
            deepest_pos: 0,
            deepest_rule: "Statement",
        }
    }

    /// Recognize a single statement, optionally terminated by `;` with
    /// arbitrary trailing text, or unterminated at end of input.
    pub fn recognize(mut self) -> Result<Recognition, BqlError> {
        self.sp();
        if !self.statement() {
            return Err(self.deepest_error());
        }
        let trailing_begin = self.pos;
        self.sp();
        self.emit(Rule::TrailingWhitespace, trailing_begin);
        if self.eat(';') || self.at_eof() {
            let rest = self.byte_offsets[self.pos.min(self.byte_offsets.len() - 1)];
            Ok(Recognition {
                tokens: self.tokens,
                runes: self.runes,
                rest,
            })
        } else {
            let (line, column) = self.line_col(self.pos);
            Err(BqlError::parse_error(
                "expected ';' or end of input after statement",
                line,
                column,
            ))
        }
    }

    // ------------------------------------------------------------------
    // Core machinery

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            token_index: self.tokens.len(),
            depth: self.depth,
        }
    }

    fn rollback(&mut self, c: Checkpoint) {
        self.pos = c.pos;
        self.tokens.truncate(c.token_index);
        self.depth = c.depth;
    }

    fn emit(&mut self, rule: Rule, begin: usize) {
        self.tokens.push(ParseToken {
            rule,
            begin,
            end: self.pos,
            depth: self.depth,
        });
    }

    /// Run a rule body with snapshot/restore semantics and failure-depth
    /// bookkeeping
    fn rule<F>(&mut self, name: &'static str, body: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let snapshot = self.checkpoint();
        self.depth += 1;
        let ok = body(self);
        self.depth -= 1;
        if !ok {
            if self.pos >= self.deepest_pos {
                self.deepest_pos = self.pos;
                self.deepest_rule = name;
            }
            self.rollback(snapshot);
        }
        ok
    }

    /// Like [`rule`], emitting a token spanning the matched text on success
    fn tok<F>(&mut self, rule: Rule, body: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        let begin = self.pos;
        let ok = self.rule(rule.name(), body);
        if ok {
            self.emit(rule, begin);
        }
        ok
    }

    fn peek(&self) -> char {
        self.runes[self.pos]
    }

    fn at_eof(&self) -> bool {
        self.pos == self.runes.len() - 1
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == c {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Match a keyword as a case-insensitive character sequence followed by
    /// a non-identifier rune
    fn keyword(&mut self, word: &str) -> bool {
        let save = self.pos;
        for wc in word.chars() {
            if self.peek().to_ascii_uppercase() == wc {
                self.pos += 1;
            } else {
                self.pos = save;
                return false;
            }
        }
        if is_ident_char(self.peek()) {
            self.pos = save;
            return false;
        }
        true
    }

    /// Whitespace: spaces, tabs, line breaks and `--` line comments.
    /// Always succeeds.
    fn sp(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.pos += 1;
                }
                '-' if self.runes[self.pos + 1] == '-' => {
                    self.pos += 2;
                    while self.peek() != '\n' && !self.at_eof() {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn ident(&mut self) -> bool {
        if !is_ident_start(self.peek()) {
            return false;
        }
        self.pos += 1;
        while is_ident_char(self.peek()) {
            self.pos += 1;
        }
        true
    }

    fn digits(&mut self) -> bool {
        if !self.peek().is_ascii_digit() {
            return false;
        }
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        true
    }

    /// Single-quoted string with `''` as the embedded escape
    fn quoted(&mut self) -> bool {
        if !self.eat('\'') {
            return false;
        }
        loop {
            match self.peek() {
                '\'' => {
                    self.pos += 1;
                    if self.peek() == '\'' {
                        self.pos += 1;
                    } else {
                        return true;
                    }
                }
                EOF_RUNE if self.at_eof() => return false,
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    fn line_col(&self, rune_pos: usize) -> (usize, usize) {
        let mut line = 1;
        let mut column = 1;
        for c in self.runes.iter().take(rune_pos) {
            if *c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }

    fn deepest_error(&self) -> BqlError {
        let (line, column) = self.line_col(self.deepest_pos);
        BqlError::parse_error(
            format!(
                "statement does not match the grammar (deepest rule: {})",
                self.deepest_rule
            ),
            line,
            column,
        )
    }

    // ------------------------------------------------------------------
    // Statements

    fn statement(&mut self) -> bool {
        self.select_union_stmt()
            || self.select_stmt()
            || self.create_stream_as_select_union_stmt()
            || self.create_stream_as_select_stmt()
            || self.create_source_stmt()
            || self.create_sink_stmt()
            || self.create_state_stmt()
            || self.update_state_stmt()
            || self.update_source_stmt()
            || self.update_sink_stmt()
            || self.insert_into_select_stmt()
            || self.insert_into_from_stmt()
            || self.pause_source_stmt()
            || self.resume_source_stmt()
            || self.rewind_source_stmt()
            || self.drop_source_stmt()
            || self.drop_stream_stmt()
            || self.drop_sink_stmt()
            || self.drop_state_stmt()
            || self.load_state_or_create_stmt()
            || self.load_state_stmt()
            || self.save_state_stmt()
            || self.eval_stmt()
    }

    fn select_stmt(&mut self) -> bool {
        self.tok(Rule::SelectStmt, |p| {
            if !p.keyword("SELECT") {
                return false;
            }
            p.sp();
            if !p.emitter() {
                return false;
            }
            p.sp();
            if !p.projections() {
                return false;
            }
            // The optional clauses own their leading whitespace, so that
            // whitespace before the terminator stays in the trailing span
            p.windowed_from();
            p.filter();
            p.grouping();
            p.having();
            true
        })
    }

    fn select_union_stmt(&mut self) -> bool {
        self.tok(Rule::SelectUnionStmt, |p| {
            if !p.select_stmt() {
                return false;
            }
            let mut unions = 0;
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.keyword("UNION") {
                    p.sp();
                    if p.keyword("ALL") {
                        p.sp();
                        if p.select_stmt() {
                            unions += 1;
                            continue;
                        }
                    }
                }
                p.rollback(save);
                break;
            }
            unions > 0
        })
    }

    fn create_stream_as_select_stmt(&mut self) -> bool {
        self.tok(Rule::CreateStreamAsSelectStmt, |p| {
            p.keyword("CREATE")
                && {
                    p.sp();
                    p.keyword("STREAM")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("AS")
                }
                && {
                    p.sp();
                    p.select_stmt()
                }
        })
    }

    fn create_stream_as_select_union_stmt(&mut self) -> bool {
        self.tok(Rule::CreateStreamAsSelectUnionStmt, |p| {
            p.keyword("CREATE")
                && {
                    p.sp();
                    p.keyword("STREAM")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("AS")
                }
                && {
                    p.sp();
                    p.select_union_stmt()
                }
        })
    }

    fn create_source_stmt(&mut self) -> bool {
        self.tok(Rule::CreateSourceStmt, |p| {
            if !p.keyword("CREATE") {
                return false;
            }
            p.sp();
            p.paused_opt();
            p.sp();
            p.keyword("SOURCE")
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("TYPE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.source_sink_specs();
                    true
                }
        })
    }

    fn create_sink_stmt(&mut self) -> bool {
        self.tok(Rule::CreateSinkStmt, |p| {
            p.keyword("CREATE")
                && {
                    p.sp();
                    p.keyword("SINK")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("TYPE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.source_sink_specs();
                    true
                }
        })
    }

    fn create_state_stmt(&mut self) -> bool {
        self.tok(Rule::CreateStateStmt, |p| {
            p.keyword("CREATE")
                && {
                    p.sp();
                    p.keyword("STATE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("TYPE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.source_sink_specs();
                    true
                }
        })
    }

    fn update_state_stmt(&mut self) -> bool {
        self.tok(Rule::UpdateStateStmt, |p| {
            p.keyword("UPDATE")
                && {
                    p.sp();
                    p.keyword("STATE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.update_source_sink_specs()
                }
        })
    }

    fn update_source_stmt(&mut self) -> bool {
        self.tok(Rule::UpdateSourceStmt, |p| {
            p.keyword("UPDATE")
                && {
                    p.sp();
                    p.keyword("SOURCE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.update_source_sink_specs()
                }
        })
    }

    fn update_sink_stmt(&mut self) -> bool {
        self.tok(Rule::UpdateSinkStmt, |p| {
            p.keyword("UPDATE")
                && {
                    p.sp();
                    p.keyword("SINK")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.update_source_sink_specs()
                }
        })
    }

    fn insert_into_select_stmt(&mut self) -> bool {
        self.tok(Rule::InsertIntoSelectStmt, |p| {
            p.keyword("INSERT")
                && {
                    p.sp();
                    p.keyword("INTO")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.select_stmt()
                }
        })
    }

    fn insert_into_from_stmt(&mut self) -> bool {
        self.tok(Rule::InsertIntoFromStmt, |p| {
            p.keyword("INSERT")
                && {
                    p.sp();
                    p.keyword("INTO")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("FROM")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn pause_source_stmt(&mut self) -> bool {
        self.tok(Rule::PauseSourceStmt, |p| {
            p.keyword("PAUSE")
                && {
                    p.sp();
                    p.keyword("SOURCE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn resume_source_stmt(&mut self) -> bool {
        self.tok(Rule::ResumeSourceStmt, |p| {
            p.keyword("RESUME")
                && {
                    p.sp();
                    p.keyword("SOURCE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn rewind_source_stmt(&mut self) -> bool {
        self.tok(Rule::RewindSourceStmt, |p| {
            p.keyword("REWIND")
                && {
                    p.sp();
                    p.keyword("SOURCE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn drop_source_stmt(&mut self) -> bool {
        self.tok(Rule::DropSourceStmt, |p| {
            p.keyword("DROP")
                && {
                    p.sp();
                    p.keyword("SOURCE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn drop_stream_stmt(&mut self) -> bool {
        self.tok(Rule::DropStreamStmt, |p| {
            p.keyword("DROP")
                && {
                    p.sp();
                    p.keyword("STREAM")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn drop_sink_stmt(&mut self) -> bool {
        self.tok(Rule::DropSinkStmt, |p| {
            p.keyword("DROP")
                && {
                    p.sp();
                    p.keyword("SINK")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn drop_state_stmt(&mut self) -> bool {
        self.tok(Rule::DropStateStmt, |p| {
            p.keyword("DROP")
                && {
                    p.sp();
                    p.keyword("STATE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        })
    }

    fn load_state_stmt(&mut self) -> bool {
        self.tok(Rule::LoadStateStmt, |p| {
            p.keyword("LOAD")
                && {
                    p.sp();
                    p.keyword("STATE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.sp();
                    p.keyword("TYPE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.state_tag_opt();
                    p.set_opt_specs();
                    true
                }
        })
    }

    fn load_state_or_create_stmt(&mut self) -> bool {
        self.tok(Rule::LoadStateOrCreateStmt, |p| {
            if !p.load_state_stmt() {
                return false;
            }
            p.sp();
            p.keyword("OR")
                && {
                    p.sp();
                    p.keyword("CREATE")
                }
                && {
                    p.sp();
                    p.keyword("IF")
                }
                && {
                    p.sp();
                    p.keyword("NOT")
                }
                && {
                    p.sp();
                    p.keyword("EXISTS")
                }
                && {
                    p.source_sink_specs();
                    true
                }
        })
    }

    fn save_state_stmt(&mut self) -> bool {
        self.tok(Rule::SaveStateStmt, |p| {
            p.keyword("SAVE")
                && {
                    p.sp();
                    p.keyword("STATE")
                }
                && {
                    p.sp();
                    p.identifier()
                }
                && {
                    p.state_tag_opt();
                    true
                }
        })
    }

    fn eval_stmt(&mut self) -> bool {
        self.tok(Rule::EvalStmt, |p| {
            if !p.keyword("EVAL") {
                return false;
            }
            p.sp();
            if !p.expression() {
                return false;
            }
            p.eval_input_opt();
            true
        })
    }

    fn eval_input_opt(&mut self) -> bool {
        self.tok(Rule::EvalInput, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("ON") {
                p.sp();
                if p.map_expr() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    // ------------------------------------------------------------------
    // Emitter

    fn emitter(&mut self) -> bool {
        self.tok(Rule::Emitter, |p| {
            let kind = p.tok(Rule::Istream, |p| p.keyword("ISTREAM"))
                || p.tok(Rule::Dstream, |p| p.keyword("DSTREAM"))
                || p.tok(Rule::Rstream, |p| p.keyword("RSTREAM"));
            if !kind {
                return false;
            }
            p.emitter_options();
            true
        })
    }

    fn emitter_options(&mut self) -> bool {
        self.tok(Rule::EmitterOptions, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.eat('[') {
                p.sp();
                if p.emitter_option_combinations() {
                    p.sp();
                    if p.eat(']') {
                        return true;
                    }
                }
            }
            p.rollback(save);
            true
        })
    }

    fn emitter_option_combinations(&mut self) -> bool {
        if self.emitter_limit() {
            return true;
        }
        if self.emitter_sampling() {
            let save = self.checkpoint();
            self.sp();
            if !self.emitter_limit() {
                self.rollback(save);
            }
            return true;
        }
        false
    }

    fn emitter_limit(&mut self) -> bool {
        self.tok(Rule::EmitterLimit, |p| {
            p.keyword("LIMIT")
                && {
                    p.sp();
                    p.numeric_literal()
                }
        })
    }

    fn emitter_sampling(&mut self) -> bool {
        self.count_based_sampling()
            || self.time_based_sampling_seconds()
            || self.time_based_sampling_milliseconds()
            || self.randomized_sampling()
    }

    fn count_based_sampling(&mut self) -> bool {
        self.tok(Rule::CountBasedSampling, |p| {
            if !p.keyword("EVERY") {
                return false;
            }
            p.sp();
            if !p.numeric_literal() {
                return false;
            }
            p.sp();
            let _ = p.keyword("ST") || p.keyword("ND") || p.keyword("RD") || p.keyword("TH");
            p.sp();
            p.keyword("TUPLE")
        })
    }

    fn time_based_sampling_seconds(&mut self) -> bool {
        self.tok(Rule::TimeBasedSamplingSeconds, |p| {
            p.keyword("EVERY")
                && {
                    p.sp();
                    p.float_literal() || p.numeric_literal()
                }
                && {
                    p.sp();
                    p.keyword("SECONDS")
                }
        })
    }

    fn time_based_sampling_milliseconds(&mut self) -> bool {
        self.tok(Rule::TimeBasedSamplingMilliseconds, |p| {
            p.keyword("EVERY")
                && {
                    p.sp();
                    p.float_literal() || p.numeric_literal()
                }
                && {
                    p.sp();
                    p.keyword("MILLISECONDS")
                }
        })
    }

    fn randomized_sampling(&mut self) -> bool {
        self.tok(Rule::RandomizedSampling, |p| {
            p.keyword("SAMPLE")
                && {
                    p.sp();
                    p.float_literal() || p.numeric_literal()
                }
                && {
                    p.sp();
                    p.eat('%')
                }
        })
    }

    // ------------------------------------------------------------------
    // SELECT clauses

    fn projections(&mut self) -> bool {
        self.tok(Rule::Projections, |p| {
            if !p.projection() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.eat(',') {
                    p.sp();
                    if p.projection() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn projection(&mut self) -> bool {
        self.alias_expression() || self.expression_or_wildcard()
    }

    fn alias_expression(&mut self) -> bool {
        self.tok(Rule::AliasExpression, |p| {
            p.expression_or_wildcard()
                && {
                    p.sp();
                    p.keyword("AS")
                }
                && {
                    p.sp();
                    p.target_identifier()
                }
        })
    }

    fn windowed_from(&mut self) -> bool {
        self.tok(Rule::WindowedFrom, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("FROM") {
                p.sp();
                if p.relations() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn relations(&mut self) -> bool {
        if !self.aliased_stream_window() {
            return false;
        }
        loop {
            let save = self.checkpoint();
            self.sp();
            if self.eat(',') {
                self.sp();
                if self.aliased_stream_window() {
                    continue;
                }
            }
            self.rollback(save);
            break;
        }
        true
    }

    fn aliased_stream_window(&mut self) -> bool {
        let with_alias = self.tok(Rule::AliasedStreamWindow, |p| {
            p.stream_window()
                && {
                    p.sp();
                    p.keyword("AS")
                }
                && {
                    p.sp();
                    p.identifier()
                }
        });
        with_alias || self.stream_window()
    }

    fn stream_window(&mut self) -> bool {
        self.tok(Rule::StreamWindow, |p| {
            p.stream_like()
                && {
                    p.sp();
                    p.eat('[')
                }
                && {
                    p.sp();
                    p.keyword("RANGE")
                }
                && {
                    p.sp();
                    p.interval()
                }
                && {
                    p.sp();
                    p.eat(']')
                }
        })
    }

    fn stream_like(&mut self) -> bool {
        self.udsf_func_app() || self.stream()
    }

    fn udsf_func_app(&mut self) -> bool {
        self.func_app_without_orderby()
    }

    fn stream(&mut self) -> bool {
        self.tok(Rule::Stream, |p| p.ident())
    }

    fn interval(&mut self) -> bool {
        self.tuples_interval()
            || self.time_interval_seconds()
            || self.time_interval_milliseconds()
    }

    fn tuples_interval(&mut self) -> bool {
        self.tok(Rule::TuplesInterval, |p| {
            p.numeric_literal()
                && {
                    p.sp();
                    p.keyword("TUPLES")
                }
        })
    }

    fn time_interval_seconds(&mut self) -> bool {
        self.tok(Rule::TimeIntervalSeconds, |p| {
            (p.float_literal() || p.numeric_literal())
                && {
                    p.sp();
                    p.keyword("SECONDS")
                }
        })
    }

    fn time_interval_milliseconds(&mut self) -> bool {
        self.tok(Rule::TimeIntervalMilliseconds, |p| {
            (p.float_literal() || p.numeric_literal())
                && {
                    p.sp();
                    p.keyword("MILLISECONDS")
                }
        })
    }

    fn filter(&mut self) -> bool {
        self.tok(Rule::Filter, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("WHERE") {
                p.sp();
                if p.expression() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn grouping(&mut self) -> bool {
        self.tok(Rule::Grouping, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("GROUP") {
                p.sp();
                if p.keyword("BY") {
                    p.sp();
                    if p.group_list() {
                        return true;
                    }
                }
            }
            p.rollback(save);
            true
        })
    }

    fn group_list(&mut self) -> bool {
        if !self.expression() {
            return false;
        }
        loop {
            let save = self.checkpoint();
            self.sp();
            if self.eat(',') {
                self.sp();
                if self.expression() {
                    continue;
                }
            }
            self.rollback(save);
            break;
        }
        true
    }

    fn having(&mut self) -> bool {
        self.tok(Rule::Having, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("HAVING") {
                p.sp();
                if p.expression() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    // ------------------------------------------------------------------
    // WITH / SET parameter blocks

    fn source_sink_specs(&mut self) -> bool {
        self.tok(Rule::SourceSinkSpecs, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("WITH") {
                p.sp();
                if p.source_sink_param_list() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn update_source_sink_specs(&mut self) -> bool {
        self.tok(Rule::UpdateSourceSinkSpecs, |p| {
            p.keyword("SET")
                && {
                    p.sp();
                    p.source_sink_param_list()
                }
        })
    }

    fn set_opt_specs(&mut self) -> bool {
        self.tok(Rule::SetOptSpecs, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("SET") {
                p.sp();
                if p.source_sink_param_list() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn source_sink_param_list(&mut self) -> bool {
        if !self.source_sink_param() {
            return false;
        }
        loop {
            let save = self.checkpoint();
            self.sp();
            if self.eat(',') {
                self.sp();
                if self.source_sink_param() {
                    continue;
                }
            }
            self.rollback(save);
            break;
        }
        true
    }

    fn source_sink_param(&mut self) -> bool {
        self.tok(Rule::SourceSinkParam, |p| {
            p.identifier()
                && {
                    p.sp();
                    p.eat('=')
                }
                && {
                    p.sp();
                    p.param_literal()
                }
        })
    }

    /// Parameter values are literals only: scalars, booleans and nested
    /// array/map literals over them
    fn param_literal(&mut self) -> bool {
        self.boolean_literal()
            || self.literal()
            || self.param_array_expr()
            || self.param_map_expr()
    }

    fn param_array_expr(&mut self) -> bool {
        self.tok(Rule::ArrayExpr, |p| {
            if !p.eat('[') {
                return false;
            }
            p.sp();
            if p.param_literal() {
                loop {
                    let save = p.checkpoint();
                    p.sp();
                    if p.eat(',') {
                        p.sp();
                        if p.param_literal() {
                            continue;
                        }
                    }
                    p.rollback(save);
                    break;
                }
                // Trailing comma is allowed in parameter arrays
                let save = p.checkpoint();
                p.sp();
                if !p.eat(',') {
                    p.rollback(save);
                }
            }
            p.sp();
            p.eat(']')
        })
    }

    fn param_map_expr(&mut self) -> bool {
        self.tok(Rule::MapExpr, |p| {
            if !p.eat('{') {
                return false;
            }
            p.sp();
            if p.param_key_value_pair() {
                loop {
                    let save = p.checkpoint();
                    p.sp();
                    if p.eat(',') {
                        p.sp();
                        if p.param_key_value_pair() {
                            continue;
                        }
                    }
                    p.rollback(save);
                    break;
                }
            }
            p.sp();
            p.eat('}')
        })
    }

    fn param_key_value_pair(&mut self) -> bool {
        self.tok(Rule::KeyValuePair, |p| {
            p.string_literal()
                && {
                    p.sp();
                    p.eat(':')
                }
                && {
                    p.sp();
                    p.param_literal()
                }
        })
    }

    fn state_tag_opt(&mut self) -> bool {
        self.tok(Rule::StateTagOpt, |p| {
            let save = p.checkpoint();
            p.sp();
            if p.keyword("TAG") {
                p.sp();
                if p.identifier() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn paused_opt(&mut self) -> bool {
        self.tok(Rule::PausedOpt, |p| {
            let _ = p.tok(Rule::Paused, |p| p.keyword("PAUSED"))
                || p.tok(Rule::Unpaused, |p| p.keyword("UNPAUSED"));
            true
        })
    }

    // ------------------------------------------------------------------
    // Expressions, lowest precedence first

    pub(crate) fn expression(&mut self) -> bool {
        self.or_expr()
    }

    fn or_expr(&mut self) -> bool {
        self.tok(Rule::OrExpr, |p| {
            if !p.and_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.tok(Rule::Or, |p| p.keyword("OR")) {
                    p.sp();
                    if p.and_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn and_expr(&mut self) -> bool {
        self.tok(Rule::AndExpr, |p| {
            if !p.not_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.tok(Rule::And, |p| p.keyword("AND")) {
                    p.sp();
                    if p.not_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn not_expr(&mut self) -> bool {
        self.tok(Rule::NotExpr, |p| {
            let save = p.checkpoint();
            if p.tok(Rule::NotOp, |p| p.keyword("NOT")) {
                p.sp();
            } else {
                p.rollback(save);
            }
            p.comparison_expr()
        })
    }

    fn comparison_expr(&mut self) -> bool {
        self.tok(Rule::ComparisonExpr, |p| {
            if !p.other_op_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.comparison_op() {
                    p.sp();
                    if p.other_op_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    /// Match a two-character operator atomically
    fn pair(&mut self, a: char, b: char) -> bool {
        let save = self.pos;
        if self.eat(a) && self.eat(b) {
            true
        } else {
            self.pos = save;
            false
        }
    }

    fn comparison_op(&mut self) -> bool {
        self.tok(Rule::ComparisonOp, |p| {
            p.pair('<', '=')
                || p.pair('>', '=')
                || p.pair('<', '>')
                || p.pair('!', '=')
                || p.eat('=')
                || p.eat('<')
                || p.eat('>')
        })
    }

    fn other_op_expr(&mut self) -> bool {
        self.tok(Rule::OtherOpExpr, |p| {
            if !p.is_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.other_op() {
                    p.sp();
                    if p.is_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn other_op(&mut self) -> bool {
        self.tok(Rule::OtherOp, |p| p.pair('|', '|'))
    }

    fn is_expr(&mut self) -> bool {
        self.tok(Rule::IsExpr, |p| {
            if !p.term_expr() {
                return false;
            }
            let save = p.checkpoint();
            p.sp();
            if p.is_op() {
                p.sp();
                if p.null_literal() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn is_op(&mut self) -> bool {
        self.tok(Rule::IsOp, |p| {
            if !p.keyword("IS") {
                return false;
            }
            let save = p.checkpoint();
            p.sp();
            if !p.keyword("NOT") {
                p.rollback(save);
            }
            true
        })
    }

    fn term_expr(&mut self) -> bool {
        self.tok(Rule::TermExpr, |p| {
            if !p.product_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.plus_minus_op() {
                    p.sp();
                    if p.product_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn plus_minus_op(&mut self) -> bool {
        self.tok(Rule::PlusMinusOp, |p| p.eat('+') || p.eat('-'))
    }

    fn product_expr(&mut self) -> bool {
        self.tok(Rule::ProductExpr, |p| {
            if !p.minus_expr() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.mult_div_op() {
                    p.sp();
                    if p.minus_expr() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn mult_div_op(&mut self) -> bool {
        self.tok(Rule::MultDivOp, |p| p.eat('*') || p.eat('/') || p.eat('%'))
    }

    fn minus_expr(&mut self) -> bool {
        self.tok(Rule::MinusExpr, |p| {
            let save = p.checkpoint();
            if p.tok(Rule::UnaryMinus, |p| p.eat('-')) {
                p.sp();
            } else {
                p.rollback(save);
            }
            p.cast_expr()
        })
    }

    fn cast_expr(&mut self) -> bool {
        self.tok(Rule::CastExpr, |p| {
            if !p.base_expr() {
                return false;
            }
            let save = p.checkpoint();
            p.sp();
            if p.eat(':') && p.eat(':') {
                p.sp();
                if p.type_name() {
                    return true;
                }
            }
            p.rollback(save);
            true
        })
    }

    fn type_name(&mut self) -> bool {
        self.tok(Rule::Type, |p| {
            p.keyword("BOOL")
                || p.keyword("INT")
                || p.keyword("FLOAT")
                || p.keyword("STRING")
                || p.keyword("BLOB")
                || p.keyword("TIMESTAMP")
                || p.keyword("ARRAY")
                || p.keyword("MAP")
        })
    }

    fn base_expr(&mut self) -> bool {
        self.paren_expr()
            || self.map_expr()
            || self.boolean_literal()
            || self.null_literal()
            || self.func_type_cast()
            || self.row_timestamp()
            || self.func_app()
            || self.row_value()
            || self.array_expr()
            || self.literal()
    }

    fn paren_expr(&mut self) -> bool {
        self.rule("ParenExpr", |p| {
            p.eat('(')
                && {
                    p.sp();
                    p.expression()
                }
                && {
                    p.sp();
                    p.eat(')')
                }
        })
    }

    fn func_type_cast(&mut self) -> bool {
        self.tok(Rule::FuncTypeCast, |p| {
            p.keyword("CAST")
                && {
                    p.sp();
                    p.eat('(')
                }
                && {
                    p.sp();
                    p.expression()
                }
                && {
                    p.sp();
                    p.keyword("AS")
                }
                && {
                    p.sp();
                    p.type_name()
                }
                && {
                    p.sp();
                    p.eat(')')
                }
        })
    }

    fn func_app(&mut self) -> bool {
        self.func_app_with_orderby() || self.func_app_without_orderby()
    }

    fn func_app_with_orderby(&mut self) -> bool {
        self.tok(Rule::FuncAppWithOrderBy, |p| {
            p.function()
                && {
                    p.sp();
                    p.eat('(')
                }
                && {
                    p.sp();
                    p.func_params()
                }
                && {
                    p.sp();
                    p.params_order()
                }
                && {
                    p.sp();
                    p.eat(')')
                }
        })
    }

    fn func_app_without_orderby(&mut self) -> bool {
        self.tok(Rule::FuncAppWithoutOrderBy, |p| {
            p.function()
                && {
                    p.sp();
                    p.eat('(')
                }
                && {
                    p.sp();
                    p.func_params()
                }
                && {
                    p.sp();
                    p.eat(')')
                }
        })
    }

    fn function(&mut self) -> bool {
        self.tok(Rule::Function, |p| p.ident())
    }

    fn func_params(&mut self) -> bool {
        self.tok(Rule::FuncParams, |p| {
            if p.expression_or_wildcard() {
                loop {
                    let save = p.checkpoint();
                    p.sp();
                    if p.eat(',') {
                        p.sp();
                        if p.expression_or_wildcard() {
                            continue;
                        }
                    }
                    p.rollback(save);
                    break;
                }
            }
            true
        })
    }

    fn params_order(&mut self) -> bool {
        self.tok(Rule::ParamsOrder, |p| {
            if !(p.keyword("ORDER") && {
                p.sp();
                p.keyword("BY")
            }) {
                return false;
            }
            p.sp();
            if !p.sorted_expression() {
                return false;
            }
            loop {
                let save = p.checkpoint();
                p.sp();
                if p.eat(',') {
                    p.sp();
                    if p.sorted_expression() {
                        continue;
                    }
                }
                p.rollback(save);
                break;
            }
            true
        })
    }

    fn sorted_expression(&mut self) -> bool {
        self.tok(Rule::SortedExpression, |p| {
            if !p.expression() {
                return false;
            }
            let save = p.checkpoint();
            p.sp();
            if !(p.tok(Rule::Ascending, |p| p.keyword("ASC"))
                || p.tok(Rule::Descending, |p| p.keyword("DESC")))
            {
                p.rollback(save);
            }
            true
        })
    }

    fn expression_or_wildcard(&mut self) -> bool {
        self.wildcard() || self.expression()
    }

    fn wildcard(&mut self) -> bool {
        self.tok(Rule::Wildcard, |p| {
            let save = p.checkpoint();
            if p.ident() {
                if !p.eat(':') || p.peek() == ':' {
                    p.rollback(save);
                }
            }
            p.eat('*')
        })
    }

    fn array_expr(&mut self) -> bool {
        self.tok(Rule::ArrayExpr, |p| {
            if !p.eat('[') {
                return false;
            }
            p.sp();
            if p.expression_or_wildcard() {
                loop {
                    let save = p.checkpoint();
                    p.sp();
                    if p.eat(',') {
                        p.sp();
                        if p.expression_or_wildcard() {
                            continue;
                        }
                    }
                    p.rollback(save);
                    break;
                }
                // Trailing comma is allowed in array literals
                let save = p.checkpoint();
                p.sp();
                if !p.eat(',') {
                    p.rollback(save);
                }
            }
            p.sp();
            p.eat(']')
        })
    }

    fn map_expr(&mut self) -> bool {
        self.tok(Rule::MapExpr, |p| {
            if !p.eat('{') {
                return false;
            }
            p.sp();
            if p.key_value_pair() {
                loop {
                    let save = p.checkpoint();
                    p.sp();
                    if p.eat(',') {
                        p.sp();
                        if p.key_value_pair() {
                            continue;
                        }
                    }
                    p.rollback(save);
                    break;
                }
            }
            p.sp();
            p.eat('}')
        })
    }

    fn key_value_pair(&mut self) -> bool {
        self.tok(Rule::KeyValuePair, |p| {
            p.string_literal()
                && {
                    p.sp();
                    p.eat(':')
                }
                && {
                    p.sp();
                    p.expression_or_wildcard()
                }
        })
    }

    // ------------------------------------------------------------------
    // Row references and literals

    fn row_timestamp(&mut self) -> bool {
        self.tok(Rule::RowTimestamp, |p| {
            let save = p.checkpoint();
            if p.ident() && !p.eat(':') {
                p.rollback(save);
            }
            (p.eat('t') || p.eat('T'))
                && (p.eat('s') || p.eat('S'))
                && p.eat('(')
                && p.eat(')')
        })
    }

    fn row_value(&mut self) -> bool {
        self.tok(Rule::RowValue, |p| {
            let save = p.checkpoint();
            if p.ident() {
                if !p.eat(':') || p.peek() == ':' {
                    p.rollback(save);
                }
            }
            p.json_get_path()
        })
    }

    fn target_identifier(&mut self) -> bool {
        self.tok(Rule::TargetIdentifier, |p| p.json_get_path())
    }

    /// Path shape validation; the raw text is compiled by the path engine
    /// when a consumer evaluates it
    fn json_get_path(&mut self) -> bool {
        // Head: bare identifier or ['quoted']
        let head = if self.peek() == '[' {
            let save = self.pos;
            self.pos += 1;
            if self.quoted() && self.eat(']') {
                true
            } else {
                self.pos = save;
                false
            }
        } else {
            self.path_ident()
        };
        if !head {
            return false;
        }
        loop {
            let save = self.pos;
            if self.eat('.') {
                if self.eat('.') {
                    if !self.path_ident() {
                        self.pos = save;
                        break;
                    }
                } else if !self.path_ident() {
                    self.pos = save;
                    break;
                }
            } else if self.eat('[') {
                if !self.bracket_path_segment() {
                    self.pos = save;
                    break;
                }
            } else {
                break;
            }
        }
        true
    }

    /// Bare path segment: an identifier whose runes may be backslash
    /// escapes, so a literal `.` or `[` can appear in a segment
    fn path_ident(&mut self) -> bool {
        if !self.path_ident_rune(true) {
            return false;
        }
        while self.path_ident_rune(false) {}
        true
    }

    /// One rune of a bare path segment; the unescaped form of the first
    /// rune must be a letter
    fn path_ident_rune(&mut self, first: bool) -> bool {
        if self.peek() == '\\' {
            // An escape needs a real rune after it
            if self.pos + 1 < self.runes.len() - 1 {
                self.pos += 2;
                return true;
            }
            return false;
        }
        let c = self.peek();
        let ok = if first {
            is_ident_start(c)
        } else {
            is_ident_char(c)
        };
        if ok {
            self.pos += 1;
        }
        ok
    }

    fn bracket_path_segment(&mut self) -> bool {
        // Opening bracket already consumed
        if self.peek() == '\'' {
            return self.quoted() && self.eat(']');
        }
        if self.eat('*') {
            return self.eat(']');
        }
        let had_first = self.path_int();
        if self.eat(':') {
            let _ = self.path_int();
            if self.eat(':') {
                let _ = self.path_int();
            }
            return self.eat(']');
        }
        had_first && self.eat(']')
    }

    fn path_int(&mut self) -> bool {
        let save = self.pos;
        let _ = self.eat('-');
        if self.digits() {
            true
        } else {
            self.pos = save;
            false
        }
    }

    fn identifier(&mut self) -> bool {
        self.tok(Rule::Identifier, |p| p.ident())
    }

    fn literal(&mut self) -> bool {
        self.float_literal() || self.numeric_literal() || self.string_literal()
    }

    fn float_literal(&mut self) -> bool {
        self.tok(Rule::FloatLiteral, |p| {
            let _ = p.eat('-');
            p.digits() && p.eat('.') && p.digits()
        })
    }

    fn numeric_literal(&mut self) -> bool {
        self.tok(Rule::NumericLiteral, |p| {
            let _ = p.eat('-');
            p.digits()
        })
    }

    fn string_literal(&mut self) -> bool {
        self.tok(Rule::StringLiteral, |p| p.quoted())
    }

    fn boolean_literal(&mut self) -> bool {
        self.tok(Rule::TrueLiteral, |p| p.keyword("TRUE"))
            || self.tok(Rule::FalseLiteral, |p| p.keyword("FALSE"))
    }

    fn null_literal(&mut self) -> bool {
        self.tok(Rule::NullLiteral, |p| p.keyword("NULL"))
    }
}
