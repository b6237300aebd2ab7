use std::fmt;

/// Errors that can occur while parsing, assembling, resolving or evaluating BQL
#[derive(Debug, Clone, PartialEq)]
pub enum BqlError {
    /// The recognizer could not match the input text
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// An assembler invariant was violated while executing a semantic action.
    /// This is a bug in the grammar/assembler pairing, not a user error.
    AssemblyError {
        action: String,
        stack_depth: usize,
        message: String,
    },

    /// The path mini-language rejected a path string
    PathError {
        message: String,
        offset: usize,
    },

    /// Type conversion or operand type errors
    TypeError {
        expected: String,
        actual: String,
        value: Option<String>,
    },

    /// Resolver rejection: unknown stream, ambiguous alias, ungrouped
    /// projection, bad cast target, out-of-range clause argument
    ResolveError {
        clause: String,
        message: String,
    },

    /// Runtime value errors: missing keys, division by zero,
    /// out-of-range timestamps, NaN used as a group key
    ValueError {
        message: String,
    },
}

impl fmt::Display for BqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BqlError::ParseError {
                message,
                line,
                column,
            } => {
                write!(f, "parse error at line {}, column {}: {}", line, column, message)
            }
            BqlError::AssemblyError {
                action,
                stack_depth,
                message,
            } => {
                write!(
                    f,
                    "assembly error in action {} (stack depth {}): {}",
                    action, stack_depth, message
                )
            }
            BqlError::PathError { message, offset } => {
                write!(f, "path error at offset {}: {}", offset, message)
            }
            BqlError::TypeError {
                expected,
                actual,
                value,
            } => {
                if let Some(val) = value {
                    write!(
                        f,
                        "type error: expected {}, got {} for value '{}'",
                        expected, actual, val
                    )
                } else {
                    write!(f, "type error: expected {}, got {}", expected, actual)
                }
            }
            BqlError::ResolveError { clause, message } => {
                write!(f, "error in {} clause: {}", clause, message)
            }
            BqlError::ValueError { message } => {
                write!(f, "value error: {}", message)
            }
        }
    }
}

impl std::error::Error for BqlError {}

impl BqlError {
    /// Create a parse error with line/column information
    pub fn parse_error(message: impl Into<String>, line: usize, column: usize) -> Self {
        BqlError::ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    /// Create an assembly error naming the offending action
    pub fn assembly_error(
        action: impl Into<String>,
        stack_depth: usize,
        message: impl Into<String>,
    ) -> Self {
        BqlError::AssemblyError {
            action: action.into(),
            stack_depth,
            message: message.into(),
        }
    }

    /// Create a path-compilation error at an offset into the path string
    pub fn path_error(message: impl Into<String>, offset: usize) -> Self {
        BqlError::PathError {
            message: message.into(),
            offset,
        }
    }

    /// Create a type error
    pub fn type_error(
        expected: impl Into<String>,
        actual: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        BqlError::TypeError {
            expected: expected.into(),
            actual: actual.into(),
            value,
        }
    }

    /// Create a resolver error attached to a named clause
    pub fn resolve_error(clause: impl Into<String>, message: impl Into<String>) -> Self {
        BqlError::ResolveError {
            clause: clause.into(),
            message: message.into(),
        }
    }

    /// Create a runtime value error
    pub fn value_error(message: impl Into<String>) -> Self {
        BqlError::ValueError {
            message: message.into(),
        }
    }
}

/// Result type for BQL operations
pub type BqlResult<T> = Result<T, BqlError>;
