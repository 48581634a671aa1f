//! Condition error types

/// Errors raised while compiling or evaluating a condition
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token: expected {expected}, found '{found}'")]
    UnexpectedToken { expected: String, found: String },

    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEof(String),

    #[error("Evaluation error: {0}")]
    EvalError(String),
}

/// Result type alias for condition operations
pub type ConditionResult<T> = Result<T, ConditionError>;
