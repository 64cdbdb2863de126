use thiserror::Error;

/// Category of a [`ParseError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParseErrorKind {
    /// Malformed token sequence: unexpected token, unbalanced parentheses,
    /// trailing comma or trailing input after a complete expression.
    Syntax,
    /// A numeric token could not be converted to a float.
    NumberFormat,
    /// Anything else that stopped the parser.
    Unknown,
}

/// Failure to turn source text into an expression tree.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind:?} error at position {position}: {message}")]
pub struct ParseError {
    /// Byte offset into the source text.
    pub position: usize,
    pub message: String,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
            kind: ParseErrorKind::Syntax,
        }
    }

    pub fn number_format(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
            kind: ParseErrorKind::NumberFormat,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            position: 0,
            message: message.into(),
            kind: ParseErrorKind::Unknown,
        }
    }
}

/// Failure while walking a parsed tree.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("Variable '{name}' not found")]
    VariableNotFound { name: String },
    #[error("Function '{name}' is not defined.")]
    FunctionNotDefined { name: String },
    #[error("Function '{function}' expects an argument at index {index}, but only {count} were given")]
    MissingArgument {
        function: String,
        index: usize,
        count: usize,
    },
}

/// Error surfaced by the expression value wrappers.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ExpressionError {
    #[error("Invalid expression for '{label}': {source}")]
    InvalidExpression { label: String, source: ParseError },
    #[error(transparent)]
    Evaluation(#[from] EvalError),
}
