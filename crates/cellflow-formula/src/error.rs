//! Formula compilation error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while building, compiling or calling a pipeline
///
/// Every variant is terminal for the builder that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// An operator or function found fewer stacked values than it consumes
    #[error("`{token}` needs {expected} argument(s) but only {available} available")]
    Arity {
        token: String,
        expected: usize,
        available: usize,
    },

    /// `finish` was called before any token was appended
    #[error("Empty token stream")]
    EmptyStream,

    /// The builder was driven out of order (e.g. finished twice)
    #[error("Builder misuse: {0}")]
    Misuse(&'static str),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Malformed reference or defined name
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A required pipeline input was not supplied
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// A pipeline input was supplied that the pipeline does not take
    #[error("Unknown input: {0}")]
    UnknownInput(String),

    /// Positional call with the wrong number of values
    #[error("Pipeline takes {expected} input(s), got {actual}")]
    InputCount { expected: usize, actual: usize },

    /// Dispatch finished without reaching the node
    #[error("Node {0} was not resolved")]
    Unresolved(String),

    /// No node with this id exists in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

impl From<cellflow_core::Error> for FormulaError {
    fn from(err: cellflow_core::Error) -> Self {
        FormulaError::InvalidReference(err.to_string())
    }
}
