use crate::config::ConfigError;
use crate::symbolic::SymbolicError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}

/// Render a parse error with a caret under the offending character of a
/// single-line expression.
pub fn format_parse_error(error: &SymbolicError, source: &str) -> String {
    match error {
        SymbolicError::Parse { message, position } => {
            let column = source.chars().take(*position).count();
            format!(
                "Error at column {}: {}\n  | {}\n  | {}^",
                column + 1,
                message,
                source,
                " ".repeat(column)
            )
        }
        other => other.to_string(),
    }
}
