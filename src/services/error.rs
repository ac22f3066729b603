//! Errors from external model services.

use thiserror::Error;

/// Errors from NER, entity-linking and column-type services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature table error: {0}")]
    Csv(#[from] csv::Error),
}
