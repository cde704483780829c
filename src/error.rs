use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesInsightError {
    #[error("Could not decode '{source_name}' with any supported encoding (tried: {}). Check that the file is a text export.", tried.join(", "))]
    UnreadableInput {
        source_name: String,
        tried: Vec<String>,
    },

    #[error("Required columns not found in header: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SalesInsightError>;

/// Why a single field could not be coerced. Row-level and never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("{0} is empty")]
    Missing(&'static str),

    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("'{0}' is negative")]
    Negative(String),

    #[error("'{0}' is not a whole number")]
    Fractional(String),

    #[error("'{0}' is not a recognised date")]
    InvalidDate(String),
}
