use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("{} association pass(es) failed: {}", .failures.len(), .failures.join("; "))]
    AssociationPasses { failures: Vec<String> },
}

impl LoaderError {
    pub fn storage(message: impl Into<String>) -> Self {
        LoaderError::Storage {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for LoaderError {
    fn from(err: rusqlite::Error) -> Self {
        LoaderError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "db")]
impl From<libsql::Error> for LoaderError {
    fn from(err: libsql::Error) -> Self {
        LoaderError::Storage {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;
