use thiserror::Error;

/// Stable error taxonomy shared by every layer of the backend.
///
/// Validation and conflict errors carry an optional `location` naming the
/// offending field, so clients get a machine-readable error shape.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input, detected before touching the store.
    #[error("{message}")]
    Validation {
        message: String,
        location: Option<String>,
    },

    /// Uniqueness violation surfaced by the store.
    #[error("{message}")]
    Conflict {
        message: String,
        location: Option<String>,
    },

    /// The id does not resolve to a record visible to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The record exists but belongs to another owner.
    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    /// Credential verification failure.
    #[error("{0}")]
    Authentication(String),

    #[error("token expired")]
    TokenExpired,

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(message: impl Into<String>, location: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            location: location.map(String::from),
        }
    }

    pub fn conflict(message: impl Into<String>, location: Option<&str>) -> Self {
        Self::Conflict {
            message: message.into(),
            location: location.map(String::from),
        }
    }
}
