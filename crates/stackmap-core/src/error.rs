//! Core errors
//!
//! Most variants never abort anything: normalization and assembly collect them
//! as warnings next to a smaller, well-formed result. Only storage and parse
//! failures are returned as `Err`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A raw resource lacks a field the normalizer needs
    #[error("Malformed {kind} resource: {reason}")]
    MalformedResource { kind: String, reason: String },

    /// Two components share an identifier; the later one was dropped
    #[error("Duplicate component identifier: {identifier}")]
    DuplicateComponent { identifier: String },

    /// A connection endpoint does not exist among the components
    #[error("Connection {source_id} -> {target_id} references missing component {missing}")]
    DanglingConnection {
        source_id: String,
        target_id: String,
        missing: String,
    },

    /// A self-loop or a repeated (source, target, type) triple
    #[error("Connection {source_id} -> {target_id} dropped: {reason}")]
    InvalidConnection {
        source_id: String,
        target_id: String,
        reason: String,
    },

    /// Design names are used as file stems
    #[error("Invalid design name '{name}': use letters, digits, '-' or '_'")]
    InvalidName { name: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("JSON error: {message}")]
    Json { message: String },
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Json {
            message: e.to_string(),
        }
    }
}
