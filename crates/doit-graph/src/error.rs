//! Error taxonomy for store operations.

use rusqlite::ErrorCode;

/// Coarse classification transport layers use to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Validation,
    Internal,
    Transient,
}

/// Errors raised by the graph store and its views.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A referenced issue, project, tenant, key or lesson does not exist
    /// (or is not visible in the caller's tenant).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Malformed input or filter.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A tenant-bound operation was called with an unbound scope.
    #[error("no tenant bound to scope for `{operation}`")]
    Scope { operation: &'static str },

    /// Identifier allocation gave up.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Timeout or lock contention; safe to retry.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Validation(_) => ErrorClass::Validation,
            Self::Transient(_) => ErrorClass::Transient,
            Self::Scope { .. }
            | Self::ResourceExhausted(_)
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialize(_) => ErrorClass::Internal,
        }
    }

    /// Whether the caller may retry the same call unchanged.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Transient(err.to_string())
            }
            _ => Self::Storage(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
