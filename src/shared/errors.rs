use thiserror::Error;

/// Caller-facing errors of ledger operations.
///
/// None of these leave the ledger in an invalid state: a rejected
/// operation is a no-op.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Station {station_id} does not exist in venue {venue_id} (valid ids: 1..={station_count})")]
    InvalidStationId {
        venue_id: String,
        station_id: u32,
        station_count: u32,
    },

    #[error("Station {0} already has a running session")]
    StationAlreadyRunning(u32),

    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Errors raised by ledger persistence backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Invalid persisted state: {0}")]
    InvalidState(String),
}

impl StorageError {
    /// Whether this error is likely transient (disk busy, DB connection lost)
    /// and the write may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Database(_))
    }
}

/// Result type for ledger operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for persistence backends
pub type StorageResult<T> = Result<T, StorageError>;
