use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl StoreError {
    /// True for a contended write (`SQLITE_BUSY`/`SQLITE_LOCKED`) or pool
    /// exhaustion — worth a caller retrying after a short backoff. Anything
    /// else (constraint violations, corrupt rows, migration failures) is
    /// permanent and should surface immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("5") | Some("6"))
            }
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
