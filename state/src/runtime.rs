use crate::error::StoreResult;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::sqlite::SqliteSynchronous;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub(crate) mod outcomes;
pub(crate) mod requests;
mod reviews;
pub(crate) mod review_tx;
mod sessions;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub const STATE_DB_FILENAME: &str = "state.db";

/// Handle to the approval broker's persisted state for a single project.
///
/// Cloning is cheap: the underlying connection pool is reference counted.
#[derive(Clone)]
pub struct StateRuntime {
    pool: Arc<SqlitePool>,
}

impl StateRuntime {
    /// Open (creating and migrating if necessary) the database at
    /// `<project_dir>/.slb/state.db`.
    pub async fn init(project_dir: &Path) -> StoreResult<Self> {
        let state_dir = project_dir.join(".slb");
        tokio::fs::create_dir_all(&state_dir)
            .await
            .map_err(sqlx::Error::Io)?;
        let path = state_db_path(&state_dir);
        let pool = open_sqlite(&path).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Open an explicit database file path directly, bypassing the
    /// `.slb/` project-directory convention. Used by tests and by
    /// `target_project` overrides.
    pub async fn init_at_path(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sqlx::Error::Io)?;
        }
        let pool = open_sqlite(path).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        self.pool.as_ref()
    }
}

async fn open_sqlite(path: &Path) -> StoreResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .inspect_err(|err| warn!("failed to open state db at {}: {err}", path.display()))?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

pub fn state_db_path(state_dir: &Path) -> PathBuf {
    state_dir.join(STATE_DB_FILENAME)
}
