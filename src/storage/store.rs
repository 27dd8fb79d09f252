use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context as _, Result};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, warn};

use super::{Context, MIGRATION_001_INITIAL, Queries, StoreError};

/// A bundle of repository calls that must become visible all together or not at all.
///
/// `Store::exec_tx` hands the unit a [`Queries`] view bound to a freshly
/// opened transaction. Returning `Err` rolls everything back.
pub trait UnitOfWork: Send {
    type Output: Send;
    type Error: From<StoreError> + std::error::Error + Send + Sync + 'static;

    fn execute(
        self,
        queries: &mut Queries<'_>,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

/// Connection options for [`Store::connect_with`].
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub database_url: String,
    pub create_if_missing: bool,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl StoreOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            create_if_missing: false,
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Owns the connection pool and runs units of work atomically.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a store over an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn connect_with(options: &StoreOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(&options.database_url)
            .with_context(|| format!("Invalid database URL '{}'", options.database_url))?
            .create_if_missing(options.create_if_missing)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(options: &StoreOptions) -> Result<Self> {
        let store = Self::connect_with(options).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// A pooled connection for reads that need no transaction.
    /// Wrap it with [`Queries::new`].
    pub async fn connection(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        self.pool.acquire().await.map_err(StoreError::Acquire)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run `work` inside one store transaction.
    ///
    /// Exactly one of commit or rollback is issued once the transaction is
    /// open. A failed unit is rolled back and its error returned; if the
    /// rollback fails as well, both errors come back as
    /// [`StoreError::Rollback`]. Cancellation or an expired deadline on `ctx`
    /// aborts a blocked begin or unit of work, and is re-checked right before
    /// commit so nothing commits after it has been observed.
    pub async fn exec_tx<U>(&self, ctx: &Context, work: U) -> Result<U::Output, U::Error>
    where
        U: UnitOfWork,
    {
        let mut tx = tokio::select! {
            biased;
            err = ctx.done() => return Err(StoreError::from(err).into()),
            tx = self.pool.begin() => tx.map_err(StoreError::Begin)?,
        };
        debug!("transaction started");

        let outcome: Result<U::Output, U::Error> = {
            let mut queries = Queries::new(&mut *tx);
            tokio::select! {
                biased;
                err = ctx.done() => Err(StoreError::from(err).into()),
                result = work.execute(&mut queries) => result,
            }
        };
        let outcome = match (outcome, ctx.err()) {
            (Ok(_), Some(err)) => Err(StoreError::from(err).into()),
            (outcome, _) => outcome,
        };

        match outcome {
            Ok(output) => {
                tx.commit().await.map_err(StoreError::Commit)?;
                debug!("transaction committed");
                Ok(output)
            }
            Err(err) => {
                warn!(error = %err, "rolling back transaction");
                match tx.rollback().await {
                    Ok(()) => Err(err),
                    Err(rollback) => Err(StoreError::Rollback {
                        source: Box::new(err),
                        rollback,
                    }
                    .into()),
                }
            }
        }
    }
}
