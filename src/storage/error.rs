use thiserror::Error;

use super::ContextError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by the store and the transaction coordinator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),

    /// The unit of work failed and the rollback that followed failed too.
    /// The store state is unknown, so both causes are kept.
    #[error("tx err: {source}, rb err: {rollback}")]
    Rollback {
        source: BoxError,
        rollback: sqlx::Error,
    },

    #[error("failed to acquire connection: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("query '{op}' failed: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid {column} in stored row: {detail}")]
    Decode {
        column: &'static str,
        detail: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    pub(crate) fn query(op: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| StoreError::Query { op, source }
    }

    /// True when a query was rejected because it referenced a missing row.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            StoreError::Query {
                source: sqlx::Error::Database(db),
                ..
            } => db.is_foreign_key_violation(),
            _ => false,
        }
    }
}

impl From<ContextError> for StoreError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => StoreError::Cancelled,
            ContextError::DeadlineExceeded => StoreError::DeadlineExceeded,
        }
    }
}
