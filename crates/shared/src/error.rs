//! Storage error taxonomy shared by every backend

use std::future::Future;
use std::time::Duration;

/// Errors returned by store operations.
///
/// `NotFound` and `AlreadyExists` are expected outcomes that callers branch
/// on; everything else is a storage failure and must be surfaced.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    AlreadyExists,
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// True for failures of the backend itself, as opposed to expected
    /// lookup/uniqueness outcomes.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Database(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::AlreadyExists,
            // Referenced row is gone (e.g. session for a deleted user)
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Bound a store call by `limit`. An elapsed deadline becomes
/// [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::NotFound));
        assert!(!err.is_storage_failure());
    }

    #[test]
    fn test_pool_timeout_is_storage_failure() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through_result() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let limit = Duration::from_millis(10);
        let result = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == limit));
    }
}
