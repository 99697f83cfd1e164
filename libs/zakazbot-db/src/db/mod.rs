use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::warn;

use crate::error::LedgerResult;

/// Transactions in this crate are short, bounded read-modify-writes; a pool
/// acquire that takes longer than this means the store is unhealthy.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn init_db(database_url: &str) -> Result<PgPool> {
    if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
        return Err(anyhow::anyhow!(
            "DATABASE_URL must start with postgres:// or postgresql://"
        ));
    }

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run DB migrations")?;

    Ok(pool)
}

/// Bounded retry for transient store failures: 3 attempts, exponential
/// delay starting at 100ms.
pub(crate) const MAX_TX_ATTEMPTS: u32 = 3;
pub(crate) const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Serialization conflicts and deadlocks are safe to retry because the
/// failed transaction applied nothing.
pub(crate) fn is_retryable_sql_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// Runs a transactional balance mutation, retrying transient failures with
/// the bounded backoff above. The closure must open a fresh transaction on
/// every call; a retried attempt starts from nothing.
pub(crate) async fn with_tx_retry<T, F, Fut>(op_name: &'static str, mut op: F) -> LedgerResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut delay = INITIAL_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_retryable() && attempt < MAX_TX_ATTEMPTS => {
                warn!(attempt, "transient store error in {op_name}, retrying: {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::{MAX_TX_ATTEMPTS, with_tx_retry};
    use crate::error::{LedgerError, LedgerResult};

    #[tokio::test]
    async fn transient_error_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_tx_retry("test op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(LedgerError::Store(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_fails_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_tx_retry("test op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(LedgerError::UserNotFound(1)) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::UserNotFound(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: LedgerResult<()> = with_tx_retry("test op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(LedgerError::Store(sqlx::Error::PoolTimedOut)) }
        })
        .await;
        assert!(matches!(result, Err(LedgerError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_TX_ATTEMPTS);
    }
}
