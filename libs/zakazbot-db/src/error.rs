use thiserror::Error;

use crate::db::is_retryable_sql_error;

/// Failures of the balance-mutating operations. Every variant leaves the
/// store exactly as it was before the call.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("order {0} not found")]
    OrderNotFound(i64),

    #[error("withdraw request {0} not found")]
    WithdrawNotFound(i64),

    /// Carries the balance observed inside the failing transaction so the
    /// caller can show it to the user.
    #[error("insufficient balance: have {balance}, requested {requested}")]
    InsufficientBalance { balance: i64, requested: i64 },

    #[error("{entity} {id} is already '{status}', cannot transition")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        status: String,
    },

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Store(e) => is_retryable_sql_error(e),
            _ => false,
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
