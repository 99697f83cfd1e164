use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use crate::db::with_tx_retry;
use crate::error::{LedgerError, LedgerResult};
use crate::models::User;

/// Owns the per-user balance and its mutation rules. Every balance write in
/// the workspace funnels through `adjust_balance_tx`: a row-locked
/// read-modify-write that clamps the result at zero.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

/// Balance arithmetic floors at zero instead of going negative or erroring;
/// debit sufficiency is checked by callers inside their own transaction.
pub fn clamped_balance(current: i64, delta: i64) -> i64 {
    current.saturating_add(delta).max(0)
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registration is link-free: `referred_by` is written only by
    /// `ReferralRepository::record`, inside the same transaction as the
    /// cycle check and the bonus credit.
    pub async fn upsert(&self, tg_id: i64, username: Option<&str>) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (tg_id, username)
            VALUES ($1, $2)
            ON CONFLICT(tg_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username)
            RETURNING *
            "#,
        )
        .bind(tg_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert user")?;

        debug!(tg_id, user_id = user.id, "user upserted");
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")
    }

    /// Typed so callers can tell "no such user" from a store failure
    /// instead of collapsing both into one message.
    pub async fn get_by_tg_id(&self, tg_id: i64) -> LedgerResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE tg_id = $1")
            .bind(tg_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Returns 0 for unknown users. Display-path default only; callers
    /// must never use this as an existence check.
    pub async fn balance_of(&self, user_id: i64) -> Result<i64> {
        let balance: Option<i64> = sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch balance")?;
        Ok(balance.unwrap_or(0))
    }

    /// Atomic clamped balance adjustment. Returns the new balance, or
    /// `UserNotFound` with nothing written. Transient store failures are
    /// retried with bounded backoff.
    pub async fn adjust_balance(&self, user_id: i64, delta: i64) -> LedgerResult<i64> {
        with_tx_retry("balance adjustment", || self.try_adjust(user_id, delta)).await
    }

    async fn try_adjust(&self, user_id: i64, delta: i64) -> LedgerResult<i64> {
        let mut tx = self.pool.begin().await.map_err(LedgerError::Store)?;
        let new_balance = Self::adjust_balance_tx(&mut tx, user_id, delta).await?;
        tx.commit().await.map_err(LedgerError::Store)?;
        Ok(new_balance)
    }

    /// Credit convenience wrapper; `amount` must be non-negative.
    pub async fn credit_balance(&self, user_id: i64, amount: i64) -> LedgerResult<i64> {
        debug_assert!(amount >= 0);
        self.adjust_balance(user_id, amount).await
    }

    /// The single balance-mutation primitive: lock the row, read the value
    /// inside this transaction, write back the clamped result. Composable
    /// into larger transactions (withdraw create/reject, order approve,
    /// referral credit) so the status write and the balance write commit or
    /// roll back together.
    pub async fn adjust_balance_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        delta: i64,
    ) -> LedgerResult<i64> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

        let current = current.ok_or(LedgerError::UserNotFound(user_id))?;
        let new_balance = clamped_balance(current, delta);

        sqlx::query("UPDATE users SET balance = $1 WHERE id = $2")
            .bind(new_balance)
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        debug!(user_id, current, new_balance, "balance updated");
        Ok(new_balance)
    }

    pub async fn set_blocked(&self, user_id: i64, blocked: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_blocked = $1 WHERE id = $2")
            .bind(blocked)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update blocked flag")?;
        Ok(())
    }

    pub async fn is_blocked(&self, tg_id: i64) -> Result<bool> {
        let blocked: Option<bool> =
            sqlx::query_scalar("SELECT is_blocked FROM users WHERE tg_id = $1")
                .bind(tg_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(blocked.unwrap_or(false))
    }

    pub async fn count_all(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_blocked(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_blocked = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::clamped_balance;

    #[test]
    fn credit_adds() {
        assert_eq!(clamped_balance(1000, 500), 1500);
    }

    #[test]
    fn debit_subtracts() {
        assert_eq!(clamped_balance(1000, -400), 600);
    }

    #[test]
    fn oversized_debit_clamps_to_zero() {
        assert_eq!(clamped_balance(50, -10000), 0);
    }

    #[test]
    fn zero_balance_stays_zero_on_debit() {
        assert_eq!(clamped_balance(0, -1), 0);
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert_eq!(clamped_balance(i64::MAX, 1), i64::MAX);
        assert_eq!(clamped_balance(i64::MIN, -1), 0);
    }
}
