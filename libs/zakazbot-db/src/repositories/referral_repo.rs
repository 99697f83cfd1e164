use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::db::with_tx_retry;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{Referral, ReferralStats};
use crate::repositories::user_repo::UserRepository;

/// Referral chains deeper than this are treated as a data problem, not a
/// legitimate tree.
const MAX_ANCESTOR_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct ReferralRepository {
    pool: PgPool,
}

impl ReferralRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Establishes the `referred_by` link on the referred user and credits
    /// the bonus to the referrer. The link write, the referral row and the
    /// balance credit commit or roll back together. Returns true only when
    /// the link was newly established.
    ///
    /// No-op cases, all returning false with nothing written:
    /// - the referred user is already linked (first write wins);
    /// - self-referral;
    /// - the link would make the referred user both ancestor and
    ///   descendant of the referrer (the cycle walk runs before the link
    ///   write, so a rejected pair leaves `users` untouched);
    /// - either user id is unknown.
    pub async fn record(
        &self,
        referrer_id: i64,
        referred_id: i64,
        bonus: i64,
        level: i32,
    ) -> LedgerResult<bool> {
        if referrer_id == referred_id {
            warn!(referrer_id, "self-referral ignored");
            return Ok(false);
        }

        with_tx_retry("referral record", || {
            self.try_record(referrer_id, referred_id, bonus, level)
        })
        .await
    }

    async fn try_record(
        &self,
        referrer_id: i64,
        referred_id: i64,
        bonus: i64,
        level: i32,
    ) -> LedgerResult<bool> {
        let mut tx = self.pool.begin().await.map_err(LedgerError::Store)?;

        // Lock both endpoints in id order so two starts linking the same
        // pair from opposite directions serialize instead of both passing
        // the walk below.
        let (lo, hi) = if referrer_id < referred_id {
            (referrer_id, referred_id)
        } else {
            (referred_id, referrer_id)
        };
        let _locked: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE id IN ($1, $2) ORDER BY id FOR UPDATE")
                .bind(lo)
                .bind(hi)
                .fetch_all(&mut *tx)
                .await?;

        // Walk referred_by upward from the referrer; finding referred_id
        // there means this link would make referred both ancestor and
        // descendant of referrer.
        let mut cursor = Some(referrer_id);
        for _ in 0..MAX_ANCESTOR_DEPTH {
            let Some(current) = cursor else { break };
            if current == referred_id {
                warn!(referrer_id, referred_id, "referral cycle ignored");
                return Ok(false);
            }
            cursor = sqlx::query_scalar("SELECT referred_by FROM users WHERE id = $1")
                .bind(current)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();
        }

        // First write wins: an already linked user keeps their original
        // referrer and this call credits nothing.
        let linked: Option<i64> = sqlx::query_scalar(
            "UPDATE users SET referred_by = $1 WHERE id = $2 AND referred_by IS NULL RETURNING id",
        )
        .bind(referrer_id)
        .bind(referred_id)
        .fetch_optional(&mut *tx)
        .await?;

        if linked.is_none() {
            return Ok(false);
        }

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO referrals (referrer_id, referred_id, bonus, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (referrer_id, referred_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(referrer_id)
        .bind(referred_id)
        .bind(bonus)
        .bind(level)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            return Ok(false);
        }

        if bonus > 0 {
            UserRepository::adjust_balance_tx(&mut tx, referrer_id, bonus).await?;
        }

        tx.commit().await.map_err(LedgerError::Store)?;
        info!(referrer_id, referred_id, bonus, level, "referral recorded");
        Ok(true)
    }

    pub async fn stats(&self, user_id: i64) -> Result<ReferralStats> {
        let list: Vec<Referral> =
            sqlx::query_as("SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch referrals")?;

        let total_bonus = list.iter().map(|r| r.bonus).sum();
        Ok(ReferralStats {
            count: list.len() as i64,
            total_bonus,
            list,
        })
    }

    pub async fn total_bonus_paid(&self) -> Result<i64> {
        let total: Option<i64> = sqlx::query_scalar("SELECT SUM(bonus) FROM referrals")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.unwrap_or(0))
    }
}
