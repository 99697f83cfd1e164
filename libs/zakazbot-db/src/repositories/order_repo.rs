use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::db::with_tx_retry;
use crate::error::{LedgerError, LedgerResult};
use crate::models::Order;
use crate::repositories::user_repo::UserRepository;

/// Order rows with the owner's username joined in, for admin review lists.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderWithUser {
    pub id: i64,
    pub user_id: i64,
    pub product_url: Option<String>,
    pub screenshot_file_id: Option<String>,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub username: Option<String>,
    pub tg_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        product_url: &str,
        screenshot_file_id: &str,
    ) -> Result<i64> {
        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (user_id, product_url, screenshot_file_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user_id)
        .bind(product_url)
        .bind(screenshot_file_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create order")?;

        debug!(order_id, user_id, "order created");
        Ok(order_id)
    }

    pub async fn get_by_id(&self, order_id: i64) -> Result<Option<Order>> {
        sqlx::query_as("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch order")
    }

    /// Approves a pending order and credits the fixed reward to its owner,
    /// in one transaction. The status write is guarded on `pending`, so a
    /// duplicate approval (double admin tap, retry) gets
    /// `InvalidTransition` and credits nothing. Returns the owner's user id
    /// for post-commit notification. Transient store failures are retried;
    /// the same guard keeps a retry from crediting twice.
    pub async fn approve(&self, order_id: i64, reward: i64) -> LedgerResult<i64> {
        with_tx_retry("order approval", || self.try_approve(order_id, reward)).await
    }

    async fn try_approve(&self, order_id: i64, reward: i64) -> LedgerResult<i64> {
        let mut tx = self.pool.begin().await.map_err(LedgerError::Store)?;

        let owner: Option<i64> = sqlx::query_scalar(
            "UPDATE orders SET status = 'approved' WHERE id = $1 AND status = 'pending' RETURNING user_id",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let user_id = match owner {
            Some(id) => id,
            None => return Err(self.transition_failure(order_id).await),
        };

        if reward > 0 {
            UserRepository::adjust_balance_tx(&mut tx, user_id, reward).await?;
        }

        tx.commit().await.map_err(LedgerError::Store)?;
        info!(order_id, user_id, reward, "order approved, reward credited");
        Ok(user_id)
    }

    /// Rejects a pending order. Terminal, no balance effect. Returns the
    /// owner's user id for post-commit notification.
    pub async fn reject(&self, order_id: i64) -> LedgerResult<i64> {
        let owner: Option<i64> = sqlx::query_scalar(
            "UPDATE orders SET status = 'rejected' WHERE id = $1 AND status = 'pending' RETURNING user_id",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match owner {
            Some(user_id) => {
                info!(order_id, user_id, "order rejected");
                Ok(user_id)
            }
            None => Err(self.transition_failure(order_id).await),
        }
    }

    /// User-initiated cancellation. Ownership and the pending status are
    /// both part of the WHERE clause: a non-owner or a decided order
    /// affects zero rows and returns false, touching nothing.
    pub async fn cancel(&self, user_id: i64, order_id: i64) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE orders SET status = 'rejected' WHERE id = $1 AND user_id = $2 AND status = 'pending'",
        )
        .bind(order_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .context("Failed to cancel order")?;

        let cancelled = res.rows_affected() > 0;
        if cancelled {
            debug!(order_id, user_id, "order cancelled by owner");
        }
        Ok(cancelled)
    }

    /// Distinguishes "unknown order" from "already decided" after a guarded
    /// UPDATE matched zero rows.
    async fn transition_failure(&self, order_id: i64) -> LedgerError {
        match self.get_by_id(order_id).await {
            Ok(Some(order)) => LedgerError::InvalidTransition {
                entity: "order",
                id: order_id,
                status: order.status,
            },
            Ok(None) => LedgerError::OrderNotFound(order_id),
            Err(_) => LedgerError::OrderNotFound(order_id),
        }
    }

    pub async fn get_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch user orders")
    }

    pub async fn get_pending(&self) -> Result<Vec<OrderWithUser>> {
        sqlx::query_as(
            r#"
            SELECT o.id, o.user_id, o.product_url, o.screenshot_file_id, o.status, o.created_at,
                   u.username, u.tg_id
            FROM orders o
            LEFT JOIN users u ON o.user_id = u.id
            WHERE o.status = 'pending'
            ORDER BY o.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending orders")
    }

    pub async fn get_all_filtered(
        &self,
        user_id: Option<i64>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<OrderWithUser>> {
        let mut query = String::from(
            r#"
            SELECT o.id, o.user_id, o.product_url, o.screenshot_file_id, o.status, o.created_at,
                   u.username, u.tg_id
            FROM orders o
            LEFT JOIN users u ON o.user_id = u.id
            WHERE 1=1
            "#,
        );
        let mut idx = 0;
        if user_id.is_some() {
            idx += 1;
            query.push_str(&format!(" AND o.user_id = ${}", idx));
        }
        if start_date.is_some() {
            idx += 1;
            query.push_str(&format!(" AND o.created_at::date >= ${}", idx));
        }
        if end_date.is_some() {
            idx += 1;
            query.push_str(&format!(" AND o.created_at::date <= ${}", idx));
        }
        query.push_str(" ORDER BY o.created_at DESC");

        let mut q = sqlx::query_as::<_, OrderWithUser>(&query);
        if let Some(uid) = user_id {
            q = q.bind(uid);
        }
        if let Some(d) = start_date {
            q = q.bind(d);
        }
        if let Some(d) = end_date {
            q = q.bind(d);
        }

        q.fetch_all(&self.pool)
            .await
            .context("Failed to fetch filtered orders")
    }

    pub async fn count_for_date(&self, date: NaiveDate) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE created_at::date = $1")
                .bind(date)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
