use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::debug;

use crate::models::SupportMessage;

#[derive(Debug, Clone)]
pub struct SupportRepository {
    pool: PgPool,
}

impl SupportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        ticket_id: &str,
        user_id: i64,
        text: Option<&str>,
        file_id: Option<&str>,
        file_type: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO support_messages (ticket_id, user_id, text, file_id, file_type) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(text)
        .bind(file_id)
        .bind(file_type)
        .execute(&self.pool)
        .await
        .context("Failed to insert support message")?;

        debug!(ticket_id, user_id, "support message saved");
        Ok(())
    }

    pub async fn set_reply(&self, ticket_id: &str, reply_text: &str) -> Result<()> {
        sqlx::query(
            "UPDATE support_messages SET reply_text = $1, replied_at = CURRENT_TIMESTAMP WHERE ticket_id = $2",
        )
        .bind(reply_text)
        .bind(ticket_id)
        .execute(&self.pool)
        .await
        .context("Failed to store support reply")?;
        Ok(())
    }

    pub async fn get_by_ticket(&self, ticket_id: &str) -> Result<Option<SupportMessage>> {
        sqlx::query_as("SELECT * FROM support_messages WHERE ticket_id = $1")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch support message")
    }
}
