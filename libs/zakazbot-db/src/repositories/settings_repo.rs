use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::debug;

use crate::models::SettingValue;

/// Generic key/value configuration read at runtime (admin-id override,
/// reward amounts, feature texts). Not part of the ledger invariants.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<SettingValue>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch setting")?;
        Ok(raw.map(|r| SettingValue::parse(&r)))
    }

    pub async fn set(&self, key: &str, value: &SettingValue) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value.serialize_to_store())
        .execute(&self.pool)
        .await
        .context("Failed to store setting")?;

        debug!(key, "setting updated");
        Ok(())
    }
}
