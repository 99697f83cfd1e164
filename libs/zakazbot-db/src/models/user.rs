use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub tg_id: i64,
    pub username: Option<String>,
    pub referred_by: Option<i64>,
    /// Whole so'm. Never negative; every mutation goes through the clamped
    /// read-modify-write in `UserRepository`.
    pub balance: i64,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Display handle for chat messages: @username when set, numeric id
    /// otherwise.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(u) if !u.is_empty() => format!("@{}", u),
            _ => format!("ID: {}", self.tg_id),
        }
    }
}
