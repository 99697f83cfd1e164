use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportMessage {
    pub id: i64,
    pub ticket_id: String,
    pub user_id: i64,
    pub text: Option<String>,
    pub file_id: Option<String>,
    pub file_type: Option<String>,
    pub reply_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
}
