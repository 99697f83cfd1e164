use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
    pub bonus: i64,
    pub level: i32,
    pub created_at: DateTime<Utc>,
}

/// Aggregate view returned by `ReferralRepository::stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralStats {
    pub count: i64,
    pub total_bonus: i64,
    pub list: Vec<Referral>,
}
