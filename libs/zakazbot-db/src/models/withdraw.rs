use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawRequest {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub wallet: String,
    pub method: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl WithdrawRequest {
    pub fn status(&self) -> WithdrawStatus {
        WithdrawStatus::from(self.status.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::Approved => "approved",
            WithdrawStatus::Rejected => "rejected",
        }
    }
}

impl From<&str> for WithdrawStatus {
    fn from(s: &str) -> Self {
        match s {
            "approved" => WithdrawStatus::Approved,
            "rejected" => WithdrawStatus::Rejected,
            _ => WithdrawStatus::Pending,
        }
    }
}

/// Payout destination kind collected by the withdraw flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawMethod {
    Card,
    Phone,
}

impl WithdrawMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawMethod::Card => "card",
            WithdrawMethod::Phone => "phone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(WithdrawMethod::Card),
            "phone" => Some(WithdrawMethod::Phone),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_rejects_unknown() {
        assert_eq!(WithdrawMethod::parse("card"), Some(WithdrawMethod::Card));
        assert_eq!(WithdrawMethod::parse("phone"), Some(WithdrawMethod::Phone));
        assert_eq!(WithdrawMethod::parse("cash"), None);
    }
}
