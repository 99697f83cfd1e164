use anyhow::Result;
use zakazbot_db::LedgerError;
use zakazbot_db::models::{WithdrawMethod, WithdrawRequest, WithdrawStatus};
use zakazbot_db::repositories::withdraw_repo::WithdrawWithUser;
use zakazbot_db::repositories::{UserRepository, WithdrawRepository};

/// Outcome of a user's withdrawal attempt, shaped for chat messaging.
#[derive(Debug, Clone)]
pub enum WithdrawOutcome {
    Created { withdraw_id: i64 },
    BelowMinimum { minimum: i64 },
    Insufficient { balance: i64 },
}

/// Post-commit notification payload for an admin decision.
#[derive(Debug, Clone)]
pub struct WithdrawDecision {
    pub withdraw_id: i64,
    pub owner_tg_id: Option<i64>,
    pub amount: i64,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct WithdrawService {
    withdraws: WithdrawRepository,
    users: UserRepository,
    min_amount: i64,
}

impl WithdrawService {
    pub fn new(withdraws: WithdrawRepository, users: UserRepository, min_amount: i64) -> Self {
        Self {
            withdraws,
            users,
            min_amount,
        }
    }

    pub fn min_amount(&self) -> i64 {
        self.min_amount
    }

    /// Validates the minimum up front; sufficiency is decided inside the
    /// create transaction against the balance read under the row lock, so
    /// a stale or concurrent pre-check can never overdraw.
    pub async fn request(
        &self,
        user_id: i64,
        amount: i64,
        wallet: &str,
        method: WithdrawMethod,
    ) -> Result<WithdrawOutcome> {
        if amount < self.min_amount {
            return Ok(WithdrawOutcome::BelowMinimum {
                minimum: self.min_amount,
            });
        }

        match self.withdraws.create(user_id, amount, wallet, method).await {
            Ok(withdraw_id) => Ok(WithdrawOutcome::Created { withdraw_id }),
            Err(LedgerError::InsufficientBalance { balance, .. }) => {
                Ok(WithdrawOutcome::Insufficient { balance })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn approve(&self, withdraw_id: i64) -> Result<WithdrawDecision, LedgerError> {
        self.decide(withdraw_id, WithdrawStatus::Approved).await
    }

    /// Refunds atomically with the status write; a second reject is
    /// InvalidTransition, never a second refund.
    pub async fn reject(&self, withdraw_id: i64) -> Result<WithdrawDecision, LedgerError> {
        self.decide(withdraw_id, WithdrawStatus::Rejected).await
    }

    async fn decide(
        &self,
        withdraw_id: i64,
        status: WithdrawStatus,
    ) -> Result<WithdrawDecision, LedgerError> {
        let owner_id = self.withdraws.set_status(withdraw_id, status).await?;

        let amount = match self.withdraws.get_by_id(withdraw_id).await {
            Ok(Some(req)) => req.amount,
            _ => 0,
        };
        let (owner_tg_id, new_balance) = match self.users.get_by_id(owner_id).await {
            Ok(Some(user)) => (Some(user.tg_id), user.balance),
            _ => (None, 0),
        };

        Ok(WithdrawDecision {
            withdraw_id,
            owner_tg_id,
            amount,
            new_balance,
        })
    }

    pub async fn pending(&self) -> Result<Vec<WithdrawWithUser>> {
        self.withdraws.get_pending().await
    }

    pub async fn history_of(&self, user_id: i64) -> Result<Vec<WithdrawRequest>> {
        self.withdraws.get_by_user(user_id).await
    }
}
