use tracing::info;
use zakazbot_db::LedgerError;
use zakazbot_db::models::User;
use zakazbot_db::repositories::UserRepository;

/// Thin orchestration over the balance primitive for handler code:
/// resolves Telegram ids to users and keeps the adjust/credit contracts in
/// one place.
#[derive(Clone)]
pub struct LedgerService {
    users: UserRepository,
}

impl LedgerService {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }

    /// Dispatcher guard: unknown users are not blocked.
    pub async fn is_blocked_tg(&self, tg_id: i64) -> bool {
        self.users.is_blocked(tg_id).await.unwrap_or(false)
    }

    pub async fn balance_of_tg(&self, tg_id: i64) -> anyhow::Result<i64> {
        match self.users.get_by_tg_id(tg_id).await? {
            Some(user) => Ok(self.users.balance_of(user.id).await?),
            None => Ok(0),
        }
    }

    /// Manual admin adjustment (praise, compensation, penalty). Returns the
    /// new balance. `UserNotFound` means exactly that; store failures pass
    /// through as `Store`.
    pub async fn adjust_by_tg_id(&self, tg_id: i64, delta: i64) -> Result<i64, LedgerError> {
        let user = self
            .users
            .get_by_tg_id(tg_id)
            .await?
            .ok_or(LedgerError::UserNotFound(tg_id))?;

        let new_balance = self.users.adjust_balance(user.id, delta).await?;
        info!(tg_id, delta, new_balance, "manual balance adjustment");
        Ok(new_balance)
    }

    pub async fn resolve_user(&self, tg_id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.users.get_by_tg_id(tg_id).await?)
    }

    /// Plain /start registration with no referrer attached.
    pub async fn register(&self, tg_id: i64, username: Option<&str>) -> anyhow::Result<User> {
        self.users.upsert(tg_id, username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // An unreachable database must surface as a store error, not as a
    // missing user, or /addbalance lies to the admin during an outage.
    #[tokio::test]
    async fn store_failure_is_not_reported_as_missing_user() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(100))
            .connect_lazy("postgres://unused@127.0.0.1:1/unused")
            .expect("lazy pool");
        let service = LedgerService::new(UserRepository::new(pool));

        let err = service.adjust_by_tg_id(42, 100).await.unwrap_err();
        assert!(
            !matches!(err, LedgerError::UserNotFound(_)),
            "store failure surfaced as: {err}"
        );
    }
}
