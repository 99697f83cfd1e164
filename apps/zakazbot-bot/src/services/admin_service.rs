use anyhow::Result;
use chrono::Utc;
use tracing::warn;
use zakazbot_db::repositories::{
    OrderRepository, ReferralRepository, UserRepository, WithdrawRepository,
};

use crate::config::{Config, parse_admin_ids};
use crate::services::settings_service::SettingsService;

/// Aggregate counters for the admin /stats screen.
#[derive(Debug, Clone)]
pub struct BotStats {
    pub total_users: i64,
    pub blocked_users: i64,
    pub today_orders: i64,
    pub pending_withdraws: i64,
    pub total_referral_bonus: i64,
}

/// Resolves admin identity and serves admin-only aggregates. The admin
/// list comes from the `admin_ids` setting when present, falling back to
/// the env config, so admins can be rotated without a restart.
#[derive(Clone)]
pub struct AdminService {
    settings: SettingsService,
    fallback_admin_ids: Vec<i64>,
    users: UserRepository,
    orders: OrderRepository,
    withdraws: WithdrawRepository,
    referrals: ReferralRepository,
}

impl AdminService {
    pub fn new(
        settings: SettingsService,
        config: &Config,
        users: UserRepository,
        orders: OrderRepository,
        withdraws: WithdrawRepository,
        referrals: ReferralRepository,
    ) -> Self {
        Self {
            settings,
            fallback_admin_ids: config.admin_ids.clone(),
            users,
            orders,
            withdraws,
            referrals,
        }
    }

    pub async fn admin_tg_ids(&self) -> Vec<i64> {
        if let Some(value) = self.settings.get("admin_ids").await {
            let raw = value.serialize_to_store();
            match parse_admin_ids(&raw) {
                Ok(ids) if !ids.is_empty() => return ids,
                Ok(_) => {}
                Err(e) => warn!("unparsable admin_ids setting, using config: {e:#}"),
            }
        }
        self.fallback_admin_ids.clone()
    }

    pub async fn is_admin(&self, tg_id: i64) -> bool {
        self.admin_tg_ids().await.contains(&tg_id)
    }

    pub async fn stats(&self) -> Result<BotStats> {
        Ok(BotStats {
            total_users: self.users.count_all().await?,
            blocked_users: self.users.count_blocked().await?,
            today_orders: self.orders.count_for_date(Utc::now().date_naive()).await?,
            pending_withdraws: self.withdraws.count_pending().await?,
            total_referral_bonus: self.referrals.total_bonus_paid().await?,
        })
    }

    /// Blocks or unblocks by Telegram id. Returns false when no such user.
    pub async fn set_blocked_by_tg_id(&self, tg_id: i64, blocked: bool) -> Result<bool> {
        match self.users.get_by_tg_id(tg_id).await? {
            Some(user) => {
                self.users.set_blocked(user.id, blocked).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
