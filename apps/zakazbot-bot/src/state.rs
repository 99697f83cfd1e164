use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use zakazbot_db::models::WithdrawMethod;

use crate::config::Config;
use crate::services::admin_service::AdminService;
use crate::services::ledger_service::LedgerService;
use crate::services::order_service::OrderService;
use crate::services::referral_service::ReferralService;
use crate::services::settings_service::SettingsService;
use crate::services::support_service::SupportService;
use crate::services::withdraw_service::WithdrawService;

/// Where a user currently is inside a multi-step form. The next plain
/// message from that chat is interpreted against this, then the entry is
/// consumed.
#[derive(Debug, Clone)]
pub enum PendingInput {
    OrderUrl,
    OrderScreenshot { product_url: String },
    WithdrawWallet { method: WithdrawMethod },
    WithdrawAmount { method: WithdrawMethod, wallet: String },
    SupportMessage,
}

pub type PendingStore = Arc<RwLock<HashMap<i64, PendingInput>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub settings: SettingsService,
    pub admin_service: AdminService,
    pub ledger_service: LedgerService,
    pub order_service: OrderService,
    pub withdraw_service: WithdrawService,
    pub referral_service: ReferralService,
    pub support_service: SupportService,
    /// In-flight form steps, keyed by Telegram chat id.
    pub pending: PendingStore,
}

impl AppState {
    pub async fn take_pending(&self, tg_id: i64) -> Option<PendingInput> {
        self.pending.write().await.remove(&tg_id)
    }

    pub async fn set_pending(&self, tg_id: i64, input: PendingInput) {
        self.pending.write().await.insert(tg_id, input);
    }

    pub async fn clear_pending(&self, tg_id: i64) {
        self.pending.write().await.remove(&tg_id);
    }
}
