use std::collections::HashMap;
use std::sync::Arc;

use dotenvy::dotenv;
use teloxide::prelude::*;
use tokio::sync::RwLock;

use zakazbot_db::repositories::{
    OrderRepository, ReferralRepository, SettingsRepository, SupportRepository, UserRepository,
    WithdrawRepository,
};

mod bot;
mod config;
mod services;
mod state;

use crate::config::Config;
use crate::services::admin_service::AdminService;
use crate::services::ledger_service::LedgerService;
use crate::services::order_service::OrderService;
use crate::services::referral_service::ReferralService;
use crate::services::settings_service::SettingsService;
use crate::services::support_service::SupportService;
use crate::services::withdraw_service::WithdrawService;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Zakaz Bot...");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("Invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let pool = match zakazbot_db::init_db(&config.database_url).await {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to initialize database: {e:#}");
            std::process::exit(1);
        }
    };

    let users = UserRepository::new(pool.clone());
    let orders = OrderRepository::new(pool.clone());
    let withdraws = WithdrawRepository::new(pool.clone());
    let referrals = ReferralRepository::new(pool.clone());
    let settings_repo = SettingsRepository::new(pool.clone());
    let support_repo = SupportRepository::new(pool.clone());

    let settings = SettingsService::new(settings_repo);
    let admin_service = AdminService::new(
        settings.clone(),
        &config,
        users.clone(),
        orders.clone(),
        withdraws.clone(),
        referrals.clone(),
    );
    let ledger_service = LedgerService::new(users.clone());
    let order_service = OrderService::new(orders.clone(), users.clone(), config.order_reward);
    let withdraw_service =
        WithdrawService::new(withdraws.clone(), users.clone(), config.min_withdraw_amount);
    let referral_service =
        ReferralService::new(referrals.clone(), users.clone(), config.referral_bonus);
    let support_service = SupportService::new(support_repo, users.clone());

    let bot = Bot::new(config.bot_token.clone());

    let state = AppState {
        config,
        settings,
        admin_service,
        ledger_service,
        order_service,
        withdraw_service,
        referral_service,
        support_service,
        pending: Arc::new(RwLock::new(HashMap::new())),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        }
    });

    bot::run_bot(bot, shutdown_rx, state).await;

    log::info!("Zakaz Bot stopped");
}
