pub mod order_repo;
pub mod referral_repo;
pub mod settings_repo;
pub mod support_repo;
pub mod user_repo;
pub mod withdraw_repo;

pub use order_repo::OrderRepository;
pub use referral_repo::ReferralRepository;
pub use settings_repo::SettingsRepository;
pub use support_repo::SupportRepository;
pub use user_repo::UserRepository;
pub use withdraw_repo::WithdrawRepository;
