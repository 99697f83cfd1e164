pub mod admin_service;
pub mod ledger_service;
pub mod order_service;
pub mod referral_service;
pub mod settings_service;
pub mod support_service;
pub mod withdraw_service;
