pub mod order;
pub mod referral;
pub mod setting;
pub mod support;
pub mod user;
pub mod withdraw;

pub use order::{Order, OrderStatus};
pub use referral::{Referral, ReferralStats};
pub use setting::SettingValue;
pub use support::SupportMessage;
pub use user::User;
pub use withdraw::{WithdrawMethod, WithdrawRequest, WithdrawStatus};
