use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

pub const BTN_NEW_ORDER: &str = "🛒 Zakaz berish";
pub const BTN_MY_ORDERS: &str = "📦 Mening zakazlarim";
pub const BTN_BALANCE: &str = "💰 Balans";
pub const BTN_WITHDRAW: &str = "💸 Pul yechish";
pub const BTN_REFERRALS: &str = "👥 Referallar";
pub const BTN_SUPPORT: &str = "🆘 Yordam";

pub fn main_menu() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            KeyboardButton::new(BTN_NEW_ORDER),
            KeyboardButton::new(BTN_MY_ORDERS),
        ],
        vec![
            KeyboardButton::new(BTN_BALANCE),
            KeyboardButton::new(BTN_WITHDRAW),
        ],
        vec![
            KeyboardButton::new(BTN_REFERRALS),
            KeyboardButton::new(BTN_SUPPORT),
        ],
    ])
    .resize_keyboard()
}

pub fn withdraw_method_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("💳 Karta", "withdraw_method_card"),
        InlineKeyboardButton::callback("📱 Telefon", "withdraw_method_phone"),
    ]])
}

pub fn order_review_keyboard(order_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Tasdiqlash", format!("approve_order_{order_id}")),
        InlineKeyboardButton::callback("❌ Rad etish", format!("reject_order_{order_id}")),
    ]])
}

pub fn withdraw_review_keyboard(withdraw_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Tasdiqlash", format!("approve_withdraw_{withdraw_id}")),
        InlineKeyboardButton::callback("❌ Rad etish", format!("reject_withdraw_{withdraw_id}")),
    ]])
}

pub fn cancel_order_keyboard(order_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🚫 Bekor qilish",
        format!("cancel_order_{order_id}"),
    )]])
}

pub fn referral_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "ℹ️ Referral haqida",
        "referral_info",
    )]])
}
