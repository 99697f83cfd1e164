use teloxide::prelude::*;
use teloxide::types::{ChatId, ForceReply, ParseMode};
use tracing::{error, info, warn};
use zakazbot_db::models::{OrderStatus, WithdrawStatus};

use crate::bot::keyboards::{
    self, main_menu, order_review_keyboard, referral_keyboard, withdraw_method_keyboard,
    withdraw_review_keyboard,
};
use crate::bot::utils::{escape_html, format_som, parse_amount};
use crate::services::withdraw_service::WithdrawOutcome;
use crate::state::{AppState, PendingInput};

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let tg_id = msg.chat.id.0;
    // Group chats and channels are not served.
    if tg_id <= 0 {
        return Ok(());
    }

    // Blocked users are silently ignored.
    if state.ledger_service.is_blocked_tg(tg_id).await {
        return Ok(());
    }

    let text = msg.text().map(str::to_owned);

    if let Some("/cancel") = text.as_deref() {
        state.clear_pending(tg_id).await;
        let _ = bot
            .send_message(msg.chat.id, "Bekor qilindi.")
            .reply_markup(main_menu())
            .await;
        return Ok(());
    }

    // A user inside a multi-step form gets their message interpreted as
    // the next step, not as a command.
    if let Some(step) = state.take_pending(tg_id).await {
        return handle_pending_step(&bot, &msg, &state, step).await;
    }

    let Some(text) = text else {
        return Ok(());
    };

    if text.starts_with("/start") {
        return handle_start(&bot, &msg, &state, &text).await;
    }

    match text.as_str() {
        keyboards::BTN_NEW_ORDER => {
            state.set_pending(tg_id, PendingInput::OrderUrl).await;
            let _ = bot
                .send_message(
                    msg.chat.id,
                    "🛒 Mahsulot havolasini yuboring.\n\nBekor qilish uchun /cancel.",
                )
                .reply_markup(ForceReply::new().selective())
                .await;
        }

        keyboards::BTN_MY_ORDERS => {
            show_my_orders(&bot, &msg, &state, tg_id).await;
        }

        keyboards::BTN_BALANCE => {
            show_balance(&bot, &msg, &state, tg_id).await;
        }

        keyboards::BTN_WITHDRAW => {
            let balance = state.ledger_service.balance_of_tg(tg_id).await.unwrap_or(0);
            if balance < state.withdraw_service.min_amount() {
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        format!(
                            "❌ Yechib olish uchun balans kamida {} bo'lishi kerak.\nJoriy balans: {}",
                            format_som(state.withdraw_service.min_amount()),
                            format_som(balance)
                        ),
                    )
                    .await;
            } else {
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        format!(
                            "💸 Yechib olish uchun balans: {}\nUsulni tanlang:",
                            format_som(balance)
                        ),
                    )
                    .reply_markup(withdraw_method_keyboard())
                    .await;
            }
        }

        keyboards::BTN_REFERRALS => {
            show_referral_stats(&bot, &msg, &state, tg_id).await;
        }

        keyboards::BTN_SUPPORT => {
            state.set_pending(tg_id, PendingInput::SupportMessage).await;
            let _ = bot
                .send_message(
                    msg.chat.id,
                    format!(
                        "🆘 Savolingizni yozib yuboring, adminlar javob beradi.\nTezkor aloqa: {}",
                        state.config.support_username
                    ),
                )
                .reply_markup(ForceReply::new().selective())
                .await;
        }

        _ => {
            if state.admin_service.is_admin(tg_id).await {
                return handle_admin_command(&bot, &msg, &state, &text).await;
            }
            let _ = bot
                .send_message(msg.chat.id, "Menyudan bo'limni tanlang 👇")
                .reply_markup(main_menu())
                .await;
        }
    }

    Ok(())
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    text: &str,
) -> Result<(), teloxide::RequestError> {
    let tg_id = msg.chat.id.0;
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

    let referrer_tg_id = text
        .strip_prefix("/start")
        .map(str::trim)
        .and_then(|args| args.strip_prefix("ref_"))
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|rid| *rid != tg_id);

    let registered = match referrer_tg_id {
        Some(rid) => {
            match state
                .referral_service
                .register_with_referrer(tg_id, username, rid)
                .await
            {
                Ok((user, credit)) => {
                    // The bonus is already committed at this point.
                    if let Some(credit) = credit {
                        let note = format!(
                            "🎉 Sizning havolangiz orqali yangi foydalanuvchi qo'shildi!\n💸 Bonus: {}",
                            format_som(credit.bonus)
                        );
                        if let Err(e) = bot.send_message(ChatId(credit.referrer_tg_id), note).await
                        {
                            warn!(
                                referrer_tg_id = credit.referrer_tg_id,
                                "failed to notify referrer: {e}"
                            );
                        }
                    }
                    Ok(user)
                }
                Err(e) => Err(e),
            }
        }
        None => state.ledger_service.register(tg_id, username).await,
    };

    if let Err(e) = registered {
        error!(tg_id, "failed to register user on /start: {e:#}");
        let _ = bot
            .send_message(msg.chat.id, "❌ Xato yuz berdi, birozdan so'ng qayta urinib ko'ring.")
            .await;
        return Ok(());
    }

    info!(tg_id, "user started the bot");
    let welcome = state
        .settings
        .get_text_or(
            "welcome_text",
            "Xush kelibsiz! 🎉\nZakaz bering, referal bonuslarini yig'ing va pulni kartangizga yechib oling.",
        )
        .await;
    let _ = bot
        .send_message(
            msg.chat.id,
            format!(
                "{welcome}\n\nTo'lov isbotlari: {}\nSavollar: {}",
                state.config.proof_channel_username, state.config.support_username
            ),
        )
        .reply_markup(main_menu())
        .await;
    Ok(())
}

async fn handle_pending_step(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    step: PendingInput,
) -> Result<(), teloxide::RequestError> {
    let tg_id = msg.chat.id.0;

    match step {
        PendingInput::OrderUrl => {
            let url = msg.text().unwrap_or_default().trim().to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                state.set_pending(tg_id, PendingInput::OrderUrl).await;
                let _ = bot
                    .send_message(msg.chat.id, "❌ Havola http:// yoki https:// bilan boshlanishi kerak.")
                    .await;
                return Ok(());
            }
            state
                .set_pending(tg_id, PendingInput::OrderScreenshot { product_url: url })
                .await;
            let _ = bot
                .send_message(msg.chat.id, "📸 Endi xarid skrinshotini yuboring.")
                .reply_markup(ForceReply::new().selective())
                .await;
        }

        PendingInput::OrderScreenshot { product_url } => {
            let Some(file_id) = msg
                .photo()
                .and_then(|sizes| sizes.last())
                .map(|p| p.file.id.to_string())
            else {
                state
                    .set_pending(tg_id, PendingInput::OrderScreenshot { product_url })
                    .await;
                let _ = bot
                    .send_message(msg.chat.id, "❌ Iltimos, rasm (skrinshot) yuboring.")
                    .await;
                return Ok(());
            };

            let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await else {
                let _ = bot.send_message(msg.chat.id, "Avval /start bosing.").await;
                return Ok(());
            };

            match state
                .order_service
                .place_order(user.id, &product_url, &file_id)
                .await
            {
                Ok(order_id) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!(
                                "✅ Zakaz #{order_id} qabul qilindi!\nTasdiqlangach balansingizga {} qo'shiladi.",
                                format_som(state.order_service.reward())
                            ),
                        )
                        .reply_markup(main_menu())
                        .await;

                    let review = format!(
                        "🆕 Yangi zakaz #{order_id}\n👤 {}\n🔗 {}",
                        escape_html(&user.display_name()),
                        escape_html(&product_url)
                    );
                    notify_admins(bot, state, &review, Some(order_review_keyboard(order_id))).await;
                }
                Err(e) => {
                    error!(tg_id, "failed to place order: {e:#}");
                    let _ = bot
                        .send_message(msg.chat.id, "❌ Zakazni saqlashda xato, qayta urinib ko'ring.")
                        .await;
                }
            }
        }

        PendingInput::WithdrawWallet { method } => {
            let wallet = msg.text().unwrap_or_default().trim().to_string();
            if wallet.len() < 4 {
                state
                    .set_pending(tg_id, PendingInput::WithdrawWallet { method })
                    .await;
                let _ = bot
                    .send_message(msg.chat.id, "❌ Rekvizit noto'g'ri, qayta kiriting.")
                    .await;
                return Ok(());
            }
            state
                .set_pending(tg_id, PendingInput::WithdrawAmount { method, wallet })
                .await;
            let _ = bot
                .send_message(
                    msg.chat.id,
                    format!(
                        "💸 Yechmoqchi bo'lgan summani kiriting (minimal {}):",
                        format_som(state.withdraw_service.min_amount())
                    ),
                )
                .reply_markup(ForceReply::new().selective())
                .await;
        }

        PendingInput::WithdrawAmount { method, wallet } => {
            let Some(amount) = msg.text().and_then(parse_amount) else {
                state
                    .set_pending(tg_id, PendingInput::WithdrawAmount { method, wallet })
                    .await;
                let _ = bot
                    .send_message(msg.chat.id, "❌ Noto'g'ri summa! Faqat raqam kiriting.")
                    .await;
                return Ok(());
            };

            let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await else {
                let _ = bot.send_message(msg.chat.id, "Avval /start bosing.").await;
                return Ok(());
            };

            match state
                .withdraw_service
                .request(user.id, amount, &wallet, method)
                .await
            {
                Ok(WithdrawOutcome::Created { withdraw_id }) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!(
                                "✅ So'rov #{withdraw_id} yuborildi!\n💰 Summa: {}\n📊 Holat: kutilmoqda",
                                format_som(amount)
                            ),
                        )
                        .reply_markup(main_menu())
                        .await;

                    let review = format!(
                        "💸 Yangi pul yechish so'rovi #{withdraw_id}\n👤 {}\n💰 {}\n📍 {} ({})",
                        escape_html(&user.display_name()),
                        format_som(amount),
                        escape_html(&wallet),
                        method.as_str()
                    );
                    notify_admins(
                        bot,
                        state,
                        &review,
                        Some(withdraw_review_keyboard(withdraw_id)),
                    )
                    .await;
                }
                Ok(WithdrawOutcome::BelowMinimum { minimum }) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!("❌ Minimal yechish summasi {}!", format_som(minimum)),
                        )
                        .await;
                }
                Ok(WithdrawOutcome::Insufficient { balance }) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!(
                                "❌ Balansingiz yetarli emas! Joriy balans: {}",
                                format_som(balance)
                            ),
                        )
                        .await;
                }
                Err(e) => {
                    error!(tg_id, "withdraw request failed: {e:#}");
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            "❌ Xato yuz berdi, birozdan so'ng qayta urinib ko'ring.",
                        )
                        .await;
                }
            }
        }

        PendingInput::SupportMessage => {
            let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await else {
                let _ = bot.send_message(msg.chat.id, "Avval /start bosing.").await;
                return Ok(());
            };

            let text = msg.text().or_else(|| msg.caption());
            let (file_id, file_type) = match msg.photo().and_then(|s| s.last()) {
                Some(p) => (Some(p.file.id.to_string()), Some("photo")),
                None => (None, None),
            };

            match state
                .support_service
                .open_ticket(user.id, text, file_id.as_deref(), file_type)
                .await
            {
                Ok(ticket_id) => {
                    let _ = bot
                        .send_message(msg.chat.id, "✅ Xabaringiz adminlarga yuborildi.")
                        .reply_markup(main_menu())
                        .await;
                    let note = format!(
                        "🆘 Yangi murojaat\n🆔 <code>{ticket_id}</code>\n👤 {}\n💬 {}\n\nJavob berish: /reply {ticket_id} matn",
                        escape_html(&user.display_name()),
                        escape_html(text.unwrap_or("(rasm)"))
                    );
                    notify_admins(bot, state, &note, None).await;
                }
                Err(e) => {
                    error!(tg_id, "failed to store support ticket: {e:#}");
                    let _ = bot.send_message(msg.chat.id, "❌ Xato yuz berdi.").await;
                }
            }
        }
    }

    Ok(())
}

async fn show_balance(bot: &Bot, msg: &Message, state: &AppState, tg_id: i64) {
    let balance = state.ledger_service.balance_of_tg(tg_id).await.unwrap_or(0);
    let mut text = format!("💰 Sizning balansingiz: <b>{}</b>", format_som(balance));

    if let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await {
        let history = state
            .withdraw_service
            .history_of(user.id)
            .await
            .unwrap_or_default();
        if !history.is_empty() {
            text.push_str("\n\n📜 So'nggi so'rovlar:");
            for req in history.iter().take(5) {
                let mark = match req.status() {
                    WithdrawStatus::Approved => "✅",
                    WithdrawStatus::Rejected => "❌",
                    WithdrawStatus::Pending => "⏳",
                };
                text.push_str(&format!("\n{mark} #{} {}", req.id, format_som(req.amount)));
            }
        }
    }

    let _ = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await;
}

async fn show_my_orders(bot: &Bot, msg: &Message, state: &AppState, tg_id: i64) {
    let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await else {
        let _ = bot.send_message(msg.chat.id, "Avval /start bosing.").await;
        return;
    };

    let orders = match state.order_service.orders_of(user.id).await {
        Ok(o) => o,
        Err(e) => {
            error!(tg_id, "failed to fetch orders: {e:#}");
            return;
        }
    };

    if orders.is_empty() {
        let _ = bot
            .send_message(msg.chat.id, "📦 Sizda hali zakazlar yo'q.")
            .await;
        return;
    }

    for order in orders.iter().take(10) {
        let status_line = match order.status() {
            OrderStatus::Approved => "✅ Tasdiqlangan",
            OrderStatus::Rejected => "❌ Rad etilgan",
            OrderStatus::Pending => "⏳ Kutilmoqda",
        };
        let text = format!(
            "📦 Zakaz #{}\n🔗 {}\n📊 {status_line}",
            order.id,
            escape_html(order.product_url.as_deref().unwrap_or("-"))
        );
        let mut req = bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html);
        if order.status() == OrderStatus::Pending {
            req = req.reply_markup(keyboards::cancel_order_keyboard(order.id));
        }
        let _ = req.await;
    }
}

async fn show_referral_stats(bot: &Bot, msg: &Message, state: &AppState, tg_id: i64) {
    let Ok(Some(user)) = state.ledger_service.resolve_user(tg_id).await else {
        let _ = bot.send_message(msg.chat.id, "Avval /start bosing.").await;
        return;
    };

    let stats = match state.referral_service.stats_of(user.id).await {
        Ok(s) => s,
        Err(e) => {
            error!(tg_id, "failed to fetch referral stats: {e:#}");
            return;
        }
    };

    // Stored by the dispatcher at startup.
    let bot_username = state.settings.get_text_or("bot_username", "").await;
    let ref_link = format!("https://t.me/{bot_username}?start=ref_{tg_id}");

    let mut text = format!(
        "<b>👥 Referral statistikangiz:</b>\n\n📊 Jami referallar: {} ta\n💸 Jami bonus: {}\n🔗 Havolangiz: {ref_link}\n",
        stats.count,
        format_som(stats.total_bonus)
    );
    if stats.list.is_empty() {
        text.push_str("\nDo'stlaringizni taklif qiling va bonus oling!");
    }

    let _ = bot
        .send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(referral_keyboard())
        .await;
}

async fn handle_admin_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    text: &str,
) -> Result<(), teloxide::RequestError> {
    let mut parts = text.split_whitespace();
    let command = parts.next().unwrap_or_default();

    match command {
        "/stats" => match state.admin_service.stats().await {
            Ok(stats) => {
                let _ = bot
                    .send_message(
                        msg.chat.id,
                        format!(
                            "📊 <b>Statistika</b>\n\n👥 Foydalanuvchilar: {}\n🚫 Bloklangan: {}\n📦 Bugungi zakazlar: {}\n💸 Kutilayotgan so'rovlar: {}\n🎁 Jami referral bonus: {}",
                            stats.total_users,
                            stats.blocked_users,
                            stats.today_orders,
                            stats.pending_withdraws,
                            format_som(stats.total_referral_bonus)
                        ),
                    )
                    .parse_mode(ParseMode::Html)
                    .await;
            }
            Err(e) => error!("failed to build stats: {e:#}"),
        },

        "/orders" => {
            let pending = state.order_service.pending().await.unwrap_or_default();
            if pending.is_empty() {
                let _ = bot
                    .send_message(msg.chat.id, "Kutilayotgan zakazlar yo'q.")
                    .await;
            }
            for order in pending.iter().take(20) {
                let text = format!(
                    "📦 Zakaz #{}\n👤 {}\n🔗 {}",
                    order.id,
                    escape_html(order.username.as_deref().unwrap_or("-")),
                    escape_html(order.product_url.as_deref().unwrap_or("-"))
                );
                let _ = bot
                    .send_message(msg.chat.id, text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(order_review_keyboard(order.id))
                    .await;
            }
        }

        "/withdraws" => {
            let pending = state.withdraw_service.pending().await.unwrap_or_default();
            if pending.is_empty() {
                let _ = bot
                    .send_message(msg.chat.id, "Kutilayotgan so'rovlar yo'q.")
                    .await;
            }
            for req in pending.iter().take(20) {
                let text = format!(
                    "💸 So'rov #{}\n👤 {}\n💰 {}\n📍 {} ({})",
                    req.id,
                    escape_html(req.username.as_deref().unwrap_or("-")),
                    format_som(req.amount),
                    escape_html(&req.wallet),
                    req.method
                );
                let _ = bot
                    .send_message(msg.chat.id, text)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(withdraw_review_keyboard(req.id))
                    .await;
            }
        }

        "/block" | "/unblock" => {
            let blocked = command == "/block";
            let Some(target) = parts.next().and_then(|s| s.parse::<i64>().ok()) else {
                let _ = bot
                    .send_message(msg.chat.id, format!("Foydalanish: {command} <tg_id>"))
                    .await;
                return Ok(());
            };
            match state.admin_service.set_blocked_by_tg_id(target, blocked).await {
                Ok(true) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!(
                                "{} {target}",
                                if blocked { "🚫 Bloklandi:" } else { "✅ Blokdan chiqarildi:" }
                            ),
                        )
                        .await;
                }
                Ok(false) => {
                    let _ = bot
                        .send_message(msg.chat.id, "Bunday foydalanuvchi topilmadi.")
                        .await;
                }
                Err(e) => error!("block/unblock failed: {e:#}"),
            }
        }

        "/reply" => {
            let ticket_id = parts.next().unwrap_or_default();
            let reply_text = text
                .splitn(3, char::is_whitespace)
                .nth(2)
                .unwrap_or_default()
                .trim();
            if ticket_id.is_empty() || reply_text.is_empty() {
                let _ = bot
                    .send_message(msg.chat.id, "Foydalanish: /reply <ticket_id> <matn>")
                    .await;
                return Ok(());
            }

            match state.support_service.reply(ticket_id, reply_text).await {
                Ok(Some(owner_tg_id)) => {
                    let _ = bot
                        .send_message(
                            ChatId(owner_tg_id),
                            format!("📨 Adminlardan javob:\n\n{reply_text}"),
                        )
                        .await;
                    let _ = bot.send_message(msg.chat.id, "✅ Javob yuborildi.").await;
                }
                Ok(None) => {
                    let _ = bot
                        .send_message(msg.chat.id, "Bunday murojaat topilmadi.")
                        .await;
                }
                Err(e) => error!("support reply failed: {e:#}"),
            }
        }

        "/addbalance" => {
            let target = parts.next().and_then(|s| s.parse::<i64>().ok());
            let delta = parts.next().and_then(|s| s.parse::<i64>().ok());
            let (Some(target), Some(delta)) = (target, delta) else {
                let _ = bot
                    .send_message(msg.chat.id, "Foydalanish: /addbalance <tg_id> <summa>")
                    .await;
                return Ok(());
            };
            match state.ledger_service.adjust_by_tg_id(target, delta).await {
                Ok(new_balance) => {
                    let _ = bot
                        .send_message(
                            msg.chat.id,
                            format!("✅ Yangi balans: {}", format_som(new_balance)),
                        )
                        .await;
                }
                Err(e) => {
                    let _ = bot
                        .send_message(msg.chat.id, format!("❌ {e}"))
                        .await;
                }
            }
        }

        _ => {
            let _ = bot
                .send_message(
                    msg.chat.id,
                    "Admin buyruqlari: /stats, /orders, /withdraws, /block, /unblock, /addbalance, /reply",
                )
                .await;
        }
    }

    Ok(())
}

/// Fire-and-forget fan-out to every admin chat. Send failures are logged
/// and never bubble up.
async fn notify_admins(
    bot: &Bot,
    state: &AppState,
    text: &str,
    keyboard: Option<teloxide::types::InlineKeyboardMarkup>,
) {
    for admin_id in state.admin_service.admin_tg_ids().await {
        let mut req = bot
            .send_message(ChatId(admin_id), text.to_string())
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard.clone() {
            req = req.reply_markup(kb);
        }
        if let Err(e) = req.await {
            warn!(admin_id, "failed to notify admin: {e}");
        }
    }
}
