use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, ChatId, ForceReply};
use tracing::{error, info};
use zakazbot_db::LedgerError;
use zakazbot_db::models::WithdrawMethod;

use crate::bot::utils::{callback_id_suffix, format_som};
use crate::state::{AppState, PendingInput};

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let tg_id = q.from.id.0 as i64;

    if state.ledger_service.is_blocked_tg(tg_id).await {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    }

    let Some(data) = q.data else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    match data.as_str() {
        "withdraw_method_card" | "withdraw_method_phone" => {
            let method = if data.ends_with("card") {
                WithdrawMethod::Card
            } else {
                WithdrawMethod::Phone
            };
            let _ = bot.answer_callback_query(callback_id).await;

            state
                .set_pending(tg_id, PendingInput::WithdrawWallet { method })
                .await;
            let prompt = match method {
                WithdrawMethod::Card => "💳 Karta raqamini kiriting:",
                WithdrawMethod::Phone => "📱 Telefon raqamini kiriting:",
            };
            if let Some(msg) = q.message {
                let _ = bot
                    .send_message(msg.chat().id, prompt)
                    .reply_markup(ForceReply::new().selective())
                    .await;
            }
        }

        "referral_info" => {
            let bonus = state.referral_service.bonus();
            let _ = bot
                .answer_callback_query(callback_id)
                .text(format!(
                    "Har bir taklif qilingan do'st uchun {} olasiz!",
                    format_som(bonus)
                ))
                .show_alert(true)
                .await;
        }

        cancel if cancel.starts_with("cancel_order_") => {
            let Some(order_id) = callback_id_suffix(cancel, "cancel_order_") else {
                let _ = bot.answer_callback_query(callback_id).await;
                return Ok(());
            };

            let user = match state.ledger_service.resolve_user(tg_id).await {
                Ok(Some(u)) => u,
                _ => {
                    let _ = bot.answer_callback_query(callback_id).await;
                    return Ok(());
                }
            };

            match state.order_service.cancel(user.id, order_id).await {
                Ok(true) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Zakaz bekor qilindi.")
                        .await;
                    if let Some(msg) = q.message {
                        let _ = bot
                            .edit_message_text(
                                msg.chat().id,
                                msg.id(),
                                format!("📦 Zakaz #{order_id}\n❌ Bekor qilingan"),
                            )
                            .await;
                    }
                }
                Ok(false) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Bu zakazni bekor qilib bo'lmaydi.")
                        .show_alert(true)
                        .await;
                }
                Err(e) => {
                    error!(order_id, "order cancel failed: {e:#}");
                    let _ = bot.answer_callback_query(callback_id).await;
                }
            }
        }

        decision
            if decision.starts_with("approve_order_") || decision.starts_with("reject_order_") =>
        {
            if !state.admin_service.is_admin(tg_id).await {
                let _ = bot.answer_callback_query(callback_id).await;
                return Ok(());
            }
            let approve = decision.starts_with("approve_order_");
            let prefix = if approve { "approve_order_" } else { "reject_order_" };
            let Some(order_id) = callback_id_suffix(decision, prefix) else {
                let _ = bot.answer_callback_query(callback_id).await;
                return Ok(());
            };

            let result = if approve {
                state.order_service.approve(order_id).await
            } else {
                state.order_service.reject(order_id).await
            };

            match result {
                Ok(outcome) => {
                    let status_line = if approve { "✅ Tasdiqlandi" } else { "❌ Rad etildi" };
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(status_line)
                        .await;
                    if let Some(msg) = q.message {
                        let _ = bot
                            .edit_message_text(
                                msg.chat().id,
                                msg.id(),
                                format!("📦 Zakaz #{order_id}\n{status_line}"),
                            )
                            .await;
                    }

                    // The decision is committed; messaging the owner is
                    // best effort.
                    if let Some(owner_tg_id) = outcome.owner_tg_id {
                        let note = if approve {
                            format!(
                                "✅ Zakaz #{order_id} tasdiqlandi!\n💰 Balansingiz: {}",
                                format_som(outcome.new_balance)
                            )
                        } else {
                            format!("❌ Zakaz #{order_id} rad etildi.")
                        };
                        if let Err(e) = bot.send_message(ChatId(owner_tg_id), note).await {
                            error!(owner_tg_id, "failed to notify order owner: {e}");
                        }
                    }
                }
                Err(LedgerError::InvalidTransition { status, .. }) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(format!("Allaqachon ko'rib chiqilgan ({status})."))
                        .show_alert(true)
                        .await;
                }
                Err(e) => {
                    error!(order_id, "order decision failed: {e}");
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Xato yuz berdi.")
                        .await;
                }
            }
        }

        decision
            if decision.starts_with("approve_withdraw_")
                || decision.starts_with("reject_withdraw_") =>
        {
            if !state.admin_service.is_admin(tg_id).await {
                let _ = bot.answer_callback_query(callback_id).await;
                return Ok(());
            }
            let approve = decision.starts_with("approve_withdraw_");
            let prefix = if approve { "approve_withdraw_" } else { "reject_withdraw_" };
            let Some(withdraw_id) = callback_id_suffix(decision, prefix) else {
                let _ = bot.answer_callback_query(callback_id).await;
                return Ok(());
            };

            let result = if approve {
                state.withdraw_service.approve(withdraw_id).await
            } else {
                state.withdraw_service.reject(withdraw_id).await
            };

            match result {
                Ok(outcome) => {
                    let status_line = if approve {
                        "✅ To'lov amalga oshirildi"
                    } else {
                        "❌ Rad etildi, mablag' qaytarildi"
                    };
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(status_line)
                        .await;
                    if let Some(msg) = q.message {
                        let _ = bot
                            .edit_message_text(
                                msg.chat().id,
                                msg.id(),
                                format!(
                                    "💸 So'rov #{withdraw_id} ({})\n{status_line}",
                                    format_som(outcome.amount)
                                ),
                            )
                            .await;
                    }

                    if let Some(owner_tg_id) = outcome.owner_tg_id {
                        let note = if approve {
                            format!(
                                "✅ So'rov #{withdraw_id} tasdiqlandi!\n💰 {} tez orada o'tkaziladi.",
                                format_som(outcome.amount)
                            )
                        } else {
                            format!(
                                "❌ So'rov #{withdraw_id} rad etildi.\n💰 {} balansingizga qaytarildi. Joriy balans: {}",
                                format_som(outcome.amount),
                                format_som(outcome.new_balance)
                            )
                        };
                        if let Err(e) = bot.send_message(ChatId(owner_tg_id), note).await {
                            error!(owner_tg_id, "failed to notify withdraw owner: {e}");
                        }
                    }
                }
                Err(LedgerError::InvalidTransition { status, .. }) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(format!("Allaqachon ko'rib chiqilgan ({status})."))
                        .show_alert(true)
                        .await;
                }
                Err(e) => {
                    error!(withdraw_id, "withdraw decision failed: {e}");
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Xato yuz berdi.")
                        .await;
                }
            }
        }

        other => {
            info!("Unhandled callback data: {other}");
            let _ = bot.answer_callback_query(callback_id).await;
        }
    }

    Ok(())
}
