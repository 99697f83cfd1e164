use std::env;

use anyhow::{Context, Result, bail};

/// Environment-backed configuration, validated once at startup. Runtime
/// overrides (admin list, reward text) live in the settings table and are
/// resolved through `SettingsService` / `AdminService`.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    /// Fallback admin list; the `admin_ids` setting takes precedence.
    pub admin_ids: Vec<i64>,
    /// Fixed credit for an approved order, in so'm.
    pub order_reward: i64,
    /// One-time bonus credited to the referrer on signup, in so'm.
    pub referral_bonus: i64,
    /// Smallest withdrawal the bot accepts, in so'm.
    pub min_withdraw_amount: i64,
    pub proof_channel_username: String,
    pub support_username: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let admin_ids = parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default())?;
        if admin_ids.is_empty() {
            bail!("ADMIN_IDS must contain at least one Telegram id");
        }

        let order_reward = env_i64("ORDER_REWARD", 10_000)?;
        if order_reward < 0 {
            bail!("ORDER_REWARD must be non-negative");
        }

        let referral_bonus = env_i64("REFERRAL_BONUS", 500)?;
        if referral_bonus < 0 {
            bail!("REFERRAL_BONUS must be non-negative");
        }

        let min_withdraw_amount = env_i64("MIN_WITHDRAW_AMOUNT", 1_000)?;
        if min_withdraw_amount < 1 {
            bail!("MIN_WITHDRAW_AMOUNT must be positive");
        }

        let proof_channel_username =
            env::var("PROOF_CHANNEL_USERNAME").unwrap_or_else(|_| "@ProofChannel".to_string());
        let support_username =
            env::var("SUPPORT_USERNAME").unwrap_or_else(|_| "@SupportBot".to_string());
        for handle in [&proof_channel_username, &support_username] {
            if !handle.starts_with('@') {
                bail!("channel handles must start with @, got {handle:?}");
            }
        }

        Ok(Self {
            bot_token,
            database_url,
            admin_ids,
            order_reward,
            referral_bonus,
            min_withdraw_amount,
            proof_channel_username,
            support_username,
        })
    }
}

pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("invalid admin id {s:?}"))
        })
        .collect()
}

fn env_i64(key: &str, default: i64) -> Result<i64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_admin_ids;

    #[test]
    fn parses_comma_list_with_spaces() {
        let ids = parse_admin_ids("1097943646, 6668026635 ,").unwrap();
        assert_eq!(ids, vec![1097943646, 6668026635]);
    }

    #[test]
    fn empty_list_is_ok_here() {
        // Emptiness is rejected at Config level, not by the parser.
        assert!(parse_admin_ids("").unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_admin_ids("123,abc").is_err());
    }
}
