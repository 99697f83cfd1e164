use anyhow::Result;
use tracing::info;
use zakazbot_db::models::{ReferralStats, User};
use zakazbot_db::repositories::{ReferralRepository, UserRepository};

/// Post-commit notification payload: who earned what.
#[derive(Debug, Clone)]
pub struct ReferralCredit {
    pub referrer_tg_id: i64,
    pub bonus: i64,
}

#[derive(Clone)]
pub struct ReferralService {
    referrals: ReferralRepository,
    users: UserRepository,
    signup_bonus: i64,
}

impl ReferralService {
    pub fn new(referrals: ReferralRepository, users: UserRepository, signup_bonus: i64) -> Self {
        Self {
            referrals,
            users,
            signup_bonus,
        }
    }

    /// Handles a `/start ref_<tg_id>` deep link: registers the user, then
    /// lets `ReferralRepository::record` establish the referrer link and
    /// credit the signup bonus in one transaction. Returns the upserted
    /// user plus, when a bonus was actually credited, the payload for
    /// notifying the referrer.
    ///
    /// Duplicate starts, self-referrals and cycle-closing links all come
    /// back as `None`: the user signs up normally, nobody is linked or
    /// credited.
    pub async fn register_with_referrer(
        &self,
        tg_id: i64,
        username: Option<&str>,
        referrer_tg_id: i64,
    ) -> Result<(User, Option<ReferralCredit>)> {
        let referrer = self.users.get_by_tg_id(referrer_tg_id).await?;
        let Some(referrer) = referrer else {
            // Dead link: referrer unknown, plain signup.
            let user = self.users.upsert(tg_id, username).await?;
            return Ok((user, None));
        };

        let user = self.users.upsert(tg_id, username).await?;

        let credited = self
            .referrals
            .record(referrer.id, user.id, self.signup_bonus, 1)
            .await?;

        if credited && self.signup_bonus > 0 {
            info!(
                referrer_tg_id,
                referred_tg_id = tg_id,
                bonus = self.signup_bonus,
                "referral signup bonus credited"
            );
            Ok((
                user,
                Some(ReferralCredit {
                    referrer_tg_id,
                    bonus: self.signup_bonus,
                }),
            ))
        } else {
            Ok((user, None))
        }
    }

    pub fn bonus(&self) -> i64 {
        self.signup_bonus
    }

    pub async fn stats_of(&self, user_id: i64) -> Result<ReferralStats> {
        self.referrals.stats(user_id).await
    }
}
