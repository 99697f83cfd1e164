use anyhow::Result;
use uuid::Uuid;
use zakazbot_db::repositories::{SupportRepository, UserRepository};

#[derive(Clone)]
pub struct SupportService {
    repo: SupportRepository,
    users: UserRepository,
}

impl SupportService {
    pub fn new(repo: SupportRepository, users: UserRepository) -> Self {
        Self { repo, users }
    }

    /// Stores a user's support message under a fresh ticket id and returns
    /// the id for admin correlation.
    pub async fn open_ticket(
        &self,
        user_id: i64,
        text: Option<&str>,
        file_id: Option<&str>,
        file_type: Option<&str>,
    ) -> Result<String> {
        let ticket_id = Uuid::new_v4().to_string();
        self.repo
            .insert(&ticket_id, user_id, text, file_id, file_type)
            .await?;
        Ok(ticket_id)
    }

    /// Stores the admin's reply on the ticket and returns the author's
    /// Telegram id for the post-commit notification. None when the ticket
    /// is unknown.
    pub async fn reply(&self, ticket_id: &str, reply_text: &str) -> Result<Option<i64>> {
        let Some(msg) = self.repo.get_by_ticket(ticket_id).await? else {
            return Ok(None);
        };
        self.repo.set_reply(ticket_id, reply_text).await?;
        Ok(self
            .users
            .get_by_id(msg.user_id)
            .await?
            .map(|user| user.tg_id))
    }
}
