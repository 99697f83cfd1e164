use anyhow::Result;
use zakazbot_db::LedgerError;
use zakazbot_db::models::Order;
use zakazbot_db::repositories::order_repo::OrderWithUser;
use zakazbot_db::repositories::{OrderRepository, UserRepository};

/// What the handler needs to message the affected user after a decision
/// committed. Notifications never happen inside the transaction.
#[derive(Debug, Clone)]
pub struct OrderDecision {
    pub order_id: i64,
    pub owner_tg_id: Option<i64>,
    pub new_balance: i64,
}

#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    users: UserRepository,
    reward: i64,
}

impl OrderService {
    pub fn new(orders: OrderRepository, users: UserRepository, reward: i64) -> Self {
        Self {
            orders,
            users,
            reward,
        }
    }

    pub fn reward(&self) -> i64 {
        self.reward
    }

    pub async fn place_order(
        &self,
        user_id: i64,
        product_url: &str,
        screenshot_file_id: &str,
    ) -> Result<i64> {
        self.orders
            .create(user_id, product_url, screenshot_file_id)
            .await
    }

    /// Approves and credits the configured reward exactly once, then
    /// resolves the owner's chat id for the post-commit notification.
    pub async fn approve(&self, order_id: i64) -> Result<OrderDecision, LedgerError> {
        let owner_id = self.orders.approve(order_id, self.reward).await?;
        Ok(self.decision(order_id, owner_id).await)
    }

    pub async fn reject(&self, order_id: i64) -> Result<OrderDecision, LedgerError> {
        let owner_id = self.orders.reject(order_id).await?;
        Ok(self.decision(order_id, owner_id).await)
    }

    async fn decision(&self, order_id: i64, owner_id: i64) -> OrderDecision {
        let (owner_tg_id, new_balance) = match self.users.get_by_id(owner_id).await {
            Ok(Some(user)) => (Some(user.tg_id), user.balance),
            _ => (None, 0),
        };
        OrderDecision {
            order_id,
            owner_tg_id,
            new_balance,
        }
    }

    /// Silently-safe: false when the order is not the caller's or already
    /// decided.
    pub async fn cancel(&self, user_id: i64, order_id: i64) -> Result<bool> {
        self.orders.cancel(user_id, order_id).await
    }

    pub async fn orders_of(&self, user_id: i64) -> Result<Vec<Order>> {
        self.orders.get_by_user(user_id).await
    }

    pub async fn pending(&self) -> Result<Vec<OrderWithUser>> {
        self.orders.get_pending().await
    }
}
