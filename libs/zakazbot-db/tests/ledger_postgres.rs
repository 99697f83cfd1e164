//! Ledger correctness properties against a live PostgreSQL.
//!
//! Ignored by default; run with a scratch database:
//!
//! ```sh
//! ZAKAZBOT_TEST_DATABASE_URL=postgres://localhost/zakazbot_test \
//!     cargo test -p zakazbot-db -- --ignored
//! ```

use sqlx::PgPool;
use zakazbot_db::LedgerError;
use zakazbot_db::models::{WithdrawMethod, WithdrawStatus};
use zakazbot_db::repositories::{
    OrderRepository, ReferralRepository, UserRepository, WithdrawRepository,
};

async fn test_pool() -> PgPool {
    let url = std::env::var("ZAKAZBOT_TEST_DATABASE_URL")
        .expect("ZAKAZBOT_TEST_DATABASE_URL must point at a scratch database");
    zakazbot_db::init_db(&url).await.expect("init test db")
}

/// Each test works on its own fresh user so tests can share a database.
async fn fresh_user(users: &UserRepository, balance: i64) -> i64 {
    // Distinct tg ids across runs and across tests.
    let tg_id = rand_tg_id();
    let user = users.upsert(tg_id, Some("tester")).await.unwrap();
    if balance > 0 {
        users.credit_balance(user.id, balance).await.unwrap();
    }
    user.id
}

fn rand_tg_id() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos() as i64;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    millis * 1_000 + (nanos % 1_000)
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn balance_clamps_instead_of_going_negative() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool);

    let uid = fresh_user(&users, 50).await;
    let new_balance = users.adjust_balance(uid, -10_000).await.unwrap();
    assert_eq!(new_balance, 0);
    assert_eq!(users.balance_of(uid).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn unknown_user_reads_zero_but_cannot_be_adjusted() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool);

    assert_eq!(users.balance_of(-1).await.unwrap(), 0);
    let err = users.adjust_balance(-1, 100).await.unwrap_err();
    assert!(matches!(err, LedgerError::UserNotFound(-1)));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn order_approval_credits_exactly_once() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let orders = OrderRepository::new(pool);

    let uid = fresh_user(&users, 0).await;
    let order_id = orders
        .create(uid, "https://market.example/item/1", "file-abc")
        .await
        .unwrap();

    let owner = orders.approve(order_id, 10_000).await.unwrap();
    assert_eq!(owner, uid);
    assert_eq!(users.balance_of(uid).await.unwrap(), 10_000);

    // Second approval must not double-credit.
    let err = orders.approve(order_id, 10_000).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(users.balance_of(uid).await.unwrap(), 10_000);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn rejected_order_credits_nothing() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let orders = OrderRepository::new(pool);

    let uid = fresh_user(&users, 0).await;
    let order_id = orders
        .create(uid, "https://market.example/item/2", "file-def")
        .await
        .unwrap();

    orders.reject(order_id).await.unwrap();
    assert_eq!(users.balance_of(uid).await.unwrap(), 0);

    // A rejected order cannot be approved afterwards.
    let err = orders.approve(order_id, 10_000).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn cancel_enforces_ownership_and_pending_status() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let orders = OrderRepository::new(pool);

    let owner = fresh_user(&users, 0).await;
    let stranger = fresh_user(&users, 0).await;
    let order_id = orders
        .create(owner, "https://market.example/item/3", "file-ghi")
        .await
        .unwrap();

    // Cross-user cancellation affects zero rows.
    assert!(!orders.cancel(stranger, order_id).await.unwrap());
    let order = orders.get_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "pending");

    assert!(orders.cancel(owner, order_id).await.unwrap());
    let order = orders.get_by_id(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, "rejected");

    // Already decided: second cancel is a no-op, not an error.
    assert!(!orders.cancel(owner, order_id).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn admin_order_list_filters_by_user_and_date() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let orders = OrderRepository::new(pool);

    let a = fresh_user(&users, 0).await;
    let b = fresh_user(&users, 0).await;
    orders
        .create(a, "https://market.example/item/4", "file-jkl")
        .await
        .unwrap();
    orders
        .create(b, "https://market.example/item/5", "file-mno")
        .await
        .unwrap();

    let only_a = orders.get_all_filtered(Some(a), None, None).await.unwrap();
    assert!(!only_a.is_empty());
    assert!(only_a.iter().all(|o| o.user_id == a));

    // Other tests share the table, so assert on membership, not counts.
    let today = chrono::Utc::now().date_naive();
    let todays = orders
        .get_all_filtered(Some(a), Some(today), Some(today))
        .await
        .unwrap();
    assert_eq!(todays.len(), only_a.len());

    let tomorrow = today.succ_opt().unwrap();
    let future = orders
        .get_all_filtered(Some(a), Some(tomorrow), None)
        .await
        .unwrap();
    assert!(future.is_empty());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn withdraw_rejection_round_trip_restores_balance() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let withdraws = WithdrawRepository::new(pool);

    let uid = fresh_user(&users, 1_000).await;
    let wid = withdraws
        .create(uid, 400, "8600123412341234", WithdrawMethod::Card)
        .await
        .unwrap();
    assert_eq!(users.balance_of(uid).await.unwrap(), 600);

    withdraws
        .set_status(wid, WithdrawStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(users.balance_of(uid).await.unwrap(), 1_000);

    // Rejecting again must not refund twice.
    let err = withdraws
        .set_status(wid, WithdrawStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(users.balance_of(uid).await.unwrap(), 1_000);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn withdraw_approval_keeps_funds_reserved() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let withdraws = WithdrawRepository::new(pool);

    let uid = fresh_user(&users, 1_000).await;
    let wid = withdraws
        .create(uid, 700, "+998901234567", WithdrawMethod::Phone)
        .await
        .unwrap();

    withdraws
        .set_status(wid, WithdrawStatus::Approved)
        .await
        .unwrap();
    assert_eq!(users.balance_of(uid).await.unwrap(), 300);

    // Approved is terminal; no late refund path.
    let err = withdraws
        .set_status(wid, WithdrawStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert_eq!(users.balance_of(uid).await.unwrap(), 300);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn concurrent_withdrawals_cannot_overdraw() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let withdraws = WithdrawRepository::new(pool);

    let uid = fresh_user(&users, 100).await;

    // Both requests ask for 60% of the balance; at most one may commit.
    let (a, b) = tokio::join!(
        withdraws.create(uid, 60, "8600111122223333", WithdrawMethod::Card),
        withdraws.create(uid, 60, "8600444455556666", WithdrawMethod::Card),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one debit may win: {a:?} / {b:?}");

    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser.unwrap_err(),
        LedgerError::InsufficientBalance { balance: 40, .. }
    ));
    assert_eq!(users.balance_of(uid).await.unwrap(), 40);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn insufficient_balance_carries_current_balance() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let withdraws = WithdrawRepository::new(pool);

    let uid = fresh_user(&users, 500).await;
    let err = withdraws
        .create(uid, 501, "8600123412341234", WithdrawMethod::Card)
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientBalance { balance, requested } => {
            assert_eq!(balance, 500);
            assert_eq!(requested, 501);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // The failed create must not leave a request row behind.
    assert!(withdraws.get_by_user(uid).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn referral_is_recorded_and_credited_once() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let referrals = ReferralRepository::new(pool);

    let referrer = fresh_user(&users, 0).await;
    let referred = fresh_user(&users, 0).await;

    assert!(referrals.record(referrer, referred, 500, 1).await.unwrap());
    // Duplicate is a no-op, not a second credit.
    assert!(!referrals.record(referrer, referred, 500, 1).await.unwrap());

    assert_eq!(users.balance_of(referrer).await.unwrap(), 500);
    let stats = referrals.stats(referrer).await.unwrap();
    assert_eq!(stats.count, 1);
    assert_eq!(stats.total_bonus, 500);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn record_establishes_the_referrer_link() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let referrals = ReferralRepository::new(pool);

    let referrer = fresh_user(&users, 0).await;
    let referred = fresh_user(&users, 0).await;

    assert!(referrals.record(referrer, referred, 500, 1).await.unwrap());
    let row = users.get_by_id(referred).await.unwrap().unwrap();
    assert_eq!(row.referred_by, Some(referrer));
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn self_and_cyclic_referrals_leave_no_trace() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let referrals = ReferralRepository::new(pool);

    let a = fresh_user(&users, 0).await;
    assert!(!referrals.record(a, a, 500, 1).await.unwrap());

    // b was referred by a; the reverse pair would close a cycle. Neither
    // the bonus nor the referred_by write may land.
    let b = fresh_user(&users, 0).await;
    assert!(referrals.record(a, b, 500, 1).await.unwrap());
    assert!(!referrals.record(b, a, 500, 1).await.unwrap());

    assert_eq!(users.balance_of(b).await.unwrap(), 0);
    let a_row = users.get_by_id(a).await.unwrap().unwrap();
    assert_eq!(a_row.referred_by, None);

    // Same through a longer chain: a <- b <- c, then c referring a.
    let c = fresh_user(&users, 0).await;
    assert!(referrals.record(b, c, 500, 1).await.unwrap());
    assert!(!referrals.record(c, a, 500, 1).await.unwrap());
    let a_row = users.get_by_id(a).await.unwrap().unwrap();
    assert_eq!(a_row.referred_by, None);
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL"]
async fn referred_by_is_first_write_wins() {
    let pool = test_pool().await;
    let users = UserRepository::new(pool.clone());
    let referrals = ReferralRepository::new(pool);

    let first = fresh_user(&users, 0).await;
    let second = fresh_user(&users, 0).await;
    let newbie = fresh_user(&users, 0).await;

    assert!(referrals.record(first, newbie, 500, 1).await.unwrap());
    let row = users.get_by_id(newbie).await.unwrap().unwrap();
    assert_eq!(row.referred_by, Some(first));

    // A later start with a different referrer must not rewrite the link
    // or pay a second bonus.
    assert!(!referrals.record(second, newbie, 500, 1).await.unwrap());
    let row = users.get_by_id(newbie).await.unwrap().unwrap();
    assert_eq!(row.referred_by, Some(first));
    assert_eq!(users.balance_of(second).await.unwrap(), 0);
}
