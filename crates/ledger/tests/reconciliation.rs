//! Integration tests for the reconciliation pipeline
//!
//! Exercise the ledger against a real Postgres: idempotent application,
//! subscription transitions, the at-most-one-active invariant, and manual
//! channel decisions.
//!
//! ## Running Tests
//! ```bash
//! export DATABASE_URL="postgres://localhost/clipforge_test"
//! cargo test --test reconciliation -- --ignored --test-threads=1
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use clipforge_ledger::{
    LedgerError, LedgerOutcome, ManualDecision, ManualLedger, ManualOutcome,
    OrderCaptureConfig, PaymentEvent, PaymentOutcome, ReconcileConfig, ReconcileService,
    RedirectLocalConfig, SubscriptionLedger,
};
use clipforge_shared::{PaymentProvider, PlanTier, SubscriptionStatus};
use sqlx::PgPool;
use uuid::Uuid;

async fn setup_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn success_event(user_id: Uuid, txn_id: &str, tier: PlanTier) -> PaymentEvent {
    PaymentEvent {
        provider: PaymentProvider::CardWallet,
        external_txn_id: txn_id.to_string(),
        user_id,
        tier,
        amount_minor_units: 2999,
        currency: "USD".to_string(),
        outcome: PaymentOutcome::Succeeded,
        raw_metadata: serde_json::json!({}),
    }
}

async fn active_subscription_count(pool: &PgPool, user_id: Uuid) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM subscriptions WHERE user_id = $1 AND status = 'active'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count query failed");
    count
}

#[tokio::test]
#[ignore] // Requires database
async fn test_success_event_grants_thirty_day_subscription() {
    let pool = setup_pool().await;
    let ledger = SubscriptionLedger::new(pool.clone());
    let user_id = Uuid::new_v4();

    let outcome = ledger
        .apply_payment_event(&success_event(user_id, "pi_grant_1", PlanTier::Standard))
        .await
        .expect("apply failed");

    let LedgerOutcome::Granted(subscription) = outcome else {
        panic!("expected Granted");
    };
    assert_eq!(subscription.user_id, user_id);
    assert_eq!(subscription.tier, PlanTier::Standard);
    assert_eq!(subscription.status, SubscriptionStatus::Active);
    let period = subscription.period_end - subscription.period_start;
    assert_eq!(period.whole_days(), 30);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_redelivery_is_suppressed() {
    let pool = setup_pool().await;
    let ledger = SubscriptionLedger::new(pool.clone());
    let user_id = Uuid::new_v4();
    let event = success_event(user_id, "pi_redelivered", PlanTier::Basic);

    let first = ledger.apply_payment_event(&event).await.expect("first apply");
    assert!(matches!(first, LedgerOutcome::Granted(_)));

    for _ in 0..3 {
        let again = ledger.apply_payment_event(&event).await.expect("redelivery");
        let LedgerOutcome::AlreadyApplied(Some(existing)) = again else {
            panic!("expected AlreadyApplied with the original subscription");
        };
        assert_eq!(existing.tier, PlanTier::Basic);
    }

    assert_eq!(active_subscription_count(&pool, user_id).await, 1);
    let (records,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payment_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(records, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_upgrade_cancels_previous_subscription() {
    let pool = setup_pool().await;
    let ledger = SubscriptionLedger::new(pool.clone());
    let user_id = Uuid::new_v4();

    ledger
        .apply_payment_event(&success_event(user_id, "pi_up_1", PlanTier::Basic))
        .await
        .expect("first grant");
    let outcome = ledger
        .apply_payment_event(&success_event(user_id, "pi_up_2", PlanTier::Premium))
        .await
        .expect("second grant");

    let LedgerOutcome::Granted(subscription) = outcome else {
        panic!("expected Granted");
    };
    assert_eq!(subscription.tier, PlanTier::Premium);
    assert_eq!(active_subscription_count(&pool, user_id).await, 1);

    let active = ledger
        .get_active_subscription(user_id)
        .await
        .expect("query")
        .expect("active subscription");
    assert_eq!(active.tier, PlanTier::Premium);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_failed_event_records_without_granting() {
    let pool = setup_pool().await;
    let ledger = SubscriptionLedger::new(pool.clone());
    let user_id = Uuid::new_v4();

    let mut event = success_event(user_id, "pi_fail_1", PlanTier::Standard);
    event.outcome = PaymentOutcome::Failed;

    let outcome = ledger.apply_payment_event(&event).await.expect("apply");
    assert!(matches!(outcome, LedgerOutcome::FailureRecorded));
    assert_eq!(active_subscription_count(&pool, user_id).await, 0);

    let (status,): (String,) = sqlx::query_as(
        "SELECT status::text FROM payment_records WHERE user_id = $1 AND external_txn_id = $2",
    )
    .bind(user_id)
    .bind("pi_fail_1")
    .fetch_one(&pool)
    .await
    .expect("record lookup");
    assert_eq!(status, "rejected");
}

#[tokio::test]
#[ignore] // Requires database
async fn test_same_txn_id_different_providers_both_apply() {
    let pool = setup_pool().await;
    let ledger = SubscriptionLedger::new(pool.clone());
    let user_id = Uuid::new_v4();

    let card = success_event(user_id, "shared_txn_id", PlanTier::Basic);
    let mut redirect = success_event(user_id, "shared_txn_id", PlanTier::Standard);
    redirect.provider = PaymentProvider::RedirectLocal;

    assert!(matches!(
        ledger.apply_payment_event(&card).await.expect("card"),
        LedgerOutcome::Granted(_)
    ));
    // Dedup key is (provider, external_txn_id), not the id alone
    assert!(matches!(
        ledger.apply_payment_event(&redirect).await.expect("redirect"),
        LedgerOutcome::Granted(_)
    ));
    assert_eq!(active_subscription_count(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_concurrent_events_leave_one_active() {
    let pool = setup_pool().await;
    let user_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for i in 0..8 {
        let ledger = SubscriptionLedger::new(pool.clone());
        let event = success_event(user_id, &format!("pi_conc_{}", i), PlanTier::Premium);
        handles.push(tokio::spawn(async move {
            ledger.apply_payment_event(&event).await
        }));
    }
    for handle in handles {
        handle.await.expect("task").expect("apply");
    }

    assert_eq!(active_subscription_count(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_identical_event_applied_concurrently_grants_once() {
    let pool = setup_pool().await;
    let user_id = Uuid::new_v4();
    let event = success_event(user_id, "pi_conc_same", PlanTier::Standard);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = SubscriptionLedger::new(pool.clone());
        let event = event.clone();
        handles.push(tokio::spawn(async move {
            ledger.apply_payment_event(&event).await
        }));
    }

    let mut grants = 0;
    for handle in handles {
        match handle.await.expect("task").expect("apply") {
            LedgerOutcome::Granted(_) => grants += 1,
            LedgerOutcome::AlreadyApplied(_) => {}
            LedgerOutcome::FailureRecorded => panic!("unexpected failure outcome"),
        }
    }

    // Exactly one racer wins the dedup claim; the rest see a duplicate
    assert_eq!(grants, 1);
    assert_eq!(active_subscription_count(&pool, user_id).await, 1);
    let (records,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payment_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(records, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_manual_receipt_decided_exactly_once() {
    let pool = setup_pool().await;
    let manual = ManualLedger::new(pool.clone());
    let user_id = Uuid::new_v4();
    let staff_id = Uuid::new_v4();

    let record = manual
        .record_receipt(user_id, 1499, "usd", PlanTier::Standard, "bank transfer ref 8812")
        .await
        .expect("record receipt");
    assert_eq!(record.currency, "USD");

    let first = manual
        .decide(record.id, ManualDecision::Approve, staff_id)
        .await
        .expect("first decision");
    let ManualOutcome::Approved(subscription) = first else {
        panic!("expected Approved");
    };
    assert_eq!(subscription.tier, PlanTier::Standard);

    // A second decision, even a contradictory one, must not mutate anything
    let second = manual
        .decide(record.id, ManualDecision::Reject, staff_id)
        .await
        .expect("second decision");
    assert!(matches!(second, ManualOutcome::AlreadyDecided(_)));
    assert_eq!(active_subscription_count(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_manual_reject_grants_nothing() {
    let pool = setup_pool().await;
    let manual = ManualLedger::new(pool.clone());
    let user_id = Uuid::new_v4();

    let record = manual
        .record_receipt(user_id, 999, "usd", PlanTier::Basic, "bank transfer ref 8813")
        .await
        .expect("record receipt");
    let outcome = manual
        .decide(record.id, ManualDecision::Reject, Uuid::new_v4())
        .await
        .expect("decision");
    assert!(matches!(outcome, ManualOutcome::Rejected));
    assert_eq!(active_subscription_count(&pool, user_id).await, 0);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_tampered_webhook_creates_no_rows() {
    let pool = setup_pool().await;
    let service = ReconcileService::new(
        ReconcileConfig {
            card_wallet_webhook_secret: "whsec_integration_secret".to_string(),
            order_capture: OrderCaptureConfig {
                api_base: "https://api.example.test".to_string(),
                client_id: "cid".to_string(),
                client_secret: "csecret".to_string(),
            },
            redirect_local: RedirectLocalConfig {
                api_base: "https://pay.example.test".to_string(),
                api_key: "rl_key".to_string(),
                webhook_secret: "rl_secret".to_string(),
            },
        },
        pool.clone(),
    );

    let user_id = Uuid::new_v4();
    let body = serde_json::json!({
        "id": "evt_forged",
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": "pi_forged",
                "amount": 2999,
                "currency": "usd",
                "metadata": { "user_id": user_id.to_string(), "plan_code": "premium" }
            }
        }
    })
    .to_string();

    // Signed with the wrong secret
    let result = service
        .handle_card_wallet_webhook(body.as_bytes(), "t=0,v1=deadbeef")
        .await;
    assert!(matches!(result, Err(LedgerError::AuthenticationFailure)));

    assert_eq!(active_subscription_count(&pool, user_id).await, 0);
    let (records,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payment_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .expect("count");
    assert_eq!(records, 0);
}

#[tokio::test]
#[ignore] // Requires database
async fn test_decide_unknown_record_is_not_found() {
    let pool = setup_pool().await;
    let manual = ManualLedger::new(pool);
    let result = manual
        .decide(Uuid::new_v4(), ManualDecision::Approve, Uuid::new_v4())
        .await;
    assert!(matches!(
        result,
        Err(clipforge_ledger::LedgerError::RecordNotFound(_))
    ));
}
