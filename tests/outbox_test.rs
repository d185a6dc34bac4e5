use affiliate_ledger::api;
use affiliate_ledger::db::init_db;
use affiliate_ledger::domain::{
    AffiliateAccount, AffiliateId, Money, PromoCode, Role, User, UserId,
};
use affiliate_ledger::{CommissionLedger, OutboxProcessor, Repository, WithdrawalLedger};
use axum::http::StatusCode;
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    repo: Arc<Repository>,
    outbox: Arc<OutboxProcessor>,
    _temp: TempDir,
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let commission_ledger = CommissionLedger::new(repo.clone());
    let withdrawal_ledger = WithdrawalLedger::new(repo.clone());
    let outbox = Arc::new(OutboxProcessor::new(
        repo.clone(),
        commission_ledger,
        60_000,
        3,
    ));
    let state = api::AppState::new(repo.clone(), withdrawal_ledger, outbox.clone());
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        outbox,
        _temp: temp_dir,
    }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

const MERCHANT: &[(&str, &str)] = &[("x-user-id", "merchant-1"), ("x-user-role", "merchant")];

async fn seed_affiliate(repo: &Repository) -> AffiliateId {
    let user = User {
        id: UserId::new("user-1"),
        full_name: "Rahim Uddin".to_string(),
        email: "user-1@example.com".to_string(),
        phone: None,
        role: Role::Affiliate,
        created_at: Utc::now(),
    };
    repo.upsert_user(&user).await.unwrap();

    let account = AffiliateAccount {
        id: AffiliateId::generate(),
        user_id: user.id,
        promo_code: PromoCode::new("RAHIM10"),
        current_level: 1,
        total_earnings: Money::zero(),
        available_balance: Money::zero(),
        total_withdrawn: Money::zero(),
        total_orders: 0,
        delivered_orders: 0,
        created_at: Utc::now(),
    };
    repo.insert_affiliate(&account).await.unwrap();
    account.id
}

async fn place_order(t: &TestApp, total: f64) -> String {
    let (status, json) = send(
        &t.app,
        "POST",
        "/orders",
        &[],
        Some(serde_json::json!({ "total": total, "promoCode": "RAHIM10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["order"]["id"].as_str().unwrap().to_string()
}

async fn set_status(t: &TestApp, order_id: &str, status: &str) {
    let (code, _) = send(
        &t.app,
        "PUT",
        &format!("/orders/{}", order_id),
        MERCHANT,
        Some(serde_json::json!({ "status": status })),
    )
    .await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn delivery_enqueues_and_drain_marks_done() {
    let t = setup_test_app().await;
    let affiliate_id = seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;

    set_status(&t, &order_id, "delivered").await;

    // The order update committed an event but did not touch the account yet.
    let account = t.repo.get_account(&affiliate_id).await.unwrap().unwrap();
    assert!(account.total_earnings.is_zero());

    let (status, json) = send(&t.app, "GET", "/admin/outbox", MERCHANT, None).await;
    assert_eq!(status, StatusCode::OK);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], "pending");
    assert_eq!(events[0]["orderId"], order_id);
    assert_eq!(events[0]["newStatus"], "delivered");

    let processed = t.outbox.process_due().await.unwrap();
    assert_eq!(processed, 1);

    let account = t.repo.get_account(&affiliate_id).await.unwrap().unwrap();
    assert_eq!(account.total_earnings, Money::from_minor(50_00));

    let (_, json) = send(&t.app, "GET", "/admin/outbox?status=done", MERCHANT, None).await;
    assert_eq!(json["events"].as_array().unwrap().len(), 1);
    let (_, json) = send(&t.app, "GET", "/admin/outbox?status=pending", MERCHANT, None).await;
    assert_eq!(json["events"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn drained_event_is_not_processed_twice() {
    let t = setup_test_app().await;
    let affiliate_id = seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;
    set_status(&t, &order_id, "delivered").await;

    assert_eq!(t.outbox.process_due().await.unwrap(), 1);
    assert_eq!(t.outbox.process_due().await.unwrap(), 0);

    let account = t.repo.get_account(&affiliate_id).await.unwrap().unwrap();
    assert_eq!(account.total_earnings, Money::from_minor(50_00));
    assert_eq!(account.delivered_orders, 1);
}

#[tokio::test]
async fn only_ledger_relevant_transitions_are_queued() {
    let t = setup_test_app().await;
    seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;

    set_status(&t, &order_id, "processing").await;
    set_status(&t, &order_id, "shipped").await;

    let (_, json) = send(&t.app, "GET", "/admin/outbox", MERCHANT, None).await;
    assert_eq!(json["events"].as_array().unwrap().len(), 0);

    set_status(&t, &order_id, "delivered").await;
    let (_, json) = send(&t.app, "GET", "/admin/outbox", MERCHANT, None).await;
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["oldStatus"], "shipped");
}

#[tokio::test]
async fn scheduled_retries_are_not_due_early() {
    let t = setup_test_app().await;
    seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;
    set_status(&t, &order_id, "delivered").await;

    let events = t.repo.list_outbox_events(None).await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];

    // Push the event an hour into the future, as a failed attempt would.
    let later = Utc::now().timestamp_millis() + 3_600_000;
    t.repo
        .mark_outbox_retry(event.id, 1, later, "simulated processing failure")
        .await
        .unwrap();

    assert_eq!(t.outbox.process_due().await.unwrap(), 0);

    let (_, json) = send(&t.app, "GET", "/admin/outbox?status=pending", MERCHANT, None).await;
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["attempts"], 1);
    assert_eq!(events[0]["lastError"], "simulated processing failure");

    // Due again once the schedule arrives.
    t.repo
        .mark_outbox_retry(event.id, 1, Utc::now().timestamp_millis() - 1, "simulated processing failure")
        .await
        .unwrap();
    assert_eq!(t.outbox.process_due().await.unwrap(), 1);
}

#[tokio::test]
async fn dead_letters_stay_visible_to_operators() {
    let t = setup_test_app().await;
    seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;
    set_status(&t, &order_id, "delivered").await;

    let events = t.repo.list_outbox_events(None).await.unwrap();
    t.repo
        .mark_outbox_failed(events[0].id, 3, "simulated repeated failure")
        .await
        .unwrap();

    // Dead letters are out of the drain loop.
    assert_eq!(t.outbox.process_due().await.unwrap(), 0);

    let (status, json) = send(&t.app, "GET", "/admin/outbox?status=failed", MERCHANT, None).await;
    assert_eq!(status, StatusCode::OK);
    let failed = json["events"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["attempts"], 3);
    assert_eq!(failed[0]["lastError"], "simulated repeated failure");
}

#[tokio::test]
async fn outbox_listing_is_merchant_only() {
    let t = setup_test_app().await;

    let (status, _) = send(
        &t.app,
        "GET",
        "/admin/outbox",
        &[("x-user-id", "user-1"), ("x-user-role", "affiliate")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&t.app, "GET", "/admin/outbox", &[], None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = send(&t.app, "GET", "/admin/outbox?status=bogus", MERCHANT, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid outbox status"));
}

#[tokio::test]
async fn repeated_status_write_is_a_noop() {
    let t = setup_test_app().await;
    seed_affiliate(&t.repo).await;
    let order_id = place_order(&t, 1000.0).await;

    set_status(&t, &order_id, "delivered").await;
    set_status(&t, &order_id, "delivered").await;

    // The idempotent second write must not enqueue a second event.
    let (_, json) = send(&t.app, "GET", "/admin/outbox", MERCHANT, None).await;
    assert_eq!(json["events"].as_array().unwrap().len(), 1);
}
