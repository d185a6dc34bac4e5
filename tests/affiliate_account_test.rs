use affiliate_ledger::api;
use affiliate_ledger::db::init_db;
use affiliate_ledger::{CommissionLedger, OutboxProcessor, Repository, WithdrawalLedger};
use axum::http::StatusCode;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
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
    let state = api::AppState::new(repo, withdrawal_ledger, outbox.clone());
    let app = api::create_router(state);

    TestApp {
        app,
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
const AFFILIATE: &[(&str, &str)] = &[("x-user-id", "user-1"), ("x-user-role", "affiliate")];

fn register_body(promo: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "fullName": "Rahim Uddin",
        "email": "rahim@example.com",
        "phone": "01712345678",
    });
    if let Some(code) = promo {
        body["promoCode"] = serde_json::json!(code);
    }
    body
}

#[tokio::test]
async fn register_creates_account_with_chosen_code() {
    let t = setup_test_app().await;

    let (status, json) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(register_body(Some("rahim10"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", json);
    assert_eq!(json["account"]["promoCode"], "RAHIM10");
    assert_eq!(json["account"]["currentLevel"], 1);
    assert_eq!(json["account"]["availableBalance"].as_f64().unwrap(), 0.0);
    assert_eq!(json["account"]["deliveredOrders"], 0);

    // The fresh code immediately attributes orders.
    let (status, json) = send(
        &t.app,
        "POST",
        "/orders",
        &[],
        Some(serde_json::json!({ "total": 1000.0, "promoCode": "rahim10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["commission"]["status"], "pending");
    assert_eq!(json["commission"]["commissionAmount"].as_f64().unwrap(), 50.0);
}

#[tokio::test]
async fn register_generates_code_when_none_given() {
    let t = setup_test_app().await;

    let (status, json) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(register_body(None)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let code = json["account"]["promoCode"].as_str().unwrap();
    assert!(code.starts_with("RAHIMU"), "generated code was {}", code);
    assert_eq!(code.len(), 10);
}

#[tokio::test]
async fn duplicate_registration_and_taken_code_rejected() {
    let t = setup_test_app().await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(register_body(Some("RAHIM10"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(register_body(Some("OTHER1"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Already registered"));

    // A different user cannot claim the same code.
    let (status, json) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        &[("x-user-id", "user-2"), ("x-user-role", "customer")],
        Some(register_body(Some("rahim10"))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("already in use"));
}

#[tokio::test]
async fn register_validates_profile_and_role() {
    let t = setup_test_app().await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(serde_json::json!({ "fullName": "  ", "email": "rahim@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(serde_json::json!({ "fullName": "Rahim Uddin", "email": "not-an-email" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        MERCHANT,
        Some(register_body(None)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn account_dashboard_shows_commission_history() {
    let t = setup_test_app().await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/affiliate/register",
        AFFILIATE,
        Some(register_body(Some("RAHIM10"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // One delivered order, one still pending.
    for _ in 0..2 {
        let (status, _) = send(
            &t.app,
            "POST",
            "/orders",
            &[],
            Some(serde_json::json!({ "total": 1000.0, "promoCode": "RAHIM10" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, json) = send(&t.app, "GET", "/affiliate/account", AFFILIATE, None).await;
    let first_order = json["commissions"][0]["orderId"].as_str().unwrap().to_string();

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/orders/{}", first_order),
        MERCHANT,
        Some(serde_json::json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    t.outbox.process_due().await.unwrap();

    let (status, json) = send(&t.app, "GET", "/affiliate/account", AFFILIATE, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["account"]["totalEarnings"].as_f64().unwrap(), 50.0);
    assert_eq!(json["account"]["totalOrders"], 2);
    assert_eq!(json["account"]["deliveredOrders"], 1);
    let commissions = json["commissions"].as_array().unwrap();
    assert_eq!(commissions.len(), 2);
    let statuses: Vec<&str> = commissions
        .iter()
        .map(|c| c["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"approved"));
    assert!(statuses.contains(&"pending"));
}

#[tokio::test]
async fn account_read_without_registration_is_404() {
    let t = setup_test_app().await;
    let (status, _) = send(&t.app, "GET", "/affiliate/account", AFFILIATE, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
