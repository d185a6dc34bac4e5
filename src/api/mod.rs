pub mod affiliates;
pub mod auth;
pub mod health;
pub mod orders;
pub mod withdrawals;

use crate::db::Repository;
use crate::ledger::{OutboxProcessor, WithdrawalLedger};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub withdrawal_ledger: WithdrawalLedger,
    pub outbox: Arc<OutboxProcessor>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        withdrawal_ledger: WithdrawalLedger,
        outbox: Arc<OutboxProcessor>,
    ) -> Self {
        Self {
            repo,
            withdrawal_ledger,
            outbox,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/orders", post(orders::create_order))
        .route(
            "/orders/:id",
            get(orders::get_order).put(orders::update_order),
        )
        .route("/affiliate/register", post(affiliates::register))
        .route("/affiliate/account", get(affiliates::get_account))
        .route(
            "/affiliate/withdrawals",
            get(withdrawals::list_withdrawals).post(withdrawals::withdrawal_action),
        )
        .route("/affiliate/settings", get(withdrawals::get_settings))
        .route("/admin/outbox", get(withdrawals::list_outbox))
        .layer(cors)
        .with_state(state)
}
