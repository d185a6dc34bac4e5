//! Order intake and status updates.
//!
//! The status update endpoint is the commission ledger's trigger: a change
//! into `delivered` or `cancelled` enqueues an outbox event in the same
//! transaction as the status write. The response reflects the order update
//! alone; commission bookkeeping happens asynchronously and cannot fail it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::auth::Actor;
use super::AppState;
use crate::db::repo::{orders, outbox};
use crate::domain::{
    calculate_commission, Commission, Money, Order, OrderId, OrderStatus, PromoCode,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub total: Money,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<Commission>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    if !req.total.is_positive() {
        return Err(AppError::BadRequest("Order total must be positive".into()));
    }

    let promo_code = req
        .promo_code
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PromoCode::new);

    let now = Utc::now();
    let order = Order {
        id: OrderId::generate(),
        total: req.total,
        status: OrderStatus::Pending,
        promo_code: promo_code.clone(),
        created_at: now,
        updated_at: now,
    };
    state.repo.insert_order(&order).await?;

    // A resolvable promo code makes the order qualifying: record the pending
    // commission at the affiliate's current tier rate.
    let mut commission = None;
    if let Some(code) = promo_code {
        if let Some(account) = state.repo.get_account_by_promo(&code).await? {
            let settings = state.repo.get_settings().await?;
            if let Some((percentage, amount)) =
                calculate_commission(order.total, account.current_level, &settings)
            {
                let record = Commission::pending(
                    account.id.clone(),
                    order.id.clone(),
                    order.total,
                    account.current_level,
                    percentage,
                    amount,
                );
                state.repo.insert_commission(&record).await?;
                state.repo.add_total_order(&account.id).await?;
                commission = Some(record);
            } else {
                tracing::warn!(
                    order_id = %order.id,
                    level = account.current_level,
                    "no tier bracket for affiliate level; order not commissioned"
                );
            }
        }
    }

    Ok((StatusCode::CREATED, Json(OrderResponse { order, commission })))
}

pub async fn get_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .repo
        .get_order(&OrderId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(OrderResponse {
        order,
        commission: None,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: String,
}

pub async fn update_order(
    Path(id): Path<String>,
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    actor.require_merchant()?;

    let new_status = OrderStatus::from_str(&req.status)
        .map_err(|_| AppError::BadRequest(format!("Invalid order status: {}", req.status)))?;

    let order_id = OrderId::new(id);
    let mut tx = state.repo.begin().await?;
    let order = orders::get_order_tx(&mut tx, &order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;

    if order.status == new_status {
        return Ok(Json(OrderResponse {
            order,
            commission: None,
        }));
    }

    orders::update_order_status(&mut tx, &order_id, new_status).await?;
    // Only the transitions the commission ledger reacts to are queued.
    if matches!(new_status, OrderStatus::Delivered | OrderStatus::Cancelled) {
        outbox::enqueue_transition(&mut tx, &order_id, order.status, new_status).await?;
    }
    tx.commit().await?;
    state.outbox.notify();

    let updated = state
        .repo
        .get_order(&order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(OrderResponse {
        order: updated,
        commission: None,
    }))
}
