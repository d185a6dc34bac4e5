//! Withdrawal endpoints: listing, creation and resolution, plus the
//! settings read and the outbox admin view.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::auth::Actor;
use super::AppState;
use crate::db::repo::{OutboxStatus, WithdrawalListItem};
use crate::domain::{
    AffiliateId, AffiliateSettings, AffiliateUser, Money, PaymentDetailsInput, PromoCode, Role,
    Withdrawal, WithdrawalId, WithdrawalStatus,
};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsQuery {
    pub affiliate_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<WithdrawalDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalDto {
    #[serde(flatten)]
    pub withdrawal: Withdrawal,
    pub affiliate: AffiliateInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateInfo {
    pub promo_code: PromoCode,
    pub user: AffiliateUser,
}

impl From<WithdrawalListItem> for WithdrawalDto {
    fn from(item: WithdrawalListItem) -> Self {
        WithdrawalDto {
            withdrawal: item.withdrawal,
            affiliate: AffiliateInfo {
                promo_code: item.promo_code,
                user: item.user,
            },
        }
    }
}

fn parse_status(s: &str) -> Result<WithdrawalStatus, AppError> {
    WithdrawalStatus::from_str(s)
        .map_err(|_| AppError::BadRequest(format!("Invalid withdrawal status: {}", s)))
}

pub async fn list_withdrawals(
    Query(params): Query<WithdrawalsQuery>,
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<WithdrawalsResponse>, AppError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;

    let items = match actor.role {
        Role::Merchant => {
            let affiliate_id = params.affiliate_id.map(AffiliateId::new);
            state
                .repo
                .list_withdrawals(affiliate_id.as_ref(), status)
                .await?
        }
        Role::Affiliate | Role::Customer => {
            // Affiliates only ever see their own requests; a user without an
            // affiliate account simply has none.
            match state.repo.get_account_by_user(&actor.user_id).await? {
                Some(account) => state.repo.list_withdrawals(Some(&account.id), status).await?,
                None => Vec::new(),
            }
        }
    };

    Ok(Json(WithdrawalsResponse {
        withdrawals: items.into_iter().map(WithdrawalDto::from).collect(),
    }))
}

/// Affiliates create requests; merchants resolve them. One endpoint, the
/// `action` tag picks the variant.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WithdrawalActionRequest {
    #[serde(rename_all = "camelCase")]
    Create {
        amount: Money,
        payment_method: String,
        #[serde(default)]
        payment_details: PaymentDetailsInput,
    },
    #[serde(rename_all = "camelCase")]
    Update {
        withdrawal_id: String,
        status: String,
        notes: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalActionResponse {
    pub withdrawal: Withdrawal,
}

pub async fn withdrawal_action(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<WithdrawalActionRequest>,
) -> Result<(StatusCode, Json<WithdrawalActionResponse>), AppError> {
    match req {
        WithdrawalActionRequest::Create {
            amount,
            payment_method,
            payment_details,
        } => {
            actor.require_affiliate()?;
            let withdrawal = state
                .withdrawal_ledger
                .create(&actor.user_id, amount, &payment_method, &payment_details)
                .await?;
            Ok((
                StatusCode::CREATED,
                Json(WithdrawalActionResponse { withdrawal }),
            ))
        }
        WithdrawalActionRequest::Update {
            withdrawal_id,
            status,
            notes,
        } => {
            actor.require_merchant()?;
            let status = parse_status(&status)?;
            let withdrawal = state
                .withdrawal_ledger
                .resolve(
                    &WithdrawalId::new(withdrawal_id),
                    status,
                    notes.as_deref(),
                    &actor.user_id,
                )
                .await?;
            Ok((StatusCode::OK, Json(WithdrawalActionResponse { withdrawal })))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub settings: AffiliateSettings,
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let settings = state.repo.get_settings().await?;
    Ok(Json(SettingsResponse { settings }))
}

#[derive(Debug, Deserialize)]
pub struct OutboxQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxResponse {
    pub events: Vec<OutboxEventDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEventDto {
    pub id: i64,
    pub order_id: String,
    pub old_status: String,
    pub new_status: String,
    pub status: String,
    pub attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Dead-letter visibility for operators. Bookkeeping failures land here
/// instead of disappearing into a log line.
pub async fn list_outbox(
    Query(params): Query<OutboxQuery>,
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<OutboxResponse>, AppError> {
    actor.require_merchant()?;

    let status = params
        .status
        .as_deref()
        .map(|s| {
            OutboxStatus::from_str(s)
                .map_err(|_| AppError::BadRequest(format!("Invalid outbox status: {}", s)))
        })
        .transpose()?;

    let events = state.repo.list_outbox_events(status).await?;
    Ok(Json(OutboxResponse {
        events: events
            .into_iter()
            .map(|e| OutboxEventDto {
                id: e.id,
                order_id: e.order_id.0,
                old_status: e.old_status.as_str().to_string(),
                new_status: e.new_status.as_str().to_string(),
                status: e.status.as_str().to_string(),
                attempts: e.attempts,
                last_error: e.last_error,
            })
            .collect(),
    }))
}
