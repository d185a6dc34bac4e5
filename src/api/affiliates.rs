//! Affiliate account registration and the account dashboard read.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::Actor;
use super::AppState;
use crate::domain::{AffiliateAccount, AffiliateId, Commission, Money, PromoCode, Role, User};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub account: AffiliateAccount,
}

pub async fn register(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    actor.require_affiliate()?;

    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".into()));
    }
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }

    if state
        .repo
        .get_account_by_user(&actor.user_id)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "Already registered as an affiliate".into(),
        ));
    }

    let promo_code = match req.promo_code.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(code) => {
            let code = PromoCode::new(code);
            if state.repo.get_account_by_promo(&code).await?.is_some() {
                return Err(AppError::BadRequest("Promo code already in use".into()));
            }
            code
        }
        None => generate_promo_code(full_name),
    };

    let now = Utc::now();
    let user = User {
        id: actor.user_id.clone(),
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone: req.phone.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
        role: Role::Affiliate,
        created_at: now,
    };
    state.repo.upsert_user(&user).await?;

    let account = AffiliateAccount {
        id: AffiliateId::generate(),
        user_id: user.id,
        promo_code,
        current_level: 1,
        total_earnings: Money::zero(),
        available_balance: Money::zero(),
        total_withdrawn: Money::zero(),
        total_orders: 0,
        delivered_orders: 0,
        created_at: now,
    };
    state.repo.insert_affiliate(&account).await?;

    tracing::info!(
        affiliate_id = %account.id,
        user_id = %account.user_id,
        promo_code = %account.promo_code,
        "affiliate account registered"
    );
    Ok((StatusCode::CREATED, Json(RegisterResponse { account })))
}

/// Derive a shareable code from the name plus a random suffix; the column's
/// UNIQUE constraint backstops the unlikely collision.
fn generate_promo_code(full_name: &str) -> PromoCode {
    let prefix: String = full_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect();
    let prefix = if prefix.is_empty() { "AFF".to_string() } else { prefix };
    let suffix = Uuid::new_v4().simple().to_string();
    PromoCode::new(format!("{}{}", prefix, &suffix[..4]))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub account: AffiliateAccount,
    pub commissions: Vec<Commission>,
}

/// The affiliate's own account with its commission history, newest first.
pub async fn get_account(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state
        .repo
        .get_account_by_user(&actor.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No affiliate account for this user".into()))?;
    let commissions = state.repo.list_commissions(&account.id).await?;
    Ok(Json(AccountResponse {
        account,
        commissions,
    }))
}
