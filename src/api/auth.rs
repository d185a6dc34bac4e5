//! Actor context extraction.
//!
//! Authentication itself happens upstream; the gateway injects the
//! authenticated principal as `x-user-id` / `x-user-role` headers and the
//! handlers only enforce role requirements.

use crate::domain::{Role, UserId};
use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    /// Merchant-only actions.
    pub fn require_merchant(&self) -> Result<(), AppError> {
        if self.role == Role::Merchant {
            Ok(())
        } else {
            Err(AppError::Forbidden("Merchant role required".into()))
        }
    }

    /// Actions available to affiliates (and customers who may hold an
    /// affiliate account).
    pub fn require_affiliate(&self) -> Result<(), AppError> {
        match self.role {
            Role::Affiliate | Role::Customer => Ok(()),
            Role::Merchant => Err(AppError::Forbidden("Affiliate role required".into())),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Forbidden("Missing x-user-id header".into()))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Role::from_str(s.trim()).ok())
            .ok_or_else(|| AppError::Forbidden("Missing or invalid x-user-role header".into()))?;

        Ok(Actor {
            user_id: UserId::new(user_id),
            role,
        })
    }
}
