//! Affiliate account aggregate.
//!
//! The account holds the running totals the commission and withdrawal ledgers
//! mutate. It carries no rules of its own; every mutation is a relative
//! increment applied by the repository so concurrent writers compose.

use crate::domain::{AffiliateId, Money, PromoCode, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateAccount {
    pub id: AffiliateId,
    pub user_id: UserId,
    pub promo_code: PromoCode,
    pub current_level: i32,
    /// Cumulative approved commission, net of reversals.
    pub total_earnings: Money,
    /// Spendable balance; never allowed below zero.
    pub available_balance: Money,
    /// Cumulative completed withdrawals.
    pub total_withdrawn: Money,
    /// Qualifying orders attributed to this affiliate, net of cancellations.
    pub total_orders: i64,
    /// Orders whose commission reached approved status; drives the tier.
    pub delivered_orders: i64,
    pub created_at: DateTime<Utc>,
}

/// Read-side view of the owning user, joined for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateUser {
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
