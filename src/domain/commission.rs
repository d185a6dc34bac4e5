//! Commission ledger record.
//!
//! One commission exists per qualifying order. The record itself is
//! append-only: status moves `pending` -> `approved` or `pending`/`approved`
//! -> `cancelled` in place, and rows are never deleted.

use crate::domain::{AffiliateId, CommissionId, Money, OrderId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Approved => "approved",
            CommissionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "approved" => Ok(CommissionStatus::Approved),
            "cancelled" => Ok(CommissionStatus::Cancelled),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub id: CommissionId,
    pub affiliate_id: AffiliateId,
    pub order_id: OrderId,
    pub order_total: Money,
    /// Affiliate tier at the time the rate was last computed.
    pub level: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_percentage: Decimal,
    pub commission_amount: Money,
    pub status: CommissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    /// New pending commission for a freshly placed qualifying order.
    pub fn pending(
        affiliate_id: AffiliateId,
        order_id: OrderId,
        order_total: Money,
        level: i32,
        percentage: Decimal,
        amount: Money,
    ) -> Self {
        let now = Utc::now();
        Commission {
            id: CommissionId::generate(),
            affiliate_id,
            order_id,
            order_total,
            level,
            commission_percentage: percentage,
            commission_amount: amount,
            status: CommissionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
