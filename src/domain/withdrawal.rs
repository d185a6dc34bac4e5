//! Withdrawal requests and payment method parsing.

use crate::domain::{AffiliateId, Money, UserId, WithdrawalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Completed,
    Rejected,
    Cancelled,
}

impl WithdrawalStatus {
    /// Completed, rejected and cancelled requests never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Completed | WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "completed" => Ok(WithdrawalStatus::Completed),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "cancelled" => Ok(WithdrawalStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// Payout destination, resolved once when the request is parsed.
///
/// The method name decides which detail fields are required; after parsing,
/// downstream code never inspects the raw strings again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PaymentMethod {
    #[serde(rename_all = "camelCase")]
    BankTransfer {
        bank_name: String,
        account_name: String,
        account_number: String,
    },
    #[serde(rename_all = "camelCase")]
    MobileWallet {
        /// "bkash", "nagad" or "rocket".
        provider: String,
        mobile_number: String,
    },
}

/// Raw payment details as submitted by the affiliate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetailsInput {
    pub bank_name: Option<String>,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub mobile_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentMethodError {
    #[error("Payment method is required")]
    MissingMethod,
    #[error("Unsupported payment method: {0}")]
    UnknownMethod(String),
    #[error("Bank name is required for bank transfer")]
    MissingBankName,
    #[error("Account holder name is required for bank transfer")]
    MissingAccountName,
    #[error("A valid account number (at least 8 digits) is required")]
    InvalidAccountNumber,
    #[error("A valid mobile number (e.g. 01712345678) is required")]
    InvalidMobileNumber,
}

const MOBILE_PROVIDERS: &[&str] = &["bkash", "nagad", "rocket"];

impl PaymentMethod {
    /// Validate a raw method name plus details into a concrete variant.
    pub fn parse(method: &str, details: &PaymentDetailsInput) -> Result<Self, PaymentMethodError> {
        let method = method.trim().to_lowercase();
        if method.is_empty() {
            return Err(PaymentMethodError::MissingMethod);
        }

        if method.contains("bank") {
            let bank_name = required(&details.bank_name).ok_or(PaymentMethodError::MissingBankName)?;
            let account_name =
                required(&details.account_name).ok_or(PaymentMethodError::MissingAccountName)?;
            let account_number = details
                .account_number
                .as_deref()
                .map(strip_whitespace)
                .filter(|n| n.len() >= 8 && n.chars().all(|c| c.is_ascii_digit()))
                .ok_or(PaymentMethodError::InvalidAccountNumber)?;
            return Ok(PaymentMethod::BankTransfer {
                bank_name,
                account_name,
                account_number,
            });
        }

        if MOBILE_PROVIDERS.contains(&method.as_str()) {
            let mobile_number = details
                .mobile_number
                .as_deref()
                .map(strip_whitespace)
                .filter(|n| is_bd_mobile(n))
                .ok_or(PaymentMethodError::InvalidMobileNumber)?;
            return Ok(PaymentMethod::MobileWallet {
                provider: method,
                mobile_number,
            });
        }

        Err(PaymentMethodError::UnknownMethod(method))
    }

    /// Short method name for storage and display.
    pub fn name(&self) -> &str {
        match self {
            PaymentMethod::BankTransfer { .. } => "bank",
            PaymentMethod::MobileWallet { provider, .. } => provider,
        }
    }
}

fn required(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Bangladesh mobile numbering: 11 digits, `01` then an operator digit 3-9.
fn is_bd_mobile(n: &str) -> bool {
    let bytes = n.as_bytes();
    bytes.len() == 11
        && bytes[0] == b'0'
        && bytes[1] == b'1'
        && (b'3'..=b'9').contains(&bytes[2])
        && n.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub affiliate_id: AffiliateId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Withdrawal {
    /// New pending request; the balance reservation happens in the repository.
    pub fn pending(affiliate_id: AffiliateId, amount: Money, payment_method: PaymentMethod) -> Self {
        Withdrawal {
            id: WithdrawalId::generate(),
            affiliate_id,
            amount,
            payment_method,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
            processed_at: None,
            processed_by: None,
            notes: None,
        }
    }
}
