//! Domain types for the affiliate commission and withdrawal ledgers.
//!
//! This module provides:
//! - Exact monetary arithmetic via the Money wrapper
//! - Identifier newtypes and promo code normalization
//! - Order, commission, withdrawal and account records
//! - Pure tier functions over the settings table

pub mod account;
pub mod commission;
pub mod ids;
pub mod money;
pub mod order;
pub mod settings;
pub mod user;
pub mod withdrawal;

pub use account::{AffiliateAccount, AffiliateUser};
pub use commission::{Commission, CommissionStatus};
pub use ids::{AffiliateId, CommissionId, OrderId, PromoCode, UserId, WithdrawalId};
pub use money::{Money, BALANCE_TOLERANCE_MINOR};
pub use order::{Order, OrderStatus};
pub use settings::{calculate_commission, calculate_level, AffiliateSettings, CommissionTier};
pub use user::{Role, User};
pub use withdrawal::{
    PaymentDetailsInput, PaymentMethod, PaymentMethodError, Withdrawal, WithdrawalStatus,
};
