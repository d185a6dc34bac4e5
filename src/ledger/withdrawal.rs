//! Withdrawal ledger: payout requests against the affiliate account.
//!
//! Creation validates a fixed precondition chain (first failure wins),
//! recomputes the available balance from delivered commissions as a
//! self-healing double check, and reserves the amount with a conditional
//! decrement so racing requests cannot drain the same funds twice.

use crate::db::repo::{accounts, withdrawals};
use crate::db::Repository;
use crate::domain::{
    Money, PaymentDetailsInput, PaymentMethod, PaymentMethodError, UserId, Withdrawal,
    WithdrawalId, WithdrawalStatus, BALANCE_TOLERANCE_MINOR,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Withdrawal amount must be greater than zero")]
    InvalidAmount,
    #[error(transparent)]
    Payment(#[from] PaymentMethodError),
    #[error("No affiliate account found for this user")]
    NoAccount,
    #[error("Minimum withdrawal amount is {0}")]
    BelowMinimum(Money),
    #[error("Insufficient available balance")]
    InsufficientBalance,
    #[error("Pending withdrawal requests already reserve this balance")]
    PendingReservation,
    #[error("Withdrawals are blocked while orders are awaiting delivery")]
    UndeliveredOrders,
    #[error("Withdrawal not found")]
    NotFound,
    #[error("Unsupported withdrawal status transition")]
    InvalidStatus,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct WithdrawalLedger {
    repo: Arc<Repository>,
}

impl WithdrawalLedger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Affiliate-initiated payout request.
    ///
    /// Preconditions are checked in a fixed order and the first failure is
    /// returned to the caller with nothing written.
    ///
    /// # Errors
    /// Returns a validation variant for each failed precondition, or a
    /// database error.
    pub async fn create(
        &self,
        user_id: &UserId,
        amount: Money,
        method: &str,
        details: &PaymentDetailsInput,
    ) -> Result<Withdrawal, WithdrawalError> {
        if !amount.is_positive() {
            return Err(WithdrawalError::InvalidAmount);
        }

        let payment_method = PaymentMethod::parse(method, details)?;

        let account = self
            .repo
            .get_account_by_user(user_id)
            .await?
            .ok_or(WithdrawalError::NoAccount)?;

        let settings = self.repo.get_settings().await?;
        if amount < settings.min_withdrawal_amount {
            return Err(WithdrawalError::BelowMinimum(settings.min_withdrawal_amount));
        }

        let available = self.corrected_balance(&account).await?;
        if amount > available {
            return Err(WithdrawalError::InsufficientBalance);
        }

        let pending = self.repo.sum_pending_withdrawals(&account.id).await?;
        if pending + amount > available {
            return Err(WithdrawalError::PendingReservation);
        }

        let undelivered = self.repo.count_pending_undelivered(&account.id).await?;
        if undelivered > 0 {
            return Err(WithdrawalError::UndeliveredOrders);
        }

        // Reserve the funds at creation time. The conditional decrement is
        // the last line of defense against a racing request that passed the
        // checks above on the same snapshot.
        let withdrawal = Withdrawal::pending(account.id.clone(), amount, payment_method);
        let mut tx = self.repo.begin().await?;
        if !accounts::reserve_balance(&mut tx, &account.id, amount).await? {
            return Err(WithdrawalError::InsufficientBalance);
        }
        withdrawals::insert_withdrawal(&mut tx, &withdrawal).await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            affiliate_id = %account.id,
            amount = %amount,
            "withdrawal requested, balance reserved"
        );
        Ok(withdrawal)
    }

    /// Merchant-initiated resolution of an open request.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown id, `InvalidStatus` when the target
    /// is `pending` or the request already reached a final status, or a
    /// database error.
    pub async fn resolve(
        &self,
        id: &WithdrawalId,
        target: WithdrawalStatus,
        notes: Option<&str>,
        processed_by: &UserId,
    ) -> Result<Withdrawal, WithdrawalError> {
        if target == WithdrawalStatus::Pending {
            return Err(WithdrawalError::InvalidStatus);
        }

        let mut tx = self.repo.begin().await?;
        let withdrawal = withdrawals::get_withdrawal_tx(&mut tx, id)
            .await?
            .ok_or(WithdrawalError::NotFound)?;

        // Final statuses never change again. Without this gate a rejected
        // request could later be completed, recording a payout that was
        // never made and refunding a reservation twice.
        if withdrawal.status.is_terminal() {
            return Err(WithdrawalError::InvalidStatus);
        }

        match target {
            WithdrawalStatus::Completed => {
                // Balance was reserved at creation; completing only records
                // the cumulative payout.
                accounts::add_withdrawn(&mut tx, &withdrawal.affiliate_id, withdrawal.amount)
                    .await?;
            }
            WithdrawalStatus::Rejected | WithdrawalStatus::Cancelled => {
                // The reservation is still held for any open request.
                accounts::refund_balance(&mut tx, &withdrawal.affiliate_id, withdrawal.amount)
                    .await?;
            }
            WithdrawalStatus::Approved => {}
            WithdrawalStatus::Pending => unreachable!("rejected above"),
        }

        // Approval is an intermediate acknowledgement; only a final
        // resolution records who processed the request and when.
        let (processed_at, processed) = if target == WithdrawalStatus::Approved {
            (None, None)
        } else {
            (Some(Utc::now()), Some(processed_by))
        };
        withdrawals::resolve_withdrawal(&mut tx, id, target, processed_at, processed, notes)
            .await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %id,
            status = %target,
            processed_by = %processed_by,
            "withdrawal resolved"
        );

        self.repo
            .get_withdrawal(id)
            .await?
            .ok_or(WithdrawalError::NotFound)
    }

    /// Recompute the available balance from the source of truth and correct
    /// the stored field when it drifted beyond tolerance.
    async fn corrected_balance(
        &self,
        account: &crate::domain::AffiliateAccount,
    ) -> Result<Money, WithdrawalError> {
        let delivered_earnings = self.repo.sum_delivered_earnings(&account.id).await?;
        let recomputed = delivered_earnings - account.total_withdrawn;

        let drift = (recomputed - account.available_balance).abs();
        if drift.to_minor() > BALANCE_TOLERANCE_MINOR {
            warn!(
                affiliate_id = %account.id,
                stored = %account.available_balance,
                recomputed = %recomputed,
                "stored available balance drifted; correcting"
            );
            self.repo
                .set_available_balance(&account.id, recomputed)
                .await?;
            return Ok(recomputed);
        }
        Ok(account.available_balance)
    }
}
