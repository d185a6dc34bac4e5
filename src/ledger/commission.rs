//! Commission ledger: keeps each order's commission in sync with the order's
//! status and propagates the financial effect onto the affiliate account.
//!
//! Only two transitions matter: any status into `delivered` approves the
//! pending commission, any status into `cancelled` voids it (and reverses the
//! credit when the order had already been delivered). Each transition runs in
//! a single transaction so the level write, the commission update and the
//! account increments land together.

use crate::db::repo::{accounts, commissions};
use crate::db::Repository;
use crate::domain::{
    calculate_commission, calculate_level, CommissionStatus, Money, OrderId, OrderStatus,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CommissionError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// What a transition ended up doing, for logging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CommissionOutcome {
    /// No commission exists for the order, or the status is not one the
    /// ledger reacts to.
    NoOp,
    /// Pending commission approved and the account credited.
    Approved { amount: Money, level: i32 },
    /// Commission approved but the owning account no longer exists.
    ApprovedWithoutAccount { amount: Money },
    /// Pending commission voided before it ever contributed to the balance.
    VoidedPending,
    /// Approved commission reversed after a post-delivery cancellation.
    Reversed { amount: Money, level: i32 },
}

#[derive(Clone)]
pub struct CommissionLedger {
    repo: Arc<Repository>,
}

impl CommissionLedger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// React to an order status change.
    ///
    /// # Errors
    /// Returns an error if any read or write fails; the transaction is rolled
    /// back and the caller (the outbox processor) retries.
    pub async fn apply_transition(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<CommissionOutcome, CommissionError> {
        match new_status {
            OrderStatus::Delivered => self.approve_delivery(order_id).await,
            OrderStatus::Cancelled => self.cancel_order(order_id).await,
            _ => Ok(CommissionOutcome::NoOp),
        }
    }

    /// Order reached `delivered`: approve the pending commission at the tier
    /// the delivery itself establishes.
    async fn approve_delivery(
        &self,
        order_id: &OrderId,
    ) -> Result<CommissionOutcome, CommissionError> {
        let settings = self.repo.get_settings().await?;
        let mut tx = self.repo.begin().await?;

        let Some(commission) =
            commissions::get_by_order_tx(&mut tx, order_id, Some(CommissionStatus::Pending))
                .await?
        else {
            // Order without an affiliate code, or already processed.
            return Ok(CommissionOutcome::NoOp);
        };

        let delivered =
            accounts::get_delivered_count_tx(&mut tx, &commission.affiliate_id).await?;

        let Some(delivered) = delivered else {
            // Account deleted out from under us. Approve the commission on
            // its original terms so the ledger stays consistent with the
            // order, but there is no balance to credit.
            commissions::approve_commission(
                &mut tx,
                &commission.id,
                commission.level,
                commission.commission_percentage,
                commission.commission_amount,
            )
            .await?;
            tx.commit().await?;
            warn!(
                order_id = %order_id,
                affiliate_id = %commission.affiliate_id,
                "approved commission without account mutation: affiliate account missing"
            );
            return Ok(CommissionOutcome::ApprovedWithoutAccount {
                amount: commission.commission_amount,
            });
        };

        // This delivery counts toward the tier, so the order that crosses a
        // threshold already earns the new tier's rate.
        let new_level = calculate_level(delivered + 1, &settings);

        let (level, percentage, amount) = if new_level != commission.level {
            match calculate_commission(commission.order_total, new_level, &settings) {
                Some((percentage, amount)) => (new_level, percentage, amount),
                None => {
                    warn!(
                        order_id = %order_id,
                        level = new_level,
                        "tier table has no bracket for level; approving at original rate"
                    );
                    (
                        commission.level,
                        commission.commission_percentage,
                        commission.commission_amount,
                    )
                }
            }
        } else {
            (
                commission.level,
                commission.commission_percentage,
                commission.commission_amount,
            )
        };

        commissions::approve_commission(&mut tx, &commission.id, level, percentage, amount)
            .await?;
        accounts::credit_delivery(&mut tx, &commission.affiliate_id, amount, new_level).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            affiliate_id = %commission.affiliate_id,
            amount = %amount,
            level = new_level,
            "commission approved"
        );
        Ok(CommissionOutcome::Approved {
            amount,
            level: new_level,
        })
    }

    /// Order reached `cancelled`: void a pending commission, or reverse an
    /// approved one when the cancellation arrived after delivery.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<CommissionOutcome, CommissionError> {
        let settings = self.repo.get_settings().await?;
        let mut tx = self.repo.begin().await?;

        if let Some(pending) =
            commissions::get_by_order_tx(&mut tx, order_id, Some(CommissionStatus::Pending))
                .await?
        {
            // Never contributed to the balance; just close it out.
            commissions::cancel_commission(&mut tx, &pending.id).await?;
            tx.commit().await?;
            info!(order_id = %order_id, "pending commission voided");
            return Ok(CommissionOutcome::VoidedPending);
        }

        let Some(approved) =
            commissions::get_by_order_tx(&mut tx, order_id, Some(CommissionStatus::Approved))
                .await?
        else {
            return Ok(CommissionOutcome::NoOp);
        };

        let delivered =
            accounts::get_delivered_count_tx(&mut tx, &approved.affiliate_id).await?;

        let mut new_level = approved.level;
        if let Some(delivered) = delivered {
            new_level = calculate_level((delivered - 1).max(0), &settings);
            accounts::reverse_delivery(
                &mut tx,
                &approved.affiliate_id,
                approved.commission_amount,
                new_level,
            )
            .await?;
        } else {
            warn!(
                order_id = %order_id,
                affiliate_id = %approved.affiliate_id,
                "reversing commission without account mutation: affiliate account missing"
            );
        }

        commissions::cancel_commission(&mut tx, &approved.id).await?;
        tx.commit().await?;

        info!(
            order_id = %order_id,
            affiliate_id = %approved.affiliate_id,
            amount = %approved.commission_amount,
            "approved commission reversed"
        );
        Ok(CommissionOutcome::Reversed {
            amount: approved.commission_amount,
            level: new_level,
        })
    }
}
