//! Outbox processor: drains queued order status transitions.
//!
//! Order updates enqueue an event instead of running commission bookkeeping
//! inline, so a bookkeeping failure can never fail the order update. Events
//! are retried with exponential delay and dead-lettered once the attempt
//! budget is spent; dead letters stay queryable for operators.

use crate::db::Repository;
use crate::ledger::commission::CommissionLedger;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// First retry delay; doubles each attempt.
const RETRY_BASE_MS: i64 = 1_000;
/// Retry delay ceiling.
const RETRY_CAP_MS: i64 = 60_000;

pub struct OutboxProcessor {
    repo: Arc<Repository>,
    ledger: CommissionLedger,
    poll_interval: Duration,
    max_attempts: i64,
    wake: Notify,
}

impl OutboxProcessor {
    pub fn new(
        repo: Arc<Repository>,
        ledger: CommissionLedger,
        poll_interval_ms: u64,
        max_attempts: i64,
    ) -> Self {
        Self {
            repo,
            ledger,
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_attempts,
            wake: Notify::new(),
        }
    }

    /// Nudge the processor to drain immediately instead of waiting out the
    /// poll interval. Called by the order update handler after it enqueues.
    pub fn notify(&self) {
        self.wake.notify_one();
    }

    /// Drain loop; runs until the process exits.
    pub async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            if let Err(e) = self.process_due().await {
                error!("outbox drain failed: {}", e);
            }
        }
    }

    /// Process every due event once. Exposed separately so tests can drive
    /// the queue deterministically.
    ///
    /// # Errors
    /// Returns an error only when the queue itself cannot be read or
    /// updated; per-event failures are recorded on the event row.
    pub async fn process_due(&self) -> Result<usize, sqlx::Error> {
        let now_ms = Utc::now().timestamp_millis();
        let events = self.repo.due_outbox_events(now_ms, 50).await?;
        let mut processed = 0;

        for event in events {
            match self
                .ledger
                .apply_transition(&event.order_id, event.new_status)
                .await
            {
                Ok(outcome) => {
                    self.repo.mark_outbox_done(event.id).await?;
                    info!(
                        event_id = event.id,
                        order_id = %event.order_id,
                        ?outcome,
                        "outbox event processed"
                    );
                    processed += 1;
                }
                Err(e) => {
                    let attempts = event.attempts + 1;
                    if attempts >= self.max_attempts {
                        self.repo
                            .mark_outbox_failed(event.id, attempts, &e.to_string())
                            .await?;
                        error!(
                            event_id = event.id,
                            order_id = %event.order_id,
                            attempts,
                            "outbox event dead-lettered: {}",
                            e
                        );
                    } else {
                        let delay = (RETRY_BASE_MS << (attempts - 1).min(16)).min(RETRY_CAP_MS);
                        self.repo
                            .mark_outbox_retry(event.id, attempts, now_ms + delay, &e.to_string())
                            .await?;
                        warn!(
                            event_id = event.id,
                            order_id = %event.order_id,
                            attempts,
                            retry_in_ms = delay,
                            "outbox event failed, scheduling retry: {}",
                            e
                        );
                    }
                }
            }
        }
        Ok(processed)
    }
}
