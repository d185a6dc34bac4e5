//! Commission outbox rows.
//!
//! An order status change enqueues an event in the same transaction as the
//! status write; the outbox processor drains events asynchronously so
//! commission bookkeeping can never block or fail an order update, and a
//! failed event is retried instead of lost.

use crate::domain::{OrderId, OrderStatus};
use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use std::fmt;
use std::str::FromStr;

use super::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Done,
    /// Dead-lettered after exhausting retries.
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Done => "done",
            OutboxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "done" => Ok(OutboxStatus::Done),
            "failed" => Ok(OutboxStatus::Failed),
            _ => Err(()),
        }
    }
}

/// A queued order status transition awaiting commission processing.
#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub next_attempt_at_ms: i64,
    pub last_error: Option<String>,
    pub created_at_ms: i64,
}

fn map_event(row: &sqlx::sqlite::SqliteRow) -> OutboxEvent {
    let old_status: String = row.get("old_status");
    let new_status: String = row.get("new_status");
    let status: String = row.get("status");
    OutboxEvent {
        id: row.get("id"),
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        old_status: OrderStatus::from_str(&old_status).unwrap_or(OrderStatus::Pending),
        new_status: OrderStatus::from_str(&new_status).unwrap_or(OrderStatus::Pending),
        status: OutboxStatus::from_str(&status).unwrap_or(OutboxStatus::Pending),
        attempts: row.get("attempts"),
        next_attempt_at_ms: row.get("next_attempt_at_ms"),
        last_error: row.get("last_error"),
        created_at_ms: row.get("created_at_ms"),
    }
}

const EVENT_COLUMNS: &str = "id, order_id, old_status, new_status, status, attempts, \
     next_attempt_at_ms, last_error, created_at_ms";

impl Repository {
    /// Pending events whose retry time has arrived, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn due_outbox_events(
        &self,
        now_ms: i64,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM commission_outbox \
             WHERE status = 'pending' AND next_attempt_at_ms <= ? \
             ORDER BY id ASC LIMIT ?",
            EVENT_COLUMNS
        ))
        .bind(now_ms)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(map_event).collect())
    }

    /// List outbox rows, optionally filtered by status, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_outbox_events(
        &self,
        status: Option<OutboxStatus>,
    ) -> Result<Vec<OutboxEvent>, sqlx::Error> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM commission_outbox WHERE status = ? ORDER BY id DESC",
                    EVENT_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM commission_outbox ORDER BY id DESC",
                    EVENT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.iter().map(map_event).collect())
    }

    /// Mark an event successfully processed.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_outbox_done(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE commission_outbox SET status = 'done' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Schedule another attempt after a processing failure.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_outbox_retry(
        &self,
        id: i64,
        attempts: i64,
        next_attempt_at_ms: i64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE commission_outbox SET attempts = ?, next_attempt_at_ms = ?, last_error = ? \
             WHERE id = ?",
        )
        .bind(attempts)
        .bind(next_attempt_at_ms)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dead-letter an event after exhausting retries.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_outbox_failed(
        &self,
        id: i64,
        attempts: i64,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE commission_outbox SET status = 'failed', attempts = ?, last_error = ? \
             WHERE id = ?",
        )
        .bind(attempts)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Enqueue a status transition in the caller's transaction, alongside the
/// order status write itself.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn enqueue_transition(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &OrderId,
    old_status: OrderStatus,
    new_status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO commission_outbox (order_id, old_status, new_status, status, created_at_ms)
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(order_id.as_str())
    .bind(old_status.as_str())
    .bind(new_status.as_str())
    .bind(Utc::now().timestamp_millis())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
