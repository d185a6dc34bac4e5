//! Repository layer for database operations.
//!
//! Pool-level reads and single-row mutations live on [`Repository`]. Ledger
//! transitions that must move several rows together (commission approval,
//! reversal, withdrawal creation/resolution) use the transaction-scoped free
//! functions in the per-concern modules so every balance effect commits or
//! rolls back as one unit.

pub mod accounts;
pub mod commissions;
pub mod orders;
pub mod outbox;
pub mod settings;
pub mod users;
pub mod withdrawals;

pub use outbox::{OutboxEvent, OutboxStatus};
pub use withdrawals::WithdrawalListItem;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::{Sqlite, Transaction};

/// Parse an RFC 3339 timestamp column, falling back to the epoch minimum
/// rather than failing the whole row.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse().unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Begin a transaction for a multi-row ledger transition.
    ///
    /// # Errors
    /// Returns an error if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }
}
