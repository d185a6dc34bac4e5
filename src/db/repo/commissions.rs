//! Commission rows: the append-only ledger keyed by order.

use crate::domain::{
    AffiliateId, Commission, CommissionId, CommissionStatus, Money, OrderId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;

use super::{parse_datetime, Repository};

const COMMISSION_COLUMNS: &str = "id, affiliate_id, order_id, order_total_minor, level, \
     commission_percentage, commission_amount_minor, status, created_at, updated_at";

fn map_commission(row: &sqlx::sqlite::SqliteRow) -> Commission {
    let percentage: String = row.get("commission_percentage");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Commission {
        id: CommissionId::new(row.get::<String, _>("id")),
        affiliate_id: AffiliateId::new(row.get::<String, _>("affiliate_id")),
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        order_total: Money::from_minor(row.get("order_total_minor")),
        level: row.get("level"),
        commission_percentage: Decimal::from_str(&percentage).unwrap_or_default(),
        commission_amount: Money::from_minor(row.get("commission_amount_minor")),
        status: CommissionStatus::from_str(&status).unwrap_or(CommissionStatus::Pending),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    }
}

impl Repository {
    /// Insert a pending commission for a qualifying order.
    ///
    /// # Errors
    /// Returns an error if the insert fails (one commission per order).
    pub async fn insert_commission(&self, commission: &Commission) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO commissions (
                id, affiliate_id, order_id, order_total_minor, level,
                commission_percentage, commission_amount_minor, status,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(commission.id.as_str())
        .bind(commission.affiliate_id.as_str())
        .bind(commission.order_id.as_str())
        .bind(commission.order_total.to_minor())
        .bind(commission.level)
        .bind(commission.commission_percentage.to_string())
        .bind(commission.commission_amount.to_minor())
        .bind(commission.status.as_str())
        .bind(commission.created_at.to_rfc3339())
        .bind(commission.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch the commission for an order, whatever its status.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_commission_by_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<Commission>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM commissions WHERE order_id = ?",
            COMMISSION_COLUMNS
        ))
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_commission))
    }

    /// All commissions for an affiliate, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_commissions(
        &self,
        affiliate_id: &AffiliateId,
    ) -> Result<Vec<Commission>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM commissions WHERE affiliate_id = ? ORDER BY created_at DESC",
            COMMISSION_COLUMNS
        ))
        .bind(affiliate_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(map_commission).collect())
    }

    /// Sum of approved commission amounts whose order actually reached
    /// delivered status. This is the source-of-truth figure the self-healing
    /// balance recompute relies on, deliberately not trusting the stored
    /// account field.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn sum_delivered_earnings(
        &self,
        affiliate_id: &AffiliateId,
    ) -> Result<Money, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(c.commission_amount_minor), 0) AS total
            FROM commissions c
            JOIN orders o ON o.id = c.order_id
            WHERE c.affiliate_id = ? AND c.status = 'approved' AND o.status = 'delivered'
            "#,
        )
        .bind(affiliate_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_minor(row.get("total")))
    }

    /// Number of pending commissions whose order has not been delivered yet.
    /// A non-zero count blocks withdrawal requests.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_pending_undelivered(
        &self,
        affiliate_id: &AffiliateId,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS n
            FROM commissions c
            JOIN orders o ON o.id = c.order_id
            WHERE c.affiliate_id = ? AND c.status = 'pending' AND o.status != 'delivered'
            "#,
        )
        .bind(affiliate_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }
}

/// Fetch an order's commission inside a transaction, optionally filtered by
/// status.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_by_order_tx(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: &OrderId,
    status: Option<CommissionStatus>,
) -> Result<Option<Commission>, sqlx::Error> {
    let row = match status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {} FROM commissions WHERE order_id = ? AND status = ?",
                COMMISSION_COLUMNS
            ))
            .bind(order_id.as_str())
            .bind(status.as_str())
            .fetch_optional(tx.as_mut())
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM commissions WHERE order_id = ?",
                COMMISSION_COLUMNS
            ))
            .bind(order_id.as_str())
            .fetch_optional(tx.as_mut())
            .await?
        }
    };
    Ok(row.as_ref().map(map_commission))
}

/// Approve a commission, persisting the rate that finally applied.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn approve_commission(
    tx: &mut Transaction<'_, Sqlite>,
    id: &CommissionId,
    level: i32,
    percentage: Decimal,
    amount: Money,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE commissions SET
            status = 'approved',
            level = ?,
            commission_percentage = ?,
            commission_amount_minor = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(level)
    .bind(percentage.to_string())
    .bind(amount.to_minor())
    .bind(Utc::now().to_rfc3339())
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Mark a commission cancelled, leaving its amounts untouched for audit.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn cancel_commission(
    tx: &mut Transaction<'_, Sqlite>,
    id: &CommissionId,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE commissions SET status = 'cancelled', updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .execute(tx.as_mut())
        .await?;
    Ok(())
}
