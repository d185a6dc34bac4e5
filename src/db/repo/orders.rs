//! Order rows. The storefront owns orders; the ledger reads them and flips
//! their status via the update endpoint.

use crate::domain::{Money, Order, OrderId, OrderStatus, PromoCode};
use chrono::Utc;
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;

use super::{parse_datetime, Repository};

fn map_order(row: &sqlx::sqlite::SqliteRow) -> Order {
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    Order {
        id: OrderId::new(row.get::<String, _>("id")),
        total: Money::from_minor(row.get("total_minor")),
        status: OrderStatus::from_str(&status).unwrap_or(OrderStatus::Pending),
        promo_code: row
            .get::<Option<String>, _>("promo_code")
            .map(PromoCode::new),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    }
}

impl Repository {
    /// Insert a new order.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_order(&self, order: &Order) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, total_minor, status, promo_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.total.to_minor())
        .bind(order.status.as_str())
        .bind(order.promo_code.as_ref().map(|c| c.as_str().to_string()))
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, total_minor, status, promo_code, created_at, updated_at \
             FROM orders WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_order))
    }
}

/// Fetch an order inside a transaction.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_order_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &OrderId,
) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, total_minor, status, promo_code, created_at, updated_at \
         FROM orders WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(tx.as_mut())
    .await?;
    Ok(row.as_ref().map(map_order))
}

/// Write a new order status.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn update_order_status(
    tx: &mut Transaction<'_, Sqlite>,
    id: &OrderId,
    status: OrderStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.as_str())
        .execute(tx.as_mut())
        .await?;
    Ok(())
}
