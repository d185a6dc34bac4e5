//! Affiliate account rows and the atomic increment operations on them.
//!
//! Every balance mutation is expressed as `SET x = x + ?` so concurrent
//! commission approvals and withdrawal requests compose without
//! read-modify-write races on the same field.

use crate::domain::{AffiliateAccount, AffiliateId, Money, PromoCode, UserId};
use sqlx::{Row, Sqlite, Transaction};

use super::{parse_datetime, Repository};

const ACCOUNT_COLUMNS: &str = "id, user_id, promo_code, current_level, total_earnings_minor, \
     available_balance_minor, total_withdrawn_minor, total_orders, delivered_orders, created_at";

fn map_account(row: &sqlx::sqlite::SqliteRow) -> AffiliateAccount {
    let created_at: String = row.get("created_at");
    AffiliateAccount {
        id: AffiliateId::new(row.get::<String, _>("id")),
        user_id: UserId::new(row.get::<String, _>("user_id")),
        promo_code: PromoCode::new(row.get::<String, _>("promo_code")),
        current_level: row.get("current_level"),
        total_earnings: Money::from_minor(row.get("total_earnings_minor")),
        available_balance: Money::from_minor(row.get("available_balance_minor")),
        total_withdrawn: Money::from_minor(row.get("total_withdrawn_minor")),
        total_orders: row.get("total_orders"),
        delivered_orders: row.get("delivered_orders"),
        created_at: parse_datetime(&created_at),
    }
}

impl Repository {
    /// Insert a new affiliate account.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including promo code collisions).
    pub async fn insert_affiliate(&self, account: &AffiliateAccount) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO affiliates (
                id, user_id, promo_code, current_level, total_earnings_minor,
                available_balance_minor, total_withdrawn_minor, total_orders,
                delivered_orders, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.id.as_str())
        .bind(account.user_id.as_str())
        .bind(account.promo_code.as_str())
        .bind(account.current_level)
        .bind(account.total_earnings.to_minor())
        .bind(account.available_balance.to_minor())
        .bind(account.total_withdrawn.to_minor())
        .bind(account.total_orders)
        .bind(account.delivered_orders)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an account by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_account(
        &self,
        id: &AffiliateId,
    ) -> Result<Option<AffiliateAccount>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM affiliates WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_account))
    }

    /// Fetch the account owned by a user.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_account_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<AffiliateAccount>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM affiliates WHERE user_id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_account))
    }

    /// Resolve a promo code to the owning account.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_account_by_promo(
        &self,
        code: &PromoCode,
    ) -> Result<Option<AffiliateAccount>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM affiliates WHERE promo_code = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_account))
    }

    /// Count a newly attributed qualifying order.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn add_total_order(&self, id: &AffiliateId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE affiliates SET total_orders = total_orders + 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Overwrite the stored available balance (self-healing correction only).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_available_balance(
        &self,
        id: &AffiliateId,
        balance: Money,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE affiliates SET available_balance_minor = ? WHERE id = ?")
            .bind(balance.to_minor())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Read an account's delivered count inside the transaction.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_delivered_count_tx(
    tx: &mut Transaction<'_, Sqlite>,
    affiliate_id: &AffiliateId,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query("SELECT delivered_orders FROM affiliates WHERE id = ?")
        .bind(affiliate_id.as_str())
        .fetch_optional(tx.as_mut())
        .await?;
    Ok(row.map(|r| r.get("delivered_orders")))
}

/// Credit a delivered order's commission onto the account.
///
/// Increments earnings, balance and the delivered count atomically and writes
/// the freshly computed level in the same statement, inside the caller's
/// transaction.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn credit_delivery(
    tx: &mut Transaction<'_, Sqlite>,
    id: &AffiliateId,
    amount: Money,
    new_level: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE affiliates SET
            total_earnings_minor = total_earnings_minor + ?,
            available_balance_minor = available_balance_minor + ?,
            delivered_orders = delivered_orders + 1,
            current_level = ?
        WHERE id = ?
        "#,
    )
    .bind(amount.to_minor())
    .bind(amount.to_minor())
    .bind(new_level)
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Reverse a previously credited delivery after the order was cancelled.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn reverse_delivery(
    tx: &mut Transaction<'_, Sqlite>,
    id: &AffiliateId,
    amount: Money,
    new_level: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE affiliates SET
            total_earnings_minor = total_earnings_minor - ?,
            available_balance_minor = available_balance_minor - ?,
            delivered_orders = delivered_orders - 1,
            total_orders = total_orders - 1,
            current_level = ?
        WHERE id = ?
        "#,
    )
    .bind(amount.to_minor())
    .bind(amount.to_minor())
    .bind(new_level)
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Reserve balance for a withdrawal request.
///
/// The decrement is conditional on sufficiency, so two racing requests can
/// never both drain the same funds. Returns false when the balance was
/// insufficient (no row changed).
///
/// # Errors
/// Returns an error if the update fails.
pub async fn reserve_balance(
    tx: &mut Transaction<'_, Sqlite>,
    id: &AffiliateId,
    amount: Money,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE affiliates
        SET available_balance_minor = available_balance_minor - ?
        WHERE id = ? AND available_balance_minor >= ?
        "#,
    )
    .bind(amount.to_minor())
    .bind(id.as_str())
    .bind(amount.to_minor())
    .execute(tx.as_mut())
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Refund a reserved amount after a rejection or cancellation.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn refund_balance(
    tx: &mut Transaction<'_, Sqlite>,
    id: &AffiliateId,
    amount: Money,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE affiliates SET available_balance_minor = available_balance_minor + ? WHERE id = ?",
    )
    .bind(amount.to_minor())
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Record a completed payout in the cumulative withdrawn total.
///
/// The available balance was already reserved at request creation; this only
/// moves the cumulative counter.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn add_withdrawn(
    tx: &mut Transaction<'_, Sqlite>,
    id: &AffiliateId,
    amount: Money,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE affiliates SET total_withdrawn_minor = total_withdrawn_minor + ? WHERE id = ?",
    )
    .bind(amount.to_minor())
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
