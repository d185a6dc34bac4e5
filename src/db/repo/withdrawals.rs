//! Withdrawal rows and the read-side listing join.

use crate::domain::{
    AffiliateId, AffiliateUser, Money, PaymentMethod, PromoCode, UserId, Withdrawal,
    WithdrawalId, WithdrawalStatus,
};
use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;

use super::{parse_datetime, Repository};

const WITHDRAWAL_COLUMNS: &str = "id, affiliate_id, amount_minor, payment_method, \
     payment_details, status, requested_at, processed_at, processed_by, notes";

fn map_withdrawal(row: &sqlx::sqlite::SqliteRow) -> Withdrawal {
    let details: String = row.get("payment_details");
    let method: String = row.get("payment_method");
    let status: String = row.get("status");
    let requested_at: String = row.get("requested_at");
    let payment_method = serde_json::from_str(&details).unwrap_or(PaymentMethod::MobileWallet {
        provider: method,
        mobile_number: String::new(),
    });
    Withdrawal {
        id: WithdrawalId::new(row.get::<String, _>("id")),
        affiliate_id: AffiliateId::new(row.get::<String, _>("affiliate_id")),
        amount: Money::from_minor(row.get("amount_minor")),
        payment_method,
        status: WithdrawalStatus::from_str(&status).unwrap_or(WithdrawalStatus::Pending),
        requested_at: parse_datetime(&requested_at),
        processed_at: row
            .get::<Option<String>, _>("processed_at")
            .map(|s| parse_datetime(&s)),
        processed_by: row.get::<Option<String>, _>("processed_by").map(UserId::new),
        notes: row.get("notes"),
    }
}

/// A withdrawal enriched with affiliate and user display fields.
#[derive(Debug, Clone)]
pub struct WithdrawalListItem {
    pub withdrawal: Withdrawal,
    pub promo_code: PromoCode,
    pub user: AffiliateUser,
}

impl Repository {
    /// Fetch a withdrawal by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_withdrawal(
        &self,
        id: &WithdrawalId,
    ) -> Result<Option<Withdrawal>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM withdrawals WHERE id = ?",
            WITHDRAWAL_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_withdrawal))
    }

    /// Sum of amounts currently reserved by pending withdrawals.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn sum_pending_withdrawals(
        &self,
        affiliate_id: &AffiliateId,
    ) -> Result<Money, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_minor), 0) AS total
            FROM withdrawals
            WHERE affiliate_id = ? AND status = 'pending'
            "#,
        )
        .bind(affiliate_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_minor(row.get("total")))
    }

    /// List withdrawals with optional affiliate/status filters, each joined
    /// with the affiliate's promo code and the owning user's display fields.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_withdrawals(
        &self,
        affiliate_id: Option<&AffiliateId>,
        status: Option<WithdrawalStatus>,
    ) -> Result<Vec<WithdrawalListItem>, sqlx::Error> {
        let mut sql = String::from(
            "SELECT w.id, w.affiliate_id, w.amount_minor, w.payment_method, \
             w.payment_details, w.status, w.requested_at, w.processed_at, \
             w.processed_by, w.notes, \
             a.promo_code, u.full_name, u.email, u.phone \
             FROM withdrawals w \
             JOIN affiliates a ON a.id = w.affiliate_id \
             JOIN users u ON u.id = a.user_id \
             WHERE 1 = 1",
        );
        if affiliate_id.is_some() {
            sql.push_str(" AND w.affiliate_id = ?");
        }
        if status.is_some() {
            sql.push_str(" AND w.status = ?");
        }
        sql.push_str(" ORDER BY w.requested_at DESC");

        let mut query = sqlx::query(&sql);
        if let Some(id) = affiliate_id {
            query = query.bind(id.as_str().to_string());
        }
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| WithdrawalListItem {
                withdrawal: map_withdrawal(row),
                promo_code: PromoCode::new(row.get::<String, _>("promo_code")),
                user: AffiliateUser {
                    full_name: row.get("full_name"),
                    email: row.get("email"),
                    phone: row.get("phone"),
                },
            })
            .collect())
    }
}

/// Insert a freshly created withdrawal inside the reservation transaction.
///
/// # Errors
/// Returns an error if the insert fails.
pub async fn insert_withdrawal(
    tx: &mut Transaction<'_, Sqlite>,
    withdrawal: &Withdrawal,
) -> Result<(), sqlx::Error> {
    let details = serde_json::to_string(&withdrawal.payment_method)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    sqlx::query(
        r#"
        INSERT INTO withdrawals (
            id, affiliate_id, amount_minor, payment_method, payment_details,
            status, requested_at, processed_at, processed_by, notes
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(withdrawal.id.as_str())
    .bind(withdrawal.affiliate_id.as_str())
    .bind(withdrawal.amount.to_minor())
    .bind(withdrawal.payment_method.name().to_string())
    .bind(details)
    .bind(withdrawal.status.as_str())
    .bind(withdrawal.requested_at.to_rfc3339())
    .bind(withdrawal.processed_at.map(|t| t.to_rfc3339()))
    .bind(withdrawal.processed_by.as_ref().map(|u| u.as_str().to_string()))
    .bind(withdrawal.notes.as_deref())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}

/// Fetch a withdrawal inside a transaction.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn get_withdrawal_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &WithdrawalId,
) -> Result<Option<Withdrawal>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM withdrawals WHERE id = ?",
        WITHDRAWAL_COLUMNS
    ))
    .bind(id.as_str())
    .fetch_optional(tx.as_mut())
    .await?;
    Ok(row.as_ref().map(map_withdrawal))
}

/// Write a withdrawal's resolution fields.
///
/// # Errors
/// Returns an error if the update fails.
pub async fn resolve_withdrawal(
    tx: &mut Transaction<'_, Sqlite>,
    id: &WithdrawalId,
    status: WithdrawalStatus,
    processed_at: Option<DateTime<Utc>>,
    processed_by: Option<&UserId>,
    notes: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE withdrawals SET
            status = ?,
            processed_at = COALESCE(?, processed_at),
            processed_by = COALESCE(?, processed_by),
            notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(processed_at.map(|t| t.to_rfc3339()))
    .bind(processed_by.map(|u| u.as_str().to_string()))
    .bind(notes)
    .bind(id.as_str())
    .execute(tx.as_mut())
    .await?;
    Ok(())
}
