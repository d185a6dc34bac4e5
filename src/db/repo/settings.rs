//! Affiliate program settings row. Read-only to the ledger; the seed row is
//! created by the migration and merchants edit it elsewhere.

use crate::domain::{AffiliateSettings, CommissionTier, Money};
use sqlx::Row;

use super::Repository;

impl Repository {
    /// Load the settings row, falling back to program defaults when the row
    /// or its tier table cannot be read.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_settings(&self) -> Result<AffiliateSettings, sqlx::Error> {
        let row = sqlx::query(
            "SELECT min_withdrawal_amount_minor, tiers FROM affiliate_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(AffiliateSettings::default_settings());
        };

        let tiers_json: String = row.get("tiers");
        let tiers: Vec<CommissionTier> = serde_json::from_str(&tiers_json)
            .unwrap_or_else(|_| AffiliateSettings::default_settings().tiers);

        Ok(AffiliateSettings {
            min_withdrawal_amount: Money::from_minor(row.get("min_withdrawal_amount_minor")),
            tiers,
        })
    }

    /// Replace the settings row (test and admin tooling).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn put_settings(&self, settings: &AffiliateSettings) -> Result<(), sqlx::Error> {
        let tiers_json =
            serde_json::to_string(&settings.tiers).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        sqlx::query(
            r#"
            INSERT INTO affiliate_settings (id, min_withdrawal_amount_minor, tiers)
            VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                min_withdrawal_amount_minor = excluded.min_withdrawal_amount_minor,
                tiers = excluded.tiers
            "#,
        )
        .bind(settings.min_withdrawal_amount.to_minor())
        .bind(tiers_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
