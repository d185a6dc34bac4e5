//! Affiliate program settings: withdrawal floor and the commission tier table.
//!
//! The tier table maps a cumulative delivered-order count to a level and a
//! commission percentage. `calculate_level` and `calculate_commission` are the
//! only two places tier semantics live; both ledgers go through them.

use crate::domain::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTier {
    pub level: i32,
    /// Minimum cumulative delivered orders to qualify for this tier.
    pub min_delivered_orders: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub commission_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateSettings {
    pub min_withdrawal_amount: Money,
    pub tiers: Vec<CommissionTier>,
}

impl AffiliateSettings {
    /// Program defaults, seeded by the migration when no settings row exists.
    pub fn default_settings() -> Self {
        let pct = |s: &str| Decimal::from_str(s).unwrap();
        AffiliateSettings {
            min_withdrawal_amount: Money::from_str("500").unwrap(),
            tiers: vec![
                CommissionTier {
                    level: 1,
                    min_delivered_orders: 0,
                    commission_percentage: pct("5"),
                },
                CommissionTier {
                    level: 2,
                    min_delivered_orders: 10,
                    commission_percentage: pct("7.5"),
                },
                CommissionTier {
                    level: 3,
                    min_delivered_orders: 25,
                    commission_percentage: pct("10"),
                },
                CommissionTier {
                    level: 4,
                    min_delivered_orders: 50,
                    commission_percentage: pct("12"),
                },
            ],
        }
    }
}

/// Level an affiliate qualifies for with the given delivered-order count.
///
/// Highest tier whose threshold is met; level 1 when the table is empty or
/// nothing matches yet.
pub fn calculate_level(delivered_orders: i64, settings: &AffiliateSettings) -> i32 {
    settings
        .tiers
        .iter()
        .filter(|t| delivered_orders >= t.min_delivered_orders)
        .map(|t| t.level)
        .max()
        .unwrap_or(1)
}

/// Commission rate and amount for an order total at a given level.
///
/// `None` when the tier table has no bracket for the level; callers must
/// treat that as "leave the existing amount unchanged".
pub fn calculate_commission(
    order_total: Money,
    level: i32,
    settings: &AffiliateSettings,
) -> Option<(Decimal, Money)> {
    let tier = settings.tiers.iter().find(|t| t.level == level)?;
    Some((
        tier.commission_percentage,
        order_total.percent(tier.commission_percentage),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds() {
        let s = AffiliateSettings::default_settings();
        assert_eq!(calculate_level(0, &s), 1);
        assert_eq!(calculate_level(9, &s), 1);
        assert_eq!(calculate_level(10, &s), 2);
        assert_eq!(calculate_level(24, &s), 2);
        assert_eq!(calculate_level(25, &s), 3);
        assert_eq!(calculate_level(500, &s), 4);
    }

    #[test]
    fn empty_tier_table_defaults_to_level_one() {
        let s = AffiliateSettings {
            min_withdrawal_amount: Money::zero(),
            tiers: vec![],
        };
        assert_eq!(calculate_level(42, &s), 1);
    }

    #[test]
    fn commission_for_known_level() {
        let s = AffiliateSettings::default_settings();
        let (pct, amount) =
            calculate_commission(Money::from_str("1000").unwrap(), 2, &s).unwrap();
        assert_eq!(pct, Decimal::from_str("7.5").unwrap());
        assert_eq!(amount, Money::from_str("75").unwrap());
    }

    #[test]
    fn commission_missing_bracket_is_none() {
        let s = AffiliateSettings::default_settings();
        assert!(calculate_commission(Money::from_str("1000").unwrap(), 9, &s).is_none());
    }
}
