//! Domain identifier newtypes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                $name(value.into())
            }

            /// Fresh random identifier.
            pub fn generate() -> Self {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Affiliate account identifier.
    AffiliateId
);
string_id!(
    /// Order identifier.
    OrderId
);
string_id!(
    /// User identifier (owner of an affiliate account, or a merchant).
    UserId
);
string_id!(
    /// Withdrawal request identifier.
    WithdrawalId
);
string_id!(
    /// Commission record identifier.
    CommissionId
);

/// Human-shareable affiliate promo code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromoCode(pub String);

impl PromoCode {
    /// Promo codes are matched case-insensitively; store uppercase.
    pub fn new(code: impl Into<String>) -> Self {
        PromoCode(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PromoCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
