pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AffiliateAccount, AffiliateId, AffiliateSettings, Commission, CommissionStatus, Money, Order,
    OrderId, OrderStatus, PromoCode, Role, User, UserId, Withdrawal, WithdrawalId,
    WithdrawalStatus,
};
pub use error::AppError;
pub use ledger::{CommissionLedger, OutboxProcessor, WithdrawalLedger};
