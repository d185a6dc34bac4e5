//! Ledger components: the business rules over the repository.

pub mod commission;
pub mod outbox;
pub mod withdrawal;

pub use commission::{CommissionError, CommissionLedger, CommissionOutcome};
pub use outbox::OutboxProcessor;
pub use withdrawal::{WithdrawalError, WithdrawalLedger};
