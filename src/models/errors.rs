use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::DeclineReason;

/// Validation failures for a single input record. Any of these aborts the
/// load; the engines never see a half-valid transaction.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Amount must be positive, got [{amount}]")]
    NonPositiveAmount { amount: Decimal },
    #[error("Declined transaction is missing a decline reason")]
    MissingDeclineReason,
    #[error("Approved transaction carries decline reason [{reason}]")]
    ReasonOnApproved { reason: DeclineReason },
    #[error("Unknown decline reason [{0}]")]
    UnknownDeclineReason(String),
    #[error("Unknown amount bracket [{0}]")]
    UnknownAmountBin(String),
}
