mod errors;
mod transaction;

use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

pub use errors::RecordError;
pub use transaction::{Transaction, TransactionRecord};

/// The fixed set of causes a processor can attach to a declined attempt.
///
/// This is a closed enumeration on purpose: an unrecognized reason in the
/// input is a load failure, never a silently coerced string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    InsufficientFunds,
    FraudSuspicion,
    TechnicalError,
    #[serde(rename = "3ds_failure")]
    ThreeDsFailure,
    ExpiredCard,
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclineReason::InsufficientFunds => "insufficient_funds",
            DeclineReason::FraudSuspicion => "fraud_suspicion",
            DeclineReason::TechnicalError => "technical_error",
            DeclineReason::ThreeDsFailure => "3ds_failure",
            DeclineReason::ExpiredCard => "expired_card",
        }
    }

    /// Whether the reason points at fraud screening rather than the
    /// cardholder or the processor.
    pub fn is_fraud_related(&self) -> bool {
        matches!(self, DeclineReason::FraudSuspicion)
    }
}

impl Display for DeclineReason {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for DeclineReason {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "insufficient_funds" => Ok(DeclineReason::InsufficientFunds),
            "fraud_suspicion" => Ok(DeclineReason::FraudSuspicion),
            "technical_error" => Ok(DeclineReason::TechnicalError),
            "3ds_failure" => Ok(DeclineReason::ThreeDsFailure),
            "expired_card" => Ok(DeclineReason::ExpiredCard),
            other => Err(RecordError::UnknownDeclineReason(other.to_string())),
        }
    }
}

/// Amount bracket assigned once at load time.
///
/// Brackets are half-open on the left: `(0,50]`, `(50,200]`, `(200,500]`,
/// `(500,inf)`. An amount of exactly 50 therefore lands in `$0-50`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AmountBin {
    UpTo50,
    UpTo200,
    UpTo500,
    Over500,
}

impl AmountBin {
    /// Classifies a positive amount into its bracket. Amounts at or below
    /// zero are out of domain and yield `None`.
    pub fn classify(amount: Decimal) -> Option<AmountBin> {
        if amount <= Decimal::ZERO {
            return None;
        }

        if amount <= Decimal::from(50) {
            Some(AmountBin::UpTo50)
        } else if amount <= Decimal::from(200) {
            Some(AmountBin::UpTo200)
        } else if amount <= Decimal::from(500) {
            Some(AmountBin::UpTo500)
        } else {
            Some(AmountBin::Over500)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AmountBin::UpTo50 => "$0-50",
            AmountBin::UpTo200 => "$50-200",
            AmountBin::UpTo500 => "$200-500",
            AmountBin::Over500 => "$500+",
        }
    }
}

impl Display for AmountBin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

impl FromStr for AmountBin {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_start_matches('$') {
            "0-50" => Ok(AmountBin::UpTo50),
            "50-200" => Ok(AmountBin::UpTo200),
            "200-500" => Ok(AmountBin::UpTo500),
            "500+" => Ok(AmountBin::Over500),
            other => Err(RecordError::UnknownAmountBin(other.to_string())),
        }
    }
}
