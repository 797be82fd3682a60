use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{AmountBin, DeclineReason, RecordError};

/// One input row as handed over by the data source, before validation.
///
/// `decline_reason` is optional at this stage because approved rows carry
/// none; the approved/reason invariant is only enforced when the record is
/// promoted to a [`Transaction`].
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub country: String,
    pub payment_method: String,
    pub processor: String,
    pub amount: Decimal,
    pub approved: bool,
    #[serde(default)]
    pub decline_reason: Option<DeclineReason>,
}

/// A validated payment attempt.
///
/// The bucketing fields (`date`, `day`, `hour`, `amount_bin`) are derived
/// exactly once here and treated as read-only afterwards; every rule
/// evaluator groups on them without re-deriving.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub country: String,
    pub payment_method: String,
    pub processor: String,
    pub amount: Decimal,
    pub approved: bool,
    /// Present iff `approved` is false.
    pub decline_reason: Option<DeclineReason>,
    pub date: NaiveDate,
    pub day: u32,
    pub hour: u32,
    pub amount_bin: AmountBin,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = RecordError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        match (record.approved, record.decline_reason) {
            (true, Some(reason)) => return Err(RecordError::ReasonOnApproved { reason }),
            (false, None) => return Err(RecordError::MissingDeclineReason),
            _ => {}
        }

        let amount_bin = AmountBin::classify(record.amount)
            .ok_or(RecordError::NonPositiveAmount { amount: record.amount })?;

        let date = record.timestamp.date();

        Ok(Transaction {
            id: record.id,
            country: record.country,
            payment_method: record.payment_method,
            processor: record.processor,
            amount: record.amount,
            approved: record.approved,
            decline_reason: record.decline_reason,
            date,
            day: date.day(),
            hour: record.timestamp.hour(),
            amount_bin,
            timestamp: record.timestamp,
        })
    }
}
