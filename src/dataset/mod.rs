mod cohort;
mod loader;

use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::models::{AmountBin, DeclineReason, Transaction, TransactionRecord};
use crate::stats::Summary;

pub use cohort::{CohortComparison, CohortSnapshot, compare_cohorts};
pub use loader::{LoadError, from_csv_reader, from_json_reader, load_from_path};

/// Inclusive day-of-month window, e.g. `16-30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: u32,
    pub end: u32,
}

impl DayRange {
    pub fn new(start: u32, end: u32) -> Self {
        DayRange { start, end }
    }

    pub fn contains(&self, day: u32) -> bool {
        (self.start..=self.end).contains(&day)
    }
}

impl Display for DayRange {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Error)]
#[error("Day range must look like A-B with 1 <= A <= B <= 31, got [{0}]")]
pub struct ParseDayRangeError(String);

impl FromStr for DayRange {
    type Err = ParseDayRangeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDayRangeError(value.to_string());
        let (start, end) = value.split_once('-').ok_or_else(invalid)?;
        let start: u32 = start.trim().parse().map_err(|_| invalid())?;
        let end: u32 = end.trim().parse().map_err(|_| invalid())?;

        if start < 1 || start > end || end > 31 {
            return Err(invalid());
        }

        Ok(DayRange::new(start, end))
    }
}

/// Request-scoped selection handed in by the caller alongside a dataset.
///
/// Empty lists mean "no constraint". The decline-reason list only constrains
/// declined transactions: approved rows always pass it, so narrowing by
/// reason never hides approvals.
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub days: Option<DayRange>,
    pub countries: Vec<String>,
    pub processors: Vec<String>,
    pub methods: Vec<String>,
    pub amount_bins: Vec<AmountBin>,
    pub decline_reasons: Vec<DeclineReason>,
}

impl FilterCriteria {
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(days) = self.days {
            if !days.contains(transaction.day) {
                return false;
            }
        }

        if !self.countries.is_empty() && !self.countries.contains(&transaction.country) {
            return false;
        }

        if !self.processors.is_empty() && !self.processors.contains(&transaction.processor) {
            return false;
        }

        if !self.methods.is_empty() && !self.methods.contains(&transaction.payment_method) {
            return false;
        }

        if !self.amount_bins.is_empty() && !self.amount_bins.contains(&transaction.amount_bin) {
            return false;
        }

        if !self.decline_reasons.is_empty() && !transaction.approved {
            return transaction
                .decline_reason
                .is_some_and(|reason| self.decline_reasons.contains(&reason));
        }

        true
    }
}

/// Headline numbers for a subset, as shown at the top of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total: usize,
    pub approved: usize,
    pub declined: usize,
    pub approval_rate: Option<f64>,
    pub volume: Decimal,
}

/// An immutable, validated batch of transactions.
///
/// Filtering always clones matching records into a fresh `Dataset`; nothing
/// downstream ever mutates a loaded batch.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    transactions: Vec<Transaction>,
}

impl Dataset {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Dataset { transactions }
    }

    /// Validates and promotes raw records into a dataset.
    ///
    /// This is the single funnel for every input format, and the only place
    /// the load can abort: invariant violations and duplicate ids fail fast
    /// here instead of surfacing later inside a rule.
    pub fn from_records(records: Vec<TransactionRecord>) -> Result<Self, LoadError> {
        let mut seen = HashSet::with_capacity(records.len());
        let mut transactions = Vec::with_capacity(records.len());

        for record in records {
            if !seen.insert(record.id.clone()) {
                return Err(LoadError::DuplicateId { id: record.id });
            }

            let id = record.id.clone();
            let transaction =
                Transaction::try_from(record).map_err(|source| LoadError::Record { id, source })?;
            transactions.push(transaction);
        }

        debug!("Validated batch of {} transactions", transactions.len());

        Ok(Dataset::new(transactions))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Applies the criteria and returns the matching subset as a new batch.
    pub fn filter(&self, criteria: &FilterCriteria) -> Dataset {
        Dataset::new(
            self.transactions
                .iter()
                .filter(|transaction| criteria.matches(transaction))
                .cloned()
                .collect(),
        )
    }

    /// Distinct processors in first-encounter order.
    pub fn processors(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut processors = Vec::new();

        for transaction in &self.transactions {
            if seen.insert(transaction.processor.as_str()) {
                processors.push(transaction.processor.clone());
            }
        }

        processors
    }

    pub fn kpis(&self) -> Kpis {
        let mut summary = Summary::default();
        let mut volume = Decimal::ZERO;

        for transaction in &self.transactions {
            summary.observe(transaction.approved);
            volume += transaction.amount;
        }

        Kpis {
            total: summary.total,
            approved: summary.approved,
            declined: summary.declined(),
            approval_rate: summary.rate(),
            volume,
        }
    }
}
