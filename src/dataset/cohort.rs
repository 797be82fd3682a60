use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::dataset::{Dataset, DayRange, FilterCriteria, Kpis};
use crate::models::DeclineReason;
use crate::stats::{Summary, group_by};

/// One comparison period: its KPIs plus per-dimension approval summaries.
#[derive(Debug, Clone)]
pub struct CohortSnapshot {
    pub range: DayRange,
    pub kpis: Kpis,
    pub by_country: Vec<(String, Summary)>,
    pub by_method: Vec<(String, Summary)>,
    pub by_processor: Vec<(String, Summary)>,
    /// Decline reasons by count, descending; ties keep encounter order.
    pub decline_counts: Vec<(DeclineReason, usize)>,
}

/// Side-by-side view of two day-range cohorts drawn from the same subset.
#[derive(Debug, Clone)]
pub struct CohortComparison {
    pub period_a: CohortSnapshot,
    pub period_b: CohortSnapshot,
}

impl CohortComparison {
    /// Approval-rate difference A minus B, when both periods have data.
    pub fn rate_delta(&self) -> Option<f64> {
        match (self.period_a.kpis.approval_rate, self.period_b.kpis.approval_rate) {
            (Some(rate_a), Some(rate_b)) => Some(rate_a - rate_b),
            _ => None,
        }
    }

    pub fn volume_delta(&self) -> Decimal {
        self.period_a.kpis.volume - self.period_b.kpis.volume
    }
}

/// Builds both period snapshots from the caller's (already filtered) subset.
pub fn compare_cohorts(dataset: &Dataset, period_a: DayRange, period_b: DayRange) -> CohortComparison {
    CohortComparison {
        period_a: snapshot(dataset, period_a),
        period_b: snapshot(dataset, period_b),
    }
}

fn snapshot(dataset: &Dataset, range: DayRange) -> CohortSnapshot {
    let subset = dataset.filter(&FilterCriteria {
        days: Some(range),
        ..FilterCriteria::default()
    });

    let by_country = group_by(subset.iter(), |t| t.country.clone()).into_iter().collect();
    let by_method = group_by(subset.iter(), |t| t.payment_method.clone()).into_iter().collect();
    let by_processor = group_by(subset.iter(), |t| t.processor.clone()).into_iter().collect();

    CohortSnapshot {
        range,
        kpis: subset.kpis(),
        by_country,
        by_method,
        by_processor,
        decline_counts: decline_counts(&subset),
    }
}

fn decline_counts(subset: &Dataset) -> Vec<(DeclineReason, usize)> {
    let mut order: Vec<DeclineReason> = Vec::new();
    let mut counts: HashMap<DeclineReason, usize> = HashMap::new();

    for transaction in subset.iter().filter(|t| !t.approved) {
        if let Some(reason) = transaction.decline_reason {
            counts
                .entry(reason)
                .and_modify(|count| *count += 1)
                .or_insert_with(|| {
                    order.push(reason);
                    1
                });
        }
    }

    let mut ranked: Vec<(DeclineReason, usize)> =
        order.into_iter().map(|reason| (reason, counts[&reason])).collect();
    ranked.sort_by(|left, right| right.1.cmp(&left.1));

    ranked
}
