#[cfg(test)]
mod tests;

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tracing::debug;

use crate::dataset::{Dataset, DayRange};
use crate::models::{AmountBin, Transaction};
use crate::stats::{Summary, mean_amount};

/// Approval probability assumed for a target processor with no history at
/// all in the batch.
pub const DEFAULT_FALLBACK_RATE: f64 = 0.75;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Source and target processor are both [{0}]; pick a different target")]
    SameProcessor(String),
}

/// A counterfactual routing question: what if `source`'s traffic on these
/// days had gone to `target` instead? Empty filter lists mean "all".
#[derive(Debug, Clone)]
pub struct RerouteRequest {
    pub source: String,
    pub target: String,
    pub days: DayRange,
    pub countries: Vec<String>,
    pub methods: Vec<String>,
}

/// Estimated outcome of the re-route. Rates are percentages; simulated
/// approvals is an expected value, not a count.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub affected: usize,
    pub actual_approvals: usize,
    pub actual_rate: f64,
    pub simulated_approvals: f64,
    pub simulated_rate: f64,
    pub rate_delta: f64,
    pub recovered_revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    /// Nothing matched the request; no rates were computed.
    NoMatches,
    Estimated(SimulationReport),
}

/// Estimates counterfactual approvals using the target processor's observed
/// rates for matching segments.
#[derive(Debug, Clone)]
pub struct Simulator {
    fallback_rate: f64,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self { fallback_rate: DEFAULT_FALLBACK_RATE }
    }

    /// Overrides the last-resort approval probability used when the target
    /// processor has no transactions in the batch.
    pub fn with_fallback_rate(mut self, fallback_rate: f64) -> Self {
        self.fallback_rate = fallback_rate;
        self
    }

    /// Runs the what-if estimate over the supplied subset.
    ///
    /// Affected rows are the source processor's traffic inside the day
    /// range; reference rates come from all of the target's rows in the
    /// subset, deliberately not restricted to those days.
    pub fn simulate(
        &self,
        subset: &Dataset,
        request: &RerouteRequest,
    ) -> Result<SimulationOutcome, SimulationError> {
        if request.source == request.target {
            return Err(SimulationError::SameProcessor(request.source.clone()));
        }

        let affected: Vec<&Transaction> = subset
            .iter()
            .filter(|t| {
                t.processor == request.source
                    && request.days.contains(t.day)
                    && (request.countries.is_empty() || request.countries.contains(&t.country))
                    && (request.methods.is_empty() || request.methods.contains(&t.payment_method))
            })
            .collect();

        if affected.is_empty() {
            return Ok(SimulationOutcome::NoMatches);
        }

        let reference = TargetRates::build(subset, &request.target);

        let mut simulated_approvals = 0.0;
        let mut actual_approvals = 0usize;

        for transaction in &affected {
            simulated_approvals += reference.rate_for(transaction, self.fallback_rate);
            if transaction.approved {
                actual_approvals += 1;
            }
        }

        let affected_count = affected.len();
        let actual_rate = actual_approvals as f64 / affected_count as f64 * 100.0;
        let simulated_rate = simulated_approvals / affected_count as f64 * 100.0;
        let mean = mean_amount(affected.iter().copied())
            .and_then(|amount| amount.to_f64())
            .unwrap_or(0.0);
        let recovered_revenue = (simulated_approvals - actual_approvals as f64) * mean;

        debug!(
            affected = affected_count,
            actual_rate, simulated_rate, "Re-route simulation complete"
        );

        Ok(SimulationOutcome::Estimated(SimulationReport {
            affected: affected_count,
            actual_approvals,
            actual_rate,
            simulated_approvals,
            simulated_rate,
            rate_delta: simulated_rate - actual_rate,
            recovered_revenue,
        }))
    }
}

/// The target processor's observed approval tallies at the three reference
/// granularities, most specific first.
struct TargetRates {
    by_bracket: HashMap<(String, String, AmountBin), Summary>,
    by_segment: HashMap<(String, String), Summary>,
    overall: Summary,
}

impl TargetRates {
    fn build(subset: &Dataset, target: &str) -> Self {
        let mut by_bracket: HashMap<(String, String, AmountBin), Summary> = HashMap::new();
        let mut by_segment: HashMap<(String, String), Summary> = HashMap::new();
        let mut overall = Summary::default();

        for t in subset.transactions().iter().filter(|t| t.processor == target) {
            by_bracket
                .entry((t.country.clone(), t.payment_method.clone(), t.amount_bin))
                .or_default()
                .observe(t.approved);
            by_segment
                .entry((t.country.clone(), t.payment_method.clone()))
                .or_default()
                .observe(t.approved);
            overall.observe(t.approved);
        }

        TargetRates { by_bracket, by_segment, overall }
    }

    /// Walks the fallback chain for one affected transaction: exact
    /// segment+bracket, then segment, then the target's overall rate, then
    /// the configured default. Returns a probability in `[0, 1]`.
    fn rate_for(&self, transaction: &Transaction, fallback: f64) -> f64 {
        let bracket_key = (
            transaction.country.clone(),
            transaction.payment_method.clone(),
            transaction.amount_bin,
        );
        let segment_key = (transaction.country.clone(), transaction.payment_method.clone());

        self.by_bracket
            .get(&bracket_key)
            .and_then(Summary::rate)
            .or_else(|| self.by_segment.get(&segment_key).and_then(Summary::rate))
            .or_else(|| self.overall.rate())
            .map(|rate| rate / 100.0)
            .unwrap_or(fallback)
    }
}
