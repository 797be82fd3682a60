
use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use tracing::debug;

use crate::dataset::Dataset;
use crate::patterns::{self, DEFAULT_SPLIT_DAY, MIN_SAMPLE};
use crate::stats::approval_rate;

const SEGMENT_MIN_VOLUME: usize = 10;

/// How loudly a finding should be surfaced. `Error` sorts before `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

impl Display for Severity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        })
    }
}

/// Stable identity of a finding: the rule plus the dimension values it
/// fired on. Dedup and outage suppression work on these, never on the
/// formatted display strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FindingKey {
    ProcessorOutage { processor: String, date: NaiveDate },
    DailyApprovalDrop { date: NaiveDate },
    CountryMethodGap { country: String, method: String },
    HighValueGap,
    ThreeDsSpike { region: &'static str },
    ProcessorCountryGap { processor: String, country: String },
}

/// One detected anomaly, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub key: FindingKey,
    pub title: String,
    pub text: String,
}

/// Scans a subset with the fixed anomaly rule battery.
///
/// Evaluation is a pure function of the subset: no state survives between
/// calls and the same input always yields the same ordered findings.
#[derive(Debug, Clone)]
pub struct InsightEngine {
    split_day: u32,
}

impl Default for InsightEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InsightEngine {
    pub fn new() -> Self {
        Self { split_day: DEFAULT_SPLIT_DAY }
    }

    /// Overrides the boundary between the two timing cohorts of the 3DS
    /// spike rule, for periods that are not 30-day months.
    pub fn with_split_day(mut self, split_day: u32) -> Self {
        self.split_day = split_day;
        self
    }

    /// Evaluates every rule and returns unique findings, errors before
    /// warnings, in stable rule order within each severity.
    ///
    /// Subsets below the minimum sample size yield no findings at all.
    pub fn evaluate(&self, subset: &Dataset) -> Vec<Finding> {
        if subset.len() < MIN_SAMPLE {
            debug!(rows = subset.len(), "Subset below minimum sample, skipping insight rules");
            return Vec::new();
        }

        let Some(overall_rate) = approval_rate(subset.iter()) else {
            return Vec::new();
        };

        let mut findings = Vec::new();

        let mut outage_dates: HashSet<NaiveDate> = HashSet::new();

        for outage in patterns::processor_day_outages(subset) {
            let Some(breakdown) = outage.breakdown else { continue };
            outage_dates.insert(outage.date);
            findings.push(Finding {
                severity: Severity::Error,
                key: FindingKey::ProcessorOutage {
                    processor: outage.processor.clone(),
                    date: outage.date,
                },
                title: format!("{} outage on {}", outage.processor, outage.date),
                text: format!(
                    "{} had only {:.1}% approval on {} ({} transactions). \
                     {} made up {:.0}% of declines; likely a technical incident.",
                    outage.processor,
                    outage.rate,
                    outage.date,
                    outage.total,
                    breakdown.top_reason,
                    breakdown.share
                ),
            });
        }

        for day_drop in patterns::daily_drops(subset, overall_rate) {
            // An outage finding already explains that day.
            if outage_dates.contains(&day_drop.date) {
                debug!(date = %day_drop.date, "Daily drop suppressed by outage finding");
                continue;
            }

            let Some(breakdown) = day_drop.breakdown else { continue };
            findings.push(Finding {
                severity: Severity::Error,
                key: FindingKey::DailyApprovalDrop { date: day_drop.date },
                title: format!("Approval rate drop on {}", day_drop.date),
                text: format!(
                    "Approval fell to {:.1}% on {} ({:.0}pp below the average of {:.1}%). \
                     {} was worst at {:.1}%. Top decline: {} ({:.0}% of that day's declines).",
                    day_drop.rate,
                    day_drop.date,
                    day_drop.drop,
                    overall_rate,
                    day_drop.worst_processor,
                    day_drop.worst_rate,
                    breakdown.top_reason,
                    breakdown.share
                ),
            });
        }

        for gap in patterns::segment_gaps(subset, overall_rate, SEGMENT_MIN_VOLUME) {
            findings.push(Finding {
                severity: Severity::Warning,
                key: FindingKey::CountryMethodGap {
                    country: gap.country.clone(),
                    method: gap.method.clone(),
                },
                title: format!("{} in {} underperforming", gap.method, gap.country),
                text: format!(
                    "{} in {} has only {:.1}% approval ({:.0}pp below average). \
                     Top decline: {} ({:.0}% of declines, {} txns).",
                    gap.method,
                    gap.country,
                    gap.rate,
                    gap.drop,
                    gap.breakdown.top_reason,
                    gap.breakdown.share,
                    gap.total
                ),
            });
        }

        if let Some(gap) = patterns::high_value_gap(subset, overall_rate) {
            findings.push(Finding {
                severity: Severity::Warning,
                key: FindingKey::HighValueGap,
                title: "High-value transactions (>$400) underperforming".to_string(),
                text: format!(
                    "Transactions above $400 have {:.1}% approval, {:.0}pp lower than \
                     overall ({:.1}%). Primary driver: {} ({:.0}% of high-value declines, {} txns).",
                    gap.rate,
                    gap.gap,
                    overall_rate,
                    gap.breakdown.top_reason,
                    gap.breakdown.share,
                    gap.total
                ),
            });
        }

        for spike in patterns::three_ds_spikes(subset, self.split_day) {
            let timing = if spike.second_half_surge {
                " The spike started in the second half of the period."
            } else {
                ""
            };

            findings.push(Finding {
                severity: Severity::Warning,
                key: FindingKey::ThreeDsSpike { region: spike.region.label },
                title: format!("3DS failure spike in {}", spike.region.label),
                text: format!(
                    "{:.0}% of card declines in {} are 3DS failures ({} declined card txns).{} \
                     Investigate the 3DS configuration for this region.",
                    spike.share, spike.region.label, spike.declines, timing
                ),
            });
        }

        for gap in patterns::processor_country_gaps(subset, overall_rate, SEGMENT_MIN_VOLUME) {
            let Some(breakdown) = gap.breakdown else { continue };
            findings.push(Finding {
                severity: Severity::Warning,
                key: FindingKey::ProcessorCountryGap {
                    processor: gap.processor.clone(),
                    country: gap.country.clone(),
                },
                title: format!("{} underperforming in {}", gap.processor, gap.country),
                text: format!(
                    "{} in {}: {:.1}% approval ({:.0}pp below average). \
                     Top decline: {} ({:.0}%, {} txns).",
                    gap.processor,
                    gap.country,
                    gap.rate,
                    gap.drop,
                    breakdown.top_reason,
                    breakdown.share,
                    gap.total
                ),
            });
        }

        dedup_and_rank(findings)
    }
}

/// Drops later findings that share a key with an earlier one, then floats
/// errors above warnings without disturbing relative order.
fn dedup_and_rank(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Finding> = findings
        .into_iter()
        .filter(|finding| seen.insert(finding.key.clone()))
        .collect();

    unique.sort_by_key(|finding| finding.severity);

    unique
}
