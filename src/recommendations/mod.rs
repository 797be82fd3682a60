
use std::collections::HashSet;
use std::fmt;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use tracing::debug;

use crate::dataset::Dataset;
use crate::markets::alternative_method;
use crate::models::DeclineReason;
use crate::patterns::{self, DEFAULT_SPLIT_DAY, MIN_SAMPLE};
use crate::stats::approval_rate;

const SEGMENT_MIN_VOLUME: usize = 10;
const REROUTE_MIN_VOLUME: usize = 15;

/// Urgency of a remediation action. `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Display for Priority {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        })
    }
}

/// Stable identity of an action, used for dedup instead of the display
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKey {
    EscalateOutage { processor: String, date: NaiveDate },
    RerouteCountry { processor: String, country: String },
    InvestigateThreeDs { region: &'static str },
    ReviewFraudRules,
    OfferInstallments,
    SegmentFailover { country: String, method: String },
    SurfaceAlternative { country: String, method: String },
}

/// One suggested remediation, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub priority: Priority,
    pub key: ActionKey,
    pub action: String,
    pub detail: String,
}

/// Turns the same statistical triggers the insight battery watches into
/// prioritized remediation actions.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    split_day: u32,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self { split_day: DEFAULT_SPLIT_DAY }
    }

    /// See [`crate::insights::InsightEngine::with_split_day`].
    pub fn with_split_day(mut self, split_day: u32) -> Self {
        self.split_day = split_day;
        self
    }

    /// Evaluates the action rules and returns unique recommendations in
    /// non-decreasing priority order (high, medium, low).
    pub fn evaluate(&self, subset: &Dataset) -> Vec<Recommendation> {
        if subset.len() < MIN_SAMPLE {
            debug!(rows = subset.len(), "Subset below minimum sample, skipping action rules");
            return Vec::new();
        }

        let Some(overall_rate) = approval_rate(subset.iter()) else {
            return Vec::new();
        };

        let mut recommendations = Vec::new();

        for outage in patterns::processor_day_outages(subset) {
            let failover = failover_clause(&outage.peer_processors);
            recommendations.push(Recommendation {
                priority: Priority::High,
                key: ActionKey::EscalateOutage {
                    processor: outage.processor.clone(),
                    date: outage.date,
                },
                action: format!("Escalate {} outage on {}", outage.processor, outage.date),
                detail: format!(
                    "{} dropped to {:.0}% approval on {}. Open a P1 ticket with {} \
                     immediately.{}",
                    outage.processor, outage.rate, outage.date, outage.processor, failover
                ),
            });
        }

        for gap in patterns::processor_country_gaps(subset, overall_rate, REROUTE_MIN_VOLUME) {
            let targets = if gap.peer_processors.is_empty() {
                "another processor".to_string()
            } else {
                gap.peer_processors.join(" or ")
            };

            recommendations.push(Recommendation {
                priority: Priority::Medium,
                key: ActionKey::RerouteCountry {
                    processor: gap.processor.clone(),
                    country: gap.country.clone(),
                },
                action: format!(
                    "Re-route {} payments away from {}",
                    gap.country, gap.processor
                ),
                detail: format!(
                    "{} has only {:.0}% approval in {} ({:.0}pp below average across {} \
                     transactions). Consider routing this market to {} as the primary processor.",
                    gap.processor, gap.rate, gap.country, gap.drop, gap.total, targets
                ),
            });
        }

        for spike in patterns::three_ds_spikes(subset, self.split_day) {
            recommendations.push(Recommendation {
                priority: Priority::Medium,
                key: ActionKey::InvestigateThreeDs { region: spike.region.label },
                action: format!(
                    "Investigate 3DS configuration for {} card payments",
                    spike.region.label
                ),
                detail: format!(
                    "{:.0}% of card declines in {} are 3DS failures. Check with the 3DS \
                     provider for recent issuer rule changes, and consider enabling 3DS \
                     exemptions for low-risk transactions in this region.",
                    spike.share, spike.region.label
                ),
            });
        }

        if let Some(gap) = patterns::high_value_gap(subset, overall_rate) {
            if gap.breakdown.top_reason.is_fraud_related() {
                recommendations.push(Recommendation {
                    priority: Priority::Medium,
                    key: ActionKey::ReviewFraudRules,
                    action: "Review fraud rules for high-value transactions (>$400)".to_string(),
                    detail: format!(
                        "Transactions above $400 have {:.0}% approval, {:.0}pp below average, \
                         driven by {}. Audit fraud scoring thresholds for this segment to cut \
                         false positives on legitimate high-value purchases.",
                        gap.rate, gap.gap, gap.breakdown.top_reason
                    ),
                });
            } else {
                recommendations.push(Recommendation {
                    priority: Priority::Low,
                    key: ActionKey::OfferInstallments,
                    action: "Offer instalment or split-payment options for high-value purchases (>$400)"
                        .to_string(),
                    detail: format!(
                        "High-value transactions have {:.0}pp lower approval (top decline: {}). \
                         Instalment plans or split payment at checkout can reduce declines \
                         caused by card limits or insufficient funds.",
                        gap.gap, gap.breakdown.top_reason
                    ),
                });
            }
        }

        for gap in patterns::segment_gaps(subset, overall_rate, SEGMENT_MIN_VOLUME) {
            match gap.breakdown.top_reason {
                DeclineReason::TechnicalError => {
                    recommendations.push(Recommendation {
                        priority: Priority::Medium,
                        key: ActionKey::SegmentFailover {
                            country: gap.country.clone(),
                            method: gap.method.clone(),
                        },
                        action: format!(
                            "Enable processor failover for {} in {}",
                            gap.method, gap.country
                        ),
                        detail: format!(
                            "{} in {} has {:.0}% approval with technical_error as the top \
                             decline, likely a processor-side issue. Enable automatic retry \
                             on a secondary processor for this segment.",
                            gap.method, gap.country, gap.rate
                        ),
                    });
                }
                DeclineReason::InsufficientFunds | DeclineReason::ExpiredCard => {
                    let alternative =
                        alternative_method(&gap.country).unwrap_or("an alternative local method");

                    // The configured alternative can be the failing method
                    // itself (Colombia and cards); skip those.
                    if alternative != gap.method {
                        recommendations.push(Recommendation {
                            priority: Priority::Low,
                            key: ActionKey::SurfaceAlternative {
                                country: gap.country.clone(),
                                method: gap.method.clone(),
                            },
                            action: format!(
                                "Surface {} as fallback for {} failures in {}",
                                alternative, gap.method, gap.country
                            ),
                            detail: format!(
                                "{} in {} declines are mainly {} ({} transactions, {:.0}% \
                                 approval). Prompt customers who fail with {} to retry with \
                                 {} at checkout.",
                                gap.method,
                                gap.country,
                                gap.breakdown.top_reason,
                                gap.total,
                                gap.rate,
                                gap.method,
                                alternative
                            ),
                        });
                    }
                }
                _ => {}
            }
        }

        dedup_and_rank(recommendations)
    }
}

fn failover_clause(peers: &[String]) -> String {
    if peers.is_empty() {
        String::new()
    } else {
        format!(
            " Enable automatic failover to {} for affected segments until it is resolved.",
            peers.join(" or ")
        )
    }
}

/// Drops later actions that share a key with an earlier one, then orders by
/// priority rank without disturbing relative order within a rank.
fn dedup_and_rank(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Recommendation> = recommendations
        .into_iter()
        .filter(|recommendation| seen.insert(recommendation.key.clone()))
        .collect();

    unique.sort_by_key(|recommendation| recommendation.priority);

    unique
}
