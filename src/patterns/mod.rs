//! The statistical triggers behind both rule batteries.
//!
//! Each detector scans one grouping of the subset against fixed heuristic
//! thresholds and returns plain data; the insight and recommendation
//! engines attach severity, wording and dedup identity on top. Keeping the
//! triggers in one place guarantees the two batteries can never drift on
//! what counts as an outage, a gap or a spike.

#[cfg(test)]
mod tests;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::dataset::Dataset;
use crate::markets::{REGIONS, Region, is_card_method};
use crate::models::{DeclineReason, Transaction};
use crate::stats::{approval_rate, group_by, top_value};

/// Minimum subset size before any battery evaluates at all.
pub const MIN_SAMPLE: usize = 20;

/// Default boundary between the first-half and second-half cohorts used by
/// the 3DS timing note. Engines expose it as a configurable split day.
pub const DEFAULT_SPLIT_DAY: u32 = 15;

const OUTAGE_MIN_VOLUME: usize = 15;
const OUTAGE_RATE_FLOOR: f64 = 30.0;
const DAILY_DROP_MIN_VOLUME: usize = 20;
const DAILY_DROP_POINTS: f64 = 15.0;
const SEGMENT_GAP_POINTS: f64 = 15.0;
const PROCESSOR_COUNTRY_GAP_POINTS: f64 = 20.0;
const HIGH_VALUE_FLOOR: u32 = 400;
const HIGH_VALUE_MIN_VOLUME: usize = 10;
const HIGH_VALUE_GAP_POINTS: f64 = 10.0;
const THREE_DS_MIN_DECLINES: usize = 10;
const THREE_DS_SHARE_POINTS: f64 = 35.0;
const THREE_DS_HALF_MIN_DECLINES: usize = 5;
const THREE_DS_SHIFT_POINTS: f64 = 15.0;

/// Top decline reason of a group and its share of the group's declines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeclineBreakdown {
    pub top_reason: DeclineReason,
    pub share: f64,
}

fn decline_breakdown<'a, I>(transactions: I) -> Option<DeclineBreakdown>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let top = top_value(
        transactions
            .into_iter()
            .filter(|transaction| !transaction.approved)
            .filter_map(|transaction| transaction.decline_reason),
    )?;

    Some(DeclineBreakdown { top_reason: top.value, share: top.share() })
}

/// A (processor, date) group whose approval collapsed below 30% on at
/// least 15 transactions.
#[derive(Debug, Clone)]
pub struct ProcessorOutage {
    pub processor: String,
    pub date: NaiveDate,
    pub rate: f64,
    pub total: usize,
    pub breakdown: Option<DeclineBreakdown>,
    /// Every other processor seen in the batch, failover candidates.
    pub peer_processors: Vec<String>,
}

pub fn processor_day_outages(subset: &Dataset) -> Vec<ProcessorOutage> {
    let processors = subset.processors();
    let mut outages = Vec::new();

    for ((processor, date), summary) in
        group_by(subset.iter(), |t| (t.processor.clone(), t.date))
    {
        if summary.total < OUTAGE_MIN_VOLUME {
            continue;
        }

        let Some(rate) = summary.rate() else { continue };
        if rate >= OUTAGE_RATE_FLOOR {
            continue;
        }

        let breakdown = decline_breakdown(
            subset.iter().filter(|t| t.processor == processor && t.date == date),
        );
        let peer_processors = processors
            .iter()
            .filter(|peer| **peer != processor)
            .cloned()
            .collect();

        debug!(%processor, %date, rate, total = summary.total, "Outage trigger fired");

        outages.push(ProcessorOutage {
            processor,
            date,
            rate,
            total: summary.total,
            breakdown,
            peer_processors,
        });
    }

    outages
}

/// A calendar date whose approval rate sits more than 15 points below the
/// subset's overall rate, on at least 20 transactions.
#[derive(Debug, Clone)]
pub struct DailyDrop {
    pub date: NaiveDate,
    pub rate: f64,
    pub total: usize,
    pub drop: f64,
    pub worst_processor: String,
    pub worst_rate: f64,
    pub breakdown: Option<DeclineBreakdown>,
}

pub fn daily_drops(subset: &Dataset, overall_rate: f64) -> Vec<DailyDrop> {
    let mut drops = Vec::new();

    for (date, summary) in group_by(subset.iter(), |t| t.date) {
        if summary.total < DAILY_DROP_MIN_VOLUME {
            continue;
        }

        let Some(rate) = summary.rate() else { continue };
        let drop = overall_rate - rate;
        if drop <= DAILY_DROP_POINTS {
            continue;
        }

        let day_transactions: Vec<&Transaction> =
            subset.iter().filter(|t| t.date == date).collect();

        // Worst performer of the day; ties keep the first in sorted order.
        let mut worst: Option<(String, f64)> = None;
        for (processor, processor_summary) in
            group_by(day_transactions.iter().copied(), |t| t.processor.clone())
        {
            let Some(processor_rate) = processor_summary.rate() else { continue };
            if worst.as_ref().map_or(true, |(_, best)| processor_rate < *best) {
                worst = Some((processor, processor_rate));
            }
        }
        let Some((worst_processor, worst_rate)) = worst else { continue };

        debug!(%date, rate, drop, "Daily drop trigger fired");

        drops.push(DailyDrop {
            date,
            rate,
            total: summary.total,
            drop,
            worst_processor,
            worst_rate,
            breakdown: decline_breakdown(day_transactions.iter().copied()),
        });
    }

    drops
}

/// A (country, payment method) pair performing more than 15 points below
/// the overall rate, with at least one decline to explain it.
#[derive(Debug, Clone)]
pub struct SegmentGap {
    pub country: String,
    pub method: String,
    pub rate: f64,
    pub total: usize,
    pub drop: f64,
    pub breakdown: DeclineBreakdown,
}

pub fn segment_gaps(subset: &Dataset, overall_rate: f64, min_total: usize) -> Vec<SegmentGap> {
    let mut gaps = Vec::new();

    for ((country, method), summary) in
        group_by(subset.iter(), |t| (t.country.clone(), t.payment_method.clone()))
    {
        if summary.total < min_total {
            continue;
        }

        let Some(rate) = summary.rate() else { continue };
        let drop = overall_rate - rate;
        if drop <= SEGMENT_GAP_POINTS {
            continue;
        }

        let Some(breakdown) = decline_breakdown(
            subset.iter().filter(|t| t.country == country && t.payment_method == method),
        ) else {
            continue;
        };

        debug!(%country, %method, rate, drop, "Segment gap trigger fired");

        gaps.push(SegmentGap { country, method, rate, total: summary.total, drop, breakdown });
    }

    gaps
}

/// A (processor, country) pair performing more than 20 points below the
/// overall rate.
#[derive(Debug, Clone)]
pub struct ProcessorCountryGap {
    pub processor: String,
    pub country: String,
    pub rate: f64,
    pub total: usize,
    pub drop: f64,
    /// `None` when the pair has no declines; consumers that cite a reason
    /// must skip such gaps.
    pub breakdown: Option<DeclineBreakdown>,
    pub peer_processors: Vec<String>,
}

pub fn processor_country_gaps(
    subset: &Dataset,
    overall_rate: f64,
    min_total: usize,
) -> Vec<ProcessorCountryGap> {
    let processors = subset.processors();
    let mut gaps = Vec::new();

    for ((processor, country), summary) in
        group_by(subset.iter(), |t| (t.processor.clone(), t.country.clone()))
    {
        if summary.total < min_total {
            continue;
        }

        let Some(rate) = summary.rate() else { continue };
        let drop = overall_rate - rate;
        if drop <= PROCESSOR_COUNTRY_GAP_POINTS {
            continue;
        }

        let breakdown = decline_breakdown(
            subset.iter().filter(|t| t.processor == processor && t.country == country),
        );
        let peer_processors = processors
            .iter()
            .filter(|peer| **peer != processor)
            .cloned()
            .collect();

        debug!(%processor, %country, rate, drop, "Processor-country gap trigger fired");

        gaps.push(ProcessorCountryGap {
            processor,
            country,
            rate,
            total: summary.total,
            drop,
            breakdown,
            peer_processors,
        });
    }

    gaps
}

/// The above-$400 slice approving more than 10 points below overall.
#[derive(Debug, Clone)]
pub struct HighValueGap {
    pub rate: f64,
    pub gap: f64,
    pub total: usize,
    pub breakdown: DeclineBreakdown,
}

pub fn high_value_gap(subset: &Dataset, overall_rate: f64) -> Option<HighValueGap> {
    let floor = Decimal::from(HIGH_VALUE_FLOOR);
    let slice: Vec<&Transaction> = subset.iter().filter(|t| t.amount > floor).collect();

    if slice.len() < HIGH_VALUE_MIN_VOLUME {
        return None;
    }

    let rate = approval_rate(slice.iter().copied())?;
    let gap = overall_rate - rate;
    if gap <= HIGH_VALUE_GAP_POINTS {
        return None;
    }

    let breakdown = decline_breakdown(slice.iter().copied())?;

    debug!(rate, gap, total = slice.len(), "High-value gap trigger fired");

    Some(HighValueGap { rate, gap, total: slice.len(), breakdown })
}

/// A region where 3DS failures dominate the declined card traffic.
#[derive(Debug, Clone)]
pub struct ThreeDsSpike {
    pub region: Region,
    /// Share of the region's declined card transactions lost to 3DS.
    pub share: f64,
    pub declines: usize,
    /// Set when both halves of the period have enough declines and the
    /// second half's 3DS share exceeds the first's by more than 15 points.
    pub second_half_surge: bool,
}

pub fn three_ds_spikes(subset: &Dataset, split_day: u32) -> Vec<ThreeDsSpike> {
    let mut spikes = Vec::new();

    for region in REGIONS {
        let declines: Vec<&Transaction> = subset
            .iter()
            .filter(|t| {
                !t.approved && region.contains(&t.country) && is_card_method(&t.payment_method)
            })
            .collect();

        if declines.len() < THREE_DS_MIN_DECLINES {
            continue;
        }

        let share = three_ds_share(&declines);
        if share <= THREE_DS_SHARE_POINTS {
            continue;
        }

        let first_half: Vec<&Transaction> =
            declines.iter().copied().filter(|t| t.day <= split_day).collect();
        let second_half: Vec<&Transaction> =
            declines.iter().copied().filter(|t| t.day > split_day).collect();

        let second_half_surge = first_half.len() >= THREE_DS_HALF_MIN_DECLINES
            && second_half.len() >= THREE_DS_HALF_MIN_DECLINES
            && three_ds_share(&second_half) - three_ds_share(&first_half) > THREE_DS_SHIFT_POINTS;

        debug!(region = region.label, share, declines = declines.len(), "3DS spike trigger fired");

        spikes.push(ThreeDsSpike { region, share, declines: declines.len(), second_half_surge });
    }

    spikes
}

fn three_ds_share(declines: &[&Transaction]) -> f64 {
    if declines.is_empty() {
        return 0.0;
    }

    let failures = declines
        .iter()
        .filter(|t| t.decline_reason == Some(DeclineReason::ThreeDsFailure))
        .count();

    failures as f64 / declines.len() as f64 * 100.0
}
