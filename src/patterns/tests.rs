use super::{daily_drops, high_value_gap, processor_day_outages, three_ds_spikes};

use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dataset::Dataset;
use crate::models::{DeclineReason, Transaction, TransactionRecord};

fn tx(
    id: u32,
    day: u32,
    country: &str,
    method: &str,
    processor: &str,
    amount: &str,
    approved: bool,
    reason: Option<DeclineReason>,
) -> Result<Transaction> {
    let record = TransactionRecord {
        id: format!("txn_{id:06}"),
        timestamp: NaiveDate::from_ymd_opt(2023, 11, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
        country: country.to_string(),
        payment_method: method.to_string(),
        processor: processor.to_string(),
        amount: Decimal::from_str(amount)?,
        approved,
        decline_reason: reason,
    };

    Ok(Transaction::try_from(record)?)
}

fn rows(
    transactions: &mut Vec<Transaction>,
    count: usize,
    day: u32,
    country: &str,
    method: &str,
    processor: &str,
    amount: &str,
    approved: bool,
    reason: Option<DeclineReason>,
) -> Result<()> {
    for _ in 0..count {
        let id = transactions.len() as u32 + 1;
        transactions.push(tx(id, day, country, method, processor, amount, approved, reason)?);
    }

    Ok(())
}

#[test]
fn test_outage_trigger_is_strict_on_the_rate_floor() -> Result<()> {
    // 5 of 20 approved is 25%, under the 30% floor.
    let mut t = Vec::new();
    rows(&mut t, 5, 18, "Brazil", "card_visa", "Beta", "100", true, None)?;
    rows(&mut t, 15, 18, "Brazil", "card_visa", "Beta", "100", false, Some(DeclineReason::TechnicalError))?;

    let outages = processor_day_outages(&Dataset::new(t));
    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].processor, "Beta");
    assert_eq!(outages[0].total, 20);
    assert!((outages[0].rate - 25.0).abs() < f64::EPSILON);

    let breakdown = outages[0].breakdown.unwrap();
    assert_eq!(breakdown.top_reason, DeclineReason::TechnicalError);
    assert!((breakdown.share - 100.0).abs() < f64::EPSILON);

    // 6 of 20 approved is exactly 30%: the boundary must not trigger.
    let mut t = Vec::new();
    rows(&mut t, 6, 18, "Brazil", "card_visa", "Beta", "100", true, None)?;
    rows(&mut t, 14, 18, "Brazil", "card_visa", "Beta", "100", false, Some(DeclineReason::TechnicalError))?;

    assert!(processor_day_outages(&Dataset::new(t)).is_empty());

    Ok(())
}

#[test]
fn test_outage_trigger_needs_fifteen_transactions() -> Result<()> {
    let mut t = Vec::new();
    rows(&mut t, 14, 18, "Brazil", "card_visa", "Beta", "100", false, Some(DeclineReason::TechnicalError))?;

    assert!(processor_day_outages(&Dataset::new(t)).is_empty());

    Ok(())
}

#[test]
fn test_daily_drop_picks_worst_processor_with_stable_tie() -> Result<()> {
    let mut t = Vec::new();
    // Day 19 runs at 50% on both processors; the tie resolves to the first
    // processor in sorted order.
    rows(&mut t, 5, 19, "Brazil", "PIX", "Beta", "50", true, None)?;
    rows(&mut t, 5, 19, "Brazil", "PIX", "Beta", "50", false, Some(DeclineReason::InsufficientFunds))?;
    rows(&mut t, 5, 19, "Brazil", "PIX", "Alpha", "50", true, None)?;
    rows(&mut t, 5, 19, "Brazil", "PIX", "Alpha", "50", false, Some(DeclineReason::InsufficientFunds))?;
    rows(&mut t, 40, 5, "Brazil", "PIX", "Alpha", "50", true, None)?;

    let subset = Dataset::new(t);
    let overall = crate::stats::approval_rate(subset.iter()).unwrap();
    let drops = daily_drops(&subset, overall);

    assert_eq!(drops.len(), 1);
    assert_eq!(drops[0].date, NaiveDate::from_ymd_opt(2023, 11, 19).unwrap());
    assert_eq!(drops[0].worst_processor, "Alpha");
    assert!((drops[0].worst_rate - 50.0).abs() < f64::EPSILON);

    Ok(())
}

#[test]
fn test_high_value_slice_is_strictly_above_400() -> Result<()> {
    // Exactly 400 stays out of the slice, so only 9 rows qualify.
    let mut t = Vec::new();
    rows(&mut t, 30, 5, "Mexico", "OXXO", "Alpha", "20", true, None)?;
    rows(&mut t, 1, 9, "Mexico", "OXXO", "Alpha", "400.00", false, Some(DeclineReason::InsufficientFunds))?;
    rows(&mut t, 9, 9, "Mexico", "OXXO", "Alpha", "450.00", false, Some(DeclineReason::InsufficientFunds))?;

    let subset = Dataset::new(t);
    let overall = crate::stats::approval_rate(subset.iter()).unwrap();
    assert!(high_value_gap(&subset, overall).is_none());

    // One more row above the floor reaches the 10-row minimum.
    let mut t = Vec::new();
    rows(&mut t, 30, 5, "Mexico", "OXXO", "Alpha", "20", true, None)?;
    rows(&mut t, 10, 9, "Mexico", "OXXO", "Alpha", "450.00", false, Some(DeclineReason::InsufficientFunds))?;

    let subset = Dataset::new(t);
    let overall = crate::stats::approval_rate(subset.iter()).unwrap();
    let gap = high_value_gap(&subset, overall).unwrap();

    assert_eq!(gap.total, 10);
    assert_eq!(gap.breakdown.top_reason, DeclineReason::InsufficientFunds);
    assert!(gap.gap > 10.0);

    Ok(())
}

#[test]
fn test_three_ds_spike_groups_spain_and_germany_together() -> Result<()> {
    let mut t = Vec::new();
    // 6 Spanish and 6 German declined card transactions, 5 of them 3DS.
    rows(&mut t, 6, 8, "Spain", "card_visa", "Alpha", "60", false, Some(DeclineReason::ThreeDsFailure))?;
    rows(&mut t, 1, 8, "Germany", "card_mastercard", "Alpha", "60", false, Some(DeclineReason::ThreeDsFailure))?;
    rows(&mut t, 5, 8, "Germany", "card_mastercard", "Alpha", "60", false, Some(DeclineReason::ExpiredCard))?;

    let spikes = three_ds_spikes(&Dataset::new(t), 15);

    assert_eq!(spikes.len(), 1);
    assert_eq!(spikes[0].region.label, "Europe (Spain + Germany)");
    assert_eq!(spikes[0].declines, 12);
    assert!(!spikes[0].second_half_surge);

    Ok(())
}
