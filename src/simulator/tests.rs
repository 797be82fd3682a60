use super::{RerouteRequest, SimulationError, SimulationOutcome, Simulator};

use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dataset::{Dataset, DayRange};
use crate::models::{DeclineReason, Transaction, TransactionRecord};

fn tx(
    id: u32,
    day: u32,
    country: &str,
    method: &str,
    processor: &str,
    amount: &str,
    approved: bool,
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
        decline_reason: if approved { None } else { Some(DeclineReason::TechnicalError) },
    };

    Ok(Transaction::try_from(record)?)
}

fn request(source: &str, target: &str, days: DayRange) -> RerouteRequest {
    RerouteRequest {
        source: source.to_string(),
        target: target.to_string(),
        days,
        countries: Vec::new(),
        methods: Vec::new(),
    }
}

fn report(outcome: SimulationOutcome) -> super::SimulationReport {
    match outcome {
        SimulationOutcome::Estimated(report) => report,
        SimulationOutcome::NoMatches => panic!("expected an estimate, got no matches"),
    }
}

#[test]
fn test_source_equal_to_target_is_rejected() {
    let simulator = Simulator::new();
    let result = simulator.simulate(
        &Dataset::default(),
        &request("Alpha", "Alpha", DayRange::new(1, 30)),
    );

    assert!(matches!(result, Err(SimulationError::SameProcessor(_))));
}

#[test]
fn test_empty_affected_set_reports_no_matches() -> Result<()> {
    let dataset = Dataset::new(vec![tx(1, 5, "Brazil", "PIX", "Beta", "50", true)?]);

    // Day range misses the only source transaction.
    let outcome = Simulator::new().simulate(&dataset, &request("Beta", "Alpha", DayRange::new(10, 20)))?;
    assert_eq!(outcome, SimulationOutcome::NoMatches);

    // Unknown source processor.
    let outcome = Simulator::new().simulate(&dataset, &request("Gamma", "Alpha", DayRange::new(1, 30)))?;
    assert_eq!(outcome, SimulationOutcome::NoMatches);

    Ok(())
}

#[test]
fn test_segment_rate_is_used_when_the_bracket_is_missing() -> Result<()> {
    // The affected row is (Brazil, PIX, $200-500). The target has Brazilian
    // PIX history only in the $0-50 bracket at 50%, and a 100% overall rate
    // elsewhere; the coarser segment rate must win over both the bracket
    // chain's tail and the built-in default.
    let mut transactions = vec![
        tx(1, 18, "Brazil", "PIX", "Source", "300.00", false)?,
        tx(2, 3, "Brazil", "PIX", "Target", "30.00", true)?,
        tx(3, 4, "Brazil", "PIX", "Target", "30.00", false)?,
    ];
    for id in 4..14 {
        transactions.push(tx(id, 6, "Mexico", "OXXO", "Target", "40.00", true)?);
    }

    let dataset = Dataset::new(transactions);
    let outcome = Simulator::new().simulate(&dataset, &request("Source", "Target", DayRange::new(18, 18)))?;
    let report = report(outcome);

    assert_eq!(report.affected, 1);
    assert_eq!(report.actual_approvals, 0);
    assert!((report.simulated_approvals - 0.5).abs() < 1e-9);
    assert!((report.simulated_rate - 50.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_exact_bracket_rate_wins_over_the_segment_rate() -> Result<()> {
    let dataset = Dataset::new(vec![
        tx(1, 18, "Brazil", "PIX", "Source", "300.00", false)?,
        // Same bracket as the affected row: 100%.
        tx(2, 3, "Brazil", "PIX", "Target", "250.00", true)?,
        // Different bracket dragging the segment rate down to 50%.
        tx(3, 4, "Brazil", "PIX", "Target", "30.00", false)?,
    ]);

    let outcome = Simulator::new().simulate(&dataset, &request("Source", "Target", DayRange::new(18, 18)))?;
    let report = report(outcome);

    assert!((report.simulated_approvals - 1.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_target_without_history_falls_back_to_the_default_rate() -> Result<()> {
    let dataset = Dataset::new(vec![
        tx(1, 18, "Brazil", "PIX", "Source", "100.00", false)?,
        tx(2, 18, "Brazil", "PIX", "Source", "100.00", false)?,
    ]);

    let outcome = Simulator::new().simulate(&dataset, &request("Source", "Ghost", DayRange::new(18, 18)))?;
    let report = report(outcome);

    assert_eq!(report.affected, 2);
    assert!((report.simulated_approvals - 1.5).abs() < 1e-9);
    assert!((report.simulated_rate - 75.0).abs() < 1e-9);

    let outcome = Simulator::new()
        .with_fallback_rate(0.5)
        .simulate(&dataset, &request("Source", "Ghost", DayRange::new(18, 18)))?;
    assert!((self::report(outcome).simulated_rate - 50.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_reference_rates_ignore_the_day_window() -> Result<()> {
    // The target's only history sits outside the simulated day range and
    // must still drive the estimate.
    let dataset = Dataset::new(vec![
        tx(1, 18, "Brazil", "PIX", "Source", "30.00", false)?,
        tx(2, 2, "Brazil", "PIX", "Target", "30.00", true)?,
        tx(3, 29, "Brazil", "PIX", "Target", "30.00", true)?,
    ]);

    let outcome = Simulator::new().simulate(&dataset, &request("Source", "Target", DayRange::new(18, 18)))?;
    let report = report(outcome);

    assert_eq!(report.affected, 1);
    assert!((report.simulated_approvals - 1.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_report_numbers_add_up() -> Result<()> {
    // 4 affected rows at $100, 1 approved (25%); the target approves
    // everything, so the simulation recovers 3 payments of $100.
    let mut transactions = vec![
        tx(1, 18, "Brazil", "PIX", "Source", "100.00", true)?,
        tx(2, 18, "Brazil", "PIX", "Source", "100.00", false)?,
        tx(3, 18, "Brazil", "PIX", "Source", "100.00", false)?,
        tx(4, 18, "Brazil", "PIX", "Source", "100.00", false)?,
    ];
    for id in 5..10 {
        transactions.push(tx(id, 3, "Brazil", "PIX", "Target", "100.00", true)?);
    }

    let dataset = Dataset::new(transactions);
    let outcome = Simulator::new().simulate(&dataset, &request("Source", "Target", DayRange::new(1, 31)))?;
    let report = report(outcome);

    assert_eq!(report.affected, 4);
    assert_eq!(report.actual_approvals, 1);
    assert!((report.actual_rate - 25.0).abs() < 1e-9);
    assert!((report.simulated_approvals - 4.0).abs() < 1e-9);
    assert!((report.simulated_rate - 100.0).abs() < 1e-9);
    assert!((report.rate_delta - 75.0).abs() < 1e-9);
    assert!((report.recovered_revenue - 300.0).abs() < 1e-6);

    Ok(())
}

#[test]
fn test_optional_filters_narrow_the_affected_set() -> Result<()> {
    let dataset = Dataset::new(vec![
        tx(1, 18, "Brazil", "PIX", "Source", "50.00", false)?,
        tx(2, 18, "Mexico", "OXXO", "Source", "50.00", false)?,
        tx(3, 18, "Brazil", "card_visa", "Source", "50.00", false)?,
    ]);

    let mut narrowed = request("Source", "Target", DayRange::new(18, 18));
    narrowed.countries = vec!["Brazil".to_string()];
    narrowed.methods = vec!["PIX".to_string()];

    let outcome = Simulator::new().simulate(&dataset, &narrowed)?;
    assert_eq!(report(outcome).affected, 1);

    Ok(())
}
