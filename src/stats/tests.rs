use super::{Summary, approval_rate, group_by, mean_amount, top_value};

use std::str::FromStr;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{DeclineReason, Transaction, TransactionRecord};

fn tx(id: u32, processor: &str, amount: &str, approved: bool) -> Result<Transaction> {
    let record = TransactionRecord {
        id: format!("txn_{id:06}"),
        timestamp: NaiveDate::from_ymd_opt(2023, 11, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
        country: "Mexico".to_string(),
        payment_method: "OXXO".to_string(),
        processor: processor.to_string(),
        amount: Decimal::from_str(amount)?,
        approved,
        decline_reason: if approved { None } else { Some(DeclineReason::TechnicalError) },
    };

    Ok(Transaction::try_from(record)?)
}

#[test]
fn test_approval_rate_is_none_on_empty_and_bounded_otherwise() -> Result<()> {
    assert_eq!(approval_rate([]), None);

    let all_declined = [tx(1, "Processor A", "10", false)?, tx(2, "Processor A", "10", false)?];
    assert_eq!(approval_rate(&all_declined), Some(0.0));

    let mixed = [
        tx(1, "Processor A", "10", true)?,
        tx(2, "Processor A", "10", false)?,
        tx(3, "Processor A", "10", true)?,
        tx(4, "Processor A", "10", true)?,
    ];
    let rate = approval_rate(&mixed).unwrap();
    assert!((rate - 75.0).abs() < f64::EPSILON);
    assert!((0.0..=100.0).contains(&rate));

    Ok(())
}

#[test]
fn test_group_by_tallies_and_sorts_groups() -> Result<()> {
    let transactions = [
        tx(1, "Processor C", "10", true)?,
        tx(2, "Processor A", "10", false)?,
        tx(3, "Processor C", "10", false)?,
        tx(4, "Processor B", "10", true)?,
    ];

    let groups = group_by(&transactions, |t| t.processor.clone());
    let keys: Vec<_> = groups.keys().cloned().collect();

    assert_eq!(keys, ["Processor A", "Processor B", "Processor C"]);
    assert_eq!(groups["Processor C"], Summary { total: 2, approved: 1 });
    assert_eq!(groups["Processor C"].declined(), 1);

    Ok(())
}

#[test]
fn test_top_value_breaks_ties_by_first_encounter() {
    let winner = top_value(["a", "b", "b", "a"]).unwrap();
    assert_eq!(winner.value, "a");
    assert_eq!(winner.count, 2);
    assert_eq!(winner.total, 4);

    let winner = top_value(["b", "a", "a", "b"]).unwrap();
    assert_eq!(winner.value, "b");

    let winner = top_value(["a", "b", "b"]).unwrap();
    assert_eq!(winner.value, "b");
    assert!((winner.share() - 66.666).abs() < 0.01);

    assert!(top_value(Vec::<&str>::new()).is_none());
}

#[test]
fn test_mean_amount_averages_the_subset() -> Result<()> {
    assert_eq!(mean_amount([]), None);

    let transactions = [
        tx(1, "Processor A", "10.00", true)?,
        tx(2, "Processor A", "20.00", false)?,
        tx(3, "Processor A", "60.00", true)?,
    ];

    assert_eq!(mean_amount(&transactions), Some(Decimal::from(30)));

    Ok(())
}
