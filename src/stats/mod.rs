#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use rust_decimal::Decimal;

use crate::models::Transaction;

/// Count/approved tally for one group of transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub approved: usize,
}

impl Summary {
    pub fn observe(&mut self, approved: bool) {
        self.total += 1;
        if approved {
            self.approved += 1;
        }
    }

    /// Approval percentage in `[0, 100]`.
    ///
    /// `None` when the group is empty; callers must treat that as "not
    /// computable" rather than zero, so no denominator is ever zero.
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.approved as f64 / self.total as f64 * 100.0)
        }
    }

    pub fn declined(&self) -> usize {
        self.total - self.approved
    }
}

/// Approval percentage of a subset, `None` when it is empty.
pub fn approval_rate<'a, I>(transactions: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut summary = Summary::default();

    for transaction in transactions {
        summary.observe(transaction.approved);
    }

    summary.rate()
}

/// Groups transactions by `key` and tallies a [`Summary`] per group.
///
/// Groups come back in a `BTreeMap`, so iteration order is the sort order of
/// the key tuple and every evaluation of the same subset walks groups in the
/// same order.
pub fn group_by<'a, I, K, F>(transactions: I, key: F) -> BTreeMap<K, Summary>
where
    I: IntoIterator<Item = &'a Transaction>,
    K: Ord,
    F: Fn(&Transaction) -> K,
{
    let mut groups: BTreeMap<K, Summary> = BTreeMap::new();

    for transaction in transactions {
        groups.entry(key(transaction)).or_default().observe(transaction.approved);
    }

    groups
}

/// Most frequent value of a categorical column, with its count and the total
/// number of observations it was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopValue<T> {
    pub value: T,
    pub count: usize,
    pub total: usize,
}

impl<T> TopValue<T> {
    /// Share of all observations held by the winning value, as a percentage.
    pub fn share(&self) -> f64 {
        self.count as f64 / self.total as f64 * 100.0
    }
}

/// Picks the most frequent value in `values`.
///
/// Ties break to the value seen first in the input iteration. The tie-break
/// is an explicit contract, not an accident of map ordering: counting via an
/// unordered map's iteration order would make results nondeterministic.
pub fn top_value<T, I>(values: I) -> Option<TopValue<T>>
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    let mut total = 0usize;

    for (index, value) in values.into_iter().enumerate() {
        total += 1;
        counts.entry(value).or_insert((0, index)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|left, right| {
            let (_, (left_count, left_first)) = left;
            let (_, (right_count, right_first)) = right;
            left_count.cmp(right_count).then(right_first.cmp(left_first))
        })
        .map(|(value, (count, _))| TopValue { value, count, total })
}

/// Mean transaction amount of a subset, `None` when it is empty.
pub fn mean_amount<'a, I>(transactions: I) -> Option<Decimal>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut sum = Decimal::ZERO;
    let mut count = 0u64;

    for transaction in transactions {
        sum += transaction.amount;
        count += 1;
    }

    if count == 0 { None } else { Some(sum / Decimal::from(count)) }
}
