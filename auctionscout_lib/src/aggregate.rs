//! Trailing-year summaries over transaction history.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Length of the trailing window, in days.
pub const WINDOW_DAYS: i64 = 365;

/// One sale row from a transaction table. Price is in 만원.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub price: i64,
    pub floor: String,
    pub date: NaiveDate,
}

/// A pre-aggregated monthly row: number of sales in `month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyCount {
    /// First day of the month.
    pub month: NaiveDate,
    pub count: i64,
}

/// Price, floor and date of one extremal transaction. Stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: i64,
    pub floor: String,
    pub date: NaiveDate,
}

impl From<&TransactionRecord> for PricePoint {
    fn from(r: &TransactionRecord) -> Self {
        Self {
            price: r.price,
            floor: r.floor.clone(),
            date: r.date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub min: PricePoint,
    pub max: PricePoint,
    /// Truncated mean of the included prices.
    pub average: i64,
    pub count: i64,
}

/// First day included in the window ending at `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(WINDOW_DAYS)
}

/// Summarize the rows dated within the trailing year.
///
/// Ties at the minimum or maximum resolve to the earliest row in input
/// order, regardless of date. Returns `None` when no row is recent enough.
pub fn summarize(records: &[TransactionRecord], today: NaiveDate) -> Option<TransactionSummary> {
    let start = window_start(today);
    let recent: Vec<&TransactionRecord> = records.iter().filter(|r| r.date >= start).collect();
    let first = *recent.first()?;

    let mut min = first;
    let mut max = first;
    let mut total: i64 = 0;
    for &r in &recent {
        if r.price < min.price {
            min = r;
        }
        if r.price > max.price {
            max = r;
        }
        total += r.price;
    }
    let count = recent.len() as i64;

    Some(TransactionSummary {
        min: min.into(),
        max: max.into(),
        average: total / count,
        count,
    })
}

/// Sum of monthly counts whose month starts inside the trailing year.
pub fn yearly_count(months: &[MonthlyCount], today: NaiveDate) -> i64 {
    let start = window_start(today);
    months
        .iter()
        .filter(|m| m.month >= start)
        .map(|m| m.count)
        .sum()
}
