//! Conversions from site-formatted text into typed values.
//!
//! Every function here is total: unparseable input yields `None` instead of
//! an error, so one malformed field never aborts the record it belongs to.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

/// Square meters per pyung.
pub const SQM_PER_PYUNG: f64 = 3.3058;

static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
static MANWON: OnceLock<Option<Regex>> = OnceLock::new();
static SHORT_DATE: OnceLock<Option<Regex>> = OnceLock::new();
static YEAR_MONTH: OnceLock<Option<Regex>> = OnceLock::new();
static BUILDING: OnceLock<Option<Regex>> = OnceLock::new();
static UNIT: OnceLock<Option<Regex>> = OnceLock::new();
static CASE_NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
static INTEGER: OnceLock<Option<Regex>> = OnceLock::new();
static FAILURES: OnceLock<Option<Regex>> = OnceLock::new();

pub(crate) fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Convert an area string such as `"84.99㎡"` to pyung, rounded to two decimals.
pub fn area_to_pyung(raw: &str) -> Option<f64> {
    let re = cached(&NUMBER, r"(\d+(?:\.\d+)?)")?;
    let compact = raw.replace(',', "");
    let sqm: f64 = re.captures(&compact)?.get(1)?.as_str().parse().ok()?;
    Some((sqm / SQM_PER_PYUNG * 100.0).round() / 100.0)
}

/// Parse a price into units of 10,000 won (만원).
///
/// Accepts `"10,000만원"`, `"1억 2,000만원"`, `"3억"` and bare grouped digits
/// (already in 만원). Trailing annotations such as `"(70%)"` are ignored.
pub fn parse_manwon(raw: &str) -> Option<i64> {
    let re = cached(&MANWON, r"(\d+)억(?:(\d+)만?)?|(\d+)")?;
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    let caps = re.captures(&compact)?;
    match caps.get(1) {
        Some(eok) => {
            let eok: i64 = eok.as_str().parse().ok()?;
            let man: i64 = match caps.get(2) {
                Some(m) => m.as_str().parse().ok()?,
                None => 0,
            };
            Some(eok * 10_000 + man)
        }
        None => caps.get(3)?.as_str().parse().ok(),
    }
}

/// Split a two-line price cell (`"4,825만\n3,280만"`) into its two values.
///
/// The halves are positional and parsed independently; a single-line input
/// yields `(first, None)`.
pub fn parse_price_pair(raw: &str) -> (Option<i64>, Option<i64>) {
    let mut lines = raw.split('\n').map(|l| l.trim_end_matches('\r'));
    let first = lines.next().and_then(parse_manwon);
    let second = lines.next().and_then(parse_manwon);
    (first, second)
}

/// Parse `YY.MM.DD` with the year taken as 20YY.
pub fn parse_short_date(raw: &str) -> Option<NaiveDate> {
    let re = cached(&SHORT_DATE, r"^(\d{2})\.(\d{2})\.(\d{2})$")?;
    let caps = re.captures(raw.trim())?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Parse `YYYYMM` as the first day of that month.
pub fn parse_year_month(raw: &str) -> Option<NaiveDate> {
    let re = cached(&YEAR_MONTH, r"^(\d{4})(\d{2})$")?;
    let caps = re.captures(raw.trim())?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Building (동) and unit (호) numbers found in an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitAddress {
    pub building: Option<String>,
    pub unit: Option<String>,
}

pub fn parse_unit_address(address: &str) -> UnitAddress {
    let capture = |cell: &'static OnceLock<Option<Regex>>, pattern: &str| {
        cached(cell, pattern)
            .and_then(|re| re.captures(address))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    UnitAddress {
        building: capture(&BUILDING, r"(\d+)동"),
        unit: capture(&UNIT, r"(\d+)호"),
    }
}

/// Find a case number like `2024-16379` or `2023-1809(7)`.
pub fn extract_case_number(text: &str) -> Option<String> {
    let re = cached(&CASE_NUMBER, r"(\d{4}-\d+(?:\(\d+\))?)")?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Second integer of a compound count such as `"비상용 1대/승용 2대"` or
/// `"지하 1층/지상 15층"`.
pub fn second_integer(raw: &str) -> Option<i64> {
    let re = cached(&INTEGER, r"\d+")?;
    re.find_iter(raw).nth(1)?.as_str().parse().ok()
}

/// Number of failed rounds from text like `"유찰 2회"`.
pub fn parse_failure_count(raw: &str) -> Option<i64> {
    let re = cached(&FAILURES, r"(\d+)\s*회")?;
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}
