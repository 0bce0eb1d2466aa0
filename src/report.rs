//! Date-range report filtering over the entry collections.
//!
//! Entry dates are free-form text from handwritten slips (dd/mm/yy or
//! dd/mm/yyyy). Rows whose date cannot be parsed are excluded from
//! range-filtered reports.

use crate::types::{DeliveryEntry, ProductionEntry};
use chrono::NaiveDate;

/// Parse a dd/mm/yy or dd/mm/yyyy entry date. Two-digit years are taken
/// as 20xx.
pub fn parse_entry_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.trim().splitn(3, '/');
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let year_text = parts.next()?.trim();
    let year: i32 = year_text.parse().ok()?;
    let year = if year_text.len() <= 2 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// An inclusive calendar range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from && date <= self.to
    }
}

/// Production entries within the range; `None` means no date filter.
pub fn production_report<'a>(
    entries: &'a [ProductionEntry],
    range: Option<DateRange>,
) -> Vec<&'a ProductionEntry> {
    entries
        .iter()
        .filter(|e| match range {
            None => true,
            Some(range) => parse_entry_date(&e.date)
                .map(|d| range.contains(d))
                .unwrap_or(false),
        })
        .collect()
}

/// Delivery entries within the range; `None` means no date filter.
pub fn delivery_report<'a>(
    entries: &'a [DeliveryEntry],
    range: Option<DateRange>,
) -> Vec<&'a DeliveryEntry> {
    entries
        .iter()
        .filter(|e| match range {
            None => true,
            Some(range) => parse_entry_date(&e.delivery_date)
                .map(|d| range.contains(d))
                .unwrap_or(false),
        })
        .collect()
}
