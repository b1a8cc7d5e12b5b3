use enforcement_core::EnforcementRecord;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::ReportError;

const MONTHS: [&str; 12] = [
    "JANUARY",
    "FEBRUARY",
    "MARCH",
    "APRIL",
    "MAY",
    "JUNE",
    "JULY",
    "AUGUST",
    "SEPTEMBER",
    "OCTOBER",
    "NOVEMBER",
    "DECEMBER",
];

/// Inclusive date range covered by a weekly report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: Date,
    pub end: Date,
}

impl ReportWindow {
    /// # Errors
    /// Returns [`ReportError::InvalidRange`] when `start` falls after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, ReportError> {
        if start > end {
            return Err(ReportError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Seven days back from `today`, through the end of `today`.
    #[must_use]
    pub fn last_seven_days(today: Date) -> Self {
        Self { start: today - Duration::days(7), end: today }
    }

    /// The end bound covers the whole of its day.
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Records issued inside `window`, optionally limited to one sub-county.
#[must_use]
pub fn filter_for_report<'a>(
    records: impl IntoIterator<Item = &'a EnforcementRecord>,
    window: &ReportWindow,
    sub_county: Option<&str>,
) -> Vec<&'a EnforcementRecord> {
    records
        .into_iter()
        .filter(|record| window.contains(record.date_issued))
        .filter(|record| sub_county.map_or(true, |name| record.sub_county == name))
        .collect()
}

/// `d/m/yyyy` without padding, as printed in the report table.
#[must_use]
pub fn format_short_date(date: Date) -> String {
    format!("{}/{}/{}", date.day(), u8::from(date.month()), date.year())
}

/// `12TH MAY 2025`, as printed in the report title.
#[must_use]
pub fn format_title_date(date: Date) -> String {
    let day = date.day();
    let suffix = match (day % 10, day % 100) {
        (1, tens) if tens != 11 => "ST",
        (2, tens) if tens != 12 => "ND",
        (3, tens) if tens != 13 => "RD",
        _ => "TH",
    };
    let month = MONTHS[usize::from(u8::from(date.month())) - 1];
    format!("{day}{suffix} {month} {}", date.year())
}
