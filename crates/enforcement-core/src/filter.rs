use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::paginate::{clamp_page, paginate, total_pages, Page};
use crate::record::{EnforcementRecord, RecordStatus};
use crate::RecordError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub enum StatusFilter {
    #[default]
    All,
    Only(RecordStatus),
}

impl StatusFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Only(status) => status.as_str(),
        }
    }

    /// # Errors
    /// Returns [`RecordError::Parse`] for anything other than `all` or a record status.
    pub fn parse(value: &str) -> Result<Self, RecordError> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        RecordStatus::parse(value)
            .map(Self::Only)
            .ok_or_else(|| RecordError::Parse(format!("unknown status filter `{value}`")))
    }

    #[must_use]
    pub fn matches(self, status: RecordStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => expected == status,
        }
    }
}

impl Display for StatusFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for StatusFilter {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StatusFilter> for String {
    fn from(value: StatusFilter) -> Self {
        value.as_str().to_string()
    }
}

/// Case-insensitive substring match on plot number, notice number or location.
#[must_use]
pub fn matches_query(record: &EnforcementRecord, query: &str) -> bool {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [record.plot_number.as_str(), record.notice_number.as_str(), record.location.as_str()]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Records matching both `query` and `status`, in input order.
#[must_use]
pub fn filter_records<'a>(
    records: &'a [EnforcementRecord],
    query: &str,
    status: StatusFilter,
) -> Vec<&'a EnforcementRecord> {
    records
        .iter()
        .filter(|record| status.matches(record.status) && matches_query(record, query))
        .collect()
}

/// Search text, status filter and current page held together so a filter
/// change can never leave the page pointing past the results.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct QueryState {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default = "first_page")]
    pub page: usize,
}

fn first_page() -> usize {
    1
}

impl Default for QueryState {
    fn default() -> Self {
        Self { query: String::new(), status: StatusFilter::All, page: 1 }
    }
}

impl QueryState {
    #[must_use]
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self { query: query.into(), status: self.status, page: 1 }
    }

    #[must_use]
    pub fn with_status(&self, status: StatusFilter) -> Self {
        Self { query: self.query.clone(), status, page: 1 }
    }

    #[must_use]
    pub fn with_page(&self, page: usize, total_pages: usize) -> Self {
        Self { page: clamp_page(page, total_pages), ..self.clone() }
    }

    #[must_use]
    pub fn next_page(&self, total_pages: usize) -> Self {
        self.with_page(self.page.saturating_add(1), total_pages)
    }

    #[must_use]
    pub fn previous_page(&self, total_pages: usize) -> Self {
        self.with_page(self.page.saturating_sub(1), total_pages)
    }

    #[must_use]
    pub fn filter<'a>(&self, records: &'a [EnforcementRecord]) -> Vec<&'a EnforcementRecord> {
        filter_records(records, &self.query, self.status)
    }

    /// Filter then slice out the current page.
    #[must_use]
    pub fn apply<'a>(
        &self,
        records: &'a [EnforcementRecord],
        page_size: usize,
    ) -> Page<&'a EnforcementRecord> {
        let matching = self.filter(records);
        paginate(&matching, page_size, self.page)
    }

    #[must_use]
    pub fn total_pages(&self, records: &[EnforcementRecord], page_size: usize) -> usize {
        total_pages(self.filter(records).len(), page_size)
    }
}
