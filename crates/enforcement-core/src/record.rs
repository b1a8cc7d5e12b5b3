use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;
use ulid::Ulid;

use crate::directory::AdministrativeDirectory;
use crate::RecordError;

const NOTICE_PREFIX: &str = "NCC-ENF-";

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(format!("REC-{}", Ulid::new()))
    }

    /// Wrap an existing identifier, rejecting blank input.
    ///
    /// # Errors
    /// Returns [`RecordError::Parse`] when `raw` is empty after trimming.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RecordError::Parse("record id MUST be non-empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing `NCC-ENF-<year>-<n>` notice number.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct NoticeNumber {
    raw: String,
    year: i32,
    sequence: u32,
}

impl NoticeNumber {
    /// Parse and validate a notice number.
    ///
    /// # Errors
    /// Returns [`RecordError::InvalidNoticeNumber`] when the value does not follow
    /// `NCC-ENF-<year>-<n>`.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let invalid = || RecordError::InvalidNoticeNumber(raw.to_string());
        let rest = raw.strip_prefix(NOTICE_PREFIX).ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || sequence.is_empty() {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { raw: raw.to_string(), year, sequence })
    }

    /// Next free number for `year`, one past the highest sequence already issued that year.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] when the year's sequence is exhausted.
    pub fn next<'a>(
        year: i32,
        existing: impl IntoIterator<Item = &'a NoticeNumber>,
    ) -> Result<Self, RecordError> {
        let highest = existing
            .into_iter()
            .filter(|notice| notice.year == year)
            .map(|notice| notice.sequence)
            .max();
        let sequence = match highest {
            None => 1,
            Some(highest) => highest.checked_add(1).ok_or_else(|| {
                RecordError::Validation(format!("notice numbers for {year} are exhausted"))
            })?,
        };
        Ok(Self { raw: format!("{NOTICE_PREFIX}{year}-{sequence:03}"), year, sequence })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Trailing serial segment, used where the full number is too wide.
    #[must_use]
    pub fn suffix(&self) -> &str {
        self.raw.rsplit('-').next().unwrap_or(&self.raw)
    }
}

impl TryFrom<String> for NoticeNumber {
    type Error = RecordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NoticeNumber> for String {
    fn from(value: NoticeNumber) -> Self {
        value.raw
    }
}

impl Display for NoticeNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessTaken {
    NoticeIssued,
    Warning,
    ArrestMade,
    Demolition,
    ComplianceVerified,
}

impl ProcessTaken {
    pub const ALL: [Self; 5] = [
        Self::NoticeIssued,
        Self::Warning,
        Self::ArrestMade,
        Self::Demolition,
        Self::ComplianceVerified,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoticeIssued => "notice_issued",
            Self::Warning => "warning",
            Self::ArrestMade => "arrest_made",
            Self::Demolition => "demolition",
            Self::ComplianceVerified => "compliance_verified",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NoticeIssued => "Notice Issued",
            Self::Warning => "Warning",
            Self::ArrestMade => "Arrest Made",
            Self::Demolition => "Demolition",
            Self::ComplianceVerified => "Compliance Verified",
        }
    }

    /// Accepts either the stored key (`arrest_made`) or the display label (`Arrest Made`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let key = normalize_key(value);
        Self::ALL.into_iter().find(|process| process.as_str() == key)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Open,
    PendingReview,
    Closed,
}

impl RecordStatus {
    pub const ALL: [Self; 3] = [Self::Open, Self::PendingReview, Self::Closed];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PendingReview => "pending_review",
            Self::Closed => "closed",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::PendingReview => "Pending Review",
            Self::Closed => "Closed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let key = normalize_key(value);
        Self::ALL.into_iter().find(|status| status.as_str() == key)
    }

    /// Open and pending-review notices still need follow-up.
    #[must_use]
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Open | Self::PendingReview)
    }
}

fn normalize_key(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// File or photo embedded inline as a data URI.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

impl Attachment {
    /// # Errors
    /// Returns [`RecordError::Validation`] when the name is blank or the payload is not a data URI.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.name.trim().is_empty() {
            return Err(RecordError::Validation("attachment name MUST be non-empty".to_string()));
        }
        if !self.data.starts_with("data:") {
            return Err(RecordError::Validation(format!(
                "attachment `{}` MUST be embedded as a data URI",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct AuditLogEntry {
    pub timestamp: String,
    pub action: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct EnforcementRecord {
    pub id: RecordId,
    pub notice_number: NoticeNumber,
    pub plot_number: String,
    pub location: String,
    pub sub_county: String,
    pub ward: String,
    #[serde(with = "iso_date")]
    pub date_issued: Date,
    pub issue_of_concern: String,
    pub process_taken: ProcessTaken,
    pub recommendations: String,
    pub officer_in_charge: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    pub audit_log: Vec<AuditLogEntry>,
}

/// Form contents for creating (`id: None`) or editing (`id: Some`) a record.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RecordDraft {
    #[serde(default)]
    pub id: Option<RecordId>,
    pub plot_number: String,
    pub location: String,
    pub sub_county: String,
    pub ward: String,
    #[serde(with = "iso_date")]
    pub date_issued: Date,
    pub issue_of_concern: String,
    pub process_taken: ProcessTaken,
    pub recommendations: String,
    /// Falls back to the sub-county's planning officer when absent or blank.
    #[serde(default)]
    pub officer_in_charge: Option<String>,
    pub status: RecordStatus,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub ai_summary: Option<String>,
}

impl RecordDraft {
    /// Start an editing draft from a stored record.
    #[must_use]
    pub fn from_record(record: &EnforcementRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            plot_number: record.plot_number.clone(),
            location: record.location.clone(),
            sub_county: record.sub_county.clone(),
            ward: record.ward.clone(),
            date_issued: record.date_issued,
            issue_of_concern: record.issue_of_concern.clone(),
            process_taken: record.process_taken,
            recommendations: record.recommendations.clone(),
            officer_in_charge: Some(record.officer_in_charge.clone()),
            status: record.status,
            attachments: record.attachments.clone(),
            ai_summary: record.ai_summary.clone(),
        }
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Drop an attachment that has not been saved yet. Stored attachments are
    /// permanent; saving a draft without them fails.
    pub fn remove_attachment(&mut self, index: usize) -> Option<Attachment> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    /// Check required fields and the sub-county/ward pairing.
    ///
    /// # Errors
    /// Returns [`RecordError::MissingFields`] listing every blank required field,
    /// [`RecordError::UnknownSubCounty`] or [`RecordError::WardNotInSubCounty`] for
    /// directory mismatches, and [`RecordError::Validation`] for malformed attachments.
    pub fn validate(&self, directory: &AdministrativeDirectory) -> Result<(), RecordError> {
        let required = [
            ("plot_number", &self.plot_number),
            ("location", &self.location),
            ("sub_county", &self.sub_county),
            ("ward", &self.ward),
            ("issue_of_concern", &self.issue_of_concern),
            ("recommendations", &self.recommendations),
        ];
        let missing = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(RecordError::MissingFields(missing));
        }

        let Some(sub_county) = directory.sub_county(&self.sub_county) else {
            return Err(RecordError::UnknownSubCounty(self.sub_county.clone()));
        };
        if !sub_county.has_ward(&self.ward) {
            return Err(RecordError::WardNotInSubCounty {
                ward: self.ward.clone(),
                sub_county: self.sub_county.clone(),
            });
        }

        for attachment in &self.attachments {
            attachment.validate()?;
        }

        Ok(())
    }

    pub(crate) fn resolved_officer(&self, directory: &AdministrativeDirectory) -> String {
        match self.officer_in_charge.as_deref().map(str::trim) {
            Some(officer) if !officer.is_empty() => officer.to_string(),
            _ => directory.planning_officer(&self.sub_county).unwrap_or_default().to_string(),
        }
    }
}

/// Legacy heuristic for AI text that is really a failure placeholder.
#[must_use]
pub fn looks_like_failure_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("error") || lower.contains("unavailable")
}

#[must_use]
pub fn format_iso_date(date: Date) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Parse a `YYYY-MM-DD` calendar date.
///
/// # Errors
/// Returns [`RecordError::Parse`] when the value is not a valid ISO calendar date.
pub fn parse_iso_date(raw: &str) -> Result<Date, RecordError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|err| RecordError::Parse(format!("invalid date `{raw}`: {err}")))
}

mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_iso_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso_date(&raw).map_err(serde::de::Error::custom)
    }
}
