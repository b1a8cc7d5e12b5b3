//! Record management core for municipal enforcement notices.
//!
//! Owns the record model, the administrative directory, the in-memory
//! [`RecordStore`], search filtering, pagination, bulk actions and the audit
//! trail every mutation leaves behind.

mod audit;
mod bulk;
mod directory;
mod filter;
mod paginate;
mod record;
mod stats;
mod store;

pub use audit::{
    local_now, Attribution, BULK_UPDATE_ACTION, CREATED_RECORD_ACTION, UPDATED_RECORD_ACTION,
};
pub use bulk::{assign_selected, close_selected, BulkOutcome, Confirmation, Selection, SkipReason};
pub use directory::{AdministrativeDirectory, AdministrativeUnit, SubCounty};
pub use filter::{filter_records, matches_query, QueryState, StatusFilter};
pub use paginate::{clamp_page, paginate, total_pages, Page, DEFAULT_PAGE_SIZE};
pub use record::{
    format_iso_date, looks_like_failure_text, parse_iso_date, Attachment, AuditLogEntry,
    EnforcementRecord, NoticeNumber, ProcessTaken, RecordDraft, RecordId, RecordStatus,
};
pub use stats::{DashboardStats, StatusCount, SubCountyCount};
pub use store::{RecordPatch, RecordStore, UpsertOutcome};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum RecordError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("unknown sub-county: {0}")]
    UnknownSubCounty(String),
    #[error("ward `{ward}` does not belong to sub-county `{sub_county}`")]
    WardNotInSubCounty { ward: String, sub_county: String },
    #[error("invalid notice number: {0}")]
    InvalidNoticeNumber(String),
    #[error("parse error: {0}")]
    Parse(String),
}
