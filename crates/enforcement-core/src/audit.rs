use time::OffsetDateTime;

use crate::record::AuditLogEntry;

pub const CREATED_RECORD_ACTION: &str = "Created Record";
pub const UPDATED_RECORD_ACTION: &str = "Updated Record";
pub const BULK_UPDATE_ACTION: &str = "Bulk Update";

/// Who performed a mutation and when.
///
/// Every mutating store operation takes one of these so the audit trail is
/// attributed by the caller rather than by a fixed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub actor: String,
    pub at: OffsetDateTime,
}

impl Attribution {
    #[must_use]
    pub fn new(actor: impl Into<String>, at: OffsetDateTime) -> Self {
        Self { actor: actor.into(), at }
    }

    /// Attribute to `actor` at the current local wall-clock time.
    #[must_use]
    pub fn now(actor: impl Into<String>) -> Self {
        Self::new(actor, local_now())
    }

    /// Minute-precision `YYYY-MM-DD HH:MM` stamp used in audit entries.
    #[must_use]
    pub fn timestamp(&self) -> String {
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.at.year(),
            u8::from(self.at.month()),
            self.at.day(),
            self.at.hour(),
            self.at.minute()
        )
    }

    #[must_use]
    pub fn entry(&self, action: &str) -> AuditLogEntry {
        AuditLogEntry {
            timestamp: self.timestamp(),
            action: action.to_string(),
            user: self.actor.clone(),
        }
    }

    pub(crate) fn append_to(&self, log: &mut Vec<AuditLogEntry>, action: &str) {
        log.push(self.entry(action));
    }
}

/// Local time when the offset can be determined, UTC otherwise.
#[must_use]
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}
