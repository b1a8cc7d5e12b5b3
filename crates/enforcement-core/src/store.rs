use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::audit::{Attribution, BULK_UPDATE_ACTION, CREATED_RECORD_ACTION, UPDATED_RECORD_ACTION};
use crate::directory::AdministrativeDirectory;
use crate::record::{EnforcementRecord, NoticeNumber, RecordDraft, RecordId, RecordStatus};
use crate::RecordError;

/// Fields a bulk action may overwrite. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RecordPatch {
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(default)]
    pub officer_in_charge: Option<String>,
    #[serde(default)]
    pub ai_summary: Option<String>,
}

impl RecordPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.officer_in_charge.is_none() && self.ai_summary.is_none()
    }

    fn apply_to(&self, record: &mut EnforcementRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(officer) = &self.officer_in_charge {
            record.officer_in_charge.clone_from(officer);
        }
        if let Some(summary) = &self.ai_summary {
            record.ai_summary = Some(summary.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Ordered record collection, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: Vec<EnforcementRecord>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records already in display order.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] when two records share an id or a notice number.
    pub fn from_records(records: Vec<EnforcementRecord>) -> Result<Self, RecordError> {
        let mut ids = HashSet::new();
        let mut notices = HashSet::new();
        for record in &records {
            if !ids.insert(record.id.as_str()) {
                return Err(RecordError::Validation(format!("duplicate record id {}", record.id)));
            }
            if !notices.insert(record.notice_number.as_str()) {
                return Err(RecordError::Validation(format!(
                    "duplicate notice number {}",
                    record.notice_number
                )));
            }
        }
        Ok(Self { records })
    }

    #[must_use]
    pub fn records(&self) -> &[EnforcementRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<EnforcementRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&EnforcementRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|record| &record.id == id)
    }

    /// Prepend `record` unless its id is already present.
    pub fn insert(&mut self, record: EnforcementRecord) -> bool {
        if self.position(&record.id).is_some() {
            return false;
        }
        self.records.insert(0, record);
        true
    }

    /// Replace in place when the id exists, otherwise prepend.
    pub fn upsert(&mut self, record: EnforcementRecord) -> UpsertOutcome {
        match self.position(&record.id) {
            Some(index) => {
                self.records[index] = record;
                UpsertOutcome::Replaced
            }
            None => {
                self.records.insert(0, record);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Persist a form draft, creating or updating as the draft's id dictates.
    ///
    /// # Errors
    /// Returns the draft's validation error, [`RecordError::NotFound`] when an
    /// edit names a record that is not in the store, or [`RecordError::Validation`]
    /// when an edit drops or replaces a stored attachment or the notice
    /// sequence is exhausted.
    pub fn save(
        &mut self,
        draft: RecordDraft,
        directory: &AdministrativeDirectory,
        attribution: &Attribution,
    ) -> Result<EnforcementRecord, RecordError> {
        draft.validate(directory)?;
        let officer_in_charge = draft.resolved_officer(directory);

        let (id, notice_number, mut audit_log, action) = match &draft.id {
            Some(id) => {
                let existing =
                    self.get(id).ok_or_else(|| RecordError::NotFound(id.to_string()))?;
                if !draft.attachments.starts_with(&existing.attachments) {
                    return Err(RecordError::Validation(
                        "stored attachments cannot be removed or replaced".to_string(),
                    ));
                }
                (
                    existing.id.clone(),
                    existing.notice_number.clone(),
                    existing.audit_log.clone(),
                    UPDATED_RECORD_ACTION,
                )
            }
            None => {
                let notice = NoticeNumber::next(
                    attribution.at.year(),
                    self.records.iter().map(|record| &record.notice_number),
                )?;
                (RecordId::new(), notice, Vec::new(), CREATED_RECORD_ACTION)
            }
        };
        attribution.append_to(&mut audit_log, action);

        let record = EnforcementRecord {
            id,
            notice_number,
            plot_number: draft.plot_number.trim().to_string(),
            location: draft.location.trim().to_string(),
            sub_county: draft.sub_county,
            ward: draft.ward,
            date_issued: draft.date_issued,
            issue_of_concern: draft.issue_of_concern,
            process_taken: draft.process_taken,
            recommendations: draft.recommendations,
            officer_in_charge,
            status: draft.status,
            attachments: draft.attachments,
            ai_summary: draft.ai_summary.filter(|summary| !summary.trim().is_empty()),
            audit_log,
        };

        let outcome = self.upsert(record.clone());
        tracing::debug!(
            record_id = %record.id,
            notice_number = %record.notice_number,
            outcome = ?outcome,
            actor = %attribution.actor,
            "record saved"
        );
        Ok(record)
    }

    /// Merge `patch` into every record in `ids`, one audit entry per record touched.
    pub fn apply_bulk(
        &mut self,
        ids: &BTreeSet<RecordId>,
        patch: &RecordPatch,
        attribution: &Attribution,
    ) -> usize {
        let mut touched = 0;
        for record in self.records.iter_mut().filter(|record| ids.contains(&record.id)) {
            patch.apply_to(record);
            attribution.append_to(&mut record.audit_log, BULK_UPDATE_ACTION);
            touched += 1;
        }
        tracing::debug!(
            requested = ids.len(),
            touched,
            actor = %attribution.actor,
            "bulk patch applied"
        );
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Attachment, ProcessTaken};
    use time::macros::{date, datetime};

    fn officer() -> Attribution {
        Attribution::new("Current Officer", datetime!(2025-05-12 09:30 UTC))
    }

    fn draft(plot: &str) -> RecordDraft {
        RecordDraft {
            id: None,
            plot_number: plot.to_string(),
            location: "Waiyaki Way".to_string(),
            sub_county: "Westlands".to_string(),
            ward: "Kangemi".to_string(),
            date_issued: date!(2025 - 05 - 10),
            issue_of_concern: "Extension beyond approved building line.".to_string(),
            process_taken: ProcessTaken::Warning,
            recommendations: "Issue enforcement notice under section 72.".to_string(),
            officer_in_charge: None,
            status: RecordStatus::Open,
            attachments: Vec::new(),
            ai_summary: None,
        }
    }

    fn seeded(count: usize) -> Result<RecordStore, RecordError> {
        let directory = AdministrativeDirectory::nairobi();
        let mut store = RecordStore::new();
        for index in 0..count {
            store.save(draft(&format!("LR-{index}")), &directory, &officer())?;
        }
        Ok(store)
    }

    #[test]
    fn create_assigns_id_notice_and_created_entry() -> Result<(), RecordError> {
        let mut store = RecordStore::new();
        let record = store.save(draft("209/11"), &AdministrativeDirectory::nairobi(), &officer())?;

        assert!(record.id.as_str().starts_with("REC-"));
        assert_eq!(record.notice_number.as_str(), "NCC-ENF-2025-001");
        assert_eq!(record.officer_in_charge, "John Mbuthia");
        assert_eq!(record.audit_log.len(), 1);
        assert_eq!(record.audit_log[0].action, CREATED_RECORD_ACTION);
        assert_eq!(record.audit_log[0].user, "Current Officer");
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn new_records_are_prepended_with_increasing_notice_numbers() -> Result<(), RecordError> {
        let store = seeded(3)?;
        let notices = store
            .records()
            .iter()
            .map(|record| record.notice_number.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(notices, vec!["NCC-ENF-2025-003", "NCC-ENF-2025-002", "NCC-ENF-2025-001"]);
        Ok(())
    }

    #[test]
    fn edit_keeps_identity_and_appends_updated_entry() -> Result<(), RecordError> {
        let directory = AdministrativeDirectory::nairobi();
        let mut store = seeded(2)?;
        let original = store.records()[1].clone();

        let mut edit = RecordDraft::from_record(&original);
        edit.status = RecordStatus::PendingReview;
        let admin = Attribution::new("Admin User", datetime!(2025-05-13 14:05 UTC));
        let updated = store.save(edit, &directory, &admin)?;

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.notice_number, original.notice_number);
        assert_eq!(updated.audit_log.len(), 2);
        assert_eq!(updated.audit_log[0], original.audit_log[0]);
        assert_eq!(updated.audit_log[1].action, UPDATED_RECORD_ACTION);
        assert_eq!(updated.audit_log[1].user, "Admin User");
        assert_eq!(store.records()[1].status, RecordStatus::PendingReview);
        assert_eq!(store.len(), 2);
        Ok(())
    }

    fn site_photo(name: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            mime_type: "image/jpeg".to_string(),
            data: "data:image/jpeg;base64,/9j/".to_string(),
        }
    }

    #[test]
    fn stored_attachments_survive_edits() -> Result<(), RecordError> {
        let directory = AdministrativeDirectory::nairobi();
        let mut store = RecordStore::new();
        let mut with_photo = draft("209/12");
        with_photo.add_attachment(site_photo("frontage.jpg"));
        let created = store.save(with_photo, &directory, &officer())?;

        let mut dropped = RecordDraft::from_record(&created);
        assert!(dropped.remove_attachment(0).is_some());
        let result = store.save(dropped, &directory, &officer());
        assert!(matches!(result, Err(RecordError::Validation(_))));

        let mut replaced = RecordDraft::from_record(&created);
        replaced.attachments = vec![site_photo("other.jpg")];
        assert!(store.save(replaced, &directory, &officer()).is_err());

        let kept = store.get(&created.id).map(|record| record.attachments.clone());
        assert_eq!(kept, Some(vec![site_photo("frontage.jpg")]));
        assert_eq!(store.records()[0].audit_log.len(), 1);

        let mut appended = RecordDraft::from_record(&created);
        appended.add_attachment(site_photo("rear.jpg"));
        let updated = store.save(appended, &directory, &officer())?;
        assert_eq!(
            updated.attachments,
            vec![site_photo("frontage.jpg"), site_photo("rear.jpg")]
        );
        Ok(())
    }

    #[test]
    fn exhausted_notice_sequence_fails_the_save() -> Result<(), RecordError> {
        let directory = AdministrativeDirectory::nairobi();
        let mut store = seeded(1)?;
        let mut last = store.records()[0].clone();
        last.notice_number = NoticeNumber::parse(&format!("NCC-ENF-2025-{}", u32::MAX))?;
        store.upsert(last);

        let result = store.save(draft("LR-9"), &directory, &officer());
        assert!(matches!(result, Err(RecordError::Validation(_))));
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn edit_of_unknown_record_is_not_found() {
        let mut store = RecordStore::new();
        let mut edit = draft("1/1");
        edit.id = Some(RecordId::new());
        let result = store.save(edit, &AdministrativeDirectory::nairobi(), &officer());
        assert!(matches!(result, Err(RecordError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn invalid_draft_leaves_store_untouched() {
        let mut store = RecordStore::new();
        let mut invalid = draft("1/1");
        invalid.sub_county = "Mombasa".to_string();
        let result = store.save(invalid, &AdministrativeDirectory::nairobi(), &officer());
        assert_eq!(result, Err(RecordError::UnknownSubCounty("Mombasa".to_string())));
        assert!(store.is_empty());
    }

    // Three records, two selected: only the selected pair changes, each with one entry.
    #[test]
    fn apply_bulk_touches_only_selected_records() -> Result<(), RecordError> {
        let mut store = seeded(3)?;
        let selected: BTreeSet<RecordId> =
            store.records()[..2].iter().map(|record| record.id.clone()).collect();
        let patch = RecordPatch { status: Some(RecordStatus::Closed), ..RecordPatch::default() };
        let admin = Attribution::new("Admin", datetime!(2025-05-14 08:00 UTC));

        let touched = store.apply_bulk(&selected, &patch, &admin);

        assert_eq!(touched, 2);
        for record in &store.records()[..2] {
            assert_eq!(record.status, RecordStatus::Closed);
            assert_eq!(record.audit_log.len(), 2);
            assert_eq!(record.audit_log[1].action, BULK_UPDATE_ACTION);
            assert_eq!(record.audit_log[1].user, "Admin");
        }
        assert_eq!(store.records()[2].status, RecordStatus::Open);
        assert_eq!(store.records()[2].audit_log.len(), 1);
        Ok(())
    }

    #[test]
    fn insert_refuses_duplicates_and_upsert_replaces_in_place() -> Result<(), RecordError> {
        let mut store = seeded(2)?;
        let mut existing = store.records()[1].clone();
        assert!(!store.insert(existing.clone()));

        existing.location = "Ring Road Parklands".to_string();
        assert_eq!(store.upsert(existing.clone()), UpsertOutcome::Replaced);
        assert_eq!(store.records()[1].location, "Ring Road Parklands");
        assert_eq!(store.len(), 2);
        Ok(())
    }

    #[test]
    fn from_records_rejects_duplicate_ids() -> Result<(), RecordError> {
        let store = seeded(1)?;
        let record = store.records()[0].clone();
        let result = RecordStore::from_records(vec![record.clone(), record]);
        assert!(matches!(result, Err(RecordError::Validation(_))));
        Ok(())
    }
}
