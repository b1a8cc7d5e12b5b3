use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::audit::Attribution;
use crate::record::{RecordId, RecordStatus};
use crate::store::{RecordPatch, RecordStore};

/// The caller's answer to "close N records?".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Affirmed,
    Declined,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    EmptySelection,
    Declined,
    BlankOfficer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkOutcome {
    Applied { updated: usize },
    Skipped { reason: SkipReason },
}

impl BulkOutcome {
    #[must_use]
    pub fn updated(self) -> usize {
        match self {
            Self::Applied { updated } => updated,
            Self::Skipped { .. } => 0,
        }
    }
}

/// Record ids checked in the records view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct Selection {
    ids: BTreeSet<RecordId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ids(&self) -> &BTreeSet<RecordId> {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    pub fn toggle(&mut self, id: RecordId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Select every visible record, or clear when all of them are already selected.
    pub fn toggle_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a RecordId>) {
        let visible = visible.into_iter().cloned().collect::<BTreeSet<_>>();
        if !visible.is_empty() && visible == self.ids {
            self.ids.clear();
        } else {
            self.ids = visible;
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl FromIterator<RecordId> for Selection {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        Self { ids: iter.into_iter().collect() }
    }
}

/// Close every selected record once the caller has confirmed.
pub fn close_selected(
    store: &mut RecordStore,
    selection: &Selection,
    confirmation: Confirmation,
    attribution: &Attribution,
) -> BulkOutcome {
    if selection.is_empty() {
        return BulkOutcome::Skipped { reason: SkipReason::EmptySelection };
    }
    if confirmation == Confirmation::Declined {
        return BulkOutcome::Skipped { reason: SkipReason::Declined };
    }
    let patch = RecordPatch { status: Some(RecordStatus::Closed), ..RecordPatch::default() };
    let updated = store.apply_bulk(selection.ids(), &patch, attribution);
    tracing::info!(updated, actor = %attribution.actor, "bulk close applied");
    BulkOutcome::Applied { updated }
}

/// Reassign every selected record to `officer`. Blank or missing names change nothing.
pub fn assign_selected(
    store: &mut RecordStore,
    selection: &Selection,
    officer: Option<&str>,
    attribution: &Attribution,
) -> BulkOutcome {
    if selection.is_empty() {
        return BulkOutcome::Skipped { reason: SkipReason::EmptySelection };
    }
    let Some(officer) = officer.map(str::trim).filter(|name| !name.is_empty()) else {
        return BulkOutcome::Skipped { reason: SkipReason::BlankOfficer };
    };
    let patch =
        RecordPatch { officer_in_charge: Some(officer.to_string()), ..RecordPatch::default() };
    let updated = store.apply_bulk(selection.ids(), &patch, attribution);
    tracing::info!(updated, officer, actor = %attribution.actor, "bulk assign applied");
    BulkOutcome::Applied { updated }
}
