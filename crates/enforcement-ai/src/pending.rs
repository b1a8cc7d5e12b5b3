use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use enforcement_core::RecordId;

/// Records with an enrichment request in flight.
///
/// A second request for a record already in flight is refused; requests for
/// different records run independently.
#[derive(Debug, Clone, Default)]
pub struct PendingEnrichments {
    in_flight: Arc<Mutex<HashSet<RecordId>>>,
}

impl PendingEnrichments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as in flight. Returns `None` when it already is.
    #[must_use]
    pub fn try_begin(&self, id: &RecordId) -> Option<PendingGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(id.clone()) {
            tracing::debug!(record_id = %id, "enrichment already in flight");
            return None;
        }
        Some(PendingGuard { in_flight: Arc::clone(&self.in_flight), id: id.clone() })
    }

    #[must_use]
    pub fn is_pending(&self, id: &RecordId) -> bool {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears the in-flight mark when dropped.
#[derive(Debug)]
pub struct PendingGuard {
    in_flight: Arc<Mutex<HashSet<RecordId>>>,
    id: RecordId,
}

impl PendingGuard {
    #[must_use]
    pub fn record_id(&self) -> &RecordId {
        &self.id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}
