use serde::Serialize;

use crate::record::{EnforcementRecord, RecordStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: RecordStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubCountyCount {
    pub sub_county: String,
    pub count: usize,
}

/// Dashboard counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total: usize,
    /// Open plus pending review.
    pub pending: usize,
    pub closed: usize,
    pub by_status: Vec<StatusCount>,
    /// Sub-counties in the order they first appear in the collection.
    pub by_sub_county: Vec<SubCountyCount>,
}

impl DashboardStats {
    #[must_use]
    pub fn from_records(records: &[EnforcementRecord]) -> Self {
        let count_of =
            |status: RecordStatus| records.iter().filter(|record| record.status == status).count();

        let by_status = RecordStatus::ALL
            .into_iter()
            .map(|status| StatusCount { status, label: status.label(), count: count_of(status) })
            .collect::<Vec<_>>();

        let mut by_sub_county: Vec<SubCountyCount> = Vec::new();
        for record in records {
            match by_sub_county.iter_mut().find(|entry| entry.sub_county == record.sub_county) {
                Some(entry) => entry.count += 1,
                None => by_sub_county
                    .push(SubCountyCount { sub_county: record.sub_county.clone(), count: 1 }),
            }
        }

        Self {
            total: records.len(),
            pending: records.iter().filter(|record| record.status.is_pending()).count(),
            closed: count_of(RecordStatus::Closed),
            by_status,
            by_sub_county,
        }
    }
}
