//! Application facade shared by the `ncenf` CLI and the HTTP service.
//!
//! Every call opens the store, migrates, and runs its read or its
//! load-mutate-persist cycle before returning plain serializable values.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use enforcement_ai::{AiEnrichmentClient, Enrichment, PendingEnrichments};
use enforcement_core::{
    assign_selected, close_selected, local_now, AdministrativeDirectory, Attribution, BulkOutcome,
    Confirmation, DashboardStats, EnforcementRecord, Page, QueryState, RecordDraft, RecordError,
    RecordId, Selection, StatusFilter,
};
use enforcement_reports::{
    csv_file_name, filter_for_report, render_pdf, to_csv, to_report_document, Jurisdiction,
    ReportWindow,
};
use enforcement_store_sqlite::{SchemaStatus, SqliteStore};
use serde::{Deserialize, Serialize};
use time::Date;

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("a summary is already being generated for {0}")]
    EnrichmentInFlight(RecordId),
    #[error("issue of concern is required to draft recommendations")]
    MissingIssue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MigrateResult {
    pub dry_run: bool,
    pub current_version: i64,
    pub target_version: i64,
    pub would_apply_versions: Vec<i64>,
    pub inferred_from_legacy: bool,
    pub after_version: Option<i64>,
    pub up_to_date: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl SearchRequest {
    fn query_state(&self) -> QueryState {
        QueryState::default().with_query(self.query.clone()).with_status(self.status)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResult {
    pub query: String,
    pub status: StatusFilter,
    pub page: Page<EnforcementRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendRequest {
    pub issue_of_concern: String,
    pub sub_county: String,
    pub plot_number: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub record: EnforcementRecord,
    pub enrichment: Enrichment,
    pub stored: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CsvExport {
    pub file_name: String,
    pub rows: usize,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WeeklyReportRequest {
    #[serde(default)]
    pub start: Option<Date>,
    #[serde(default)]
    pub end: Option<Date>,
    #[serde(default)]
    pub sub_county: Option<String>,
    #[serde(default)]
    pub preparers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WeeklyReport {
    pub file_name: String,
    pub title: String,
    pub subtitle: String,
    pub jurisdiction: Jurisdiction,
    pub window: ReportWindow,
    pub rows: usize,
    pub pages: usize,
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EnforcementApi {
    db_path: PathBuf,
    directory: AdministrativeDirectory,
    ai: AiEnrichmentClient,
    pending: PendingEnrichments,
}

impl EnforcementApi {
    #[must_use]
    pub fn new(db_path: PathBuf, ai: AiEnrichmentClient) -> Self {
        Self {
            db_path,
            directory: AdministrativeDirectory::nairobi(),
            ai,
            pending: PendingEnrichments::new(),
        }
    }

    #[must_use]
    pub fn directory(&self) -> AdministrativeDirectory {
        self.directory
    }

    #[must_use]
    pub fn pending(&self) -> &PendingEnrichments {
        &self.pending
    }

    fn open_store(&self) -> Result<SqliteStore> {
        let mut store = SqliteStore::open(&self.db_path)?;
        store.migrate()?;
        Ok(store)
    }

    /// Inspect schema status without mutating data.
    ///
    /// # Errors
    /// Returns an error when the `SQLite` database cannot be opened or queried.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let store = SqliteStore::open(&self.db_path)?;
        store.schema_status()
    }

    /// Apply pending migrations, or return planned versions for dry-run mode.
    ///
    /// # Errors
    /// Returns an error when migration planning or execution fails.
    pub fn migrate(&self, dry_run: bool) -> Result<MigrateResult> {
        let mut store = SqliteStore::open(&self.db_path)?;
        let before = store.schema_status()?;
        if dry_run {
            return Ok(MigrateResult {
                dry_run: true,
                current_version: before.current_version,
                target_version: before.target_version,
                would_apply_versions: before.pending_versions,
                inferred_from_legacy: before.inferred_from_legacy,
                after_version: None,
                up_to_date: None,
            });
        }

        let planned_versions = before.pending_versions;
        store.migrate()?;
        let after = store.schema_status()?;
        Ok(MigrateResult {
            dry_run: false,
            current_version: before.current_version,
            target_version: before.target_version,
            would_apply_versions: planned_versions,
            inferred_from_legacy: before.inferred_from_legacy,
            after_version: Some(after.current_version),
            up_to_date: Some(after.pending_versions.is_empty()),
        })
    }

    /// Validate and store a new record, assigning its notice number.
    ///
    /// # Errors
    /// Returns [`RecordError`] validation failures, or storage errors.
    pub fn create_record(
        &self,
        mut draft: RecordDraft,
        attribution: &Attribution,
    ) -> Result<EnforcementRecord> {
        draft.id = None;
        let directory = self.directory;
        self.open_store()?
            .update_records(|store| Ok(store.save(draft, &directory, attribution)?))
    }

    /// Replace the editable fields of an existing record.
    ///
    /// # Errors
    /// Returns [`RecordError::NotFound`] for unknown ids, validation failures,
    /// or storage errors.
    pub fn update_record(
        &self,
        id: &RecordId,
        mut draft: RecordDraft,
        attribution: &Attribution,
    ) -> Result<EnforcementRecord> {
        draft.id = Some(id.clone());
        let directory = self.directory;
        self.open_store()?
            .update_records(|store| Ok(store.save(draft, &directory, attribution)?))
    }

    /// # Errors
    /// Returns [`RecordError::NotFound`] when no record carries `id`.
    pub fn show_record(&self, id: &RecordId) -> Result<EnforcementRecord> {
        let store = self.open_store()?.load_records()?;
        store.get(id).cloned().ok_or_else(|| RecordError::NotFound(id.to_string()).into())
    }

    /// Filter by query text and status, then return one page of matches.
    ///
    /// # Errors
    /// Returns an error when records cannot be loaded.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let store = self.open_store()?.load_records()?;
        let state = request.query_state();
        let page_size = request.page_size.unwrap_or(enforcement_core::DEFAULT_PAGE_SIZE);
        let total_pages = state.total_pages(store.records(), page_size);
        let state = state.with_page(request.page.unwrap_or(1), total_pages);
        let page = state.apply(store.records(), page_size);

        Ok(SearchResult {
            query: state.query.clone(),
            status: state.status,
            page: Page {
                items: page.items.into_iter().cloned().collect(),
                page_number: page.page_number,
                total_pages: page.total_pages,
                total_items: page.total_items,
            },
        })
    }

    /// Close every record in `ids` when `confirmation` is affirmative.
    ///
    /// # Errors
    /// Returns an error when records cannot be loaded or persisted.
    pub fn bulk_close(
        &self,
        ids: Vec<RecordId>,
        confirmation: Confirmation,
        attribution: &Attribution,
    ) -> Result<BulkOutcome> {
        let selection: Selection = ids.into_iter().collect();
        self.open_store()?.update_records(|store| {
            Ok(close_selected(store, &selection, confirmation, attribution))
        })
    }

    /// Reassign every record in `ids`; a blank or missing officer is a no-op.
    ///
    /// # Errors
    /// Returns an error when records cannot be loaded or persisted.
    pub fn bulk_assign(
        &self,
        ids: Vec<RecordId>,
        officer: Option<&str>,
        attribution: &Attribution,
    ) -> Result<BulkOutcome> {
        let selection: Selection = ids.into_iter().collect();
        self.open_store()?.update_records(|store| {
            Ok(assign_selected(store, &selection, officer, attribution))
        })
    }

    /// Draft recommendations for a notice that has not been saved yet.
    ///
    /// # Errors
    /// Returns [`ApiError::MissingIssue`] when there is nothing to base the draft on.
    /// Provider failures are not errors; they come back as [`Enrichment::Unavailable`].
    pub fn recommend(&self, request: &RecommendRequest) -> Result<Enrichment> {
        if request.issue_of_concern.trim().is_empty() {
            return Err(ApiError::MissingIssue.into());
        }
        Ok(self.ai.generate_recommendations(
            &request.issue_of_concern,
            &request.sub_county,
            &request.plot_number,
        ))
    }

    /// Generate an executive summary for a stored record and save it on success.
    /// Unavailable placeholders are returned to the caller and never stored.
    ///
    /// # Errors
    /// Returns [`ApiError::EnrichmentInFlight`] while another summary for the same
    /// record is running, [`RecordError::NotFound`] for unknown ids, or storage errors.
    pub fn summarize_record(
        &self,
        id: &RecordId,
        attribution: &Attribution,
    ) -> Result<SummaryOutcome> {
        let Some(_guard) = self.pending.try_begin(id) else {
            return Err(ApiError::EnrichmentInFlight(id.clone()).into());
        };
        let record = self.show_record(id)?;
        let enrichment = self.ai.generate_summary(
            &record.issue_of_concern,
            &record.recommendations,
            &record.location,
        );

        let Some(summary) = enrichment.generated_text().map(str::to_string) else {
            tracing::info!(record_id = %id, "summary unavailable; record left unchanged");
            return Ok(SummaryOutcome { record, enrichment, stored: false });
        };

        let directory = self.directory;
        let record = self.open_store()?.update_records(|store| {
            let current = store.get(id).ok_or_else(|| RecordError::NotFound(id.to_string()))?;
            let mut draft = RecordDraft::from_record(current);
            draft.ai_summary = Some(summary);
            Ok(store.save(draft, &directory, attribution)?)
        })?;
        Ok(SummaryOutcome { record, enrichment, stored: true })
    }

    /// CSV of every record matching the search filters, ignoring pagination.
    ///
    /// # Errors
    /// Returns [`enforcement_reports::ReportError::NothingToExport`] when nothing matches.
    pub fn export_csv(&self, request: &SearchRequest, today: Date) -> Result<CsvExport> {
        let store = self.open_store()?.load_records()?;
        let matches = request.query_state().filter(store.records());
        let rows = matches.len();
        let content = to_csv(matches)?;
        Ok(CsvExport { file_name: csv_file_name(today), rows, content })
    }

    /// Lay out and render the weekly PDF report. Missing bounds default to the
    /// seven days ending `today`.
    ///
    /// # Errors
    /// Returns [`RecordError::UnknownSubCounty`] for an unknown jurisdiction,
    /// [`enforcement_reports::ReportError`] for an inverted range or an empty
    /// result set, or storage errors.
    pub fn weekly_report(
        &self,
        request: &WeeklyReportRequest,
        today: Date,
    ) -> Result<WeeklyReport> {
        let jurisdiction = Jurisdiction::from_sub_county(request.sub_county.as_deref());
        if let Some(name) = jurisdiction.sub_county() {
            if self.directory.sub_county(name).is_none() {
                return Err(RecordError::UnknownSubCounty(name.to_string()).into());
            }
        }

        let default_window = ReportWindow::last_seven_days(today);
        let window = ReportWindow::new(
            request.start.unwrap_or(default_window.start),
            request.end.unwrap_or(default_window.end),
        )?;

        let store = self.open_store()?.load_records()?;
        let selected = filter_for_report(store.records(), &window, jurisdiction.sub_county());
        let document = to_report_document(selected, &window, &jurisdiction, &request.preparers)?;
        let pdf = render_pdf(&document)?;

        tracing::info!(
            jurisdiction = jurisdiction.label(),
            rows = document.row_count,
            pages = document.pages.len(),
            "weekly report rendered"
        );
        Ok(WeeklyReport {
            file_name: document.file_name,
            title: document.title,
            subtitle: document.subtitle,
            jurisdiction,
            window,
            rows: document.row_count,
            pages: document.pages.len(),
            pdf,
        })
    }

    /// # Errors
    /// Returns an error when records cannot be loaded.
    pub fn stats(&self) -> Result<DashboardStats> {
        let store = self.open_store()?.load_records()?;
        Ok(DashboardStats::from_records(store.records()))
    }

    /// # Errors
    /// Returns [`RecordError::UnknownSubCounty`] for names outside the directory.
    pub fn sub_county(&self, name: &str) -> Result<enforcement_core::SubCounty> {
        self.directory
            .sub_county(name)
            .copied()
            .ok_or_else(|| anyhow!(RecordError::UnknownSubCounty(name.to_string())))
    }
}

/// Today's date in the local timezone, falling back to UTC.
#[must_use]
pub fn local_today() -> Date {
    local_now().date()
}
