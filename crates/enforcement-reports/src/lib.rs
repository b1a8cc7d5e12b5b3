//! CSV and weekly PDF reports over enforcement records.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::Date;

mod csv;
mod layout;
mod metrics;
mod pdf;
mod window;

pub use csv::{csv_file_name, to_csv, CSV_HEADERS};
pub use layout::{
    to_report_document, Element, Jurisdiction, PageLayout, ReportDocument, PAGE_HEIGHT_MM,
    PAGE_WIDTH_MM,
};
pub use pdf::render_pdf;
pub use window::{filter_for_report, format_short_date, format_title_date, ReportWindow};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("no records found for the selected criteria")]
    NothingToExport,
    #[error("invalid report range: start {start} is after end {end}")]
    InvalidRange { start: Date, end: Date },
    #[error("pdf rendering failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write `bytes` to `dir/file_name` through a temporary sibling so a failed
/// write never leaves a partial export behind.
///
/// # Errors
/// Returns [`ReportError::Io`] when the temporary file cannot be written or renamed.
pub fn write_export(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
    let target = dir.join(file_name);
    let staging = dir.join(format!(".{file_name}.partial"));
    let written = fs::File::create(&staging).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&staging);
        return Err(ReportError::Io { path: staging, source });
    }
    if let Err(source) = fs::rename(&staging, &target) {
        let _ = fs::remove_file(&staging);
        return Err(ReportError::Io { path: target, source });
    }

    tracing::info!(path = %target.display(), bytes = bytes.len(), "export written");
    Ok(target)
}
