use enforcement_core::{format_iso_date, EnforcementRecord};
use time::Date;

use crate::ReportError;

pub const CSV_HEADERS: [&str; 12] = [
    "Notice Number",
    "Plot Number",
    "Location",
    "Sub-County",
    "Ward",
    "Date Issued",
    "Status",
    "Process Taken",
    "Issue of Concern",
    "Recommendations",
    "Officer In Charge",
    "AI Summary",
];

/// One header line plus one row per record, joined by `\n`.
///
/// # Errors
/// Returns [`ReportError::NothingToExport`] when `records` is empty.
pub fn to_csv<'a>(
    records: impl IntoIterator<Item = &'a EnforcementRecord>,
) -> Result<String, ReportError> {
    let mut lines = vec![CSV_HEADERS.join(",")];
    for record in records {
        let date_issued = format_iso_date(record.date_issued);
        let fields = [
            record.notice_number.as_str(),
            record.plot_number.as_str(),
            record.location.as_str(),
            record.sub_county.as_str(),
            record.ward.as_str(),
            date_issued.as_str(),
            record.status.label(),
            record.process_taken.label(),
            record.issue_of_concern.as_str(),
            record.recommendations.as_str(),
            record.officer_in_charge.as_str(),
            record.ai_summary.as_deref().unwrap_or_default(),
        ];
        lines.push(fields.iter().map(|field| escape_field(field)).collect::<Vec<_>>().join(","));
    }
    if lines.len() == 1 {
        return Err(ReportError::NothingToExport);
    }
    Ok(lines.join("\n"))
}

#[must_use]
pub fn csv_file_name(exported_on: Date) -> String {
    format!("enforcement_records_{}.csv", format_iso_date(exported_on))
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
