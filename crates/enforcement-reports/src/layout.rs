use enforcement_core::EnforcementRecord;
use serde::{Deserialize, Serialize};

use crate::metrics::{text_width_mm, wrap_text, PT_PER_MM};
use crate::window::{format_short_date, format_title_date, ReportWindow};
use crate::ReportError;

/// A4 landscape.
pub const PAGE_WIDTH_MM: f32 = 297.0;
pub const PAGE_HEIGHT_MM: f32 = 210.0;

const MARGIN_MM: f32 = 14.0;
const TITLE_Y: f32 = 20.0;
const SUBTITLE_Y: f32 = 28.0;
const TABLE_START_Y: f32 = 35.0;
const TITLE_SIZE: f32 = 14.0;
const SUBTITLE_SIZE: f32 = 11.0;
const TABLE_SIZE: f32 = 9.0;
const FOOTER_SIZE: f32 = 10.0;
const CELL_PADDING_MM: f32 = 3.0;
const LINE_HEIGHT_FACTOR: f32 = 1.15;
const ASCENT_FACTOR: f32 = 0.8;
const GRID_LINE_WIDTH_MM: f32 = 0.1;
/// The preparer block moves to a new page once the table ends this close to the bottom.
const FOOTER_RESERVE_MM: f32 = 40.0;

const COLUMN_HEADERS: [&str; 7] = [
    "NO",
    "Date issued",
    "Notice s/No",
    "Plot No/ street/ Road",
    "Issue of concern",
    "Process",
    "Recommendations",
];
const FIXED_COLUMN_WIDTHS: [f32; 6] = [12.0, 25.0, 20.0, 50.0, 60.0, 40.0];
const CENTERED_COLUMNS: [bool; 7] = [true, true, true, false, false, false, false];

/// Who the weekly report is issued for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", content = "name", rename_all = "snake_case")]
pub enum Jurisdiction {
    County,
    SubCounty(String),
}

impl Jurisdiction {
    pub const COUNTY_LABEL: &'static str = "NAIROBI CITY COUNTY";

    #[must_use]
    pub fn from_sub_county(sub_county: Option<&str>) -> Self {
        match sub_county.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Self::SubCounty(name.to_string()),
            None => Self::County,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::County => Self::COUNTY_LABEL,
            Self::SubCounty(name) => name,
        }
    }

    #[must_use]
    pub fn sub_county(&self) -> Option<&str> {
        match self {
            Self::County => None,
            Self::SubCounty(name) => Some(name),
        }
    }

    /// First title line, e.g. `WESTLANDS SUB-COUNTY`.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::County => Self::COUNTY_LABEL.to_string(),
            Self::SubCounty(name) => format!("{} SUB-COUNTY", name.to_uppercase()),
        }
    }

    #[must_use]
    pub fn report_file_name(&self, window: &ReportWindow) -> String {
        format!(
            "{}_Weekly_Report_{}_{}.pdf",
            self.label().split_whitespace().collect::<Vec<_>>().join("_"),
            enforcement_core::format_iso_date(window.start),
            enforcement_core::format_iso_date(window.end),
        )
    }
}

/// Positioned drawing primitive. Coordinates are millimetres from the
/// top-left corner; text `y` is the baseline.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Text { x: f32, y: f32, size: f32, bold: bool, text: String },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, width: f32 },
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PageLayout {
    pub elements: Vec<Element>,
}

impl PageLayout {
    /// Text runs on this page, in drawing order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|element| match element {
            Element::Text { text, .. } => Some(text.as_str()),
            Element::Line { .. } => None,
        })
    }

    fn text(&mut self, x: f32, y: f32, size: f32, bold: bool, text: impl Into<String>) {
        self.elements.push(Element::Text { x, y, size, bold, text: text.into() });
    }

    fn centered_text(&mut self, y: f32, size: f32, bold: bool, text: String) {
        let x = (PAGE_WIDTH_MM - text_width_mm(&text, size, bold)) / 2.0;
        self.text(x, y, size, bold, text);
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        self.elements.push(Element::Line { x1, y1, x2, y2, width: GRID_LINE_WIDTH_MM });
    }
}

/// Laid-out weekly report, ready for [`crate::render_pdf`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub subtitle: String,
    pub file_name: String,
    pub row_count: usize,
    pub pages: Vec<PageLayout>,
}

struct Table {
    widths: [f32; 7],
    line_height: f32,
}

impl Table {
    fn new() -> Self {
        let fixed: f32 = FIXED_COLUMN_WIDTHS.iter().sum();
        let mut widths = [0.0; 7];
        widths[..6].copy_from_slice(&FIXED_COLUMN_WIDTHS);
        widths[6] = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - fixed;
        Self { widths, line_height: TABLE_SIZE * LINE_HEIGHT_FACTOR / PT_PER_MM }
    }

    fn width(&self) -> f32 {
        self.widths.iter().sum()
    }

    fn wrap_row(&self, cells: &[String; 7], bold: bool) -> Vec<Vec<String>> {
        cells
            .iter()
            .zip(self.widths)
            .map(|(cell, width)| wrap_text(cell, width - 2.0 * CELL_PADDING_MM, TABLE_SIZE, bold))
            .collect()
    }

    fn row_height(&self, wrapped: &[Vec<String>]) -> f32 {
        let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);
        #[allow(clippy::cast_precision_loss)]
        let lines = lines as f32;
        lines * self.line_height + 2.0 * CELL_PADDING_MM
    }

    /// Whole text lines that fit in `room` millimetres of row height.
    fn lines_fitting(&self, room: f32) -> usize {
        let usable = (room - 2.0 * CELL_PADDING_MM) / self.line_height;
        if usable < 1.0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let lines = usable.floor() as usize;
        lines
    }

    fn draw_row(
        &self,
        page: &mut PageLayout,
        top: f32,
        wrapped: &[Vec<String>],
        header: bool,
    ) -> f32 {
        let height = self.row_height(wrapped);
        let right = MARGIN_MM + self.width();
        page.line(MARGIN_MM, top, right, top);
        page.line(MARGIN_MM, top + height, right, top + height);

        let mut x = MARGIN_MM;
        page.line(x, top, x, top + height);
        for (column, (lines, width)) in wrapped.iter().zip(self.widths).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let block = lines.len() as f32 * self.line_height;
            let first_baseline =
                top + (height - block) / 2.0 + TABLE_SIZE / PT_PER_MM * ASCENT_FACTOR;
            let centered = header || CENTERED_COLUMNS[column];
            for (index, line) in lines.iter().enumerate().filter(|(_, line)| !line.is_empty()) {
                let text_x = if centered {
                    x + (width - text_width_mm(line, TABLE_SIZE, header)) / 2.0
                } else {
                    x + CELL_PADDING_MM
                };
                #[allow(clippy::cast_precision_loss)]
                let baseline = first_baseline + index as f32 * self.line_height;
                page.text(text_x, baseline, TABLE_SIZE, header, line.clone());
            }
            x += width;
            page.line(x, top, x, top + height);
        }
        height
    }
}

/// Cut `wrapped` after `lines` lines, returning the continuation.
fn split_row(wrapped: &mut [Vec<String>], lines: usize) -> Vec<Vec<String>> {
    wrapped
        .iter_mut()
        .map(|cell| if cell.len() > lines { cell.split_off(lines) } else { Vec::new() })
        .collect()
}

fn row_cells(sequence: usize, record: &EnforcementRecord) -> [String; 7] {
    [
        sequence.to_string(),
        format_short_date(record.date_issued),
        record.notice_number.suffix().to_string(),
        format!("{}; {}", record.plot_number, record.location),
        record.issue_of_concern.clone(),
        format!("{}\n({})", record.process_taken.label(), record.status.label()),
        record.recommendations.clone(),
    ]
}

/// Lay out the weekly report: two-line title, grid table with the header
/// repeated on every page, and the "Prepared by" list.
///
/// # Errors
/// Returns [`ReportError::NothingToExport`] when `records` is empty.
pub fn to_report_document<'a>(
    records: impl IntoIterator<Item = &'a EnforcementRecord>,
    window: &ReportWindow,
    jurisdiction: &Jurisdiction,
    preparers: &[String],
) -> Result<ReportDocument, ReportError> {
    let records = records.into_iter().collect::<Vec<_>>();
    if records.is_empty() {
        return Err(ReportError::NothingToExport);
    }

    let title = jurisdiction.title();
    let subtitle = format!(
        "WEEKLY REPORT {} - {}",
        format_title_date(window.start),
        format_title_date(window.end)
    );

    let table = Table::new();
    let header = table.wrap_row(&COLUMN_HEADERS.map(str::to_string), true);
    let bottom = PAGE_HEIGHT_MM - MARGIN_MM;

    let mut pages = Vec::new();
    let mut page = PageLayout::default();
    page.centered_text(TITLE_Y, TITLE_SIZE, true, title.clone());
    page.centered_text(SUBTITLE_Y, SUBTITLE_SIZE, true, subtitle.clone());
    let mut y = TABLE_START_Y + table.draw_row(&mut page, TABLE_START_Y, &header, true);
    let full_page_room = bottom - MARGIN_MM - table.row_height(&header);
    let mut page_has_rows = false;

    for (index, record) in records.iter().enumerate() {
        let mut wrapped = table.wrap_row(&row_cells(index + 1, record), false);
        loop {
            let height = table.row_height(&wrapped);
            if y + height <= bottom {
                y += table.draw_row(&mut page, y, &wrapped, false);
                page_has_rows = true;
                break;
            }
            // Rows taller than a page continue on the next one under a repeated header.
            let fitting = table.lines_fitting(bottom - y);
            let continuation = if fitting > 0 && (!page_has_rows || height > full_page_room) {
                let rest = split_row(&mut wrapped, fitting);
                table.draw_row(&mut page, y, &wrapped, false);
                Some(rest)
            } else {
                None
            };
            pages.push(std::mem::take(&mut page));
            y = MARGIN_MM + table.draw_row(&mut page, MARGIN_MM, &header, true);
            page_has_rows = false;
            if let Some(rest) = continuation {
                wrapped = rest;
            }
        }
    }

    let preparers = preparers.iter().map(|name| name.trim()).filter(|name| !name.is_empty());
    let (heading_y, first_entry_y) = if y < PAGE_HEIGHT_MM - FOOTER_RESERVE_MM {
        (y + 10.0, y + 16.0)
    } else {
        pages.push(std::mem::take(&mut page));
        (20.0, 26.0)
    };
    page.text(MARGIN_MM, heading_y, FOOTER_SIZE, false, "Prepared by");
    for (index, name) in preparers.enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let entry_y = first_entry_y + index as f32 * 5.0;
        page.text(MARGIN_MM, entry_y, FOOTER_SIZE, false, format!("{}   {name}", index + 1));
    }
    pages.push(page);

    tracing::debug!(rows = records.len(), pages = pages.len(), "weekly report laid out");
    Ok(ReportDocument {
        title,
        subtitle,
        file_name: jurisdiction.report_file_name(window),
        row_count: records.len(),
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use enforcement_core::{
        AdministrativeDirectory, Attribution, ProcessTaken, RecordDraft, RecordError,
        RecordStatus, RecordStore,
    };
    use time::macros::{date, datetime};

    fn store(count: usize) -> Result<RecordStore, RecordError> {
        let directory = AdministrativeDirectory::nairobi();
        let attribution = Attribution::new("Current Officer", datetime!(2025-05-12 07:45 UTC));
        let mut store = RecordStore::new();
        for index in 0..count {
            let draft = RecordDraft {
                id: None,
                plot_number: format!("WL/{index}"),
                location: "Ring Road".to_string(),
                sub_county: "Westlands".to_string(),
                ward: "Parklands".to_string(),
                date_issued: date!(2025 - 05 - 09),
                issue_of_concern: "Unapproved extension.".to_string(),
                process_taken: ProcessTaken::NoticeIssued,
                recommendations: "Stop works.".to_string(),
                officer_in_charge: None,
                status: RecordStatus::Open,
                attachments: Vec::new(),
                ai_summary: None,
            };
            store.save(draft, &directory, &attribution)?;
        }
        Ok(store)
    }

    fn window() -> ReportWindow {
        ReportWindow { start: date!(2025 - 05 - 05), end: date!(2025 - 05 - 12) }
    }

    fn preparers() -> Vec<String> {
        vec!["John Mbuthia".to_string(), "  ".to_string(), "Mercy Amoa".to_string()]
    }

    fn layout(count: usize) -> Result<ReportDocument, Box<dyn std::error::Error>> {
        let store = store(count)?;
        let jurisdiction = Jurisdiction::SubCounty("Westlands".to_string());
        Ok(to_report_document(store.records(), &window(), &jurisdiction, &preparers())?)
    }

    #[test]
    fn title_block_and_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(1)?;
        assert_eq!(document.title, "WESTLANDS SUB-COUNTY");
        assert_eq!(document.subtitle, "WEEKLY REPORT 5TH MAY 2025 - 12TH MAY 2025");
        assert_eq!(document.file_name, "Westlands_Weekly_Report_2025-05-05_2025-05-12.pdf");

        let county = Jurisdiction::from_sub_county(Some("  "));
        assert_eq!(county.title(), "NAIROBI CITY COUNTY");
        assert_eq!(
            county.report_file_name(&window()),
            "NAIROBI_CITY_COUNTY_Weekly_Report_2025-05-05_2025-05-12.pdf"
        );
        Ok(())
    }

    #[test]
    fn table_cells_use_report_formats() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(1)?;
        let texts = document.pages[0].texts().collect::<Vec<_>>();
        let expected_cells = [
            "NO",
            "Notice",
            "s/No",
            "1",
            "9/5/2025",
            "001",
            "WL/0; Ring Road",
            "Notice Issued",
            "(Open)",
        ];
        for expected in expected_cells {
            assert!(texts.contains(&expected), "missing `{expected}` in {texts:?}");
        }
        Ok(())
    }

    #[test]
    fn preparers_skip_blanks_and_are_renumbered() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(1)?;
        let texts = document.pages[0].texts().collect::<Vec<_>>();
        let footer =
            texts.iter().skip_while(|text| **text != "Prepared by").copied().collect::<Vec<_>>();
        assert_eq!(footer, vec!["Prepared by", "1   John Mbuthia", "2   Mercy Amoa"]);
        Ok(())
    }

    #[test]
    fn footer_stays_on_page_when_space_remains() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(9)?;
        assert_eq!(document.pages.len(), 1);
        assert!(document.pages[0].texts().any(|text| text == "Prepared by"));
        Ok(())
    }

    #[test]
    fn footer_moves_to_a_fresh_page_when_table_ends_low() -> Result<(), Box<dyn std::error::Error>>
    {
        let document = layout(10)?;
        assert_eq!(document.pages.len(), 2);
        let continuation = document.pages[1].texts().collect::<Vec<_>>();
        assert_eq!(continuation, vec!["Prepared by", "1   John Mbuthia", "2   Mercy Amoa"]);
        Ok(())
    }

    #[test]
    fn long_tables_repeat_the_header_row() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(12)?;
        assert_eq!(document.row_count, 12);
        assert_eq!(document.pages.len(), 2);
        for page in &document.pages {
            assert!(page.texts().any(|text| text == "Recommendations"));
        }
        assert!(document.pages[1].texts().any(|text| text == "12"));
        assert!(document.pages[1].texts().any(|text| text == "Prepared by"));
        Ok(())
    }

    #[test]
    fn everything_is_drawn_inside_the_page() -> Result<(), Box<dyn std::error::Error>> {
        let document = layout(25)?;
        for page in &document.pages {
            for element in &page.elements {
                let (x, y) = match element {
                    Element::Text { x, y, .. } => (*x, *y),
                    Element::Line { x2, y2, .. } => (*x2, *y2),
                };
                assert!((0.0..=PAGE_WIDTH_MM).contains(&x), "x out of page: {element:?}");
                assert!((0.0..=PAGE_HEIGHT_MM).contains(&y), "y out of page: {element:?}");
            }
        }
        Ok(())
    }

    #[test]
    fn oversized_rows_continue_on_the_next_page() -> Result<(), Box<dyn std::error::Error>> {
        let mut store = store(2)?;
        let mut long = RecordDraft::from_record(&store.records()[0]);
        long.recommendations =
            "Serve a fresh enforcement notice and schedule inspection. ".repeat(60);
        store.save(
            long,
            &AdministrativeDirectory::nairobi(),
            &Attribution::new("Current Officer", datetime!(2025-05-12 08:00 UTC)),
        )?;
        let jurisdiction = Jurisdiction::SubCounty("Westlands".to_string());
        let document = to_report_document(store.records(), &window(), &jurisdiction, &[])?;

        assert!(document.pages.len() >= 2);
        assert!(document.pages[0].texts().any(|text| text.contains("inspection")));
        let mut inspections = 0;
        for page in &document.pages {
            assert!(page.texts().any(|text| text == "Recommendations"));
            inspections +=
                page.texts().map(|text| text.matches("inspection.").count()).sum::<usize>();
            for element in &page.elements {
                let y = match element {
                    Element::Text { y, .. } => *y,
                    Element::Line { y1, y2, .. } => y1.max(*y2),
                };
                assert!(y <= PAGE_HEIGHT_MM - MARGIN_MM, "y out of page: {element:?}");
            }
        }
        assert_eq!(inspections, 60);
        Ok(())
    }

    #[test]
    fn empty_report_is_refused() {
        let result = to_report_document(&[], &window(), &Jurisdiction::County, &preparers());
        assert!(matches!(result, Err(ReportError::NothingToExport)));
    }
}
