use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::layout::{Element, PageLayout, ReportDocument, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use crate::metrics::PT_PER_MM;
use crate::ReportError;

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";

fn pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

/// PDF y grows upwards from the bottom edge.
fn flip_y(mm: f32) -> f32 {
    pt(PAGE_HEIGHT_MM - mm)
}

/// Standard-font strings are WinAnsi; characters outside Latin-1 print as `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => u8::try_from(code).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}

fn page_operations(page: &PageLayout) -> Vec<Operation> {
    let mut operations =
        vec![Operation::new("G", vec![0.into()]), Operation::new("g", vec![0.into()])];

    for element in &page.elements {
        match element {
            Element::Line { x1, y1, x2, y2, width } => {
                operations.push(Operation::new("w", vec![pt(*width).into()]));
                operations.push(Operation::new("m", vec![pt(*x1).into(), flip_y(*y1).into()]));
                operations.push(Operation::new("l", vec![pt(*x2).into(), flip_y(*y2).into()]));
                operations.push(Operation::new("S", vec![]));
            }
            Element::Text { x, y, size, bold, text } => {
                let font = if *bold { BOLD_FONT } else { REGULAR_FONT };
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec![font.into(), (*size).into()]));
                operations.push(Operation::new("Td", vec![pt(*x).into(), flip_y(*y).into()]));
                operations.push(Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]));
                operations.push(Operation::new("ET", vec![]));
            }
        }
    }
    operations
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Render a laid-out report to PDF bytes.
///
/// # Errors
/// Returns [`ReportError::Pdf`] when a content stream cannot be encoded or the
/// document cannot be serialized.
pub fn render_pdf(document: &ReportDocument) -> Result<Vec<u8>, ReportError> {
    let mut pdf = Document::with_version("1.5");
    let pages_id = pdf.new_object_id();
    let regular_id = pdf.add_object(font("Helvetica"));
    let bold_id = pdf.add_object(font("Helvetica-Bold"));
    let resources_id = pdf.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let content = Content { operations: page_operations(page) };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = i64::try_from(kids.len()).unwrap_or(i64::MAX);
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), pt(PAGE_WIDTH_MM).into(), pt(PAGE_HEIGHT_MM).into()],
    };
    pdf.objects.insert(pages_id, Object::Dictionary(pages));

    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(win_ansi(&format!(
            "{} {}",
            document.title, document.subtitle
        ))),
        "Producer" => Object::string_literal("ncenf"),
    });
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut bytes = Vec::new();
    pdf.save_to(&mut bytes).map_err(lopdf::Error::from)?;
    tracing::debug!(pages = document.pages.len(), bytes = bytes.len(), "report rendered");
    Ok(bytes)
}
