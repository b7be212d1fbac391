use std::io::Cursor;

use printpdf::{IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use ttf_parser::Face;

use super::{certificate_lines, ReportError, ReportRenderer};
use crate::model::TestRecord;

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_LEFT: f32 = 20.0;
const VALUE_COLUMN: f32 = 75.0;
const LINE_HEIGHT: f32 = 9.0;

/// DejaVu Sans, embedded so that names in Polish and other Latin
/// Extended-A scripts print intact.
static REGULAR_TTF: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
static BOLD_TTF: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// A4 single-page certificate.
pub struct PdfRenderer {
    title: String,
}

impl PdfRenderer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new("Leak-tightness test certificate")
    }
}

/// One embedded face: the PDF font reference plus the parsed tables used
/// to check glyph coverage before drawing.
struct Typeface<'a> {
    font: IndirectFontRef,
    face: Face<'a>,
}

impl<'a> Typeface<'a> {
    fn embed(doc: &PdfDocumentReference, ttf: &'a [u8]) -> Result<Self, ReportError> {
        let face = Face::parse(ttf, 0).map_err(|e| ReportError::Pdf(e.to_string()))?;
        let font = doc
            .add_external_font(Cursor::new(ttf))
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        Ok(Self { font, face })
    }

    /// printpdf drops characters without a glyph; refuse them instead.
    fn check(&self, text: &str) -> Result<(), ReportError> {
        match text.chars().find(|c| self.face.glyph_index(*c).is_none()) {
            Some(c) => Err(ReportError::UnsupportedCharacter(c, text.to_string())),
            None => Ok(()),
        }
    }
}

impl ReportRenderer for PdfRenderer {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn render(&self, record: &TestRecord) -> Result<Vec<u8>, ReportError> {
        let doc_title = format!("{} No. {}", self.title, record.serial_number);
        let (doc, page, layer) = PdfDocument::new(&doc_title, PAGE_WIDTH, PAGE_HEIGHT, "certificate");

        let regular = Typeface::embed(&doc, REGULAR_TTF)?;
        let bold = Typeface::embed(&doc, BOLD_TTF)?;

        let lines = certificate_lines(record);
        let footer = format!("Record {}", record.id);
        bold.check(&self.title)?;
        regular.check(&footer)?;
        for (label, value) in &lines {
            bold.check(label)?;
            regular.check(value)?;
        }

        let canvas = doc.get_page(page).get_layer(layer);
        canvas.use_text(self.title.as_str(), 18.0, Mm(MARGIN_LEFT), Mm(265.0), &bold.font);

        let mut y = 240.0;
        for (label, value) in lines {
            canvas.use_text(label, 11.0, Mm(MARGIN_LEFT), Mm(y), &bold.font);
            canvas.use_text(value, 11.0, Mm(VALUE_COLUMN), Mm(y), &regular.font);
            y -= LINE_HEIGHT;
        }

        canvas.use_text(footer, 8.0, Mm(MARGIN_LEFT), Mm(15.0), &regular.font);

        doc.save_to_bytes()
            .map_err(|e| ReportError::Pdf(e.to_string()))
    }
}
