//! Test certificates.

mod pdf;

use thiserror::Error;

use crate::model::TestRecord;

pub use pdf::PdfRenderer;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("pdf rendering failed: {0}")]
    Pdf(String),

    #[error("character {0:?} in {1:?} cannot be printed with the certificate font")]
    UnsupportedCharacter(char, String),
}

/// Turns a stored record into a printable document.
pub trait ReportRenderer: Send + Sync {
    /// MIME type of the rendered bytes.
    fn content_type(&self) -> &'static str;

    fn render(&self, record: &TestRecord) -> Result<Vec<u8>, ReportError>;
}

/// Label/value pairs printed on a certificate, in order.
pub fn certificate_lines(record: &TestRecord) -> Vec<(&'static str, String)> {
    vec![
        ("Serial number", record.serial_number.to_string()),
        ("Device", record.device.name.clone()),
        ("Inspector", record.inspector_name.clone()),
        (
            "Performed at",
            record.performed_at.format("%Y-%m-%d %H:%M").to_string(),
        ),
        ("Test pressure", format!("{} bar", format_pressure(record.pressure_bar))),
        (
            "Held 45 minutes",
            if record.held_45_minutes { "yes" } else { "no" }.to_string(),
        ),
        ("Medium", record.medium.code().to_string()),
    ]
}

/// Up to two decimals, trailing zeros trimmed.
fn format_pressure(bar: f64) -> String {
    let s = format!("{:.2}", bar);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}
