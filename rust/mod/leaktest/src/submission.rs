//! Raw submission form and its validation.
//!
//! Everything here runs before a serial number is drawn, so a rejected
//! form never consumes one.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use leakcheck_core::ServiceError;

use crate::model::Medium;

const MAX_NAME_LEN: usize = 200;

/// Accepted `photo_taken_at` layouts besides RFC 3339.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Uploaded photo as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Multipart fields exactly as posted; every field is optional here so
/// that validation can report what is missing.
#[derive(Debug, Clone, Default)]
pub struct SubmissionForm {
    pub device_name: Option<String>,
    pub inspector_name: Option<String>,
    pub photo_taken_at: Option<String>,
    pub pressure_bar: Option<String>,
    pub min_45_minutes: Option<String>,
    pub medium: Option<String>,
    pub confirm_duplicate: Option<String>,
    pub photo: Option<Photo>,
}

/// A validated submission, ready for allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTest {
    pub device_name: String,
    pub inspector_name: String,
    pub performed_at: NaiveDateTime,
    pub pressure_bar: f64,
    pub held_45_minutes: bool,
    pub medium: Medium,
    pub photo: Photo,
    /// Caller has seen the duplicate warning and resubmits on purpose.
    pub confirm_duplicate: bool,
}

impl SubmissionForm {
    /// Store a text field by its form name. Unknown names are ignored.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "device_name" => &mut self.device_name,
            "inspector_name" => &mut self.inspector_name,
            "photo_taken_at" => &mut self.photo_taken_at,
            "pressure_bar" => &mut self.pressure_bar,
            "min_45_minutes" => &mut self.min_45_minutes,
            "medium" => &mut self.medium,
            "confirm_duplicate" => &mut self.confirm_duplicate,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Check every field and produce a [`NewTest`].
    ///
    /// `performed_at` is always the inspector's wall-clock time. A supplied
    /// timestamp keeps its wall-clock part; a missing one falls back to
    /// `received_at` read in its own offset, which the caller sets to the
    /// site's local offset.
    pub fn validate(
        self,
        max_photo_bytes: usize,
        received_at: DateTime<FixedOffset>,
    ) -> Result<NewTest, ServiceError> {
        let device_name = required_name("device_name", self.device_name)?;
        let inspector_name = required_name("inspector_name", self.inspector_name)?;

        let pressure_bar = parse_pressure(self.pressure_bar.as_deref().unwrap_or(""))?;

        let medium: Medium = self
            .medium
            .as_deref()
            .unwrap_or("")
            .parse()
            .map_err(ServiceError::Validation)?;

        let held_45_minutes = match self.min_45_minutes.as_deref() {
            None => false,
            Some(v) => parse_flag("min_45_minutes", v)?,
        };
        let confirm_duplicate = match self.confirm_duplicate.as_deref() {
            None => false,
            Some(v) => parse_flag("confirm_duplicate", v)?,
        };

        let performed_at = match self.photo_taken_at.as_deref().map(str::trim) {
            None | Some("") => received_at.naive_local(),
            Some(v) => parse_timestamp(v)?,
        };

        let photo = self
            .photo
            .ok_or_else(|| ServiceError::Validation("photo is required".into()))?;
        if photo.bytes.is_empty() {
            return Err(ServiceError::Validation("photo is empty".into()));
        }
        if photo.bytes.len() > max_photo_bytes {
            return Err(ServiceError::Validation(format!(
                "photo is {} bytes, limit is {}",
                photo.bytes.len(),
                max_photo_bytes
            )));
        }

        Ok(NewTest {
            device_name,
            inspector_name,
            performed_at,
            pressure_bar,
            held_45_minutes,
            medium,
            photo,
            confirm_duplicate,
        })
    }
}

fn required_name(field: &str, value: Option<String>) -> Result<String, ServiceError> {
    let value = value.unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "{} is longer than {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Non-negative finite decimal. A comma is accepted as decimal separator.
pub fn parse_pressure(raw: &str) -> Result<f64, ServiceError> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(ServiceError::Validation("pressure_bar is required".into()));
    }
    let value: f64 = normalized
        .parse()
        .map_err(|_| ServiceError::Validation(format!("pressure_bar {:?} is not a number", raw)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ServiceError::Validation(format!(
            "pressure_bar must be a non-negative number, got {:?}",
            raw
        )));
    }
    Ok(value)
}

/// Checkbox-style boolean. HTML checkboxes post "on" when ticked.
fn parse_flag(field: &str, raw: &str) -> Result<bool, ServiceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" | "" => Ok(false),
        _ => Err(ServiceError::Validation(format!(
            "{} must be true or false, got {:?}",
            field, raw
        ))),
    }
}

/// RFC 3339 keeps its wall-clock part; offset-less layouts are taken as is.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ServiceError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    LOCAL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            ServiceError::Validation(format!("photo_taken_at {:?} is not a valid timestamp", raw))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-05-02T12:00:00Z").unwrap()
    }

    fn valid_form() -> SubmissionForm {
        let mut form = SubmissionForm::default();
        form.set_field("device_name", "  K-12 ".into());
        form.set_field("inspector_name", "Jan Kowalski".into());
        form.set_field("photo_taken_at", "2024-05-02T10:30".into());
        form.set_field("pressure_bar", "6,5".into());
        form.set_field("min_45_minutes", "on".into());
        form.set_field("medium", "po".into());
        form.photo = Some(Photo {
            bytes: vec![0xFF, 0xD8, 0xFF],
            content_type: "image/jpeg".into(),
        });
        form
    }

    fn validation_message(form: SubmissionForm) -> String {
        match form.validate(1024, now()) {
            Err(ServiceError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_form_is_normalized() {
        let test = valid_form().validate(1024, now()).unwrap();
        assert_eq!(test.device_name, "K-12");
        assert_eq!(test.pressure_bar, 6.5);
        assert!(test.held_45_minutes);
        assert_eq!(test.medium, Medium::Po);
        assert_eq!(test.performed_at.to_string(), "2024-05-02 10:30:00");
        assert!(!test.confirm_duplicate);
    }

    #[test]
    fn unknown_medium_rejected() {
        let mut form = valid_form();
        form.set_field("medium", "XX".into());
        assert!(validation_message(form).contains("medium"));
    }

    #[test]
    fn negative_or_garbage_pressure_rejected() {
        for raw in ["-0.1", "abc", "", "NaN", "inf"] {
            let mut form = valid_form();
            form.set_field("pressure_bar", raw.into());
            assert!(validation_message(form).contains("pressure_bar"), "raw {raw:?}");
        }
    }

    #[test]
    fn zero_pressure_is_allowed() {
        let mut form = valid_form();
        form.set_field("pressure_bar", "0".into());
        assert_eq!(form.validate(1024, now()).unwrap().pressure_bar, 0.0);
    }

    #[test]
    fn missing_photo_rejected() {
        let mut form = valid_form();
        form.photo = None;
        assert!(validation_message(form).contains("photo"));
    }

    #[test]
    fn oversized_photo_rejected() {
        let mut form = valid_form();
        form.photo = Some(Photo {
            bytes: vec![0; 2048],
            content_type: "image/jpeg".into(),
        });
        assert!(validation_message(form).contains("limit"));
    }

    #[test]
    fn blank_names_rejected() {
        let mut form = valid_form();
        form.set_field("device_name", "   ".into());
        assert!(validation_message(form).contains("device_name"));

        let mut form = valid_form();
        form.inspector_name = None;
        assert!(validation_message(form).contains("inspector_name"));
    }

    #[test]
    fn unchecked_box_means_not_held() {
        let mut form = valid_form();
        form.min_45_minutes = None;
        assert!(!form.validate(1024, now()).unwrap().held_45_minutes);

        let mut form = valid_form();
        form.set_field("min_45_minutes", "maybe".into());
        assert!(validation_message(form).contains("min_45_minutes"));
    }

    #[test]
    fn timestamp_layouts() {
        assert_eq!(
            parse_timestamp("2024-05-02T10:30:15+02:00").unwrap().to_string(),
            "2024-05-02 10:30:15"
        );
        assert_eq!(
            parse_timestamp("2024-05-02 10:30").unwrap().to_string(),
            "2024-05-02 10:30:00"
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn missing_timestamp_uses_receipt_time() {
        let mut form = valid_form();
        form.photo_taken_at = None;
        let test = form.validate(1024, now()).unwrap();
        assert_eq!(test.performed_at.to_string(), "2024-05-02 12:00:00");
    }

    #[test]
    fn missing_timestamp_uses_receipt_wall_clock() {
        let warsaw = FixedOffset::east_opt(2 * 3600).unwrap();
        let mut form = valid_form();
        form.photo_taken_at = None;
        let test = form.validate(1024, now().with_timezone(&warsaw)).unwrap();
        assert_eq!(test.performed_at.to_string(), "2024-05-02 14:00:00");

        // Same convention as an explicit timestamp carrying that offset.
        assert_eq!(
            parse_timestamp("2024-05-02T14:00:00+02:00").unwrap(),
            test.performed_at
        );
    }

    #[test]
    fn unknown_fields_ignored() {
        let mut form = valid_form();
        form.set_field("color", "blue".into());
        assert!(form.validate(1024, now()).is_ok());
    }
}
