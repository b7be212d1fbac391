use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Device, Medium};
use crate::serial::SerialNumber;

/// Metadata of the photo attached to a test. The bytes live in the blob store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoInfo {
    pub content_type: String,
    pub size: u64,
}

/// One pressure test of one device.
/// Immutable once stored; only deletion is supported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestRecord {
    pub id: String,

    /// Owning device, created together with this record.
    pub device: Device,

    /// Number printed on the certificate. Assigned once at creation.
    pub serial_number: SerialNumber,

    pub inspector_name: String,

    /// Inspector's wall-clock time when the photo was taken.
    pub performed_at: NaiveDateTime,

    pub pressure_bar: f64,

    /// Whether pressure held for at least 45 minutes.
    #[serde(rename = "held45Minutes")]
    pub held_45_minutes: bool,

    pub medium: Medium,

    pub photo: PhotoInfo,

    /// Commit time. Drives duplicate-submission detection.
    pub created_at: DateTime<Utc>,
}

/// Blob key under which a test's photo is stored.
pub fn photo_key(test_id: &str) -> String {
    format!("photos/{}", test_id)
}
