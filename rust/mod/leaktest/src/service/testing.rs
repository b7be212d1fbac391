//! Fixtures shared by the service and api tests.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use leakcheck_blob::FileStore;
use leakcheck_sql::SqliteStore;

use super::{LeakTestService, ServiceOptions};
use crate::serial::SerialPolicy;
use crate::submission::{Photo, SubmissionForm};

/// Service over a fresh on-disk database and blob directory.
pub(crate) fn service(policy: SerialPolicy) -> (LeakTestService, TempDir) {
    let dir = TempDir::new().unwrap();
    let sql = Arc::new(SqliteStore::open(&dir.path().join("leakcheck.sqlite")).unwrap());
    let blob = Arc::new(FileStore::open(&dir.path().join("blobs")).unwrap());
    let options = ServiceOptions {
        serial_policy: policy,
        ..ServiceOptions::default()
    };
    (LeakTestService::new(sql, blob, options).unwrap(), dir)
}

/// `secs` seconds after a fixed receipt time.
pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-02T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::seconds(secs)
}

/// A valid submission for `device`.
pub(crate) fn form(device: &str) -> SubmissionForm {
    let mut form = SubmissionForm::default();
    form.set_field("device_name", device.to_string());
    form.set_field("inspector_name", "Jan Kowalski".into());
    form.set_field("photo_taken_at", "2024-05-02T10:30".into());
    form.set_field("pressure_bar", "8".into());
    form.set_field("min_45_minutes", "true".into());
    form.set_field("medium", "OL".into());
    form.photo = Some(Photo {
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
        content_type: "image/jpeg".into(),
    });
    form
}
