pub mod schema;
pub mod record;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};

use leakcheck_blob::BlobStore;
use leakcheck_core::ServiceError;
use leakcheck_sql::{Row, SQLError, SQLStore};

use crate::model::{Device, Medium, PhotoInfo, TestRecord};
use crate::report::{PdfRenderer, ReportRenderer};
use crate::serial::{SerialAllocator, SerialNumber, SerialPolicy};

/// Tunables for the leak-test service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub serial_policy: SerialPolicy,

    /// Allocation attempts before lock contention is reported as a failure.
    pub max_attempts: u32,

    /// A repeat of the last committed device inside this window is
    /// rejected as an accidental resubmission.
    pub debounce: Duration,

    pub max_photo_bytes: usize,

    /// Site offset from UTC. A submission without `photo_taken_at` is
    /// dated with the receipt time on this clock.
    pub local_offset: FixedOffset,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            serial_policy: SerialPolicy::default(),
            max_attempts: 5,
            debounce: Duration::from_secs(10),
            max_photo_bytes: 20 * 1024 * 1024,
            local_offset: Utc.fix(),
        }
    }
}

/// Leak-test service. Holds the storage backends and the serial allocator.
pub struct LeakTestService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) blob: Arc<dyn BlobStore>,
    pub(crate) allocator: SerialAllocator,
    pub(crate) renderer: Box<dyn ReportRenderer>,
    pub(crate) options: ServiceOptions,
}

impl LeakTestService {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        options: ServiceOptions,
    ) -> Result<Self, ServiceError> {
        schema::init_schema(sql.as_ref())?;
        Ok(Self {
            sql,
            blob,
            allocator: SerialAllocator::new(options.serial_policy, options.max_attempts),
            renderer: Box::new(PdfRenderer::default()),
            options,
        })
    }

    /// Replace the certificate renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn ReportRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn serial_policy(&self) -> SerialPolicy {
        self.allocator.policy()
    }
}

/// Columns selected for every [`TestRecord`] read. Join alias `t` is the
/// tests table, `d` the devices table.
pub(crate) const RECORD_COLUMNS: &str = "t.id AS id, t.serial_number AS serial_number, \
    t.inspector_name AS inspector_name, t.performed_at AS performed_at, \
    t.pressure_bar AS pressure_bar, t.held_45_minutes AS held_45_minutes, \
    t.medium AS medium, t.photo_content_type AS photo_content_type, \
    t.photo_size AS photo_size, t.created_at AS created_at, \
    d.id AS device_id, d.name AS device_name";

/// Storage layout of `performed_at`.
pub(crate) const PERFORMED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub(crate) fn sql_err(e: SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

fn column<'a>(row: &'a Row, name: &str) -> Result<&'a str, ServiceError> {
    row.get_str(name)
        .ok_or_else(|| ServiceError::Internal(format!("missing {} column", name)))
}

fn int_column(row: &Row, name: &str) -> Result<i64, ServiceError> {
    row.get_i64(name)
        .ok_or_else(|| ServiceError::Internal(format!("missing {} column", name)))
}

pub(crate) fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, ServiceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ServiceError::Internal(format!("bad created_at {:?}: {}", raw, e)))
}

/// Map a row selected with [`RECORD_COLUMNS`].
pub(crate) fn row_to_record(row: &Row) -> Result<TestRecord, ServiceError> {
    let serial_raw = int_column(row, "serial_number")?;
    let serial_number = SerialNumber::from_column(serial_raw)
        .ok_or_else(|| ServiceError::Internal(format!("bad serial {}", serial_raw)))?;

    let performed_raw = column(row, "performed_at")?;
    let performed_at = NaiveDateTime::parse_from_str(performed_raw, PERFORMED_AT_FORMAT)
        .map_err(|e| ServiceError::Internal(format!("bad performed_at {:?}: {}", performed_raw, e)))?;

    let medium: Medium = column(row, "medium")?
        .parse()
        .map_err(ServiceError::Internal)?;

    let pressure_bar = row
        .get_f64("pressure_bar")
        .ok_or_else(|| ServiceError::Internal("missing pressure_bar column".into()))?;

    Ok(TestRecord {
        id: column(row, "id")?.to_string(),
        device: Device {
            id: column(row, "device_id")?.to_string(),
            name: column(row, "device_name")?.to_string(),
        },
        serial_number,
        inspector_name: column(row, "inspector_name")?.to_string(),
        performed_at,
        pressure_bar,
        held_45_minutes: int_column(row, "held_45_minutes")? != 0,
        medium,
        photo: PhotoInfo {
            content_type: column(row, "photo_content_type")?.to_string(),
            size: int_column(row, "photo_size")?.max(0) as u64,
        },
        created_at: parse_created_at(column(row, "created_at")?)?,
    })
}
