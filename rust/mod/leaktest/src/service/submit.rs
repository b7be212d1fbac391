use chrono::{DateTime, Timelike, Utc};
use tracing::{info, warn};

use leakcheck_core::{new_id, ServiceError};
use leakcheck_sql::{SQLExecutor, SQLTransaction, Value};

use crate::model::{photo_key, Device, PhotoInfo, TestRecord};
use crate::serial::{allocation_error, SerialNumber};
use crate::submission::{NewTest, SubmissionForm};
use super::{parse_created_at, LeakTestService, PERFORMED_AT_FORMAT};

/// Device name and commit time of the most recently committed test.
struct LastCommit {
    device_name: String,
    serial: i64,
    created_at: DateTime<Utc>,
}

impl LeakTestService {
    /// Validate, store and number a submission received now.
    pub fn submit(&self, form: SubmissionForm) -> Result<TestRecord, ServiceError> {
        self.submit_at(form, Utc::now())
    }

    /// Validate, store and number a submission received at `received_at`.
    ///
    /// Order matters: validation and the duplicate check reject before a
    /// serial is drawn; the photo is written before the allocation
    /// transaction so the write lock is never held across blob I/O.
    pub fn submit_at(
        &self,
        form: SubmissionForm,
        received_at: DateTime<Utc>,
    ) -> Result<TestRecord, ServiceError> {
        let local_received = received_at.with_timezone(&self.options.local_offset);
        let test = form.validate(self.options.max_photo_bytes, local_received)?;

        // Cheap early answer for the common double-tap; repeated under the
        // write lock below, where it is authoritative.
        if !test.confirm_duplicate {
            self.reject_recent_duplicate(self.sql.as_ref(), &test.device_name, received_at)?;
        }

        let id = new_id();
        let key = photo_key(&id);
        self.blob
            .put(&key, &test.photo.bytes)
            .map_err(|e| ServiceError::Storage(format!("photo upload failed: {}", e)))?;

        let result = self.allocator.reserve_and_commit(
            self.sql.as_ref(),
            |tx| {
                if test.confirm_duplicate {
                    return Ok(());
                }
                self.reject_recent_duplicate(tx, &test.device_name, received_at)
            },
            |tx, serial| insert_test(tx, &id, &test, serial, received_at),
        );

        match result {
            Ok(record) => {
                info!(
                    serial = %record.serial_number,
                    device = %record.device.name,
                    "test {} committed",
                    record.id
                );
                Ok(record)
            }
            Err(e) => {
                if let Err(blob_err) = self.blob.delete(&key) {
                    warn!("orphaned photo {} left behind: {}", key, blob_err);
                }
                Err(e)
            }
        }
    }

    /// Reject when `device_name` matches the last committed record and
    /// `received_at` falls inside the debounce window of its commit.
    fn reject_recent_duplicate<E: SQLExecutor + ?Sized>(
        &self,
        sql: &E,
        device_name: &str,
        received_at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let Some(last) = last_commit(sql)? else {
            return Ok(());
        };
        if !last.device_name.trim().eq_ignore_ascii_case(device_name.trim()) {
            return Ok(());
        }

        let elapsed = received_at.signed_duration_since(last.created_at);
        let window = chrono::Duration::from_std(self.options.debounce)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if elapsed >= window {
            return Ok(());
        }

        Err(ServiceError::DuplicateSubmission(format!(
            "device '{}' was already recorded as test no. {} {}s ago; resubmit with confirm_duplicate=true to record it again",
            device_name,
            last.serial,
            elapsed.num_seconds().max(0)
        )))
    }
}

fn last_commit<E: SQLExecutor + ?Sized>(sql: &E) -> Result<Option<LastCommit>, ServiceError> {
    let rows = sql
        .query(
            "SELECT d.name AS device_name, t.serial_number AS serial_number, t.created_at AS created_at
             FROM tests t JOIN devices d ON d.id = t.device_id
             ORDER BY t.seq DESC LIMIT 1",
            &[],
        )
        .map_err(allocation_error)?;

    let Some(row) = rows.first() else {
        return Ok(None);
    };
    Ok(Some(LastCommit {
        device_name: row.get_str("device_name").unwrap_or_default().to_string(),
        serial: row.get_i64("serial_number").unwrap_or_default(),
        created_at: parse_created_at(row.get_str("created_at").unwrap_or_default())?,
    }))
}

/// Write the device and test rows for `serial` inside the allocation transaction.
fn insert_test(
    tx: &dyn SQLTransaction,
    id: &str,
    test: &NewTest,
    serial: SerialNumber,
    received_at: DateTime<Utc>,
) -> Result<TestRecord, ServiceError> {
    let device = Device {
        id: new_id(),
        name: test.device_name.clone(),
    };
    let created = received_at.to_rfc3339();
    let performed_at = test
        .performed_at
        .with_nanosecond(0)
        .unwrap_or(test.performed_at);

    tx.exec(
        "INSERT INTO devices (id, name, created_at) VALUES (?1, ?2, ?3)",
        &[
            Value::Text(device.id.clone()),
            Value::Text(device.name.clone()),
            Value::Text(created.clone()),
        ],
    )
    .map_err(allocation_error)?;

    tx.exec(
        "INSERT INTO tests (id, device_id, serial_number, inspector_name, performed_at,
            pressure_bar, held_45_minutes, medium, photo_content_type, photo_size, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        &[
            Value::Text(id.to_string()),
            Value::Text(device.id.clone()),
            Value::Integer(i64::from(serial.get())),
            Value::Text(test.inspector_name.clone()),
            Value::Text(performed_at.format(PERFORMED_AT_FORMAT).to_string()),
            Value::Real(test.pressure_bar),
            Value::Integer(i64::from(test.held_45_minutes)),
            Value::Text(test.medium.code().to_string()),
            Value::Text(test.photo.content_type.clone()),
            Value::Integer(test.photo.bytes.len() as i64),
            Value::Text(created),
        ],
    )
    .map_err(allocation_error)?;

    Ok(TestRecord {
        id: id.to_string(),
        device,
        serial_number: serial,
        inspector_name: test.inspector_name.clone(),
        performed_at,
        pressure_bar: test.pressure_bar,
        held_45_minutes: test.held_45_minutes,
        medium: test.medium,
        photo: PhotoInfo {
            content_type: test.photo.content_type.clone(),
            size: test.photo.bytes.len() as u64,
        },
        created_at: received_at,
    })
}
