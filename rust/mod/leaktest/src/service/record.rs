use tracing::{info, warn};

use leakcheck_core::{ListParams, ListResult, ServiceError};
use leakcheck_sql::{SQLExecutor, Value};

use crate::model::{photo_key, TestRecord};
use super::{row_to_record, sql_err, LeakTestService, RECORD_COLUMNS};

const MAX_PAGE: usize = 500;

impl LeakTestService {
    pub fn get_test(&self, id: &str) -> Result<TestRecord, ServiceError> {
        find_test(self.sql.as_ref(), id)?
            .ok_or_else(|| ServiceError::NotFound(format!("test {} not found", id)))
    }

    /// Newest first. `q` filters on a case-insensitive device name substring.
    pub fn list_tests(&self, params: &ListParams) -> Result<ListResult<TestRecord>, ServiceError> {
        let limit = params.capped_limit(MAX_PAGE);
        let (filter, mut args) = match params.query() {
            Some(q) => (
                "WHERE instr(lower(d.name), lower(?1)) > 0",
                vec![Value::Text(q.to_string())],
            ),
            None => ("", Vec::new()),
        };

        let count_rows = self
            .sql
            .query(
                &format!(
                    "SELECT COUNT(*) AS cnt FROM tests t JOIN devices d ON d.id = t.device_id {}",
                    filter
                ),
                &args,
            )
            .map_err(sql_err)?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0)
            .max(0) as usize;

        let n = args.len();
        args.push(Value::Integer(limit as i64));
        args.push(Value::Integer(params.offset as i64));
        let rows = self
            .sql
            .query(
                &format!(
                    "SELECT {} FROM tests t JOIN devices d ON d.id = t.device_id {} \
                     ORDER BY t.seq DESC LIMIT ?{} OFFSET ?{}",
                    RECORD_COLUMNS,
                    filter,
                    n + 1,
                    n + 2
                ),
                &args,
            )
            .map_err(sql_err)?;

        let items = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult { items, total })
    }

    /// Photo bytes and their stored content type.
    pub fn get_photo(&self, id: &str) -> Result<(String, Vec<u8>), ServiceError> {
        let record = self.get_test(id)?;
        let bytes = self
            .blob
            .get(&photo_key(&record.id))
            .map_err(|e| ServiceError::Storage(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("photo of test {} not found", id)))?;
        Ok((record.photo.content_type, bytes))
    }

    /// Certificate for one record: content type and document bytes.
    pub fn render_report(&self, id: &str) -> Result<(&'static str, Vec<u8>), ServiceError> {
        let record = self.get_test(id)?;
        let bytes = self
            .renderer
            .render(&record)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        Ok((self.renderer.content_type(), bytes))
    }

    /// Remove a record with its device row and photo.
    ///
    /// Under gap-filling the serial becomes available to the next
    /// submission once this commits.
    pub fn delete_test(&self, id: &str) -> Result<TestRecord, ServiceError> {
        let tx = self.sql.begin().map_err(sql_err)?;
        let record = find_test(&*tx, id)?
            .ok_or_else(|| ServiceError::NotFound(format!("test {} not found", id)))?;

        tx.exec("DELETE FROM tests WHERE id = ?1", &[Value::Text(record.id.clone())])
            .map_err(sql_err)?;
        tx.exec(
            "DELETE FROM devices WHERE id = ?1
             AND NOT EXISTS (SELECT 1 FROM tests WHERE device_id = ?1)",
            &[Value::Text(record.device.id.clone())],
        )
        .map_err(sql_err)?;
        self.allocator
            .release(&*tx, record.serial_number)
            .map_err(sql_err)?;
        tx.commit().map_err(sql_err)?;

        info!(serial = %record.serial_number, "test {} deleted", record.id);

        let key = photo_key(&record.id);
        if let Err(e) = self.blob.delete(&key) {
            warn!("orphaned photo {} left behind: {}", key, e);
        }
        Ok(record)
    }
}

fn find_test<E: SQLExecutor + ?Sized>(sql: &E, id: &str) -> Result<Option<TestRecord>, ServiceError> {
    let rows = sql
        .query(
            &format!(
                "SELECT {} FROM tests t JOIN devices d ON d.id = t.device_id WHERE t.id = ?1",
                RECORD_COLUMNS
            ),
            &[Value::Text(id.to_string())],
        )
        .map_err(sql_err)?;
    rows.first().map(row_to_record).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialPolicy;
    use crate::service::testing::{at, form, service};

    #[test]
    fn get_returns_what_submit_stored() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let created = svc.submit_at(form("K-12"), at(0)).unwrap();

        let fetched = svc.get_test(&created.id).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.performed_at.to_string(), "2024-05-02 10:30:00");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        assert!(matches!(svc.get_test("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.delete_test("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.get_photo("nope"), Err(ServiceError::NotFound(_))));
        assert!(matches!(svc.render_report("nope"), Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn list_is_newest_first_with_filter_and_paging() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        for (i, name) in ["Cooler A", "Freezer B", "cooler C"].iter().enumerate() {
            svc.submit_at(form(name), at(i as i64 * 60)).unwrap();
        }

        let all = svc.list_tests(&ListParams::default()).unwrap();
        assert_eq!(all.total, 3);
        let names: Vec<_> = all.items.iter().map(|t| t.device.name.as_str()).collect();
        assert_eq!(names, vec!["cooler C", "Freezer B", "Cooler A"]);

        let coolers = svc
            .list_tests(&ListParams {
                q: Some("COOLER".into()),
                ..ListParams::default()
            })
            .unwrap();
        assert_eq!(coolers.total, 2);
        assert_eq!(coolers.items.len(), 2);

        let page = svc
            .list_tests(&ListParams {
                limit: 1,
                offset: 1,
                q: None,
            })
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].device.name, "Freezer B");
    }

    #[test]
    fn photo_roundtrips_with_content_type() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let created = svc.submit_at(form("K-12"), at(0)).unwrap();

        let (content_type, bytes) = svc.get_photo(&created.id).unwrap();
        assert_eq!(content_type, "image/jpeg");
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn report_is_a_pdf() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let created = svc.submit_at(form("K-12"), at(0)).unwrap();

        let (content_type, bytes) = svc.render_report(&created.id).unwrap();
        assert_eq!(content_type, "application/pdf");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn delete_removes_record_device_and_photo() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let created = svc.submit_at(form("K-12"), at(0)).unwrap();

        let deleted = svc.delete_test(&created.id).unwrap();
        assert_eq!(deleted.serial_number, created.serial_number);
        assert!(matches!(svc.get_test(&created.id), Err(ServiceError::NotFound(_))));
        assert!(svc.blob.get(&photo_key(&created.id)).unwrap().is_none());

        let devices = svc
            .sql
            .query("SELECT COUNT(*) AS cnt FROM devices", &[])
            .unwrap();
        assert_eq!(devices[0].get_i64("cnt"), Some(0));
    }

    #[test]
    fn gap_filling_reuses_deleted_serial() {
        let (svc, _dir) = service(SerialPolicy::GapFilling);
        let ids: Vec<_> = (0..3)
            .map(|i| svc.submit_at(form(&format!("dev {i}")), at(i * 60)).unwrap())
            .collect();
        assert_eq!(ids[1].serial_number.get(), 2);

        svc.delete_test(&ids[1].id).unwrap();
        let next = svc.submit_at(form("dev 3"), at(300)).unwrap();
        assert_eq!(next.serial_number.get(), 2);
    }

    #[test]
    fn monotonic_never_reuses_deleted_serial() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        let ids: Vec<_> = (0..3)
            .map(|i| svc.submit_at(form(&format!("dev {i}")), at(i * 60)).unwrap())
            .collect();

        svc.delete_test(&ids[2].id).unwrap();
        let next = svc.submit_at(form("dev 3"), at(300)).unwrap();
        assert_eq!(next.serial_number.get(), 4);
    }

    #[test]
    fn deleting_last_record_moves_duplicate_reference() {
        let (svc, _dir) = service(SerialPolicy::Monotonic);
        svc.submit_at(form("K-11"), at(0)).unwrap();
        let second = svc.submit_at(form("K-12"), at(2)).unwrap();
        svc.delete_test(&second.id).unwrap();

        // K-11 is the last committed record again.
        assert!(svc.submit_at(form("K-12"), at(4)).is_ok());
        let mut repeat = svc.submit_at(form("K-12"), at(5));
        assert!(matches!(repeat, Err(ServiceError::DuplicateSubmission(_))));
        repeat = svc.submit_at(form("K-11"), at(6));
        assert!(repeat.is_ok());
    }
}
