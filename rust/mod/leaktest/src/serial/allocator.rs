use std::thread;
use std::time::Duration;

use leakcheck_core::ServiceError;
use leakcheck_sql::{SQLError, SQLExecutor, SQLStore, SQLTransaction, Value};
use tracing::{debug, warn};

use super::{first_gap, SerialNumber, SerialPolicy};

/// Counter row used by the monotonic policy.
const SEQUENCE_NAME: &str = "tests";

/// Hands out serial numbers for new test records.
///
/// Every allocation runs inside a store write transaction, so the
/// read-compute-persist step excludes other allocators in this process and
/// in any other process sharing the database. The allocator itself holds no
/// mutable state.
#[derive(Debug, Clone)]
pub struct SerialAllocator {
    policy: SerialPolicy,
    max_attempts: u32,
}

impl SerialAllocator {
    pub fn new(policy: SerialPolicy, max_attempts: u32) -> Self {
        Self {
            policy,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn policy(&self) -> SerialPolicy {
        self.policy
    }

    /// Claim the next serial inside `tx`.
    ///
    /// The claim only becomes durable when `tx` commits; a rollback leaves
    /// the sequence exactly as it was.
    pub fn allocate(&self, tx: &dyn SQLTransaction) -> Result<SerialNumber, SQLError> {
        let raw = match self.policy {
            SerialPolicy::GapFilling => {
                let rows = tx.query(
                    "SELECT serial_number FROM tests ORDER BY serial_number ASC",
                    &[],
                )?;
                let live: Vec<i64> = rows
                    .iter()
                    .filter_map(|r| r.get_i64("serial_number"))
                    .collect();
                first_gap(&live)
            }
            SerialPolicy::Monotonic => {
                let name = Value::Text(SEQUENCE_NAME.into());
                tx.exec(
                    "INSERT OR IGNORE INTO serial_sequence (name, last_value) VALUES (?1, 0)",
                    &[name.clone()],
                )?;
                // Lift the counter over any serial issued under gap-filling.
                tx.exec(
                    "UPDATE serial_sequence
                     SET last_value = MAX(last_value, (SELECT COALESCE(MAX(serial_number), 0) FROM tests)) + 1
                     WHERE name = ?1",
                    &[name.clone()],
                )?;
                let rows = tx.query(
                    "SELECT last_value FROM serial_sequence WHERE name = ?1",
                    &[name],
                )?;
                rows.first()
                    .and_then(|r| r.get_i64("last_value"))
                    .ok_or_else(|| SQLError::Query("serial sequence row missing".into()))?
            }
        };

        let serial = SerialNumber::from_column(raw)
            .ok_or_else(|| SQLError::Query(format!("serial out of range: {raw}")))?;
        debug!(policy = %self.policy, %serial, "serial reserved");
        Ok(serial)
    }

    /// Give back a serial whose record was deleted in `tx`.
    ///
    /// Gap-filling derives the free set from live rows, so the delete
    /// itself frees the number; this only checks the row is really gone.
    /// Monotonic never reuses numbers.
    pub fn release(&self, tx: &dyn SQLTransaction, serial: SerialNumber) -> Result<(), SQLError> {
        match self.policy {
            SerialPolicy::GapFilling => {
                let rows = tx.query(
                    "SELECT COUNT(*) AS cnt FROM tests WHERE serial_number = ?1",
                    &[Value::Integer(i64::from(serial.get()))],
                )?;
                if rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) > 0 {
                    return Err(SQLError::Execution(format!(
                        "serial {serial} is still held by a live record"
                    )));
                }
                debug!(%serial, "serial released for reuse");
            }
            SerialPolicy::Monotonic => {
                debug!(%serial, "serial retired");
            }
        }
        Ok(())
    }

    /// Reserve a serial, build and store the record, commit.
    ///
    /// `guard` runs first inside the transaction and may reject the work
    /// before any number is drawn. `build` receives the reserved number and
    /// must write everything through `tx`. If either fails the transaction
    /// rolls back and the number was never consumed. Lock contention is
    /// retried up to `max_attempts` times, then reported as storage failure.
    pub fn reserve_and_commit<T, G, B>(
        &self,
        store: &dyn SQLStore,
        mut guard: G,
        mut build: B,
    ) -> Result<T, ServiceError>
    where
        G: FnMut(&dyn SQLTransaction) -> Result<(), ServiceError>,
        B: FnMut(&dyn SQLTransaction, SerialNumber) -> Result<T, ServiceError>,
    {
        let mut last_conflict = String::new();
        for attempt in 1..=self.max_attempts {
            match self.attempt(store, &mut guard, &mut build) {
                Err(e) if e.is_retryable() => {
                    warn!(attempt, max = self.max_attempts, "serial allocation conflict: {}", e);
                    last_conflict = e.to_string();
                    if attempt < self.max_attempts {
                        thread::sleep(Duration::from_millis(10 * u64::from(attempt)));
                    }
                }
                other => return other,
            }
        }
        Err(ServiceError::Storage(format!(
            "serial allocation failed after {} attempts: {}",
            self.max_attempts, last_conflict
        )))
    }

    fn attempt<T, G, B>(
        &self,
        store: &dyn SQLStore,
        guard: &mut G,
        build: &mut B,
    ) -> Result<T, ServiceError>
    where
        G: FnMut(&dyn SQLTransaction) -> Result<(), ServiceError>,
        B: FnMut(&dyn SQLTransaction, SerialNumber) -> Result<T, ServiceError>,
    {
        let tx = store.begin().map_err(allocation_error)?;
        guard(&*tx)?;
        let serial = self.allocate(&*tx).map_err(allocation_error)?;
        let value = build(&*tx, serial)?;
        tx.commit().map_err(allocation_error)?;
        Ok(value)
    }
}

/// Only lock contention is worth another attempt. Constraint failures
/// (NOT NULL, CHECK, trigger aborts) repeat identically, so they surface
/// at once as storage errors.
pub(crate) fn allocation_error(e: SQLError) -> ServiceError {
    match e {
        SQLError::Busy(msg) => ServiceError::AllocationConflict(msg),
        other => ServiceError::Storage(other.to_string()),
    }
}
