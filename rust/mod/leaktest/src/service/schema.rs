use leakcheck_core::ServiceError;
use leakcheck_sql::{SQLExecutor, SQLStore};

/// SQL DDL statements to initialize the leak-test database schema.
///
/// `tests.seq` is AUTOINCREMENT so its order is commit order and a value
/// is never handed out twice, even after deletes.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS devices (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tests (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        device_id TEXT NOT NULL REFERENCES devices(id),
        serial_number INTEGER NOT NULL UNIQUE CHECK (serial_number > 0),
        inspector_name TEXT NOT NULL,
        performed_at TEXT NOT NULL,
        pressure_bar REAL NOT NULL CHECK (pressure_bar >= 0),
        held_45_minutes INTEGER NOT NULL,
        medium TEXT NOT NULL,
        photo_content_type TEXT NOT NULL,
        photo_size INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS serial_sequence (
        name TEXT PRIMARY KEY,
        last_value INTEGER NOT NULL
    )",
    // Indexes
    "CREATE INDEX IF NOT EXISTS idx_tests_device ON tests(device_id)",
];

pub fn init_schema(sql: &dyn SQLStore) -> Result<(), ServiceError> {
    for stmt in SCHEMA {
        sql.exec(stmt, &[])
            .map_err(|e| ServiceError::Storage(format!("schema init failed: {}", e)))?;
    }
    Ok(())
}
