//! Persistent telemetry store, backed by a bundled SQLite database so
//! entries survive a collector restart.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

/// One recorded observation. `readings` is stored as a comma-separated
/// list of floats — sqlite has no native float-array column type and
/// this keeps the schema to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEntry {
    pub device_id: u32,
    pub session_id: u32,
    pub state: u8,
    pub readings: Vec<f32>,
    pub timestamp: u64,
}

/// Append-only, mutex-guarded telemetry sink shared across every
/// connection worker.
#[derive(Clone)]
pub struct TelemetryStore {
    conn: Arc<Mutex<Connection>>,
}

impl TelemetryStore {
    /// Open (creating if necessary) the database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS telemetry (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                device_id   INTEGER NOT NULL,
                session_id  INTEGER NOT NULL,
                state       INTEGER NOT NULL,
                readings    TEXT NOT NULL,
                timestamp   INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Self::open(":memory:")
    }

    pub fn append(
        &self,
        device_id: u32,
        session_id: u32,
        state: u8,
        readings: &[f32],
        timestamp: u64,
    ) -> rusqlite::Result<()> {
        let encoded = readings.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(",");
        // sqlite integers are signed 64-bit; rusqlite has no ToSql for u64,
        // so the timestamp crosses the FFI boundary as i64 (safe until the
        // year 292 billion).
        let conn = self.conn.lock().expect("telemetry store mutex poisoned");
        conn.execute(
            "INSERT INTO telemetry (device_id, session_id, state, readings, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![device_id, session_id, state, encoded, timestamp as i64],
        )?;
        Ok(())
    }

    /// All entries matching the given optional filters, oldest first.
    pub fn iterate_filtered(
        &self,
        device_id: Option<u32>,
        session_id: Option<u32>,
    ) -> rusqlite::Result<Vec<TelemetryEntry>> {
        let conn = self.conn.lock().expect("telemetry store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT device_id, session_id, state, readings, timestamp FROM telemetry
             WHERE (?1 IS NULL OR device_id = ?1) AND (?2 IS NULL OR session_id = ?2)
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![device_id, session_id], |row| {
            let readings_text: String = row.get(3)?;
            let readings = if readings_text.is_empty() {
                Vec::new()
            } else {
                readings_text.split(',').map(|s| s.parse::<f32>().unwrap_or(0.0)).collect()
            };
            let timestamp: i64 = row.get(4)?;
            Ok(TelemetryEntry {
                device_id: row.get(0)?,
                session_id: row.get(1)?,
                state: row.get(2)?,
                readings,
                timestamp: timestamp as u64,
            })
        })?;
        rows.collect()
    }
}
