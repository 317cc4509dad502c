//! SQLite-backed temperature history
//!
//! Append-only time series of (timestamp, reading) rows with windowed
//! queries over an enumerated set of hour windows.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;

use crate::error::TelemetryError;

/// Hour windows the history endpoint accepts.
pub const ACCEPTED_INTERVALS: [u32; 5] = [6, 12, 24, 168, 720];

/// One stored reading
#[derive(Debug, Clone, Serialize)]
pub struct TempRow {
    pub timestamp: DateTime<Utc>,
    pub temp: f64,
}

/// Append-only temperature store.
pub struct TempStore {
    conn: Mutex<Connection>,
}

impl TempStore {
    /// Open (creating the schema if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, TelemetryError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self, TelemetryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, TelemetryError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS temps (timestamp DATETIME, temp NUMERIC)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append a reading stamped with the current time.
    pub fn insert(&self, temp: f64) -> Result<(), TelemetryError> {
        self.insert_at(Utc::now(), temp)
    }

    pub(crate) fn insert_at(&self, timestamp: DateTime<Utc>, temp: f64) -> Result<(), TelemetryError> {
        self.conn.lock().execute(
            "INSERT INTO temps (timestamp, temp) VALUES (?1, ?2)",
            rusqlite::params![timestamp, temp],
        )?;
        Ok(())
    }

    /// All rows within the last `hours` hours, oldest first.
    pub fn history(&self, hours: u32) -> Result<Vec<TempRow>, TelemetryError> {
        let cutoff = Utc::now() - Duration::hours(hours as i64);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT timestamp, temp FROM temps WHERE timestamp >= ?1 ORDER BY timestamp",
        )?;
        let rows = stmt
            .query_map([cutoff], |row| {
                Ok(TempRow {
                    timestamp: row.get(0)?,
                    temp: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query() {
        let store = TempStore::open_in_memory().unwrap();
        store.insert(21.5).unwrap();
        store.insert(22.0).unwrap();

        let rows = store.history(6).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temp, 21.5);
        assert_eq!(rows[1].temp, 22.0);
    }

    #[test]
    fn window_excludes_older_rows() {
        let store = TempStore::open_in_memory().unwrap();
        store.insert_at(Utc::now() - Duration::hours(25), 10.0).unwrap();
        store.insert_at(Utc::now() - Duration::hours(23), 20.0).unwrap();
        store.insert(30.0).unwrap();

        let rows = store.history(24).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].temp, 20.0);
        assert_eq!(rows[1].temp, 30.0);
    }

    #[test]
    fn rows_come_back_oldest_first() {
        let store = TempStore::open_in_memory().unwrap();
        store.insert_at(Utc::now() - Duration::hours(2), 2.0).unwrap();
        store.insert_at(Utc::now() - Duration::hours(4), 4.0).unwrap();
        store.insert_at(Utc::now() - Duration::hours(1), 1.0).unwrap();

        let temps: Vec<f64> = store.history(6).unwrap().iter().map(|r| r.temp).collect();
        assert_eq!(temps, vec![4.0, 2.0, 1.0]);
    }

    #[test]
    fn accepted_intervals_match_the_history_views() {
        assert_eq!(ACCEPTED_INTERVALS, [6, 12, 24, 168, 720]);
    }
}
