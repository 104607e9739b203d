//! SQLite copy of the `electricity_monitor` table

use super::{parse_timestamp, RawReading, ReadingSource};
use crate::error::Result;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;

const READINGS_QUERY: &str = "SELECT data_id, device_id, voltage, current, power, energy, \
     frequency, power_factor, created_at \
     FROM electricity_monitor \
     WHERE power > ?1 \
     ORDER BY created_at DESC";

const DEVICES_QUERY: &str =
    "SELECT DISTINCT device_id FROM electricity_monitor WHERE device_id IS NOT NULL";

/// Reading source backed by a SQLite database
pub struct SqliteReadingSource {
    conn: Connection,
}

impl SqliteReadingSource {
    /// Open an existing database read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        tracing::debug!(path = %path.as_ref().display(), "Opened readings database");
        Ok(Self { conn })
    }

    /// Wrap an already-open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Create the table on a connection (used for fixtures and local setups)
    pub fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS electricity_monitor (
                data_id INTEGER PRIMARY KEY,
                device_id TEXT,
                voltage REAL,
                current REAL,
                power REAL,
                energy REAL,
                frequency REAL,
                power_factor REAL,
                created_at TEXT
            );",
        )?;
        Ok(())
    }

    /// Insert one raw row
    pub fn insert(conn: &Connection, row: &RawReading) -> Result<()> {
        conn.execute(
            "INSERT INTO electricity_monitor (data_id, device_id, voltage, current, power, \
             energy, frequency, power_factor, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.data_id,
                row.device_id,
                row.voltage,
                row.current,
                row.power,
                row.energy,
                row.frequency,
                row.power_factor,
                row.created_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            ],
        )?;
        Ok(())
    }
}

impl ReadingSource for SqliteReadingSource {
    fn fetch_readings(&mut self, min_power: f64) -> Result<Vec<RawReading>> {
        let mut stmt = self.conn.prepare(READINGS_QUERY)?;
        let rows = stmt.query_map(params![min_power], |row| {
            let created_at: Option<String> = row.get(8)?;
            Ok(RawReading {
                data_id: row.get(0)?,
                device_id: row.get(1)?,
                voltage: row.get(2)?,
                current: row.get(3)?,
                power: row.get(4)?,
                energy: row.get(5)?,
                frequency: row.get(6)?,
                power_factor: row.get(7)?,
                created_at: created_at.as_deref().and_then(parse_timestamp),
            })
        })?;

        let readings = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(rows = readings.len(), "Fetched readings");
        Ok(readings)
    }

    fn device_ids(&mut self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(DEVICES_QUERY)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;

    fn seeded() -> SqliteReadingSource {
        let conn = Connection::open_in_memory().unwrap();
        SqliteReadingSource::create_schema(&conn).unwrap();
        let ts = |s: &str| parse_timestamp(s).unwrap();
        let f = |power: f64| FeatureVector::from_array([230.0, 1.0, power, 2.0, 50.0, 0.9]);

        SqliteReadingSource::insert(&conn, &RawReading::complete(1, "AA:BB", f(120.0), ts("2024-01-01 00:00:00"))).unwrap();
        SqliteReadingSource::insert(&conn, &RawReading::complete(2, "AA:BB", f(0.2), ts("2024-01-02 00:00:00"))).unwrap();
        SqliteReadingSource::insert(&conn, &RawReading::complete(3, "CC:DD", f(80.0), ts("2024-01-03 00:00:00"))).unwrap();
        SqliteReadingSource::from_connection(conn)
    }

    #[test]
    fn test_sqlite_fetch_filters_and_orders() {
        let mut source = seeded();
        let rows = source.fetch_readings(0.5).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.data_id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_sqlite_device_ids_and_close() {
        let mut source = seeded();
        let mut devices = source.device_ids().unwrap();
        devices.sort();
        assert_eq!(devices, vec!["AA:BB".to_string(), "CC:DD".to_string()]);
        Box::new(source).close().unwrap();
    }
}
