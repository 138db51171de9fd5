//! Durable per-user coordinate storage.
//!
//! Every user has at most one row. Writes go through a single
//! `INSERT .. ON CONFLICT DO UPDATE` under the connection mutex, so the
//! latest write wins and latitude and longitude are never mixed between
//! concurrent writers.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, types::Type};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{CoordinateRecord, Coordinates};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for the last location each user shared.
pub trait CoordinateStore: Send + Sync {
    /// Insert or replace the user's location.
    fn upsert(&self, user_id: i64, coordinates: Coordinates) -> StoreResult<()>;

    /// Latest location of the user, `None` if they never shared one.
    fn get(&self, user_id: i64) -> StoreResult<Option<Coordinates>>;
}

/// SQLite-backed [`CoordinateStore`].
pub struct SqliteCoordinateStore {
    conn: Mutex<Connection>,
}

impl SqliteCoordinateStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock();

        if Self::has_legacy_table(&conn)? {
            Self::migrate_legacy_table(&conn)?;
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS coordinates (
                chat_id INTEGER PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// The append-only table from earlier versions has no `updated_at` column.
    fn has_legacy_table(conn: &Connection) -> StoreResult<bool> {
        let table_exists: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='coordinates'",
            [],
            |row| row.get(0),
        )?;
        if table_exists == 0 {
            return Ok(false);
        }

        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(coordinates)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(!columns.iter().any(|name| name == "updated_at"))
    }

    /// Keep only the last row written for each user.
    fn migrate_legacy_table(conn: &Connection) -> StoreResult<()> {
        info!("Migrating legacy coordinates table");

        conn.execute_batch(
            r#"
            BEGIN;
            ALTER TABLE coordinates RENAME TO coordinates_legacy;
            CREATE TABLE coordinates (
                chat_id INTEGER PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            INSERT INTO coordinates (chat_id, latitude, longitude, created_at, updated_at)
                SELECT chat_id, latitude, longitude,
                    strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                FROM coordinates_legacy
                WHERE rowid IN (SELECT MAX(rowid) FROM coordinates_legacy GROUP BY chat_id);
            DROP TABLE coordinates_legacy;
            COMMIT;
            "#,
        )?;
        Ok(())
    }

    /// Full stored record including timestamps.
    pub fn record(&self, user_id: i64) -> StoreResult<Option<CoordinateRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT chat_id, latitude, longitude, created_at, updated_at
                 FROM coordinates WHERE chat_id = ?1",
                params![user_id],
                |row| {
                    Ok(CoordinateRecord {
                        user_id: row.get(0)?,
                        coordinates: Coordinates::new(row.get(1)?, row.get(2)?),
                        created_at: parse_timestamp(3, row.get(3)?)?,
                        updated_at: parse_timestamp(4, row.get(4)?)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Number of users with a stored location.
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM coordinates", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl CoordinateStore for SqliteCoordinateStore {
    fn upsert(&self, user_id: i64, coordinates: Coordinates) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO coordinates (chat_id, latitude, longitude, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(chat_id) DO UPDATE SET
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                updated_at = excluded.updated_at",
            params![user_id, coordinates.latitude, coordinates.longitude, now],
        )?;
        debug!(user_id, "Stored coordinates");
        Ok(())
    }

    fn get(&self, user_id: i64) -> StoreResult<Option<Coordinates>> {
        let conn = self.conn.lock();
        let coordinates = conn
            .query_row(
                "SELECT latitude, longitude FROM coordinates WHERE chat_id = ?1",
                params![user_id],
                |row| Ok(Coordinates::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(coordinates)
    }
}

/// A stored timestamp that is not RFC 3339 is an integrity failure.
fn parse_timestamp(column: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_without_upsert_is_none() {
        let store = SqliteCoordinateStore::in_memory().expect("store");
        assert_eq!(store.get(1).expect("get"), None);
    }

    #[test]
    fn upsert_then_get_returns_written_value() {
        let store = SqliteCoordinateStore::in_memory().expect("store");
        store.upsert(7, Coordinates::new(55.75, 37.62)).expect("upsert");

        assert_eq!(store.get(7).expect("get"), Some(Coordinates::new(55.75, 37.62)));
        assert_eq!(store.get(8).expect("get"), None);
    }

    #[test]
    fn latest_write_wins() {
        let store = SqliteCoordinateStore::in_memory().expect("store");
        store.upsert(7, Coordinates::new(1.0, 2.0)).expect("first upsert");
        store.upsert(7, Coordinates::new(3.0, 4.0)).expect("second upsert");

        assert_eq!(store.get(7).expect("get"), Some(Coordinates::new(3.0, 4.0)));
        assert_eq!(store.count().expect("count"), 1);
    }

    #[test]
    fn update_keeps_created_at_and_moves_updated_at() {
        let store = SqliteCoordinateStore::in_memory().expect("store");
        store.upsert(7, Coordinates::new(1.0, 2.0)).expect("first upsert");
        let first = store.record(7).expect("record").expect("present");

        store.upsert(7, Coordinates::new(3.0, 4.0)).expect("second upsert");
        let second = store.record(7).expect("record").expect("present");

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.coordinates, Coordinates::new(3.0, 4.0));
    }

    #[test]
    fn concurrent_writers_never_mix_fields() {
        let store = Arc::new(SqliteCoordinateStore::in_memory().expect("store"));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let value = f64::from(writer * 100 + i);
                        store.upsert(1, Coordinates::new(value, -value)).expect("upsert");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer thread");
        }

        let coords = store.get(1).expect("get").expect("present");
        assert_eq!(coords.longitude, -coords.latitude);
    }

    #[test]
    fn legacy_table_keeps_last_row_per_user() {
        let conn = Connection::open_in_memory().expect("connection");
        conn.execute_batch(
            "CREATE TABLE coordinates(chat_id INTEGER, latitude REAL, longitude REAL);
             INSERT INTO coordinates VALUES (1, 10.0, 20.0);
             INSERT INTO coordinates VALUES (2, 30.0, 40.0);
             INSERT INTO coordinates VALUES (1, 11.0, 21.0);",
        )
        .expect("legacy schema");

        let store = SqliteCoordinateStore::with_connection(conn).expect("migrated store");

        assert_eq!(store.count().expect("count"), 2);
        assert_eq!(store.get(1).expect("get"), Some(Coordinates::new(11.0, 21.0)));
        assert_eq!(store.get(2).expect("get"), Some(Coordinates::new(30.0, 40.0)));

        let record = store.record(1).expect("record").expect("present");
        assert!(record.created_at <= Utc::now());
    }

    #[test]
    fn corrupt_timestamp_is_a_storage_error() {
        let store = SqliteCoordinateStore::in_memory().expect("store");
        store.upsert(7, Coordinates::new(1.0, 2.0)).expect("upsert");
        store
            .conn
            .lock()
            .execute("UPDATE coordinates SET updated_at = 'yesterday' WHERE chat_id = 7", [])
            .expect("corrupt row");

        let err = store.record(7).unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
    }
}
