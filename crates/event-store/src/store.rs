use std::path::{Path, PathBuf};

use diesel::{connection::SimpleConnection, prelude::*};

use crate::{StoreError, schema};

/// Name of the database file inside the data directory.
pub const DATABASE_FILE: &str = "procguard.db";

const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
";

/// Handle to the SQLite database holding process, web and log events.
///
/// The handle only remembers where the database lives: every reader opens
/// its own connection, while all mutations go through
/// [`WriteSerializer`](crate::WriteSerializer).
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

/// One observed process instance.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = schema::process_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProcessRecord {
    pub id: i64,
    pub process_name: String,
    pub pid: i64,
    pub parent_process_name: Option<String>,
    pub exe_path: Option<String>,
    pub start_time: i64,
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = schema::web_events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WebEvent {
    pub id: i64,
    pub url: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = schema::web_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WebMetadata {
    pub domain: String,
    pub title: Option<String>,
    pub icon_url: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = schema::logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: i64,
    pub level: String,
    pub message: String,
}

impl EventStore {
    /// Opens (creating it when missing) `procguard.db` inside `data_dir` and
    /// brings the schema up to date.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        Self::open_file(data_dir.join(DATABASE_FILE))
    }

    /// Opens the database at an explicit path.
    pub fn open_file(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                source,
                path: parent.to_path_buf(),
            })?;
        }

        let store = Self { path };
        let mut conn = store.connect()?;
        conn.batch_execute(schema::CREATE_SCHEMA)
            .map_err(StoreError::Migration)?;

        log::debug!("Event store ready at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a new configured connection to the database.
    pub fn connect(&self) -> Result<SqliteConnection, StoreError> {
        let path_str = self.path.to_str().ok_or_else(|| StoreError::PathNonUtf8 {
            path: self.path.clone(),
        })?;
        let mut conn =
            SqliteConnection::establish(path_str).map_err(|source| StoreError::Connection {
                source,
                path: self.path.clone(),
            })?;
        conn.batch_execute(CONNECTION_PRAGMAS)
            .map_err(StoreError::Configure)?;
        Ok(conn)
    }

    /// PIDs of every process record still believed running.
    pub fn open_process_pids(&self) -> Result<Vec<i64>, StoreError> {
        use schema::process_events::dsl::*;

        let mut conn = self.connect()?;
        process_events
            .filter(end_time.is_null())
            .select(pid)
            .distinct()
            .order(pid.asc())
            .load(&mut conn)
            .map_err(|source| StoreError::Query {
                source,
                table: "process_events",
            })
    }

    /// All process records, oldest first.
    pub fn process_records(&self) -> Result<Vec<ProcessRecord>, StoreError> {
        use schema::process_events::dsl::*;

        let mut conn = self.connect()?;
        process_events
            .order(id.asc())
            .select(ProcessRecord::as_select())
            .load(&mut conn)
            .map_err(|source| StoreError::Query {
                source,
                table: "process_events",
            })
    }

    /// Visited URLs recorded at or after `since`, oldest first.
    pub fn web_events_since(&self, since: i64) -> Result<Vec<WebEvent>, StoreError> {
        use schema::web_events::dsl::*;

        let mut conn = self.connect()?;
        web_events
            .filter(timestamp.ge(since))
            .order((timestamp.asc(), id.asc()))
            .select(WebEvent::as_select())
            .load(&mut conn)
            .map_err(|source| StoreError::Query {
                source,
                table: "web_events",
            })
    }

    pub fn web_metadata(&self, for_domain: &str) -> Result<Option<WebMetadata>, StoreError> {
        use schema::web_metadata::dsl::*;

        let mut conn = self.connect()?;
        web_metadata
            .filter(domain.eq(for_domain))
            .select(WebMetadata::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|source| StoreError::Query {
                source,
                table: "web_metadata",
            })
    }

    /// The `limit` most recent log records, newest first.
    pub fn recent_logs(&self, limit: i64) -> Result<Vec<LogRecord>, StoreError> {
        use schema::logs::dsl::*;

        let mut conn = self.connect()?;
        logs.order(id.desc())
            .limit(limit)
            .select(LogRecord::as_select())
            .load(&mut conn)
            .map_err(|source| StoreError::Query {
                source,
                table: "logs",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(store: &EventStore, sql: &str) {
        let mut conn = store.connect().unwrap();
        diesel::sql_query(sql).execute(&mut conn).unwrap();
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        exec(
            &store,
            "INSERT INTO logs (timestamp, level, message) VALUES (1, 'INFO', 'hello')",
        );

        let reopened = EventStore::open(dir.path()).unwrap();
        assert_eq!(reopened.path(), dir.path().join(DATABASE_FILE));
        let logs = reopened.recent_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "hello");
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        EventStore::open(&nested).unwrap();
        assert!(nested.join(DATABASE_FILE).exists());
    }

    #[test]
    fn open_pids_skip_closed_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        exec(
            &store,
            "INSERT INTO process_events (process_name, pid, start_time, end_time) VALUES
                ('firefox', 300, 1, NULL),
                ('bash', 200, 1, 5),
                ('vim', 100, 2, NULL)",
        );

        assert_eq!(store.open_process_pids().unwrap(), vec![100, 300]);
        let records = store.process_records().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].end_time, Some(5));
        assert_eq!(records[0].parent_process_name, None);
    }

    #[test]
    fn metadata_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        assert_eq!(store.web_metadata("example.com").unwrap(), None);
        exec(
            &store,
            "INSERT INTO web_metadata (domain, title, icon_url, timestamp)
             VALUES ('example.com', 'Example', NULL, 42)",
        );
        let meta = store.web_metadata("example.com").unwrap().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Example"));
        assert_eq!(meta.timestamp, 42);
    }
}
