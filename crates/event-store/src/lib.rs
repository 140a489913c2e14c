//! Durable storage of the agent: process lifecycle records, visited URLs,
//! page metadata and log lines, kept in a single SQLite database.
//!
//! Reads open their own connections through [`EventStore`]. Every mutation is
//! a [`WriteJob`] submitted to the [`WriteSerializer`], whose single worker
//! applies jobs in submission order.

mod error;
pub mod jobs;
mod schema;
mod store;
mod writer;

pub use error::{StoreError, WriteError};
pub use store::{DATABASE_FILE, EventStore, LogRecord, ProcessRecord, WebEvent, WebMetadata};
pub use writer::{
    DEFAULT_QUEUE_CAPACITY, SqlValue, WriteHandle, WriteJob, WriteSerializer, WriterStats,
};

/// Current wall clock time as Unix seconds, the unit of every stored timestamp.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
