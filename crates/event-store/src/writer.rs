use std::borrow::Cow;

use diesel::{
    prelude::*,
    sql_types::{BigInt, Nullable, Text},
    sqlite::Sqlite,
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::{EventStore, StoreError, WriteError};

/// Default number of jobs buffered before producers have to wait.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Positional argument of a [`WriteJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A mutating statement with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteJob {
    statement: Cow<'static, str>,
    args: Vec<SqlValue>,
}

impl WriteJob {
    pub fn new(statement: impl Into<Cow<'static, str>>, args: Vec<SqlValue>) -> Self {
        Self {
            statement: statement.into(),
            args,
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    fn execute(&self, conn: &mut SqliteConnection) -> QueryResult<usize> {
        let mut query = diesel::sql_query(self.statement.to_string()).into_boxed::<Sqlite>();
        for arg in &self.args {
            query = match arg {
                SqlValue::Integer(value) => query.bind::<BigInt, _>(*value),
                SqlValue::Text(value) => query.bind::<Text, _>(value.clone()),
                SqlValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            };
        }
        query.execute(conn)
    }
}

#[derive(Debug)]
enum WriterMessage {
    Job(WriteJob),
    Close,
}

/// Outcome counters of a write worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: u64,
    pub failed: u64,
}

/// Cloneable producer side of the write queue.
#[derive(Debug, Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<WriterMessage>,
}

impl WriteHandle {
    /// Buffers `job`, waiting only while the queue is at capacity.
    pub async fn enqueue(&self, job: WriteJob) -> Result<(), WriteError> {
        self.tx
            .send(WriterMessage::Job(job))
            .await
            .map_err(|_| WriteError::Closed)
    }

    /// Buffers `job` without waiting.
    pub fn try_enqueue(&self, job: WriteJob) -> Result<(), WriteError> {
        self.tx
            .try_send(WriterMessage::Job(job))
            .map_err(|err| match err {
                TrySendError::Full(_) => WriteError::QueueFull,
                TrySendError::Closed(_) => WriteError::Closed,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single consumer of the write queue.
///
/// Exactly one worker runs on a blocking thread and applies jobs in the order
/// they were buffered, each at most once. A failing job is logged and dropped.
pub struct WriteSerializer {
    handle: WriteHandle,
    worker: JoinHandle<WriterStats>,
}

impl WriteSerializer {
    /// Opens the worker connection and starts consuming the queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: &EventStore, capacity: usize) -> Result<Self, StoreError> {
        let conn = store.connect()?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::task::spawn_blocking(move || run_writer(conn, rx));

        Ok(Self {
            handle: WriteHandle { tx },
            worker,
        })
    }

    pub fn handle(&self) -> WriteHandle {
        self.handle.clone()
    }

    /// Closes the queue, waits for every job already buffered to be applied
    /// and joins the worker.
    ///
    /// Jobs submitted afterwards, through any handle, fail with [`WriteError::Closed`].
    pub async fn shutdown(self) -> Result<WriterStats, WriteError> {
        let Self { handle, worker } = self;
        // A closed queue means the worker already stopped: joining is enough.
        let _ = handle.tx.send(WriterMessage::Close).await;
        drop(handle);

        worker
            .await
            .map_err(|err| WriteError::Worker(err.to_string()))
    }
}

fn run_writer(mut conn: SqliteConnection, mut rx: mpsc::Receiver<WriterMessage>) -> WriterStats {
    let mut stats = WriterStats::default();

    while let Some(message) = rx.blocking_recv() {
        match message {
            WriterMessage::Job(job) => match job.execute(&mut conn) {
                Ok(_) => stats.applied += 1,
                Err(err) => {
                    stats.failed += 1;
                    log::error!("Write job failed ({}): {err}", job.statement());
                }
            },
            // Refuse new jobs; whatever is still buffered is drained by the loop.
            WriterMessage::Close => rx.close(),
        }
    }

    log::debug!(
        "Write worker stopped: {} applied, {} failed",
        stats.applied,
        stats.failed
    );
    stats
}
