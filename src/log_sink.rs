use std::sync::OnceLock;

use event_store::{WriteHandle, jobs, unix_now};
use log::{Level, Log, Metadata, Record};

/// Write queue receiving the copies made by [`StoreLogSink`], set once the store is open.
pub(crate) static LOG_WRITER: OnceLock<WriteHandle> = OnceLock::new();

/// Targets kept on the console only, the write worker's among them.
const CONSOLE_ONLY_TARGETS: &[&str] = &["event_store", "diesel"];

/// Logger forwarding every record to `inner` and copying `Info` and more
/// severe records into the `logs` table.
///
/// Copies never wait: when the queue is full or closed they are dropped.
pub struct StoreLogSink<L> {
    inner: L,
    writer: &'static OnceLock<WriteHandle>,
}

impl<L: Log> StoreLogSink<L> {
    pub fn new(inner: L, writer: &'static OnceLock<WriteHandle>) -> Self {
        Self { inner, writer }
    }

    fn copy(&self, record: &Record) {
        if record.level() > Level::Info
            || CONSOLE_ONLY_TARGETS
                .iter()
                .any(|target| record.target().starts_with(target))
        {
            return;
        }
        if let Some(writer) = self.writer.get() {
            let message = record.args().to_string();
            let _ = writer.try_enqueue(jobs::insert_log(
                unix_now(),
                record.level().as_str(),
                &message,
            ));
        }
    }
}

impl<L: Log> Log for StoreLogSink<L> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.copy(record);
        self.inner.log(record);
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Starts copying log records into the store behind `writer`.
pub fn attach(writer: WriteHandle) {
    if LOG_WRITER.set(writer).is_err() {
        log::debug!("Log records are already copied to the store");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use event_store::{EventStore, WriteSerializer};
    use log::LevelFilter;

    use super::*;

    #[derive(Default)]
    struct Console {
        lines: Mutex<Vec<String>>,
    }

    impl Log for &'static Console {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= LevelFilter::Debug
        }

        fn log(&self, record: &Record) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    fn emit(sink: &impl Log, level: Level, target: &str, message: &str) {
        sink.log(
            &Record::builder()
                .level(level)
                .target(target)
                .args(format_args!("{message}"))
                .build(),
        );
    }

    #[tokio::test]
    async fn info_and_above_reach_the_store() {
        static WRITER: OnceLock<WriteHandle> = OnceLock::new();
        let console: &'static Console = Box::leak(Box::new(Console::default()));

        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let serializer = WriteSerializer::start(&store, 16).unwrap();
        let sink = StoreLogSink::new(console, &WRITER);

        emit(&sink, Level::Info, "procguard", "before attach");
        WRITER.set(serializer.handle()).unwrap();
        emit(&sink, Level::Info, "blocklist_enforcer", "killed blocked process steam (pid 42)");
        emit(&sink, Level::Warn, "process-tracker", "Skipping tick");
        emit(&sink, Level::Debug, "procguard", "details");
        emit(&sink, Level::Trace, "procguard", "filtered out");
        emit(&sink, Level::Error, "event_store::writer", "Write job failed");
        serializer.shutdown().await.unwrap();

        let logs = store.recent_logs(10).unwrap();
        let mut messages: Vec<(&str, &str)> = logs
            .iter()
            .map(|log| (log.level.as_str(), log.message.as_str()))
            .collect();
        messages.sort();
        assert_eq!(
            messages,
            vec![
                ("INFO", "killed blocked process steam (pid 42)"),
                ("WARN", "Skipping tick"),
            ]
        );
        assert_eq!(console.lines.lock().unwrap().len(), 5);
    }
}
