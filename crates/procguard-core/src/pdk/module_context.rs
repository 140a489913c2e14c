use std::path::{Path, PathBuf};

use event_store::{EventStore, WriteError, WriteHandle, WriteJob};
use tokio::sync::{broadcast, mpsc};

use super::{ModuleError, ModuleName, ModuleSignal};

/// Entrypoint to access all the functions available to the module.
#[derive(Clone)]
pub struct ModuleContext {
    module_name: ModuleName,
    signal_sender: mpsc::Sender<ModuleSignal>,
    store: EventStore,
    writer: WriteHandle,
    data_dir: PathBuf,
}

impl ModuleContext {
    /// Constructs a new [`ModuleContext`]
    pub fn new(
        module_name: ModuleName,
        signal_sender: mpsc::Sender<ModuleSignal>,
        store: EventStore,
        writer: WriteHandle,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            module_name,
            signal_sender,
            store,
            writer,
            data_dir,
        }
    }

    /// Returns the module name
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Read access to the event store. Reads never go through the write queue.
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Directory holding the database and the blocklist files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Submits a write job to the shared serializer, waiting for queue capacity.
    pub async fn enqueue(&self, job: WriteJob) -> Result<(), WriteError> {
        self.writer.enqueue(job).await
    }

    /// Raises warnings from the module to the upper layer.
    ///
    /// Warnings are listed in the module status until it is restarted.
    pub async fn raise_warning(&self, warning: String) {
        let _ = self
            .signal_sender
            .send(ModuleSignal::Warning(warning))
            .await;
    }
}

/// Tracks consecutive failures of a periodic operation, so a streak of
/// failures raises a single warning instead of one per tick.
#[derive(Debug, Default)]
pub struct FailureStreak {
    failing: bool,
}

impl FailureStreak {
    /// Logs the failure and raises it as a warning if the previous run succeeded.
    pub async fn failed(&mut self, ctx: &ModuleContext, message: String) {
        log::warn!(target: ctx.module_name(), "{message}");
        if !self.failing {
            self.failing = true;
            ctx.raise_warning(message).await;
        }
    }

    pub fn succeeded(&mut self, ctx: &ModuleContext) {
        if self.failing {
            log::info!(target: ctx.module_name(), "Recovered");
            self.failing = false;
        }
    }
}

#[derive(Debug)]
pub struct CleanExit(());

/// Stop request observed by long running loops at their suspension points.
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
    rx: broadcast::Receiver<()>,
}

impl Clone for ShutdownSignal {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    pub fn new() -> (ShutdownSender, ShutdownSignal) {
        let (tx, rx) = broadcast::channel(1);
        (ShutdownSender(tx.clone()), ShutdownSignal { tx, rx })
    }

    /// Resolves once the paired [`ShutdownSender`] fired.
    pub async fn recv(&mut self) -> Result<CleanExit, ModuleError> {
        let _ = self.rx.recv().await;
        Ok(CleanExit(()))
    }
}

pub struct ShutdownSender(broadcast::Sender<()>);

impl ShutdownSender {
    pub fn send_signal(self) {
        let _ = self.0.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use event_store::WriteSerializer;

    use super::*;

    #[tokio::test]
    async fn failure_streak_warns_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path()).unwrap();
        let serializer = WriteSerializer::start(&store, 4).unwrap();
        let (tx_sig, mut rx_sig) = mpsc::channel(8);
        let ctx = ModuleContext::new(
            "tracker".into(),
            tx_sig,
            store,
            serializer.handle(),
            dir.path().to_path_buf(),
        );

        let mut streak = FailureStreak::default();
        streak.failed(&ctx, "no process table".to_string()).await;
        streak.failed(&ctx, "no process table".to_string()).await;
        streak.succeeded(&ctx);
        streak.failed(&ctx, "permission denied".to_string()).await;
        drop(ctx);

        let mut warnings = Vec::new();
        while let Some(signal) = rx_sig.recv().await {
            match signal {
                ModuleSignal::Warning(warning) => warnings.push(warning),
                ModuleSignal::Error(err) => panic!("unexpected error {err}"),
            }
        }
        assert_eq!(warnings, vec!["no process table", "permission denied"]);
        serializer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_reaches_every_clone() {
        let (tx, mut first) = ShutdownSignal::new();
        let mut second = first.clone();

        let waiter = tokio::spawn(async move { second.recv().await.is_ok() });
        tx.send_signal();

        assert!(first.recv().await.is_ok());
        let done = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(done);
    }
}
