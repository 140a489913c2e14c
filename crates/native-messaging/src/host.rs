use std::time::Duration;

use blocklist::{AddOutcome, Blocklist};
use event_store::{WriteError, WriteHandle, WriteJob, jobs, unix_now};
use procguard_core::pdk::ShutdownSignal;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
    task::JoinError,
    time::{self, MissedTickBehavior},
};

use crate::{
    framing::{self, FramingError},
    message::{Request, Response, WebMetadataPayload},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_GUI_ORIGIN: &str = "http://127.0.0.1:58141";

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("native host task failed")]
    Task(#[from] JoinError),
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// URLs under this prefix belong to the agent's own GUI and are not recorded.
    pub gui_origin: String,
    /// How often the web blocklist is checked for changes.
    pub poll_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            gui_origin: DEFAULT_GUI_ORIGIN.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Bridge between a browser extension and the agent.
///
/// Requests arrive as frames on `reader`; replies and blocklist pushes leave
/// through a single output task so frames never interleave.
pub struct NativeHost {
    writer: WriteHandle,
    web_blocklist: Blocklist,
    config: HostConfig,
}

impl NativeHost {
    pub fn new(writer: WriteHandle, web_blocklist: Blocklist, config: HostConfig) -> Self {
        Self {
            writer,
            web_blocklist,
            config,
        }
    }

    /// Serves requests until the browser closes `reader`.
    pub async fn run<R, W>(self, mut reader: R, output: W) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx_out, rx_out) = mpsc::channel(16);
        let output_task = tokio::spawn(run_output(output, rx_out));

        let (tx_shutdown, rx_shutdown) = ShutdownSignal::new();
        let poller = tokio::spawn(run_blocklist_poller(
            self.web_blocklist.clone(),
            self.config.poll_interval,
            tx_out.clone(),
            rx_shutdown,
        ));

        let result = self.serve(&mut reader, &tx_out).await;

        tx_shutdown.send_signal();
        poller.await?;
        drop(tx_out);
        output_task.await??;

        result
    }

    async fn serve<R>(&self, reader: &mut R, tx_out: &mpsc::Sender<Response>) -> Result<(), HostError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let Some(frame) = framing::read_frame(reader).await? else {
                log::info!("Browser closed the native messaging channel");
                return Ok(());
            };

            match Request::parse(&frame) {
                Ok(request) => self.handle(request, tx_out).await,
                Err(err) => log::warn!("Skipping malformed message: {err}"),
            }
        }
    }

    async fn handle(&self, request: Request, tx_out: &mpsc::Sender<Response>) {
        match request {
            Request::Ping(payload) => {
                let _ = tx_out.send(Response::Echo(payload)).await;
            }
            Request::LogUrl(url) => {
                if url.starts_with(&self.config.gui_origin) {
                    log::trace!("Ignoring visit to the agent GUI {url}");
                    return;
                }
                self.submit(jobs::insert_web_event(&url, unix_now())).await;
            }
            Request::LogWebMetadata(WebMetadataPayload {
                domain,
                title,
                icon_url,
            }) => {
                let job = jobs::upsert_web_metadata(
                    &domain,
                    title.as_deref(),
                    icon_url.as_deref(),
                    unix_now(),
                );
                self.submit(job).await;
            }
            Request::GetWebBlocklist => {
                let list = self.load_web_blocklist();
                let _ = tx_out.send(Response::WebBlocklist(list)).await;
            }
            Request::AddToWebBlocklist(domain) => match self.web_blocklist.add(&domain) {
                Ok(AddOutcome::Added) => log::info!("Added {domain} to the web blocklist"),
                Ok(AddOutcome::Exists) => log::debug!("{domain} already in the web blocklist"),
                Err(err) => log::warn!("Adding {domain} to the web blocklist failed: {err}"),
            },
            Request::Unknown(kind) => log::debug!("Ignoring message of unknown type {kind}"),
        }
    }

    async fn submit(&self, job: WriteJob) {
        if let Err(WriteError::Closed) = self.writer.enqueue(job).await {
            log::warn!("Write queue closed, event dropped");
        }
    }

    fn load_web_blocklist(&self) -> Vec<String> {
        self.web_blocklist.load().unwrap_or_else(|err| {
            log::warn!("Reading the web blocklist failed: {err}");
            Vec::new()
        })
    }
}

async fn run_output<W>(mut output: W, mut rx: mpsc::Receiver<Response>) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let bytes = match response.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Encoding response failed: {err}");
                continue;
            }
        };
        match framing::write_frame(&mut output, &bytes).await {
            Ok(()) => {}
            Err(err @ FramingError::OutgoingTooLarge { .. }) => log::warn!("Dropping reply: {err}"),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Pushes the web blocklist to the extension on connect, then whenever its
/// content changes.
async fn run_blocklist_poller(
    list: Blocklist,
    period: Duration,
    tx_out: mpsc::Sender<Response>,
    mut shutdown: ShutdownSignal,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<Vec<String>> = None;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.recv() => return,
            _ = interval.tick() => {}
        }

        let current = match list.load() {
            Ok(current) => current,
            Err(err) => {
                log::warn!("Reading the web blocklist failed: {err}");
                continue;
            }
        };
        if last.as_ref() != Some(&current) {
            log::debug!("Web blocklist changed, pushing {} entries", current.len());
            if tx_out
                .send(Response::WebBlocklist(current.clone()))
                .await
                .is_err()
            {
                return;
            }
            last = Some(current);
        }
    }
}
