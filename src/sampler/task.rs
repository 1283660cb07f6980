//! Sampler task lifecycle: spawn the facility, run the reader, shut down.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ReaderExit, ReadingSet, SampleStore, SamplerError, SnapshotPublisher, StreamReader};

/// Default timeout for graceful shutdown (5 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a killed facility process to exit.
const REAP_TIMEOUT: Duration = Duration::from_secs(2);

fn default_enabled() -> bool {
    true
}

fn default_program() -> String {
    "powermetrics".to_string()
}

fn default_args() -> Vec<String> {
    ["--samplers", "smc", "-i", "5000"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sudo() -> bool {
    true
}

fn default_namespace() -> String {
    "node".to_string()
}

/// Configuration for the powermetrics sampler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Start the sampler at all (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Facility executable (default: "powermetrics").
    #[serde(default = "default_program")]
    pub program: String,
    /// Facility arguments (default: SMC sampler every 5s).
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Run the facility through non-interactive `sudo` (default: true).
    #[serde(default = "default_sudo")]
    pub sudo: bool,
    /// Metric namespace prefix (default: "node").
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            program: default_program(),
            args: default_args(),
            sudo: default_sudo(),
            namespace: default_namespace(),
        }
    }
}

impl SamplerConfig {
    /// Set the facility program and arguments.
    pub fn with_command<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = program.into();
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether to run through `sudo`.
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Set the metric namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Build the facility command with stdout piped.
    ///
    /// `sudo -n` fails instead of prompting when no password-less rule exists.
    pub fn command(&self) -> Command {
        let mut cmd = if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(&self.program);
            cmd
        } else {
            Command::new(&self.program)
        };
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Lifecycle state of the background reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplerStatus {
    Running,
    Stopped(ReaderExit),
}

/// Cheap, cloneable view of a sampler's status.
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    status: watch::Receiver<SamplerStatus>,
}

impl SamplerHandle {
    pub fn status(&self) -> SamplerStatus {
        self.status.borrow().clone()
    }

    /// Wait until the reader loop has ended.
    pub async fn stopped(&mut self) -> ReaderExit {
        match self
            .status
            .wait_for(|s| matches!(s, SamplerStatus::Stopped(_)))
            .await
        {
            Ok(status) => match &*status {
                SamplerStatus::Stopped(exit) => exit.clone(),
                SamplerStatus::Running => ReaderExit::Cancelled,
            },
            // Sender dropped without reporting: the task was aborted.
            Err(_) => ReaderExit::Cancelled,
        }
    }
}

type BoxedStream = Box<dyn AsyncRead + Send + Unpin>;

/// Background sampler: one detached task reading the facility output.
///
/// The task and the scrape path share nothing but the [`SampleStore`]. If the
/// facility cannot be started or its output ends, the last known values keep
/// being served.
pub struct SamplerTask {
    readings: Arc<ReadingSet>,
    store: Arc<SampleStore>,
    cancel: CancellationToken,
    status: watch::Receiver<SamplerStatus>,
    join: JoinHandle<()>,
}

impl std::fmt::Debug for SamplerTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerTask")
            .field("readings", &self.readings.len())
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl SamplerTask {
    /// Spawn the facility and start reading its output.
    ///
    /// A spawn failure is logged and the task runs over an empty stream, so
    /// every entry stays unpopulated. Must be called inside a Tokio runtime.
    pub fn start(config: &SamplerConfig, readings: ReadingSet) -> Self {
        let (stream, child) = match spawn_facility(config) {
            Ok((stream, child)) => (stream, Some(child)),
            Err(e) => {
                tracing::error!(
                    program = %config.program,
                    sudo = config.sudo,
                    error = %e,
                    "Failed to start facility"
                );
                (Box::new(tokio::io::empty()) as BoxedStream, None)
            }
        };
        Self::launch(BufReader::new(stream), readings, child)
    }

    /// Start reading from an already-open stream instead of a subprocess.
    pub fn from_reader<R>(stream: R, readings: ReadingSet) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self::launch(stream, readings, None)
    }

    fn launch<R>(stream: R, readings: ReadingSet, child: Option<Child>) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let readings = Arc::new(readings);
        let store = Arc::new(SampleStore::new(readings.len()));
        let cancel = CancellationToken::new();
        let (status_tx, status) = watch::channel(SamplerStatus::Running);

        let reader = StreamReader::new(stream, Arc::clone(&readings), Arc::clone(&store));
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            // The reader owns the pipe; it is closed when `run` returns.
            let exit = reader.run(&token).await;
            if let Some(child) = child {
                stop_child(child).await;
            }
            match &exit {
                ReaderExit::Eof => tracing::warn!("Facility output ended, serving last values"),
                ReaderExit::Cancelled => tracing::info!("Sampler stopped"),
                ReaderExit::Failed(e) => {
                    tracing::error!(error = %e, "Sampler stopped on read error")
                }
            }
            status_tx.send_replace(SamplerStatus::Stopped(exit));
        });

        tracing::info!(readings = readings.len(), "Sampler started");
        Self {
            readings,
            store,
            cancel,
            status,
            join,
        }
    }

    /// Publisher bound to this sampler's store.
    pub fn publisher(&self) -> SnapshotPublisher {
        SnapshotPublisher::new(Arc::clone(&self.readings), Arc::clone(&self.store))
    }

    pub fn handle(&self) -> SamplerHandle {
        SamplerHandle {
            status: self.status.clone(),
        }
    }

    pub fn status(&self) -> SamplerStatus {
        self.status.borrow().clone()
    }

    /// Gracefully shutdown with default timeout.
    pub async fn shutdown(self) -> Result<(), SamplerError> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    /// Cancel the reader, kill the facility and wait for the task.
    ///
    /// If the task does not finish in time it is aborted and a warning logged.
    pub async fn shutdown_with_timeout(self, timeout: Duration) -> Result<(), SamplerError> {
        self.cancel.cancel();
        let abort = self.join.abort_handle();

        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(SamplerError::Internal(e.to_string())),
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "Sampler shutdown timed out");
                abort.abort();
                Ok(())
            }
        }
    }
}

fn spawn_facility(config: &SamplerConfig) -> Result<(BoxedStream, Child), SamplerError> {
    let mut child = config.command().spawn()?;
    let stdout = child.stdout.take().ok_or_else(|| {
        SamplerError::Spawn(std::io::Error::other("facility stdout was not captured"))
    })?;
    tracing::info!(
        program = %config.program,
        pid = child.id(),
        "Facility started"
    );
    Ok((Box::new(stdout), child))
}

async fn stop_child(mut child: Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            tracing::debug!(%status, "Facility exited");
            return;
        }
        Ok(None) => {}
        Err(e) => tracing::debug!(error = %e, "Failed to poll facility status"),
    }

    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to kill facility");
        return;
    }
    match tokio::time::timeout(REAP_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => tracing::debug!(%status, "Facility killed"),
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reap facility"),
        Err(_) => tracing::warn!("Facility did not exit after kill"),
    }
}
