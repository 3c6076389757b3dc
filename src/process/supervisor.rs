use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::LogEvent;
use crate::metrics::{MetricPoint, MetricsWindow, SamplerTiming, SysinfoProbe, run_sampler};
use crate::observer::{ObserverHandle, ObserverSlot, ObserverToken};
use crate::process::launch::LaunchSource;
use crate::process::stream::{StreamKind, spawn_reader};

/// Command the game server understands as a clean shutdown
pub const DEFAULT_STOP_COMMAND: &str = "stop";

/// How long the exit waiter lets the output readers drain before `stopped`
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("server already running")]
    AlreadyRunning,
    #[error("server not running")]
    NotRunning,
    #[error("failed to launch server: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to write to server input: {0}")]
    Write(#[source] std::io::Error),
}

/// Lifecycle state visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub stop_command: String,
    pub sampler: SamplerTiming,
    pub drain_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            stop_command: DEFAULT_STOP_COMMAND.to_string(),
            sampler: SamplerTiming::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// The live child, present exactly while the state is `Running`
struct SupervisedProcess {
    pid: Option<u32>,
    stdin: BufWriter<ChildStdin>,
    /// Cancelled by the exit waiter once the child is gone
    exited: CancellationToken,
}

impl SupervisedProcess {
    /// Write one line and flush it to the child
    async fn write_line(&mut self, line: &str) -> Result<(), SupervisorError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(SupervisorError::Write)?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(SupervisorError::Write)?;
        self.stdin.flush().await.map_err(SupervisorError::Write)
    }
}

struct Shared {
    /// `Some` while running; the only place the process handle lives
    process: Mutex<Option<SupervisedProcess>>,
    observers: Arc<ObserverSlot>,
    metrics: Arc<StdMutex<MetricsWindow>>,
    launch: Box<dyn LaunchSource>,
    options: SupervisorOptions,
    /// Pid and exit token of the running child, readable without `process`
    exit_watch: StdMutex<Option<ExitWatch>>,
}

#[derive(Clone)]
struct ExitWatch {
    pid: Option<u32>,
    exited: CancellationToken,
}

impl Shared {
    fn set_exit_watch(&self, watch: Option<ExitWatch>) {
        *self.exit_watch.lock().unwrap_or_else(PoisonError::into_inner) = watch;
    }

    fn exit_watch(&self) -> Option<ExitWatch> {
        self.exit_watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owns the game server process and its I/O
///
/// Cloning is cheap and every clone controls the same process.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    pub fn new(launch: impl LaunchSource, options: SupervisorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                process: Mutex::new(None),
                observers: Arc::new(ObserverSlot::new()),
                metrics: Arc::new(StdMutex::new(MetricsWindow::default())),
                launch: Box::new(launch),
                options,
                exit_watch: StdMutex::new(None),
            }),
        }
    }

    /// `Running` while a child process is alive, `Stopped` otherwise
    ///
    /// Waits for any in-flight start, stop or command write to finish.
    pub async fn state(&self) -> ProcessState {
        match *self.shared.process.lock().await {
            Some(_) => ProcessState::Running,
            None => ProcessState::Stopped,
        }
    }

    /// OS process id of the running server
    pub async fn pid(&self) -> Option<u32> {
        self.shared
            .process
            .lock()
            .await
            .as_ref()
            .and_then(|process| process.pid)
    }

    /// Launch the server and its reader, exit-waiter and sampler tasks
    ///
    /// The state only becomes `Running` once the spawn succeeded, so a
    /// failed launch leaves the supervisor `Stopped`.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        // Held through the spawn: the slot only turns `Some` together with a
        // live stdin, so stop and send_command never see `Running` without one.
        let mut slot = self.shared.process.lock().await;
        if slot.is_some() {
            tracing::warn!("start rejected: server already running");
            self.shared.observers.emit(LogEvent::Log {
                text: "Server already running!".into(),
            });
            return Err(SupervisorError::AlreadyRunning);
        }

        let spec = self.shared.launch.launch_spec();
        tracing::info!(
            command = %spec,
            directory = %spec.working_dir.display(),
            "starting server"
        );
        let mut child = spec.command().spawn().map_err(|err| {
            tracing::error!(error = %err, "failed to spawn server");
            SupervisorError::Spawn(err)
        })?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = child.start_kill();
            return Err(SupervisorError::Spawn(std::io::Error::other(
                "server pipes unavailable",
            )));
        };

        let pid = child.id();
        let exited = CancellationToken::new();
        let observers = &self.shared.observers;
        let readers = [
            spawn_reader(stdout, StreamKind::Stdout, observers.clone()),
            spawn_reader(stderr, StreamKind::Stderr, observers.clone()),
        ];
        tokio::spawn(watch_exit(
            self.shared.clone(),
            child,
            exited.clone(),
            readers,
        ));
        if let Some(pid) = pid {
            let metrics = self.shared.metrics.clone();
            let observers = observers.clone();
            let exited = exited.clone();
            let timing = self.shared.options.sampler;
            tokio::spawn(async move {
                run_sampler(SysinfoProbe::new(pid), metrics, observers, exited, timing).await;
            });
        }

        self.shared.set_exit_watch(Some(ExitWatch {
            pid,
            exited: exited.clone(),
        }));
        *slot = Some(SupervisedProcess {
            pid,
            stdin: BufWriter::new(stdin),
            exited,
        });
        tracing::info!(pid, "server process started");
        Ok(())
    }

    /// Ask the server to shut down; does not wait for the exit
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let mut slot = self.shared.process.lock().await;
        let Some(process) = slot.as_mut() else {
            tracing::warn!("stop rejected: server not running");
            return Err(SupervisorError::NotRunning);
        };
        tracing::info!("stopping server");
        process.write_line(&self.shared.options.stop_command).await
    }

    /// Stop, wait for the old process to exit, then start again
    ///
    /// When nothing is running this is the same as [`Supervisor::start`].
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let exited = {
            let mut slot = self.shared.process.lock().await;
            match slot.as_mut() {
                None => None,
                Some(process) => {
                    tracing::info!("restarting server");
                    process
                        .write_line(&self.shared.options.stop_command)
                        .await?;
                    Some(process.exited.clone())
                }
            }
        };

        match exited {
            Some(exited) => {
                exited.cancelled().await;
                tracing::info!("previous server process exited, starting again");
            }
            None => tracing::info!("server not running, starting"),
        }
        self.start().await
    }

    /// Write one command line to the server console
    ///
    /// Line breaks inside `command` are replaced by spaces, so each call
    /// produces exactly one input line.
    pub async fn send_command(&self, command: &str) -> Result<(), SupervisorError> {
        let line = command.trim_end_matches(['\r', '\n']).replace(['\r', '\n'], " ");
        let mut slot = self.shared.process.lock().await;
        let Some(process) = slot.as_mut() else {
            tracing::warn!(command = %line, "command rejected: server not running");
            return Err(SupervisorError::NotRunning);
        };
        tracing::info!(command = %line, "sending command");
        process.write_line(&line).await
    }

    /// Make a new observer current, replacing the previous one
    pub fn attach_observer(&self) -> ObserverHandle {
        self.shared.observers.attach()
    }

    /// Detach the observer if `token` is still current
    pub fn detach_observer(&self, token: ObserverToken) -> bool {
        self.shared.observers.detach(token)
    }

    pub fn observers(&self) -> &ObserverSlot {
        &self.shared.observers
    }

    /// Padded metrics history, oldest first
    pub fn metrics_points(&self) -> Vec<MetricPoint> {
        self.shared
            .metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .points()
    }

    /// Stop the server and wait up to `timeout` for it to exit
    ///
    /// A server that ignores the stop command is sent SIGTERM. So is one
    /// whose input stays busy past the deadline, for example because a
    /// command write is blocked on a full pipe.
    pub async fn shutdown(&self, timeout: Duration) {
        let Some(ExitWatch { pid, exited }) = self.shared.exit_watch() else {
            return;
        };
        let deadline = tokio::time::Instant::now() + timeout;

        match tokio::time::timeout_at(deadline, self.stop()).await {
            Ok(Ok(())) | Ok(Err(SupervisorError::NotRunning)) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "failed to send stop command during shutdown");
            }
            Err(_) => tracing::warn!("server input busy, could not send stop command"),
        }
        if tokio::time::timeout_at(deadline, exited.cancelled())
            .await
            .is_ok()
        {
            return;
        }

        tracing::warn!(?pid, "server did not exit in time, sending SIGTERM");
        if let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) {
            let target = nix::unistd::Pid::from_raw(pid);
            if let Err(err) = nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGTERM) {
                tracing::error!(error = %err, "failed to signal server");
            }
        }
        let _ = tokio::time::timeout(timeout, exited.cancelled()).await;
    }
}

/// Wait for the child to exit, then flip the state and announce it
///
/// The state is released before the readers are drained, so a reader held
/// open by a leftover grandchild can delay the `stopped` event but never
/// the transition to `Stopped`.
async fn watch_exit(
    shared: Arc<Shared>,
    mut child: Child,
    exited: CancellationToken,
    readers: [JoinHandle<()>; 2],
) {
    let status = child.wait().await;
    {
        let mut slot = shared.process.lock().await;
        slot.take();
        shared.set_exit_watch(None);
    }
    exited.cancel();

    let text = match &status {
        Ok(status) if status.success() => {
            tracing::info!("server process exited normally");
            "Server stopped".to_string()
        }
        Ok(status) => {
            tracing::warn!(%status, "server process exited with error");
            format!("Server stopped with error: {status}")
        }
        Err(err) => {
            tracing::error!(error = %err, "failed waiting on server process");
            format!("Server stopped with error: {err}")
        }
    };

    let drained = futures::future::join_all(readers);
    if tokio::time::timeout(shared.options.drain_timeout, drained)
        .await
        .is_err()
    {
        tracing::debug!("server output still open after exit");
    }
    shared.observers.emit(LogEvent::Stopped { text });
}
