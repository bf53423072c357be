//! Cloudflared process launching and exit tracking

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::error::TunnelError;

/// Default connector executable, looked up on `PATH`
pub const CLOUDFLARED: &str = "cloudflared";

/// Result of checking cloudflared installation
#[derive(Debug, Clone)]
pub struct CloudflaredInfo {
    pub version: String,
    pub path: String,
}

/// Check if cloudflared is installed and get version
pub async fn check_installation(binary: &Path) -> Option<CloudflaredInfo> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let version = parse_version(&String::from_utf8_lossy(&output.stdout))
        .unwrap_or_else(|| "unknown".to_string());

    let path = which::which(binary)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| binary.to_string_lossy().to_string());

    Some(CloudflaredInfo { version, path })
}

/// Parse "cloudflared version 2024.12.0 (built 2024-12-01)"
fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .nth(2)
        .map(String::from)
}

/// How a connector process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorExit {
    code: Option<i32>,
}

impl ConnectorExit {
    /// Exit with a status code; `None` means killed by a signal
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        Self::new(status.code())
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Handle to a running connector
///
/// Dropping it without terminating asks the connector to stop.
#[derive(Debug)]
pub struct ConnectorProcess {
    pid: Option<u32>,
    terminate_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ConnectorExit>>,
}

/// Counterpart of a [`ConnectorProcess`] held by whatever drives the
/// actual process (the child watcher task, or a test)
#[derive(Debug)]
pub struct ConnectorDriver {
    terminate_rx: oneshot::Receiver<()>,
    terminate_requested: bool,
    exit_tx: watch::Sender<Option<ConnectorExit>>,
}

impl ConnectorProcess {
    /// Create a process handle and the driver that reports on it
    pub fn pair(pid: Option<u32>) -> (Self, ConnectorDriver) {
        let (terminate_tx, terminate_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        let process = Self {
            pid,
            terminate_tx: Some(terminate_tx),
            exit_rx,
        };
        let driver = ConnectorDriver {
            terminate_rx,
            terminate_requested: false,
            exit_tx,
        };
        (process, driver)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Send the termination signal. Later calls do nothing.
    pub fn terminate(&mut self) {
        if let Some(tx) = self.terminate_tx.take() {
            let _ = tx.send(());
        }
    }

    /// The "killed" flag: true once the process is known to be gone
    ///
    /// A driver that went away without reporting counts as gone, since
    /// dropping the child kills it.
    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some() || self.exit_rx.has_changed().is_err()
    }

    /// Receiver that observes the exit, for listeners outliving `&self`
    pub fn exits(&self) -> watch::Receiver<Option<ConnectorExit>> {
        self.exit_rx.clone()
    }
}

impl ConnectorDriver {
    /// Wait for a termination request
    ///
    /// Returns false if the process handle was dropped instead.
    pub async fn terminated(&mut self) -> bool {
        if !self.terminate_requested {
            self.terminate_requested = (&mut self.terminate_rx).await.is_ok();
        }
        self.terminate_requested
    }

    /// Report that the process ended
    pub fn exited(&self, exit: ConnectorExit) {
        self.exit_tx.send_replace(Some(exit));
    }
}

/// Wait until the process behind `exits` ends
///
/// Returns `None` if the driver went away without reporting an exit.
pub async fn wait_for_exit(
    mut exits: watch::Receiver<Option<ConnectorExit>>,
) -> Option<ConnectorExit> {
    exits
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|exit| *exit)
}

/// Starts connector processes
#[async_trait]
pub trait ConnectorLauncher: Send + Sync {
    /// Fail with [`TunnelError::Config`] if the connector cannot be run
    async fn preflight(&self) -> Result<(), TunnelError>;

    /// Start a connector authenticated with `token`
    async fn launch(&self, token: &str) -> Result<ConnectorProcess, TunnelError>;
}

/// Launches `cloudflared tunnel run --token <token>` with stdio discarded
#[derive(Debug, Clone)]
pub struct CloudflaredLauncher {
    binary: PathBuf,
}

impl Default for CloudflaredLauncher {
    fn default() -> Self {
        Self::with_binary(CLOUDFLARED)
    }
}

impl CloudflaredLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable instead of `cloudflared` from `PATH`
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl ConnectorLauncher for CloudflaredLauncher {
    async fn preflight(&self) -> Result<(), TunnelError> {
        let info = check_installation(&self.binary).await.ok_or_else(|| {
            TunnelError::Config(format!(
                "{} is not available on the system. Install cloudflared and ensure it is in your PATH.",
                self.binary.display()
            ))
        })?;
        debug!("Using cloudflared {} at {}", info.version, info.path);
        Ok(())
    }

    async fn launch(&self, token: &str) -> Result<ConnectorProcess, TunnelError> {
        let child = Command::new(&self.binary)
            .args(["tunnel", "run", "--token"])
            .arg(token)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                error!("Failed to spawn cloudflared: {}", e);
                TunnelError::SpawnFailed(e)
            })?;

        let pid = child.id();
        info!(pid = ?pid, "Spawned cloudflared");

        let (process, driver) = ConnectorProcess::pair(pid);
        tokio::spawn(watch_child(child, driver));
        Ok(process)
    }
}

/// Own the child until it exits, terminating it on request
async fn watch_child(mut child: Child, mut driver: ConnectorDriver) {
    let status = tokio::select! {
        status = child.wait() => status,
        requested = driver.terminated() => {
            if requested {
                debug!(pid = ?child.id(), "Terminating cloudflared");
            } else {
                debug!(pid = ?child.id(), "Connector handle dropped, terminating cloudflared");
            }
            send_terminate(&mut child);
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => ConnectorExit::from_status(status),
        Err(e) => {
            error!("Failed to wait for cloudflared: {}", e);
            ConnectorExit::new(None)
        }
    };
    debug!(code = ?exit.code(), "cloudflared exited");
    driver.exited(exit);
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    // No pid means the child was already reaped
    if let Some(pid) = child.id()
        && unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0
    {
        warn!(pid, "SIGTERM failed: {}", std::io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill cloudflared: {}", e);
    }
}
