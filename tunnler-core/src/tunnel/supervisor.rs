//! Connector supervision and the close protocol

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, error, info, warn};

use super::cloudflared::{ConnectorExit, ConnectorLauncher, ConnectorProcess, wait_for_exit};
use super::config::ClosePolicy;
use super::state::{ConnectorState, TunnelEvent};
use crate::error::TunnelError;

/// Releases whatever a tunnel provisioned remotely
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn teardown(&self) -> Result<(), TunnelError>;
}

#[derive(Debug, Default)]
struct Lifecycle {
    process: Option<ConnectorProcess>,
    destroyed: bool,
}

/// Launches one connector for a tunnel, watches it, and tears the tunnel
/// down once the connector is gone
///
/// Every state change happens under the lifecycle lock, except recording
/// a crash, which only ever moves a live state to `Crashed`.
pub struct ConnectorSupervisor {
    token: String,
    domain: String,
    service: String,
    launcher: Arc<dyn ConnectorLauncher>,
    teardown: Arc<dyn Teardown>,
    policy: ClosePolicy,
    lifecycle: Mutex<Lifecycle>,
    state_tx: watch::Sender<ConnectorState>,
    event_tx: broadcast::Sender<TunnelEvent>,
    crash: OnceLock<ConnectorExit>,
}

impl ConnectorSupervisor {
    pub fn new(
        token: impl Into<String>,
        domain: impl Into<String>,
        service: impl Into<String>,
        launcher: Arc<dyn ConnectorLauncher>,
        teardown: Arc<dyn Teardown>,
        policy: ClosePolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectorState::Idle);
        let (event_tx, _) = broadcast::channel(100);
        Self {
            token: token.into(),
            domain: domain.into(),
            service: service.into(),
            launcher,
            teardown,
            policy,
            lifecycle: Mutex::new(Lifecycle::default()),
            state_tx,
            event_tx,
            crash: OnceLock::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> ConnectorState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TunnelEvent> {
        self.event_tx.subscribe()
    }

    /// Start the connector unless one is already held
    pub async fn connect(self: &Arc<Self>) -> Result<(), TunnelError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.destroyed {
            return Err(TunnelError::Config("tunnel already closed".to_string()));
        }
        if lifecycle.process.is_some() {
            debug!(domain = %self.domain, "Connector already running");
            return Ok(());
        }

        self.set_state(ConnectorState::Launching);
        let launched = match self.launcher.preflight().await {
            Ok(()) => self.launcher.launch(&self.token).await,
            Err(e) => Err(e),
        };
        let process = match launched {
            Ok(process) => process,
            Err(e) => {
                self.set_state(ConnectorState::Idle);
                return Err(e);
            }
        };

        let exits = process.exits();
        lifecycle.process = Some(process);

        self.set_state(ConnectorState::Connected { since: Utc::now() });
        self.emit(TunnelEvent::Connected {
            domain: self.domain.clone(),
            service: self.service.clone(),
        });
        info!("{} -> {}", self.domain, self.service);

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let exit = wait_for_exit(exits).await;
            supervisor.on_process_ended(exit).await;
        });

        Ok(())
    }

    /// Single funnel for every connector exit, expected or not
    async fn on_process_ended(&self, exit: Option<ConnectorExit>) {
        // A driver that vanished without reporting is treated as killed
        let exit = exit.unwrap_or_else(|| ConnectorExit::new(None));

        if !exit.success() && self.mark_crashed(exit) {
            let error = TunnelError::ConnectorExit { code: exit.code() };
            error!(domain = %self.domain, code = ?exit.code(), "Connector crashed: {}", error);
            let _ = self.crash.set(exit);
            self.emit(TunnelEvent::Failed {
                domain: self.domain.clone(),
                error: error.to_string(),
            });
        }

        if let Err(e) = self.close().await {
            error!(domain = %self.domain, "Teardown after connector exit failed: {}", e);
        }
    }

    /// Move a live state to `Crashed`, leaving `Closing` and `Closed` alone
    fn mark_crashed(&self, exit: ConnectorExit) -> bool {
        self.state_tx.send_if_modified(|state| {
            if matches!(state, ConnectorState::Closing | ConnectorState::Closed) {
                return false;
            }
            debug!("Tunnel state: {:?} -> Crashed", state);
            *state = ConnectorState::Crashed { code: exit.code() };
            true
        })
    }

    /// Stop the connector, then release the remote resources once
    pub async fn close(&self) -> Result<(), TunnelError> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.destroyed {
            return Ok(());
        }

        if let Some(process) = lifecycle.process.as_mut() {
            self.set_state(ConnectorState::Closing);
            process.terminate();
            if !self.wait_for_shutdown(process).await {
                warn!(
                    domain = %self.domain,
                    pid = ?process.pid(),
                    attempts = self.policy.max_attempts,
                    "Connector did not exit"
                );
                return Err(TunnelError::CloseTimeout {
                    attempts: self.policy.max_attempts,
                });
            }
            lifecycle.process = None;
        }

        lifecycle.destroyed = true;
        let result = self.teardown.teardown().await;
        self.set_state(ConnectorState::Closed);

        match result {
            Ok(()) => {
                self.emit(TunnelEvent::Closed {
                    domain: self.domain.clone(),
                });
                info!(domain = %self.domain, "Tunnel closed");
                Ok(())
            }
            Err(e) => {
                error!(domain = %self.domain, "Failed to release tunnel resources: {}", e);
                self.emit(TunnelEvent::Failed {
                    domain: self.domain.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Poll the killed flag until it flips or the attempts run out
    async fn wait_for_shutdown(&self, process: &ConnectorProcess) -> bool {
        if process.has_exited() {
            return true;
        }
        let mut attempts = 0;
        while attempts < self.policy.max_attempts {
            tokio::time::sleep(self.policy.poll_interval).await;
            attempts += 1;
            if process.has_exited() {
                debug!(attempts, "Connector exited");
                return true;
            }
        }
        false
    }

    /// Wait until the tunnel is closed
    ///
    /// Fails with [`TunnelError::ConnectorExit`] if the connector crashed.
    pub async fn closed(&self) -> Result<(), TunnelError> {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives in `self`, so this only ends at `Closed`
        let _ = state_rx.wait_for(ConnectorState::is_closed).await;
        match self.crash.get() {
            Some(exit) => Err(TunnelError::ConnectorExit { code: exit.code() }),
            None => Ok(()),
        }
    }

    fn set_state(&self, new_state: ConnectorState) {
        let old = self.state_tx.send_replace(new_state.clone());
        debug!("Tunnel state: {:?} -> {:?}", old, new_state);
    }

    fn emit(&self, event: TunnelEvent) {
        let _ = self.event_tx.send(event);
    }
}
