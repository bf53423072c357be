//! Scripted connector launcher for tests
//!
//! Hands out [`ConnectorProcess`]es with no OS process behind them. Each
//! fake connector either exits when asked to terminate or ignores the
//! request, and can be made to exit on its own with [`ScriptedLauncher::exit_latest`].

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::cloudflared::{ConnectorExit, ConnectorLauncher, ConnectorProcess};
use crate::error::TunnelError;

#[derive(Debug, Default)]
struct Script {
    preflights: usize,
    tokens: Vec<String>,
    exits: Vec<oneshot::Sender<Option<i32>>>,
}

/// In-memory [`ConnectorLauncher`]
#[derive(Debug)]
pub struct ScriptedLauncher {
    obeys_terminate: bool,
    preflight_error: Option<String>,
    script: Mutex<Script>,
}

impl Default for ScriptedLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLauncher {
    /// Connectors exit with a signal when terminated
    pub fn new() -> Self {
        Self {
            obeys_terminate: true,
            preflight_error: None,
            script: Mutex::new(Script::default()),
        }
    }

    /// Connectors keep running when terminated
    pub fn ignoring_terminate() -> Self {
        Self {
            obeys_terminate: false,
            ..Self::new()
        }
    }

    /// Preflight fails with a config error carrying `message`
    pub fn failing_preflight(message: impl Into<String>) -> Self {
        Self {
            preflight_error: Some(message.into()),
            ..Self::new()
        }
    }

    pub fn preflights(&self) -> usize {
        self.script().preflights
    }

    pub fn launches(&self) -> usize {
        self.script().tokens.len()
    }

    /// Tokens passed to each launch, in order
    pub fn tokens(&self) -> Vec<String> {
        self.script().tokens.clone()
    }

    /// Make the most recently launched connector exit with `code`
    ///
    /// Returns false if nothing was launched or it already ended.
    pub fn exit_latest(&self, code: Option<i32>) -> bool {
        match self.script().exits.pop() {
            Some(tx) => tx.send(code).is_ok(),
            None => false,
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl ConnectorLauncher for ScriptedLauncher {
    async fn preflight(&self) -> Result<(), TunnelError> {
        self.script().preflights += 1;
        match &self.preflight_error {
            Some(message) => Err(TunnelError::Config(message.clone())),
            None => Ok(()),
        }
    }

    async fn launch(&self, token: &str) -> Result<ConnectorProcess, TunnelError> {
        let (process, mut driver) = ConnectorProcess::pair(None);
        let (exit_tx, exit_rx) = oneshot::channel();
        {
            let mut script = self.script();
            script.tokens.push(token.to_string());
            script.exits.push(exit_tx);
        }

        let obeys_terminate = self.obeys_terminate;
        tokio::spawn(async move {
            tokio::select! {
                _ = driver.terminated(), if obeys_terminate => {
                    driver.exited(ConnectorExit::new(None));
                }
                code = exit_rx => match code {
                    Ok(code) => driver.exited(ConnectorExit::new(code)),
                    // Nobody will end it; keep the driver so it stays alive
                    Err(_) => std::future::pending::<()>().await,
                },
            }
        });

        Ok(process)
    }
}
