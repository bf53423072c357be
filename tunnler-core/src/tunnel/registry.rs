//! Registry of live tunnels

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::handle::TunnelHandle;

/// Outcome of [`TunnelRegistry::close_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub closed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl ShutdownReport {
    /// Every handle closed within the budget
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

/// Handles created by a controller, keyed by tunnel id
///
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct TunnelRegistry {
    handles: Arc<Mutex<HashMap<String, TunnelHandle>>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: TunnelHandle) {
        self.lock().insert(handle.tunnel_id().to_string(), handle);
    }

    pub fn get(&self, tunnel_id: &str) -> Option<TunnelHandle> {
        self.lock().get(tunnel_id).cloned()
    }

    pub fn handles(&self) -> Vec<TunnelHandle> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Close every handle concurrently, waiting at most `budget`
    ///
    /// Closes still running when the budget runs out are left to finish
    /// in the background.
    pub async fn close_all(&self, budget: Duration) -> ShutdownReport {
        let handles = self.handles();
        let mut report = ShutdownReport::default();
        if handles.is_empty() {
            return report;
        }
        info!(count = handles.len(), "Closing tunnels");

        let mut tasks = JoinSet::new();
        for handle in handles {
            tasks.spawn(async move {
                let result = handle.close().await;
                (handle, result)
            });
        }

        let deadline = tokio::time::Instant::now() + budget;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((_, Ok(()))))) => report.closed += 1,
                Ok(Some(Ok((handle, Err(e))))) => {
                    error!(domain = %handle.domain(), "Failed to close tunnel: {}", e);
                    report.failed += 1;
                }
                Ok(Some(Err(e))) => {
                    error!("Close task failed: {}", e);
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    report.timed_out = tasks.len();
                    warn!(
                        remaining = report.timed_out,
                        "Shutdown budget of {:?} exceeded", budget
                    );
                    tasks.detach_all();
                    break;
                }
            }
        }

        report
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TunnelHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_all_on_empty_registry_is_clean() {
        let registry = TunnelRegistry::new();
        let report = registry.close_all(Duration::from_secs(5)).await;
        assert_eq!(report, ShutdownReport::default());
        assert!(report.is_clean());
        assert!(registry.is_empty());
    }

    #[test]
    fn report_with_timeouts_is_not_clean() {
        let report = ShutdownReport {
            closed: 1,
            failed: 0,
            timed_out: 1,
        };
        assert!(!report.is_clean());
    }
}
