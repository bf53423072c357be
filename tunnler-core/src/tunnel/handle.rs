//! Tunnel handles

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::dns::DnsBinder;
use super::provisioner::ResourceProvisioner;
use super::state::{ConnectorState, TunnelEvent};
use super::supervisor::{ConnectorSupervisor, Teardown};
use crate::error::TunnelError;

/// The DNS record and tunnel resource behind one handle
pub struct RemoteResources {
    pub(crate) dns: Arc<DnsBinder>,
    pub(crate) provisioner: Arc<ResourceProvisioner>,
    pub(crate) record_name: String,
    pub(crate) tunnel_id: String,
}

#[async_trait]
impl Teardown for RemoteResources {
    /// Record first, so the hostname never points at a deleted tunnel
    async fn teardown(&self) -> Result<(), TunnelError> {
        self.dns.delete(&self.record_name).await?;
        self.provisioner.delete(&self.tunnel_id).await
    }
}

struct HandleInner {
    tunnel_id: String,
    record_id: String,
    record_name: String,
    domain: String,
    supervisor: Arc<ConnectorSupervisor>,
}

/// A provisioned tunnel and its connector
///
/// Clones share the same connector and lifecycle.
#[derive(Clone)]
pub struct TunnelHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for TunnelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelHandle")
            .field("tunnel_id", &self.inner.tunnel_id)
            .field("record_id", &self.inner.record_id)
            .field("domain", &self.inner.domain)
            .field("state", &self.state().as_str())
            .finish()
    }
}

impl TunnelHandle {
    pub(crate) fn new(
        tunnel_id: String,
        record_id: String,
        record_name: String,
        domain: String,
        supervisor: Arc<ConnectorSupervisor>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                tunnel_id,
                record_id,
                record_name,
                domain,
                supervisor,
            }),
        }
    }

    pub fn tunnel_id(&self) -> &str {
        &self.inner.tunnel_id
    }

    pub fn record_id(&self) -> &str {
        &self.inner.record_id
    }

    /// DNS label the record was created under
    pub fn record_name(&self) -> &str {
        &self.inner.record_name
    }

    /// Public hostname
    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    pub fn token(&self) -> &str {
        self.inner.supervisor.token()
    }

    /// Launch the connector; does nothing if one is already running
    pub async fn connect(&self) -> Result<(), TunnelError> {
        self.inner.supervisor.connect().await
    }

    /// Stop the connector, then delete the DNS record and the tunnel
    pub async fn close(&self) -> Result<(), TunnelError> {
        self.inner.supervisor.close().await
    }

    pub fn state(&self) -> ConnectorState {
        self.inner.supervisor.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TunnelEvent> {
        self.inner.supervisor.subscribe()
    }

    /// Wait until the tunnel is closed, by any path
    pub async fn closed(&self) -> Result<(), TunnelError> {
        self.inner.supervisor.closed().await
    }
}
