//! Tunnel resource provisioning

use std::sync::Arc;

use tracing::{debug, info};

use crate::cloudflare::TunnelApi;
use crate::error::TunnelError;

/// A provisioned tunnel and the token its connector authenticates with
#[derive(Clone, PartialEq, Eq)]
pub struct TunnelResource {
    pub id: String,
    pub name: String,
    pub token: String,
}

impl std::fmt::Debug for TunnelResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelResource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Creates or reuses named tunnels in one account
pub struct ResourceProvisioner {
    api: Arc<dyn TunnelApi>,
    account_id: String,
}

impl ResourceProvisioner {
    pub fn new(api: Arc<dyn TunnelApi>, account_id: impl Into<String>) -> Self {
        Self {
            api,
            account_id: account_id.into(),
        }
    }

    /// Resolve the tunnel called `name`, creating it if needed, and fetch
    /// a fresh connection token
    pub async fn provision(&self, name: &str) -> Result<TunnelResource, TunnelError> {
        if name.is_empty() {
            return Err(TunnelError::Provision(
                "tunnel name must not be empty".to_string(),
            ));
        }
        self.require_account()?;

        let existing = self
            .api
            .list_tunnels(&self.account_id)
            .await?
            .into_iter()
            .find(|t| t.name == name);

        let tunnel = match existing {
            Some(tunnel) => {
                debug!(tunnel_id = %tunnel.id, name, "Reusing existing tunnel");
                tunnel
            }
            None => {
                let tunnel = self
                    .api
                    .create_tunnel(&self.account_id, name)
                    .await
                    .map_err(|e| TunnelError::Provision(format!("failed to create tunnel: {}", e)))?;
                info!(tunnel_id = %tunnel.id, name, "Created tunnel");
                tunnel
            }
        };

        if tunnel.id.is_empty() {
            return Err(TunnelError::Provision(format!(
                "tunnel '{}' has no id",
                name
            )));
        }

        let token = self.api.tunnel_token(&self.account_id, &tunnel.id).await?;
        if token.is_empty() {
            return Err(TunnelError::Provision(format!(
                "no connection token for tunnel {}",
                tunnel.id
            )));
        }

        Ok(TunnelResource {
            id: tunnel.id,
            name: tunnel.name,
            token,
        })
    }

    /// Delete the tunnel resource
    pub async fn delete(&self, tunnel_id: &str) -> Result<(), TunnelError> {
        self.require_account()?;
        self.api.delete_tunnel(&self.account_id, tunnel_id).await?;
        info!(tunnel_id, "Deleted tunnel");
        Ok(())
    }

    fn require_account(&self) -> Result<(), TunnelError> {
        if self.account_id.is_empty() {
            return Err(TunnelError::Provision(
                "no credentials configured: account id is empty".to_string(),
            ));
        }
        Ok(())
    }
}
