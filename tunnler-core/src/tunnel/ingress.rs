//! Ingress configuration

use std::sync::Arc;

use tracing::debug;

use crate::cloudflare::{IngressRule, TunnelApi};
use crate::error::TunnelError;

/// Rule set routing `domain` to `service` and everything else to 404
pub fn ingress_rules(domain: &str, service: &str) -> Vec<IngressRule> {
    vec![IngressRule::route(domain, service), IngressRule::catch_all()]
}

/// Pushes routing rules to a tunnel
pub struct IngressConfigurator {
    api: Arc<dyn TunnelApi>,
    account_id: String,
}

impl IngressConfigurator {
    pub fn new(api: Arc<dyn TunnelApi>, account_id: impl Into<String>) -> Self {
        Self {
            api,
            account_id: account_id.into(),
        }
    }

    /// Replace the tunnel's whole rule list, dropping any earlier routes
    pub async fn configure(
        &self,
        tunnel_id: &str,
        domain: &str,
        service: &str,
    ) -> Result<(), TunnelError> {
        let rules = ingress_rules(domain, service);
        self.api
            .update_ingress(&self.account_id, tunnel_id, &rules)
            .await?;
        debug!(tunnel_id, domain, service, "Configured ingress");
        Ok(())
    }
}
