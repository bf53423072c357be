//! Tunnel lifecycle controller

use std::sync::Arc;

use tracing::info;

use super::cloudflared::{CloudflaredLauncher, ConnectorLauncher};
use super::config::{ClosePolicy, TunnelSpec, TunnelSpecBuilder, routing_hostname};
use super::dns::DnsBinder;
use super::handle::{RemoteResources, TunnelHandle};
use super::ingress::IngressConfigurator;
use super::provisioner::ResourceProvisioner;
use super::registry::TunnelRegistry;
use super::supervisor::ConnectorSupervisor;
use crate::cloudflare::{CloudflareClient, DnsApi, TunnelApi};
use crate::credentials::Credentials;
use crate::error::TunnelError;

/// Collaborators a controller is built from
pub struct ControllerDeps {
    pub tunnel_api: Arc<dyn TunnelApi>,
    pub dns_api: Arc<dyn DnsApi>,
    pub account_id: String,
    /// Zone used by [`TunnelController::spec`] when none is given
    pub default_zone: Option<String>,
    pub launcher: Arc<dyn ConnectorLauncher>,
}

/// Sequences provisioning, routing, and DNS into live tunnel handles
pub struct TunnelController {
    provisioner: Arc<ResourceProvisioner>,
    ingress: IngressConfigurator,
    dns_api: Arc<dyn DnsApi>,
    account_id: String,
    default_zone: Option<String>,
    launcher: Arc<dyn ConnectorLauncher>,
    registry: TunnelRegistry,
    close_policy: ClosePolicy,
}

impl TunnelController {
    pub fn new(deps: ControllerDeps, registry: TunnelRegistry) -> Self {
        Self {
            provisioner: Arc::new(ResourceProvisioner::new(
                deps.tunnel_api.clone(),
                deps.account_id.clone(),
            )),
            ingress: IngressConfigurator::new(deps.tunnel_api, deps.account_id.clone()),
            dns_api: deps.dns_api,
            account_id: deps.account_id,
            default_zone: deps.default_zone,
            launcher: deps.launcher,
            registry,
            close_policy: ClosePolicy::default(),
        }
    }

    /// Wire the Cloudflare REST client and the `cloudflared` launcher
    pub fn from_credentials(
        credentials: &Credentials,
        registry: TunnelRegistry,
    ) -> Result<Self, TunnelError> {
        if credentials.api_key.trim().is_empty() {
            return Err(TunnelError::Config("API key must not be empty".to_string()));
        }
        if credentials.account_id.trim().is_empty() {
            return Err(TunnelError::Config(
                "Account ID must not be empty".to_string(),
            ));
        }

        let client = Arc::new(CloudflareClient::new(credentials.api_key.clone()));
        let deps = ControllerDeps {
            tunnel_api: client.clone(),
            dns_api: client,
            account_id: credentials.account_id.clone(),
            default_zone: credentials.default_zone.clone(),
            launcher: Arc::new(CloudflaredLauncher::new()),
        };
        Ok(Self::new(deps, registry))
    }

    #[must_use]
    pub fn with_close_policy(mut self, policy: ClosePolicy) -> Self {
        self.close_policy = policy;
        self
    }

    pub fn registry(&self) -> &TunnelRegistry {
        &self.registry
    }

    /// Spec builder pre-filled with the default zone
    pub fn spec(&self, local_port: u16) -> TunnelSpecBuilder {
        TunnelSpec::builder(local_port).default_zone(self.default_zone.clone())
    }

    /// Provision a tunnel for `spec` and register its handle
    ///
    /// Nothing is rolled back if a step fails partway.
    pub async fn create(&self, spec: &TunnelSpec) -> Result<TunnelHandle, TunnelError> {
        spec.validate()?;
        self.launcher.preflight().await?;

        let domain = spec.domain();
        let origin = spec.origin();

        let resource = self.provisioner.provision(&spec.subdomain).await?;
        self.ingress
            .configure(&resource.id, &domain, &origin)
            .await?;

        let dns = Arc::new(DnsBinder::new(
            self.dns_api.clone(),
            self.account_id.clone(),
            spec.zone.clone(),
        ));
        let record = dns
            .upsert(&spec.subdomain, &routing_hostname(&resource.id))
            .await?;

        let teardown = Arc::new(RemoteResources {
            dns,
            provisioner: self.provisioner.clone(),
            record_name: spec.subdomain.clone(),
            tunnel_id: resource.id.clone(),
        });
        let supervisor = Arc::new(ConnectorSupervisor::new(
            resource.token,
            domain.clone(),
            origin,
            self.launcher.clone(),
            teardown,
            self.close_policy,
        ));

        let handle = TunnelHandle::new(
            resource.id,
            record.id,
            spec.subdomain.clone(),
            domain,
            supervisor,
        );
        self.registry.insert(handle.clone());
        info!(tunnel_id = %handle.tunnel_id(), domain = %handle.domain(), "Tunnel ready");

        Ok(handle)
    }
}
