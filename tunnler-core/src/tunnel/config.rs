//! Tunnel configuration types

use std::time::Duration;

use uuid::Uuid;

use crate::error::TunnelError;

/// Domain suffix of Cloudflare's tunnel routing hostnames
pub const TUNNEL_NETWORK_SUFFIX: &str = "cfargotunnel.com";

/// Local service used when none is given
pub const DEFAULT_SERVICE: &str = "http://localhost";

/// Length of generated subdomain labels
const GENERATED_SUBDOMAIN_LEN: usize = 12;

/// Routing hostname a DNS record must point at for the given tunnel
pub fn routing_hostname(tunnel_id: &str) -> String {
    format!("{}.{}", tunnel_id, TUNNEL_NETWORK_SUFFIX)
}

/// Generate a unique DNS label for tunnels created without a subdomain
pub fn generate_subdomain() -> String {
    let mut label = Uuid::new_v4().simple().to_string();
    label.truncate(GENERATED_SUBDOMAIN_LEN);
    label
}

/// What to expose and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Port of the local service
    pub local_port: u16,
    /// DNS label under `zone`; also used as the tunnel resource name
    pub subdomain: String,
    /// Cloudflare zone the record is created in
    pub zone: String,
    /// Scheme and host of the local service, without port
    pub service: String,
}

impl TunnelSpec {
    /// Start building a spec for a local port
    pub fn builder(local_port: u16) -> TunnelSpecBuilder {
        TunnelSpecBuilder {
            local_port,
            subdomain: None,
            zone: None,
            service: None,
        }
    }

    /// Public hostname, `{subdomain}.{zone}`
    pub fn domain(&self) -> String {
        format!("{}.{}", self.subdomain, self.zone)
    }

    /// Local origin the tunnel forwards to, `{service}:{port}`
    pub fn origin(&self) -> String {
        format!("{}:{}", self.service.trim_end_matches('/'), self.local_port)
    }

    /// Check every field before anything remote is touched
    pub fn validate(&self) -> Result<(), TunnelError> {
        if self.local_port == 0 {
            return Err(TunnelError::Config(
                "Port must be between 1 and 65535".to_string(),
            ));
        }
        if self.zone.trim().is_empty() {
            return Err(TunnelError::Config("Zone must not be empty".to_string()));
        }
        validate_label(&self.subdomain)?;
        validate_service(&self.service)
    }
}

/// Builder filling in the default service, a generated subdomain, and
/// the configured default zone
#[derive(Debug, Clone)]
pub struct TunnelSpecBuilder {
    local_port: u16,
    subdomain: Option<String>,
    zone: Option<String>,
    service: Option<String>,
}

impl TunnelSpecBuilder {
    #[must_use]
    pub fn subdomain(mut self, subdomain: Option<String>) -> Self {
        self.subdomain = subdomain;
        self
    }

    #[must_use]
    pub fn zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone;
        self
    }

    /// Zone used when [`zone`](Self::zone) was not given
    #[must_use]
    pub fn default_zone(mut self, zone: Option<String>) -> Self {
        self.zone = self.zone.or(zone);
        self
    }

    #[must_use]
    pub fn service(mut self, service: Option<String>) -> Self {
        self.service = service;
        self
    }

    /// Fill the defaults and validate
    ///
    /// Subdomain and zone are lowercased, since Cloudflare stores DNS
    /// names that way.
    pub fn build(self) -> Result<TunnelSpec, TunnelError> {
        let zone = self
            .zone
            .map(|z| z.trim().to_ascii_lowercase())
            .filter(|z| !z.is_empty())
            .ok_or_else(|| {
                TunnelError::Config(
                    "No zone given and no default zone configured".to_string(),
                )
            })?;
        let subdomain = self
            .subdomain
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_else(generate_subdomain);
        let spec = TunnelSpec {
            local_port: self.local_port,
            subdomain,
            zone,
            service: self.service.unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
        };
        spec.validate()?;
        Ok(spec)
    }
}

fn validate_label(label: &str) -> Result<(), TunnelError> {
    let valid = !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(TunnelError::Config(format!(
            "Subdomain '{}' is not a valid DNS label",
            label
        )))
    }
}

fn validate_service(service: &str) -> Result<(), TunnelError> {
    let url = url::Url::parse(service)
        .map_err(|e| TunnelError::Config(format!("Invalid service '{}': {}", service, e)))?;
    if url.host_str().is_none() {
        return Err(TunnelError::Config(format!(
            "Service '{}' has no host",
            service
        )));
    }
    if url.port().is_some() {
        return Err(TunnelError::Config(format!(
            "Service '{}' must not include a port; use --port",
            service
        )));
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() || url.fragment().is_some() {
        return Err(TunnelError::Config(format!(
            "Service '{}' must be a scheme and host only, without a path",
            service
        )));
    }
    Ok(())
}

/// How long `close()` waits for the connector to die
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    /// Delay between liveness checks
    pub poll_interval: Duration,
    /// Number of checks before giving up with `CloseTimeout`
    pub max_attempts: u32,
}

impl Default for ClosePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_attempts: 11,
        }
    }
}

impl ClosePolicy {
    /// Total time spent polling before a timeout
    pub fn budget(&self) -> Duration {
        self.poll_interval * self.max_attempts
    }
}
