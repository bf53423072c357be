//! Wire types shared by the Cloudflare API implementations

use serde::{Deserialize, Serialize};

/// A Cloudflare Tunnel as returned by the tunnel-management API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TunnelInfo {
    pub id: String,
    pub name: String,
}

/// A DNS zone managed by the account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// An existing DNS record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
}

/// Body of a DNS record creation request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewDnsRecord {
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    pub proxied: bool,
}

impl NewDnsRecord {
    /// A proxied CNAME with a 600 second TTL
    pub fn cname(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            record_type: "CNAME".to_string(),
            ttl: 600,
            proxied: true,
        }
    }
}

/// Where an ingress rule sends matching traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressService {
    /// Proxy to a local origin such as `http://localhost:3000`
    Origin(String),
    /// Answer with 404 "service unavailable"
    NotFound,
}

impl IngressService {
    /// Value of the `service` field in Cloudflare's ingress config
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Origin(url) => url,
            Self::NotFound => "http_status:404",
        }
    }
}

impl std::fmt::Display for IngressService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origin(url) => write!(f, "{}", url),
            Self::NotFound => write!(f, "404"),
        }
    }
}

/// A single hostname routing rule. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub hostname: String,
    pub service: IngressService,
}

impl IngressRule {
    /// Route an exact hostname to a local origin
    pub fn route(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            service: IngressService::Origin(service.into()),
        }
    }

    /// Wildcard rule answering 404
    pub fn catch_all() -> Self {
        Self {
            hostname: "*".to_string(),
            service: IngressService::NotFound,
        }
    }

    /// JSON object in the shape of Cloudflare's `config.ingress[]`
    pub fn to_wire(&self) -> serde_json::Value {
        match &self.service {
            IngressService::Origin(url) => serde_json::json!({
                "hostname": self.hostname,
                "service": url,
                "originRequest": {},
            }),
            IngressService::NotFound => serde_json::json!({
                "hostname": self.hostname,
                "service": self.service.as_wire(),
            }),
        }
    }
}
