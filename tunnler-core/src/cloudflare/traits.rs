//! TunnelApi and DnsApi traits

use async_trait::async_trait;

use super::error::ApiError;
use super::types::{DnsRecord, IngressRule, NewDnsRecord, TunnelInfo, Zone};

/// Cloudflare Tunnel management operations for one account
#[async_trait]
pub trait TunnelApi: Send + Sync {
    /// List live (not deleted) tunnels
    async fn list_tunnels(&self, account_id: &str) -> Result<Vec<TunnelInfo>, ApiError>;

    /// Create a remotely-managed tunnel
    async fn create_tunnel(&self, account_id: &str, name: &str) -> Result<TunnelInfo, ApiError>;

    /// Delete a tunnel
    async fn delete_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<(), ApiError>;

    /// Fetch the token `cloudflared tunnel run --token` authenticates with
    async fn tunnel_token(&self, account_id: &str, tunnel_id: &str) -> Result<String, ApiError>;

    /// Replace the tunnel's ingress rules
    async fn update_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError>;
}

/// Cloudflare DNS operations
#[async_trait]
pub trait DnsApi: Send + Sync {
    async fn list_zones(&self, account_id: &str) -> Result<Vec<Zone>, ApiError>;

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError>;

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ApiError>;

    /// Change only the content of an existing record
    async fn update_record_content(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<DnsRecord, ApiError>;

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError>;
}
