//! In-memory Cloudflare implementation
//!
//! MemoryCloudflare implements both [`TunnelApi`] and [`DnsApi`] over plain
//! collections, records every call in order, and can be told to fail a
//! given operation. Used to test the lifecycle without network access.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::ApiError;
use super::traits::{DnsApi, TunnelApi};
use super::types::{DnsRecord, IngressRule, NewDnsRecord, TunnelInfo, Zone};

/// API operation kinds, used for call logs and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    ListTunnels,
    CreateTunnel,
    DeleteTunnel,
    TunnelToken,
    UpdateIngress,
    ListZones,
    ListRecords,
    CreateRecord,
    UpdateRecord,
    DeleteRecord,
}

/// One recorded API call with the id or name it addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub op: ApiOp,
    pub target: String,
}

#[derive(Default)]
struct MemoryState {
    tunnels: Vec<TunnelInfo>,
    ingress: HashMap<String, Vec<IngressRule>>,
    zones: Vec<Zone>,
    /// Records keyed by zone id
    records: HashMap<String, Vec<DnsRecord>>,
    calls: Vec<ApiCall>,
    failing: HashSet<ApiOp>,
}

impl MemoryState {
    fn record(&mut self, op: ApiOp, target: &str) -> Result<(), ApiError> {
        self.calls.push(ApiCall {
            op,
            target: target.to_string(),
        });
        if self.failing.contains(&op) {
            return Err(ApiError::Cloudflare {
                status: 500,
                messages: vec![format!("injected failure for {:?}", op)],
            });
        }
        Ok(())
    }
}

/// In-memory implementation of the Cloudflare APIs
#[derive(Default)]
pub struct MemoryCloudflare {
    state: RwLock<MemoryState>,
}

impl MemoryCloudflare {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone and return its id
    pub async fn add_zone(&self, name: &str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut state = self.state.write().await;
        state.zones.push(Zone {
            id: id.clone(),
            name: name.to_string(),
        });
        state.records.insert(id.clone(), Vec::new());
        id
    }

    /// Seed a record in the named zone and return its id
    pub async fn add_record(
        &self,
        zone_name: &str,
        name: &str,
        record_type: &str,
        content: &str,
    ) -> Result<String, ApiError> {
        let mut state = self.state.write().await;
        let zone_id = state
            .zones
            .iter()
            .find(|z| z.name == zone_name)
            .map(|z| z.id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("zone {}", zone_name)))?;
        let id = Uuid::new_v4().simple().to_string();
        state.records.entry(zone_id).or_default().push(DnsRecord {
            id: id.clone(),
            name: name.to_string(),
            record_type: record_type.to_string(),
            content: content.to_string(),
        });
        Ok(id)
    }

    /// Seed an existing tunnel and return its id
    pub async fn add_tunnel(&self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.write().await.tunnels.push(TunnelInfo {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Remove records named `name` behind the API's back, as a user
    /// editing the zone in the dashboard would
    pub async fn delete_record_by_name(&self, zone_name: &str, name: &str) {
        let mut state = self.state.write().await;
        let Some(zone_id) = state
            .zones
            .iter()
            .find(|z| z.name == zone_name)
            .map(|z| z.id.clone())
        else {
            return;
        };
        if let Some(records) = state.records.get_mut(&zone_id) {
            records.retain(|r| r.name != name);
        }
    }

    /// Make every later call of `op` fail
    pub async fn fail_on(&self, op: ApiOp) {
        self.state.write().await.failing.insert(op);
    }

    pub async fn tunnels(&self) -> Vec<TunnelInfo> {
        self.state.read().await.tunnels.clone()
    }

    pub async fn ingress(&self, tunnel_id: &str) -> Option<Vec<IngressRule>> {
        self.state.read().await.ingress.get(tunnel_id).cloned()
    }

    /// All records of the named zone (empty if the zone is unknown)
    pub async fn records(&self, zone_name: &str) -> Vec<DnsRecord> {
        let state = self.state.read().await;
        state
            .zones
            .iter()
            .find(|z| z.name == zone_name)
            .and_then(|z| state.records.get(&z.id))
            .cloned()
            .unwrap_or_default()
    }

    /// Calls made so far, oldest first
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.state.read().await.calls.clone()
    }

    /// Number of calls of one kind
    pub async fn count(&self, op: ApiOp) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .count()
    }
}

#[async_trait]
impl TunnelApi for MemoryCloudflare {
    async fn list_tunnels(&self, account_id: &str) -> Result<Vec<TunnelInfo>, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::ListTunnels, account_id)?;
        Ok(state.tunnels.clone())
    }

    async fn create_tunnel(&self, _account_id: &str, name: &str) -> Result<TunnelInfo, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::CreateTunnel, name)?;
        let tunnel = TunnelInfo {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        state.tunnels.push(tunnel.clone());
        Ok(tunnel)
    }

    async fn delete_tunnel(&self, _account_id: &str, tunnel_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::DeleteTunnel, tunnel_id)?;
        let before = state.tunnels.len();
        state.tunnels.retain(|t| t.id != tunnel_id);
        if state.tunnels.len() == before {
            return Err(ApiError::NotFound(format!("tunnel {}", tunnel_id)));
        }
        state.ingress.remove(tunnel_id);
        Ok(())
    }

    async fn tunnel_token(&self, _account_id: &str, tunnel_id: &str) -> Result<String, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::TunnelToken, tunnel_id)?;
        if !state.tunnels.iter().any(|t| t.id == tunnel_id) {
            return Err(ApiError::NotFound(format!("tunnel {}", tunnel_id)));
        }
        Ok(format!("token-{}", tunnel_id))
    }

    async fn update_ingress(
        &self,
        _account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::UpdateIngress, tunnel_id)?;
        if !state.tunnels.iter().any(|t| t.id == tunnel_id) {
            return Err(ApiError::NotFound(format!("tunnel {}", tunnel_id)));
        }
        state.ingress.insert(tunnel_id.to_string(), rules.to_vec());
        Ok(())
    }
}

#[async_trait]
impl DnsApi for MemoryCloudflare {
    async fn list_zones(&self, account_id: &str) -> Result<Vec<Zone>, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::ListZones, account_id)?;
        Ok(state.zones.clone())
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::ListRecords, zone_id)?;
        state
            .records
            .get(zone_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("zone {}", zone_id)))
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::CreateRecord, &record.name)?;
        let created = DnsRecord {
            id: Uuid::new_v4().simple().to_string(),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            content: record.content.clone(),
        };
        state
            .records
            .get_mut(zone_id)
            .ok_or_else(|| ApiError::NotFound(format!("zone {}", zone_id)))?
            .push(created.clone());
        Ok(created)
    }

    async fn update_record_content(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<DnsRecord, ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::UpdateRecord, record_id)?;
        let record = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| ApiError::NotFound(format!("record {}", record_id)))?;
        record.content = content.to_string();
        Ok(record.clone())
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.write().await;
        state.record(ApiOp::DeleteRecord, record_id)?;
        let records = state
            .records
            .get_mut(zone_id)
            .ok_or_else(|| ApiError::NotFound(format!("zone {}", zone_id)))?;
        let before = records.len();
        records.retain(|r| r.id != record_id);
        if records.len() == before {
            return Err(ApiError::NotFound(format!("record {}", record_id)));
        }
        Ok(())
    }
}
