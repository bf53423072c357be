//! DNS record binding

use std::sync::Arc;

use tracing::{debug, info};

use crate::cloudflare::{DnsApi, DnsRecord, NewDnsRecord};
use crate::error::TunnelError;

/// Record types an upsert may overwrite
const ALLOWED_TYPES: [&str; 3] = ["CNAME", "A", "AAAA"];

/// Reference to a DNS record owned by a tunnel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordRef {
    pub id: String,
    pub name: String,
    pub record_type: String,
    pub content: String,
}

impl From<DnsRecord> for DnsRecordRef {
    fn from(record: DnsRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            record_type: record.record_type,
            content: record.content,
        }
    }
}

/// Creates, updates, and deletes records by name in one zone
///
/// Zone and record ids are looked up on every call since records can be
/// edited outside tunnler. Names compare case-insensitively.
pub struct DnsBinder {
    api: Arc<dyn DnsApi>,
    account_id: String,
    zone: String,
}

impl DnsBinder {
    pub fn new(api: Arc<dyn DnsApi>, account_id: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            api,
            account_id: account_id.into(),
            zone: zone.into(),
        }
    }

    /// Point `name` at `content`, creating a proxied CNAME if absent
    pub async fn upsert(&self, name: &str, content: &str) -> Result<DnsRecordRef, TunnelError> {
        let zone_id = self.zone_id().await?;
        let existing = self.find_record(&zone_id, name).await?;

        let record = match existing {
            Some(record) => {
                if !ALLOWED_TYPES.contains(&record.record_type.as_str()) {
                    return Err(TunnelError::RecordTypeConflict {
                        name: name.to_string(),
                        record_type: record.record_type,
                    });
                }
                debug!(record_id = %record.id, name, content, "Updating DNS record");
                self.api
                    .update_record_content(&zone_id, &record.id, content)
                    .await?
            }
            None => {
                let record = self
                    .api
                    .create_record(&zone_id, &NewDnsRecord::cname(name, content))
                    .await?;
                info!(record_id = %record.id, name, content, "Created DNS record");
                record
            }
        };

        Ok(record.into())
    }

    /// Delete the record called `name`
    pub async fn delete(&self, name: &str) -> Result<(), TunnelError> {
        let zone_id = self.zone_id().await?;
        let record = self
            .find_record(&zone_id, name)
            .await?
            .ok_or_else(|| TunnelError::RecordNotFound {
                name: name.to_string(),
            })?;

        self.api.delete_record(&zone_id, &record.id).await?;
        info!(record_id = %record.id, name, "Deleted DNS record");
        Ok(())
    }

    async fn zone_id(&self) -> Result<String, TunnelError> {
        self.api
            .list_zones(&self.account_id)
            .await?
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(&self.zone))
            .map(|z| z.id)
            .ok_or_else(|| TunnelError::ZoneNotFound {
                zone: self.zone.clone(),
            })
    }

    async fn find_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>, TunnelError> {
        let fqdn = format!("{}.{}", name, self.zone);
        Ok(self
            .api
            .list_records(zone_id)
            .await?
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name) || r.name.eq_ignore_ascii_case(&fqdn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudflare::{ApiOp, MemoryCloudflare};

    async fn setup() -> (Arc<MemoryCloudflare>, DnsBinder) {
        let cf = Arc::new(MemoryCloudflare::new());
        cf.add_zone("example.com").await;
        let binder = DnsBinder::new(cf.clone(), "acc", "example.com");
        (cf, binder)
    }

    #[tokio::test]
    async fn upsert_creates_proxied_cname() {
        let (cf, binder) = setup().await;

        let record = binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap();

        assert_eq!(record.name, "demo");
        assert_eq!(record.record_type, "CNAME");
        assert_eq!(record.content, "abc.cfargotunnel.com");
        assert_eq!(cf.records("example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn upsert_twice_leaves_one_record() {
        let (cf, binder) = setup().await;

        binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap();
        binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap();

        let records = cf.records("example.com").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "abc.cfargotunnel.com");
        assert_eq!(cf.count(ApiOp::CreateRecord).await, 1);
        assert_eq!(cf.count(ApiOp::UpdateRecord).await, 1);
    }

    #[tokio::test]
    async fn upsert_updates_existing_a_record_content() {
        let (cf, binder) = setup().await;
        let id = cf
            .add_record("example.com", "demo", "A", "192.0.2.1")
            .await
            .unwrap();

        let record = binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.content, "abc.cfargotunnel.com");
    }

    #[tokio::test]
    async fn upsert_matches_fully_qualified_name() {
        let (cf, binder) = setup().await;
        let id = cf
            .add_record("example.com", "demo.example.com", "CNAME", "old.cfargotunnel.com")
            .await
            .unwrap();

        let record = binder.upsert("demo", "new.cfargotunnel.com").await.unwrap();

        assert_eq!(record.id, id);
        assert_eq!(cf.records("example.com").await.len(), 1);
    }

    #[tokio::test]
    async fn upsert_refuses_to_clobber_mx() {
        let (cf, binder) = setup().await;
        cf.add_record("example.com", "demo", "MX", "mail.example.com")
            .await
            .unwrap();

        let err = binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap_err();

        match err {
            TunnelError::RecordTypeConflict { name, record_type } => {
                assert_eq!(name, "demo");
                assert_eq!(record_type, "MX");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let records = cf.records("example.com").await;
        assert_eq!(records[0].content, "mail.example.com");
        assert_eq!(cf.count(ApiOp::UpdateRecord).await, 0);
    }

    #[tokio::test]
    async fn upsert_in_unknown_zone_fails() {
        let cf = Arc::new(MemoryCloudflare::new());
        let binder = DnsBinder::new(cf.clone(), "acc", "missing.com");

        let err = binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap_err();

        assert!(matches!(err, TunnelError::ZoneNotFound { zone } if zone == "missing.com"));
    }

    #[tokio::test]
    async fn delete_removes_record_by_name() {
        let (cf, binder) = setup().await;
        binder.upsert("demo", "abc.cfargotunnel.com").await.unwrap();

        binder.delete("demo").await.unwrap();

        assert!(cf.records("example.com").await.is_empty());
    }

    #[tokio::test]
    async fn delete_missing_record_fails() {
        let (_cf, binder) = setup().await;
        let err = binder.delete("demo").await.unwrap_err();
        assert!(matches!(err, TunnelError::RecordNotFound { name } if name == "demo"));
    }

    #[tokio::test]
    async fn mixed_case_names_match_stored_lowercase_record() {
        let cf = Arc::new(MemoryCloudflare::new());
        cf.add_zone("example.com").await;
        let id = cf
            .add_record("example.com", "demo.example.com", "CNAME", "old.cfargotunnel.com")
            .await
            .unwrap();
        let binder = DnsBinder::new(cf.clone(), "acc", "Example.COM");

        let record = binder.upsert("Demo", "new.cfargotunnel.com").await.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(cf.count(ApiOp::CreateRecord).await, 0);

        binder.delete("DEMO").await.unwrap();
        assert!(cf.records("example.com").await.is_empty());
    }

    #[tokio::test]
    async fn delete_re_resolves_zone_each_call() {
        let (cf, binder) = setup().await;
        binder.upsert("a", "x.cfargotunnel.com").await.unwrap();
        binder.upsert("b", "y.cfargotunnel.com").await.unwrap();
        let before = cf.count(ApiOp::ListZones).await;

        binder.delete("a").await.unwrap();
        binder.delete("b").await.unwrap();

        assert_eq!(cf.count(ApiOp::ListZones).await, before + 2);
    }
}
