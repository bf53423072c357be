//! End-to-end lifecycle tests over the in-memory Cloudflare
//!
//! These cover the create → connect → close sequence:
//! - what gets provisioned, routed, and bound
//! - teardown order and exactly-once deprovisioning
//! - close timeouts, crashes, and registry shutdown

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tunnler_core::cloudflare::{
    ApiError, ApiOp, DnsApi, DnsRecord, IngressRule, IngressService, NewDnsRecord, Zone,
};
use tunnler_core::tunnel::routing_hostname;
use tunnler_core::{
    ClosePolicy, ConnectorState, ControllerDeps, MemoryCloudflare, ScriptedLauncher,
    TunnelController, TunnelError, TunnelEvent, TunnelRegistry, TunnelSpec,
};

const ZONE: &str = "example.com";

struct Harness {
    cf: Arc<MemoryCloudflare>,
    launcher: Arc<ScriptedLauncher>,
    registry: TunnelRegistry,
    controller: TunnelController,
}

async fn harness_with(launcher: ScriptedLauncher) -> Harness {
    let cf = Arc::new(MemoryCloudflare::new());
    cf.add_zone(ZONE).await;
    let launcher = Arc::new(launcher);
    let registry = TunnelRegistry::new();
    let deps = ControllerDeps {
        tunnel_api: cf.clone(),
        dns_api: cf.clone(),
        account_id: "acc".to_string(),
        default_zone: Some(ZONE.to_string()),
        launcher: launcher.clone(),
    };
    let controller = TunnelController::new(deps, registry.clone());
    Harness {
        cf,
        launcher,
        registry,
        controller,
    }
}

async fn harness() -> Harness {
    harness_with(ScriptedLauncher::new()).await
}

fn demo_spec() -> TunnelSpec {
    TunnelSpec {
        local_port: 3000,
        subdomain: "demo".to_string(),
        zone: ZONE.to_string(),
        service: "http://localhost".to_string(),
    }
}

#[tokio::test]
async fn create_configures_ingress_and_dns() {
    let h = harness().await;

    let handle = h.controller.create(&demo_spec()).await.unwrap();

    assert_eq!(handle.domain(), "demo.example.com");
    assert_eq!(handle.record_name(), "demo");
    assert_eq!(handle.token(), format!("token-{}", handle.tunnel_id()));
    assert_eq!(handle.state(), ConnectorState::Idle);

    let rules = h.cf.ingress(handle.tunnel_id()).await.unwrap();
    assert_eq!(
        rules,
        vec![
            IngressRule {
                hostname: "demo.example.com".to_string(),
                service: IngressService::Origin("http://localhost:3000".to_string()),
            },
            IngressRule {
                hostname: "*".to_string(),
                service: IngressService::NotFound,
            },
        ]
    );

    let records = h.cf.records(ZONE).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, handle.record_id());
    assert_eq!(records[0].name, "demo");
    assert_eq!(records[0].content, routing_hostname(handle.tunnel_id()));

    assert_eq!(h.registry.len(), 1);
    assert!(h.registry.get(handle.tunnel_id()).is_some());
}

#[tokio::test]
async fn create_reuses_tunnel_with_same_name() {
    let h = harness().await;
    let existing = h.cf.add_tunnel("demo").await;

    let handle = h.controller.create(&demo_spec()).await.unwrap();

    assert_eq!(handle.tunnel_id(), existing);
    assert_eq!(h.cf.count(ApiOp::CreateTunnel).await, 0);
}

#[tokio::test]
async fn create_rejects_invalid_spec_before_remote_calls() {
    let h = harness().await;
    let mut spec = demo_spec();
    spec.local_port = 0;

    let err = h.controller.create(&spec).await.unwrap_err();

    assert!(matches!(err, TunnelError::Config(_)));
    assert!(h.cf.calls().await.is_empty());
}

#[tokio::test]
async fn create_fails_preflight_before_remote_calls() {
    let h = harness_with(ScriptedLauncher::failing_preflight("cloudflared missing")).await;

    let err = h.controller.create(&demo_spec()).await.unwrap_err();

    assert!(matches!(err, TunnelError::Config(_)));
    assert!(h.cf.calls().await.is_empty());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn create_in_unknown_zone_leaves_tunnel_unregistered() {
    let h = harness().await;
    let mut spec = demo_spec();
    spec.zone = "other.dev".to_string();

    let err = h.controller.create(&spec).await.unwrap_err();

    assert!(matches!(err, TunnelError::ZoneNotFound { .. }));
    // No rollback: the tunnel stays provisioned
    assert_eq!(h.cf.tunnels().await.len(), 1);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn create_refuses_to_clobber_mx_record() {
    let h = harness().await;
    h.cf.add_record(ZONE, "demo", "MX", "mail.example.com")
        .await
        .unwrap();

    let err = h.controller.create(&demo_spec()).await.unwrap_err();

    assert!(matches!(err, TunnelError::RecordTypeConflict { .. }));
    assert_eq!(h.cf.records(ZONE).await[0].content, "mail.example.com");
}

#[tokio::test]
async fn close_without_connect_deprovisions() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();

    handle.close().await.unwrap();

    assert_eq!(h.launcher.launches(), 0);
    assert!(h.cf.records(ZONE).await.is_empty());
    assert!(h.cf.tunnels().await.is_empty());
    assert_eq!(handle.state(), ConnectorState::Closed);
}

/// Stores record names as lowercase FQDNs, the way Cloudflare does
struct CanonicalDns {
    inner: Arc<MemoryCloudflare>,
    zone: String,
}

#[async_trait]
impl DnsApi for CanonicalDns {
    async fn list_zones(&self, account_id: &str) -> Result<Vec<Zone>, ApiError> {
        self.inner.list_zones(account_id).await
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError> {
        self.inner.list_records(zone_id).await
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ApiError> {
        let mut record = record.clone();
        record.name = format!("{}.{}", record.name, self.zone).to_ascii_lowercase();
        self.inner.create_record(zone_id, &record).await
    }

    async fn update_record_content(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<DnsRecord, ApiError> {
        self.inner.update_record_content(zone_id, record_id, content).await
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError> {
        self.inner.delete_record(zone_id, record_id).await
    }
}

#[tokio::test]
async fn mixed_case_subdomain_is_fully_deprovisioned() {
    let cf = Arc::new(MemoryCloudflare::new());
    cf.add_zone(ZONE).await;
    let deps = ControllerDeps {
        tunnel_api: cf.clone(),
        dns_api: Arc::new(CanonicalDns {
            inner: cf.clone(),
            zone: ZONE.to_string(),
        }),
        account_id: "acc".to_string(),
        default_zone: Some(ZONE.to_string()),
        launcher: Arc::new(ScriptedLauncher::new()),
    };
    let controller = TunnelController::new(deps, TunnelRegistry::new());
    let spec = TunnelSpec {
        subdomain: "Demo".to_string(),
        ..demo_spec()
    };

    let handle = controller.create(&spec).await.unwrap();
    assert_eq!(cf.records(ZONE).await[0].name, "demo.example.com");

    // A second create finds the stored record instead of adding another
    controller.create(&spec).await.unwrap();
    assert_eq!(cf.records(ZONE).await.len(), 1);

    handle.close().await.unwrap();

    assert!(cf.records(ZONE).await.is_empty());
    assert!(cf.tunnels().await.is_empty());
    assert_eq!(cf.count(ApiOp::DeleteTunnel).await, 1);
}

#[tokio::test]
async fn connect_twice_launches_one_process() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();

    handle.connect().await.unwrap();
    handle.clone().connect().await.unwrap();

    assert_eq!(h.launcher.launches(), 1);
    assert_eq!(h.launcher.tokens(), vec![handle.token().to_string()]);
}

#[tokio::test]
async fn close_tears_down_dns_before_tunnel() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    handle.connect().await.unwrap();

    handle.close().await.unwrap();

    let ops: Vec<ApiOp> = h.cf.calls().await.into_iter().map(|c| c.op).collect();
    let record_deleted = ops.iter().position(|op| *op == ApiOp::DeleteRecord);
    let tunnel_deleted = ops.iter().position(|op| *op == ApiOp::DeleteTunnel);
    assert!(record_deleted.is_some());
    assert!(record_deleted < tunnel_deleted);
    assert_eq!(h.cf.count(ApiOp::DeleteRecord).await, 1);
    assert_eq!(h.cf.count(ApiOp::DeleteTunnel).await, 1);
}

#[tokio::test]
async fn close_twice_deprovisions_once() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    handle.connect().await.unwrap();

    handle.close().await.unwrap();
    handle.close().await.unwrap();

    assert_eq!(h.cf.count(ApiOp::DeleteTunnel).await, 1);
    assert!(handle.connect().await.is_err());
}

#[tokio::test]
async fn events_report_connect_and_close() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    let mut events = handle.subscribe();

    handle.connect().await.unwrap();
    handle.close().await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        TunnelEvent::Connected {
            domain: "demo.example.com".to_string(),
            service: "http://localhost:3000".to_string(),
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        TunnelEvent::Closed {
            domain: "demo.example.com".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn stuck_connector_times_out_and_keeps_resources() {
    let h = harness_with(ScriptedLauncher::ignoring_terminate()).await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    handle.connect().await.unwrap();

    let err = handle.close().await.unwrap_err();

    assert!(matches!(err, TunnelError::CloseTimeout { attempts: 11 }));
    assert_eq!(h.cf.records(ZONE).await.len(), 1);
    assert_eq!(h.cf.tunnels().await.len(), 1);
    assert_eq!(handle.state(), ConnectorState::Closing);
}

#[tokio::test(start_paused = true)]
async fn close_policy_is_configurable() {
    let h = harness_with(ScriptedLauncher::ignoring_terminate()).await;
    let controller = h.controller.with_close_policy(ClosePolicy {
        poll_interval: Duration::from_millis(50),
        max_attempts: 3,
    });
    let handle = controller.create(&demo_spec()).await.unwrap();
    handle.connect().await.unwrap();

    let started = tokio::time::Instant::now();
    let err = handle.close().await.unwrap_err();

    assert!(matches!(err, TunnelError::CloseTimeout { attempts: 3 }));
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(started.elapsed() < Duration::from_millis(1100));
}

#[tokio::test]
async fn crash_deprovisions_exactly_once_with_concurrent_close() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    let mut events = handle.subscribe();
    handle.connect().await.unwrap();

    assert!(h.launcher.exit_latest(Some(1)));
    // Once the crash is recorded its teardown is under way; race it
    loop {
        if let TunnelEvent::Failed { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    let explicit = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.close().await })
    };

    let crashed = handle.closed().await.unwrap_err();
    explicit.await.unwrap().unwrap();

    assert!(matches!(crashed, TunnelError::ConnectorExit { code: Some(1) }));
    assert_eq!(handle.state(), ConnectorState::Closed);
    assert_eq!(h.cf.count(ApiOp::DeleteRecord).await, 1);
    assert_eq!(h.cf.count(ApiOp::DeleteTunnel).await, 1);
    assert!(h.cf.tunnels().await.is_empty());
}

#[tokio::test]
async fn teardown_fails_when_record_was_removed_externally() {
    let h = harness().await;
    let handle = h.controller.create(&demo_spec()).await.unwrap();
    h.cf.delete_record_by_name(ZONE, "demo").await;

    let err = handle.close().await.unwrap_err();

    assert!(matches!(err, TunnelError::RecordNotFound { .. }));
    // DNS failed first, so the tunnel delete never ran
    assert_eq!(h.cf.count(ApiOp::DeleteTunnel).await, 0);
    assert_eq!(handle.state(), ConnectorState::Closed);
}

#[tokio::test]
async fn close_all_closes_every_handle() {
    let h = harness().await;
    for name in ["one", "two", "three"] {
        let mut spec = demo_spec();
        spec.subdomain = name.to_string();
        let handle = h.controller.create(&spec).await.unwrap();
        handle.connect().await.unwrap();
    }

    let report = h.registry.close_all(Duration::from_secs(5)).await;

    assert_eq!(report.closed, 3);
    assert!(report.is_clean());
    assert!(h.cf.tunnels().await.is_empty());
    assert!(h.cf.records(ZONE).await.is_empty());
    assert!(
        h.registry
            .handles()
            .iter()
            .all(|handle| handle.state() == ConnectorState::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn close_all_respects_budget() {
    let h = harness_with(ScriptedLauncher::ignoring_terminate()).await;
    let controller = h.controller.with_close_policy(ClosePolicy {
        poll_interval: Duration::from_secs(1),
        max_attempts: 60,
    });
    let handle = controller.create(&demo_spec()).await.unwrap();
    handle.connect().await.unwrap();

    let started = tokio::time::Instant::now();
    let report = h.registry.close_all(Duration::from_secs(5)).await;

    assert_eq!(report.timed_out, 1);
    assert_eq!(report.closed, 0);
    assert!(started.elapsed() < Duration::from_secs(6));
}
