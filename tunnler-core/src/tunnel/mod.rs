//! Tunnel provisioning and connector lifecycle

pub mod cloudflared;
pub mod config;
pub mod controller;
pub mod dns;
pub mod handle;
pub mod ingress;
pub mod provisioner;
pub mod registry;
pub mod scripted;
pub mod state;
pub mod supervisor;

pub use cloudflared::{
    CloudflaredInfo, CloudflaredLauncher, ConnectorDriver, ConnectorExit, ConnectorLauncher,
    ConnectorProcess, check_installation,
};
pub use config::{ClosePolicy, TunnelSpec, TunnelSpecBuilder, generate_subdomain, routing_hostname};
pub use controller::{ControllerDeps, TunnelController};
pub use dns::{DnsBinder, DnsRecordRef};
pub use handle::TunnelHandle;
pub use ingress::{IngressConfigurator, ingress_rules};
pub use provisioner::{ResourceProvisioner, TunnelResource};
pub use registry::{ShutdownReport, TunnelRegistry};
pub use scripted::ScriptedLauncher;
pub use state::{ConnectorState, TunnelEvent};
pub use supervisor::{ConnectorSupervisor, Teardown};
