//! tunnler-core: Core library for tunnler
//!
//! Exposes a local HTTP service on a public hostname through Cloudflare
//! Tunnel:
//!
//! - **Cloudflare APIs** - [`TunnelApi`] and [`DnsApi`] traits, the REST
//!   [`CloudflareClient`], and [`MemoryCloudflare`] for tests
//! - **Credentials** - [`CredentialSource`] layering explicit values, the
//!   credentials file, and the environment
//! - **Lifecycle** - [`TunnelController`] provisions a tunnel, routes it, and
//!   binds DNS; the returned [`TunnelHandle`] runs and closes the connector
//!
//! # Quick Start
//!
//! ```no_run
//! use tunnler_core::{CredentialSource, RawCredentials, TunnelController, TunnelRegistry};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = CredentialSource::default()
//!         .resolve(RawCredentials::default())?
//!         .require()?;
//!     let registry = TunnelRegistry::new();
//!     let controller = TunnelController::from_credentials(&credentials, registry.clone())?;
//!
//!     let spec = controller.spec(3000).build()?;
//!     let handle = controller.create(&spec).await?;
//!     handle.connect().await?;
//!     println!("{} is live", handle.domain());
//!
//!     handle.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! TunnelController::create
//!   ├─ ResourceProvisioner   tunnel + token
//!   ├─ IngressConfigurator   domain -> service:port, * -> 404
//!   └─ DnsBinder             subdomain CNAME -> <id>.cfargotunnel.com
//!
//! TunnelHandle
//!   └─ ConnectorSupervisor   cloudflared process, close protocol
//!        └─ teardown         DNS record, then tunnel
//! ```

pub mod cloudflare;
pub mod credentials;
pub mod error;
pub mod tunnel;

pub use cloudflare::{ApiError, CloudflareClient, DnsApi, MemoryCloudflare, TunnelApi};
pub use credentials::{CredentialSource, CredentialStore, Credentials, RawCredentials};
pub use error::{CredentialError, TunnelError};
pub use tunnel::{
    ClosePolicy, ConnectorState, ControllerDeps, ScriptedLauncher, ShutdownReport, TunnelController,
    TunnelEvent, TunnelHandle, TunnelRegistry, TunnelSpec,
};
