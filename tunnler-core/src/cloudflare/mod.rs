//! Cloudflare tunnel-management and DNS APIs
//!
//! The lifecycle core talks to Cloudflare only through the [`TunnelApi`] and
//! [`DnsApi`] traits. [`CloudflareClient`] is the HTTPS implementation and
//! [`MemoryCloudflare`] keeps everything in memory for tests.

mod client;
mod error;
mod memory;
mod traits;
mod types;

pub use client::{CloudflareClient, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use memory::{ApiCall, ApiOp, MemoryCloudflare};
pub use traits::{DnsApi, TunnelApi};
pub use types::{DnsRecord, IngressRule, IngressService, NewDnsRecord, TunnelInfo, Zone};
