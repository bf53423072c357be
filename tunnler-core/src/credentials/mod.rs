//! Cloudflare credential resolution
//!
//! Credentials are layered field by field. Explicit values win over the
//! credentials file, which wins over the environment.

mod store;

use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, TunnelError};

pub use store::CredentialStore;

/// Environment variable holding the Cloudflare API token
pub const ENV_API_KEY: &str = "CLOUDFLARE_API_KEY";
/// Environment variable holding the Cloudflare account id
pub const ENV_ACCOUNT_ID: &str = "CLOUDFLARE_ACCOUNT_ID";
/// Environment variable holding the default DNS zone
pub const ENV_DEFAULT_ZONE: &str = "CLOUDFLARE_DEFAULT_ZONE";

/// Credentials as stored or supplied (optional fields for merging)
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_zone: Option<String>,
}

impl std::fmt::Debug for RawCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("account_id", &self.account_id)
            .field("default_zone", &self.default_zone)
            .finish()
    }
}

impl RawCredentials {
    /// Read the `CLOUDFLARE_*` environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: read_env(ENV_API_KEY),
            account_id: read_env(ENV_ACCOUNT_ID),
            default_zone: read_env(ENV_DEFAULT_ZONE),
        }
    }

    /// Fill fields missing in `self` from `base`
    #[must_use]
    pub fn or(self, base: RawCredentials) -> Self {
        Self {
            api_key: non_empty(self.api_key).or(non_empty(base.api_key)),
            account_id: non_empty(self.account_id).or(non_empty(base.account_id)),
            default_zone: non_empty(self.default_zone).or(non_empty(base.default_zone)),
        }
    }

    /// Turn the merged layers into complete credentials
    pub fn require(self) -> Result<Credentials, TunnelError> {
        let api_key = non_empty(self.api_key).ok_or_else(|| {
            TunnelError::Config(format!(
                "Cloudflare API key is not configured. Run `tunnler init` or set {}.",
                ENV_API_KEY
            ))
        })?;
        let account_id = non_empty(self.account_id).ok_or_else(|| {
            TunnelError::Config(format!(
                "Cloudflare account ID is not configured. Run `tunnler init` or set {}.",
                ENV_ACCOUNT_ID
            ))
        })?;
        Ok(Credentials {
            api_key,
            account_id,
            default_zone: non_empty(self.default_zone),
        })
    }
}

/// Complete credentials for the Cloudflare APIs
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub api_key: String,
    pub account_id: String,
    pub default_zone: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("default_zone", &self.default_zone)
            .finish()
    }
}

impl From<Credentials> for RawCredentials {
    fn from(credentials: Credentials) -> Self {
        Self {
            api_key: Some(credentials.api_key),
            account_id: Some(credentials.account_id),
            default_zone: credentials.default_zone,
        }
    }
}

/// Resolves credentials from explicit values, a store, and the environment
pub struct CredentialSource {
    store: CredentialStore,
}

impl CredentialSource {
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Merge `explicit`, then the stored file, then the environment
    pub fn resolve(&self, explicit: RawCredentials) -> Result<RawCredentials, CredentialError> {
        let stored = self.store.load()?;
        Ok(explicit.or(stored).or(RawCredentials::from_env()))
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::new(CredentialStore::default())
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
