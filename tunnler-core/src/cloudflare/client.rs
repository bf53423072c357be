//! HTTPS client for the Cloudflare v4 API

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::traits::{DnsApi, TunnelApi};
use super::types::{DnsRecord, IngressRule, NewDnsRecord, TunnelInfo, Zone};

/// Base URL of the Cloudflare v4 API
pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Zones endpoint caps `per_page` at 50
const ZONES_PER_PAGE: u32 = 50;

const RECORDS_PER_PAGE: u32 = 100;

const TUNNELS_PER_PAGE: u32 = 50;

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<EnvelopeMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

/// Paging metadata on list responses
#[derive(Debug, Clone, Copy, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

impl ResultInfo {
    /// Whether a page after `page` exists
    fn has_more(info: Option<&Self>, page: u32) -> bool {
        info.and_then(|i| i.total_pages)
            .is_some_and(|total| page < total)
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

impl std::fmt::Display for EnvelopeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Authenticated Cloudflare API client
#[derive(Clone)]
pub struct CloudflareClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CloudflareClient {
    /// Create a client authenticating with an API token
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at another API root (e.g. a local stub)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "Cloudflare API request");
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
    }

    /// Send a request and return the envelope's `result`, which may be null
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        Ok(self.fetch(request).await?.result)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        decode_envelope(status, &body)
    }

    /// GET every page of a list endpoint
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        per_page: u32,
    ) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let request = self
                .request(Method::GET, path)
                .query(query)
                .query(&[("page", page), ("per_page", per_page)]);
            let envelope: Envelope<Vec<T>> = self.fetch(request).await?;
            let more = ResultInfo::has_more(envelope.result_info.as_ref(), page);
            let batch = envelope.result.unwrap_or_default();
            let done = batch.is_empty() || !more;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// Like [`execute`](Self::execute) but requires a non-null result
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.execute(request)
            .await?
            .ok_or_else(|| ApiError::Cloudflare {
                status: 200,
                messages: vec!["response had no result".to_string()],
            })
    }
}

/// Decode a Cloudflare envelope, mapping failures to [`ApiError::Cloudflare`]
fn decode_envelope<T: DeserializeOwned>(status: u16, body: &str) -> Result<Envelope<T>, ApiError> {
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let mut messages = vec![format!("unreadable response: {}", e)];
            if !body.is_empty() {
                messages.push(body.chars().take(200).collect());
            }
            return Err(ApiError::Cloudflare { status, messages });
        }
    };

    if !(200..300).contains(&status) || !envelope.success {
        let messages = if envelope.errors.is_empty() {
            vec!["request failed".to_string()]
        } else {
            envelope.errors.iter().map(ToString::to_string).collect()
        };
        return Err(ApiError::Cloudflare { status, messages });
    }

    Ok(envelope)
}

#[async_trait]
impl TunnelApi for CloudflareClient {
    async fn list_tunnels(&self, account_id: &str) -> Result<Vec<TunnelInfo>, ApiError> {
        self.list_all(
            &format!("/accounts/{}/cfd_tunnel", account_id),
            &[("is_deleted", "false")],
            TUNNELS_PER_PAGE,
        )
        .await
    }

    async fn create_tunnel(&self, account_id: &str, name: &str) -> Result<TunnelInfo, ApiError> {
        let request = self
            .request(Method::POST, &format!("/accounts/{}/cfd_tunnel", account_id))
            .json(&serde_json::json!({
                "name": name,
                "config_src": "cloudflare",
            }));
        self.send(request).await
    }

    async fn delete_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<(), ApiError> {
        let request = self.request(
            Method::DELETE,
            &format!("/accounts/{}/cfd_tunnel/{}", account_id, tunnel_id),
        );
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }

    async fn tunnel_token(&self, account_id: &str, tunnel_id: &str) -> Result<String, ApiError> {
        let request = self.request(
            Method::GET,
            &format!("/accounts/{}/cfd_tunnel/{}/token", account_id, tunnel_id),
        );
        self.send(request).await
    }

    async fn update_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError> {
        let ingress: Vec<serde_json::Value> = rules.iter().map(IngressRule::to_wire).collect();
        let request = self
            .request(
                Method::PUT,
                &format!(
                    "/accounts/{}/cfd_tunnel/{}/configurations",
                    account_id, tunnel_id
                ),
            )
            .json(&serde_json::json!({ "config": { "ingress": ingress } }));
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }
}

#[async_trait]
impl DnsApi for CloudflareClient {
    async fn list_zones(&self, account_id: &str) -> Result<Vec<Zone>, ApiError> {
        self.list_all("/zones", &[("account.id", account_id)], ZONES_PER_PAGE)
            .await
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError> {
        self.list_all(
            &format!("/zones/{}/dns_records", zone_id),
            &[],
            RECORDS_PER_PAGE,
        )
        .await
    }

    async fn create_record(
        &self,
        zone_id: &str,
        record: &NewDnsRecord,
    ) -> Result<DnsRecord, ApiError> {
        let request = self
            .request(Method::POST, &format!("/zones/{}/dns_records", zone_id))
            .json(record);
        self.send(request).await
    }

    async fn update_record_content(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<DnsRecord, ApiError> {
        let request = self
            .request(
                Method::PATCH,
                &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            )
            .json(&serde_json::json!({ "content": content }));
        self.send(request).await
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError> {
        let request = self.request(
            Method::DELETE,
            &format!("/zones/{}/dns_records/{}", zone_id, record_id),
        );
        self.execute::<serde_json::Value>(request).await?;
        Ok(())
    }
}
