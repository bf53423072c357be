//! Cloudflare API error types

use thiserror::Error;

/// Errors returned by a [`TunnelApi`](super::TunnelApi) or [`DnsApi`](super::DnsApi) call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a usable response
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Cloudflare answered with an error status or `success: false`
    #[error("Cloudflare returned {status}: {}", messages.join("; "))]
    Cloudflare { status: u16, messages: Vec<String> },

    /// The addressed object does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloudflare_error_joins_messages() {
        let err = ApiError::Cloudflare {
            status: 400,
            messages: vec!["bad name".to_string(), "try again".to_string()],
        };
        assert_eq!(err.to_string(), "Cloudflare returned 400: bad name; try again");
    }

    #[test]
    fn not_found_display() {
        let err = ApiError::NotFound("record abc".to_string());
        assert_eq!(err.to_string(), "not found: record abc");
    }
}
