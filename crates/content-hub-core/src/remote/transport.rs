//! HTTP transport seam
//!
//! TLS trust is a property of each request. The relaxed policy selects a
//! separate client instance; there is no process-wide toggle.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{HubError, Result};
use crate::repo::RepoSource;

/// Certificate validation policy for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    Verify,
    AcceptInvalidCerts,
}

impl TlsPolicy {
    /// Relaxed validation only for enterprise hosts the user opted in for.
    /// The public host always verifies.
    pub fn for_repo(repo: &RepoSource, allow_insecure_enterprise: bool) -> Self {
        if repo.is_enterprise() && allow_insecure_enterprise {
            Self::AcceptInvalidCerts
        } else {
            Self::Verify
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub tls: TlsPolicy,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport with one client per TLS policy
pub struct ReqwestTransport {
    verified: Client,
    insecure: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            verified: Self::builder().build().map_err(network_error)?,
            insecure: Self::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(network_error)?,
        })
    }

    fn builder() -> reqwest::ClientBuilder {
        Client::builder().user_agent(user_agent())
    }

    fn client_for(&self, policy: TlsPolicy) -> &Client {
        match policy {
            TlsPolicy::Verify => &self.verified,
            TlsPolicy::AcceptInvalidCerts => &self.insecure,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client_for(request.tls)
            .get(&request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HubError::Network {
                    message: format!(
                        "request to {} timed out after {}s",
                        request.url,
                        request.timeout.as_secs()
                    ),
                }
            } else {
                network_error(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(network_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

pub fn user_agent() -> String {
    format!("content-hub/{}", env!("CARGO_PKG_VERSION"))
}

fn network_error(e: reqwest::Error) -> HubError {
    HubError::Network {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_host_always_verifies() {
        let public = RepoSource::new("o", "r");
        assert_eq!(TlsPolicy::for_repo(&public, true), TlsPolicy::Verify);

        let explicit_public = RepoSource::new("o", "r").with_base_url("https://github.com");
        assert_eq!(TlsPolicy::for_repo(&explicit_public, true), TlsPolicy::Verify);
    }

    #[test]
    fn enterprise_relaxes_only_when_opted_in() {
        let ghe = RepoSource::new("o", "r").with_base_url("https://ghe.corp");
        assert_eq!(TlsPolicy::for_repo(&ghe, false), TlsPolicy::Verify);
        assert_eq!(
            TlsPolicy::for_repo(&ghe, true),
            TlsPolicy::AcceptInvalidCerts
        );
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = HttpResponse::new(403, "").with_header("X-RateLimit-Remaining", "0");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("0"));
        assert!(!response.is_success());
    }
}
