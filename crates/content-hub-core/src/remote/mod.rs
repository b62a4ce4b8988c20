//! Remote access to repository contents
//!
//! - `transport`: HTTP seam with per-request TLS policy
//! - `auth`: credential providers and resolution order
//! - `client`: contents API client (listing, file bodies, retry-after-auth)

mod auth;
mod client;
mod transport;

pub use auth::{
    auth_host, enterprise_token, CredentialProvider, GhCliCredentials, SessionMode,
    StaticCredentials, PUBLIC_HOST,
};
pub use client::{
    ClientSettings, RemoteContentClient, RemoteFile, API_VERSION, PUBLIC_API_ROOT,
    REQUEST_TIMEOUT,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, TlsPolicy, Transport};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for tests

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};

    use super::{HttpRequest, HttpResponse, RemoteContentClient, Transport};
    use crate::error::{HubError, Result};
    use crate::repo::RepoSource;

    /// Serves queued responses per URL; the last response repeats.
    /// Unknown URLs answer 404. URLs marked with `fail_network` error out
    /// before any response.
    #[derive(Default)]
    pub struct FakeTransport {
        routes: Mutex<HashMap<String, Vec<HttpResponse>>>,
        failures: Mutex<HashMap<String, String>>,
        requests: Mutex<Vec<HttpRequest>>,
        delay: Option<Duration>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn respond(&self, url: &str, response: HttpResponse) {
            self.routes
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push(response);
        }

        pub fn fail_network(&self, url: &str, message: &str) {
            self.failures
                .lock()
                .unwrap()
                .insert(url.to_string(), message.to_string());
        }

        pub fn json(&self, url: &str, value: Value) {
            self.respond(url, HttpResponse::new(200, value.to_string()));
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Highest number of requests observed in flight at once
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .count()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
            let url = request.url.clone();
            self.requests.lock().unwrap().push(request);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(message) = self.failures.lock().unwrap().get(&url) {
                return Err(HubError::Network {
                    message: message.clone(),
                });
            }

            let mut routes = self.routes.lock().unwrap();
            let response = match routes.get_mut(&url) {
                Some(queue) if queue.len() > 1 => queue.remove(0),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => HttpResponse::new(404, r#"{"message":"Not Found"}"#),
            };
            Ok(response)
        }
    }

    pub fn contents_url(repo: &RepoSource, path: &str) -> String {
        RemoteContentClient::contents_url(repo, path).unwrap()
    }

    /// Directory listing body for `(path, type)` pairs
    pub fn listing_json(items: &[(&str, &str)]) -> Value {
        Value::Array(
            items
                .iter()
                .map(|(path, kind)| {
                    let name = path.rsplit('/').next().unwrap_or(path);
                    json!({
                        "name": name,
                        "path": path,
                        "type": kind,
                        "size": 10,
                        "sha": format!("sha-{path}"),
                        "download_url": if *kind == "file" {
                            Value::String(format!("https://raw.example/{path}"))
                        } else {
                            Value::Null
                        },
                    })
                })
                .collect(),
        )
    }

    /// Single-file body with inline base64 content
    pub fn file_json(path: &str, content: &str) -> Value {
        let name = path.rsplit('/').next().unwrap_or(path);
        json!({
            "name": name,
            "path": path,
            "type": "file",
            "size": content.len(),
            "sha": format!("sha-{path}"),
            "encoding": "base64",
            "content": STANDARD.encode(content),
            "download_url": format!("https://raw.example/{path}"),
        })
    }
}
