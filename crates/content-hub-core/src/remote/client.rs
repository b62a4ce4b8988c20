//! GitHub contents API client
//!
//! Builds contents URLs for public and enterprise hosts, attaches the best
//! available credential, classifies failures and retries once after an
//! accepted re-authentication.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::DateTime;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::category::Category;
use crate::content::{ContentEntry, EntryKind};
use crate::error::{HubError, Result};
use crate::interaction::{Interaction, SignInReason};
use crate::repo::RepoSource;
use crate::resolver;

use super::auth::{auth_host, enterprise_token, CredentialProvider, SessionMode};
use super::transport::{user_agent, HttpRequest, HttpResponse, TlsPolicy, Transport};

pub const PUBLIC_API_ROOT: &str = "https://api.github.com";
pub const API_VERSION: &str = "2022-11-28";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client knobs that come from configuration
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub enterprise_token: Option<String>,
    /// Opt-in to skip certificate validation for enterprise hosts
    pub allow_insecure_enterprise_tls: bool,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            enterprise_token: None,
            allow_insecure_enterprise_tls: false,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// A downloaded file body
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub sha: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<RawItem>),
    Single(RawItem),
}

#[derive(Debug, Deserialize)]
struct RawItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

impl RawItem {
    fn into_entry(self, repo: &RepoSource) -> Option<ContentEntry> {
        let kind = match self.kind.as_str() {
            "file" => EntryKind::File,
            "dir" => EntryKind::Dir,
            _ => return None,
        };
        Some(ContentEntry {
            display_name: self.name.clone(),
            name: self.name,
            path: self.path,
            kind,
            size: self.size,
            download_url: self.download_url,
            sha: self.sha,
            repo: repo.clone(),
        })
    }
}

pub struct RemoteContentClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    interaction: Arc<dyn Interaction>,
    settings: ClientSettings,
    /// Silent lookups per auth host, including misses
    session_tokens: Mutex<HashMap<String, Option<String>>>,
}

impl RemoteContentClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        interaction: Arc<dyn Interaction>,
        settings: ClientSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            interaction,
            settings,
            session_tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn interaction(&self) -> &dyn Interaction {
        self.interaction.as_ref()
    }

    // ========== URLs ==========

    /// API root: the public API host, or `{baseUrl}/api/v3`
    pub fn api_root(repo: &RepoSource) -> String {
        match repo.enterprise_base() {
            Some(base) if repo.is_enterprise() => format!("{}/api/v3", base),
            _ => PUBLIC_API_ROOT.to_string(),
        }
    }

    /// `{root}/repos/{owner}/{repo}/contents/{path}[?ref={branch}]`
    pub fn contents_url(repo: &RepoSource, path: &str) -> Result<String> {
        let root = Self::api_root(repo);
        let mut url = url::Url::parse(&root).map_err(|e| HubError::ConfigValue {
            key: "base_url".to_string(),
            message: format!("{}: {}", root, e),
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|_| HubError::ConfigValue {
                key: "base_url".to_string(),
                message: format!("{} cannot be used as an API root", root),
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }

        if let Some(branch) = repo.branch.as_deref().filter(|b| !b.trim().is_empty()) {
            url.query_pairs_mut().append_pair("ref", branch.trim());
        }

        Ok(url.to_string())
    }

    // ========== Credentials ==========

    async fn token_for(&self, repo: &RepoSource, mode: SessionMode) -> Option<String> {
        if let Some(token) = enterprise_token(repo, self.settings.enterprise_token.as_deref()) {
            return Some(token.to_string());
        }
        let host = auth_host(repo);
        match mode {
            SessionMode::Silent => self.silent_token(&host).await,
            SessionMode::Interactive => self.interactive_token(&host).await,
        }
    }

    /// Looked up once per host for the life of the client
    async fn silent_token(&self, host: &str) -> Option<String> {
        let mut tokens = self.session_tokens.lock().await;
        if let Some(cached) = tokens.get(host) {
            return cached.clone();
        }
        let token = self
            .credentials
            .session_token(host, SessionMode::Silent)
            .await;
        tokens.insert(host.to_string(), token.clone());
        token
    }

    async fn interactive_token(&self, host: &str) -> Option<String> {
        let token = self
            .credentials
            .session_token(host, SessionMode::Interactive)
            .await;
        let mut tokens = self.session_tokens.lock().await;
        match &token {
            Some(fresh) => tokens.insert(host.to_string(), Some(fresh.clone())),
            None => tokens.remove(host),
        };
        token
    }

    /// Whether any credential is available for `repo` without prompting
    pub async fn has_credential(&self, repo: &RepoSource) -> bool {
        self.token_for(repo, SessionMode::Silent).await.is_some()
    }

    /// Interactive sign-in for the host serving `repo`
    pub async fn sign_in(&self, repo: &RepoSource) -> bool {
        self.interactive_token(&auth_host(repo)).await.is_some()
    }

    // ========== Requests ==========

    fn build_request(&self, repo: &RepoSource, url: &str, token: Option<&str>) -> HttpRequest {
        let mut headers = vec![
            ("User-Agent".to_string(), user_agent()),
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
        ];
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        HttpRequest {
            url: url.to_string(),
            headers,
            tls: TlsPolicy::for_repo(repo, self.settings.allow_insecure_enterprise_tls),
            timeout: self.settings.timeout,
        }
    }

    /// GET with auth, status classification and a single retry after
    /// an accepted re-authentication.
    async fn get(&self, repo: &RepoSource, url: &str) -> Result<HttpResponse> {
        let token = self.token_for(repo, SessionMode::Silent).await;
        let response = self
            .transport
            .get(self.build_request(repo, url, token.as_deref()))
            .await?;

        let err = match classify(response, url, repo) {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let reason = match &err {
            HubError::AuthRequired { target, status } => Some(SignInReason::AuthFailed {
                target: target.clone(),
                status: *status,
            }),
            HubError::RateLimited { reset_at } if token.is_none() => {
                Some(SignInReason::RateLimited {
                    reset_at: *reset_at,
                })
            }
            _ => None,
        };
        let Some(reason) = reason else {
            return Err(err);
        };

        if !self.interaction.offer_sign_in(&reason) {
            return Err(err);
        }

        let Some(fresh) = self.token_for(repo, SessionMode::Interactive).await else {
            warn!("Sign-in did not produce a credential for {}", repo.identity());
            return Err(err);
        };

        debug!("Retrying {} with refreshed credentials", url);
        let retry = self
            .transport
            .get(self.build_request(repo, url, Some(&fresh)))
            .await?;
        classify(retry, url, repo)
    }

    /// List a remote directory. A missing directory is a `NotFound` error.
    pub async fn list_directory(&self, repo: &RepoSource, path: &str) -> Result<Vec<ContentEntry>> {
        let url = Self::contents_url(repo, path)?;
        let response = self.get(repo, &url).await?;
        let parsed: ContentsResponse = parse_json(&response, &url)?;

        let items = match parsed {
            ContentsResponse::Listing(items) => items,
            ContentsResponse::Single(item) => vec![item],
        };
        Ok(items
            .into_iter()
            .filter_map(|item| item.into_entry(repo))
            .collect())
    }

    /// List a category. Excluded categories and missing folders are empty.
    pub async fn list_category(
        &self,
        repo: &RepoSource,
        category: Category,
    ) -> Result<Vec<ContentEntry>> {
        let Some(path) = resolver::resolve(repo, category) else {
            debug!("{} excluded for {}", category, repo.identity());
            return Ok(Vec::new());
        };

        match self.list_directory(repo, &path).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => {
                debug!("{} has no '{}' folder", repo.identity(), path);
                Ok(Vec::new())
            }
            Err(e) => Err(e.with_listing_context(&repo.identity(), category)),
        }
    }

    /// Fetch one file by exact path. A missing file is an error.
    pub async fn fetch_file(&self, repo: &RepoSource, path: &str) -> Result<RemoteFile> {
        let url = Self::contents_url(repo, path)?;
        let response = self.get(repo, &url).await?;
        let item = match parse_json::<ContentsResponse>(&response, &url)? {
            ContentsResponse::Single(item) => item,
            ContentsResponse::Listing(_) => {
                return Err(HubError::InvalidResponse {
                    url,
                    message: format!("{} is a directory", path),
                })
            }
        };

        let inline = item
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .filter(|_| item.encoding.as_deref().unwrap_or("base64") == "base64");

        let bytes = match (inline, item.download_url.as_deref()) {
            (Some(content), _) => decode_base64(content).map_err(|message| {
                HubError::InvalidResponse {
                    url: url.clone(),
                    message,
                }
            })?,
            (None, Some(raw_url)) => self.fetch_raw(repo, raw_url).await?,
            (None, None) => {
                return Err(HubError::InvalidResponse {
                    url,
                    message: "file has neither inline content nor a download URL".to_string(),
                })
            }
        };

        Ok(RemoteFile {
            path: item.path,
            sha: item.sha,
            bytes,
        })
    }

    /// Follow a raw download locator with the same auth and TLS policy
    pub async fn fetch_raw(&self, repo: &RepoSource, url: &str) -> Result<Vec<u8>> {
        Ok(self.get(repo, url).await?.body)
    }
}

fn classify(response: HttpResponse, url: &str, repo: &RepoSource) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    let quota_exhausted = response
        .header("x-ratelimit-remaining")
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    match status {
        404 => Err(HubError::NotFound {
            path: url.to_string(),
        }),
        403 | 429 if quota_exhausted => Err(HubError::RateLimited {
            reset_at: response
                .header("x-ratelimit-reset")
                .and_then(|v| v.trim().parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }),
        401 | 403 => Err(HubError::AuthRequired {
            target: repo.identity(),
            status,
        }),
        _ => Err(HubError::Http {
            status,
            url: url.to_string(),
        }),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse, url: &str) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| HubError::InvalidResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Decode the API's line-wrapped base64 content
fn decode_base64(content: &str) -> std::result::Result<Vec<u8>, String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| e.to_string())
}
