//! Credential resolution
//!
//! Order per request: enterprise token (enterprise targets only), then a
//! session token from the [`CredentialProvider`], then anonymous.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::repo::RepoSource;

/// Identity provider host for repositories on the public host
pub const PUBLIC_HOST: &str = "github.com";

/// Identity provider host for `repo`
pub fn auth_host(repo: &RepoSource) -> String {
    if !repo.is_enterprise() {
        return PUBLIC_HOST.to_string();
    }
    repo.enterprise_base()
        .and_then(|base| url::Url::parse(base).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| repo.enterprise_base().unwrap_or(PUBLIC_HOST).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Never prompt; used during normal fetches
    Silent,
    /// The user asked to sign in
    Interactive,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Short-lived session token from `host`'s identity provider
    async fn session_token(&self, host: &str, mode: SessionMode) -> Option<String>;
}

/// Fixed token, or none at all
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn session_token(&self, _host: &str, _mode: SessionMode) -> Option<String> {
        self.token.clone()
    }
}

/// Environment variables, then the GitHub CLI.
///
/// Interactive mode runs `gh auth login --web` before asking for the token.
#[derive(Debug, Clone, Default)]
pub struct GhCliCredentials;

impl GhCliCredentials {
    const PUBLIC_ENV_VARS: &'static [&'static str] = &["GITHUB_TOKEN", "GH_TOKEN"];
    const ENTERPRISE_ENV_VARS: &'static [&'static str] =
        &["GH_ENTERPRISE_TOKEN", "GITHUB_ENTERPRISE_TOKEN"];

    fn from_env(host: &str) -> Option<String> {
        let vars = if host == PUBLIC_HOST {
            Self::PUBLIC_ENV_VARS
        } else {
            Self::ENTERPRISE_ENV_VARS
        };
        vars.iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }

    async fn gh_token(host: &str) -> Option<String> {
        let output = Command::new("gh")
            .args(["auth", "token", "--hostname", host])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!token.is_empty()).then_some(token)
    }

    async fn gh_login(host: &str) -> bool {
        match Command::new("gh")
            .args(["auth", "login", "--web", "--hostname", host])
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("gh auth login unavailable: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for GhCliCredentials {
    async fn session_token(&self, host: &str, mode: SessionMode) -> Option<String> {
        if let Some(token) = Self::from_env(host) {
            return Some(token);
        }
        if let Some(token) = Self::gh_token(host).await {
            return Some(token);
        }
        if mode == SessionMode::Interactive && Self::gh_login(host).await {
            return Self::gh_token(host).await;
        }
        None
    }
}

/// Token configured for enterprise hosts, if this target uses one
pub fn enterprise_token<'a>(repo: &RepoSource, configured: Option<&'a str>) -> Option<&'a str> {
    if !repo.is_enterprise() {
        return None;
    }
    configured.map(str::trim).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enterprise_token_ignored_for_public_host() {
        let public = RepoSource::new("o", "r");
        assert_eq!(enterprise_token(&public, Some("ghe-token")), None);

        let ghe = RepoSource::new("o", "r").with_base_url("https://ghe.corp");
        assert_eq!(enterprise_token(&ghe, Some(" ghe-token ")), Some("ghe-token"));
        assert_eq!(enterprise_token(&ghe, Some("  ")), None);
    }

    #[test]
    fn auth_host_per_target() {
        assert_eq!(auth_host(&RepoSource::new("o", "r")), "github.com");
        let ghe = RepoSource::new("o", "r").with_base_url("https://ghe.corp:8443/");
        assert_eq!(auth_host(&ghe), "ghe.corp");
    }

    #[tokio::test]
    async fn static_credentials_filter_blank() {
        let creds = StaticCredentials::new(Some("   ".to_string()));
        assert_eq!(creds.session_token(PUBLIC_HOST, SessionMode::Silent).await, None);

        let creds = StaticCredentials::new(Some("abc".to_string()));
        assert_eq!(
            creds
                .session_token(PUBLIC_HOST, SessionMode::Interactive)
                .await
                .as_deref(),
            Some("abc")
        );
    }
}
