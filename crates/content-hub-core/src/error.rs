use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::category::Category;
use crate::manifest::ManifestError;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Authentication required for {target} (HTTP {status})")]
    AuthRequired { target: String, status: u16 },

    #[error("{}", rate_limit_message(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP error {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Failed to list {category} in {repo}: {source}")]
    Listing {
        repo: String,
        category: Category,
        #[source]
        source: Box<HubError>,
    },

    #[error("Plugin manifest invalid: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Unknown category: {name}")]
    UnknownCategory { name: String },

    #[error("Repository not configured: {name}")]
    RepoNotFound { name: String },

    #[error("Repository already configured: {name}")]
    RepoAlreadyExists { name: String },

    #[error("Invalid repository reference: '{value}' - expected owner/repo")]
    InvalidRepoRef { value: String },

    #[error("Content not found: {name}")]
    ContentNotFound { name: String },

    #[error("Unsafe path in remote content: {path}")]
    PathTraversal { path: String },

    #[error("{path} would overwrite {kept} after flattening")]
    NameCollision { path: String, kept: String },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid value for {key}: {message}")]
    ConfigValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type Result<T> = std::result::Result<T, HubError>;

/// Coarse classification callers branch on instead of inspecting variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    AuthRequired,
    RateLimited,
    Network,
    Validation,
    Local,
}

fn rate_limit_message(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(
            "GitHub API rate limit exceeded, resets at {}",
            at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "GitHub API rate limit exceeded".to_string(),
    }
}

impl HubError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::AuthRequired { .. } => ErrorClass::AuthRequired,
            Self::RateLimited { .. } => ErrorClass::RateLimited,
            Self::Network { .. } | Self::Http { .. } | Self::InvalidResponse { .. } => {
                ErrorClass::Network
            }
            Self::Listing { source, .. } => source.class(),
            Self::Manifest(_) | Self::PathTraversal { .. } | Self::NameCollision { .. } => {
                ErrorClass::Validation
            }
            _ => ErrorClass::Local,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    pub fn with_listing_context(self, repo: &str, category: Category) -> Self {
        Self::Listing {
            repo: repo.to_string(),
            category,
            source: Box::new(self),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::NotFound => 2,
            ErrorClass::AuthRequired => 3,
            ErrorClass::RateLimited => 4,
            ErrorClass::Network => 5,
            ErrorClass::Validation => 6,
            ErrorClass::Local => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_context_keeps_class() {
        let err = HubError::AuthRequired {
            target: "github.com".to_string(),
            status: 401,
        }
        .with_listing_context("default-host/a/b", Category::Agents);

        assert_eq!(err.class(), ErrorClass::AuthRequired);
        assert!(err.to_string().contains("agents"));
        assert!(err.to_string().contains("default-host/a/b"));
    }

    #[test]
    fn rate_limit_reports_reset() {
        let reset = DateTime::from_timestamp(1_700_000_000, 0);
        let err = HubError::RateLimited { reset_at: reset };
        assert!(err.to_string().contains("2023-11-14"));
        assert_eq!(err.exit_code(), 4);
    }
}
