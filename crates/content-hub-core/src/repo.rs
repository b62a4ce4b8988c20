//! Repository sources and per-repository folder mappings

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::category::Category;
use crate::error::{HubError, Result};

/// Identity prefix used for repositories on the public host
pub const DEFAULT_HOST: &str = "default-host";

const PUBLIC_HOSTS: &[&str] = &["github.com", "www.github.com", "api.github.com"];

/// Where a category's content lives inside a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderTarget {
    /// Category is not served by this repository
    Excluded,
    /// Repository root is the content source
    Root,
    /// Custom folder; blank means "use the default"
    Path(String),
}

impl FolderTarget {
    pub fn as_config_str(&self) -> &str {
        match self {
            Self::Excluded => "none",
            Self::Root => "root",
            Self::Path(p) => p,
        }
    }
}

impl From<Option<&str>> for FolderTarget {
    fn from(value: Option<&str>) -> Self {
        match value {
            None => Self::Excluded,
            Some(v) if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("null") => {
                Self::Excluded
            }
            Some("root") => Self::Root,
            Some(v) => Self::Path(v.to_string()),
        }
    }
}

impl Serialize for FolderTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_config_str())
    }
}

impl<'de> Deserialize<'de> for FolderTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(FolderTarget::from(value.as_deref()))
    }
}

pub type FolderMappings = BTreeMap<Category, FolderTarget>;

/// A remote repository content is discovered in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSource {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Enterprise host base URL (e.g. `https://github.example.com`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub folder_mappings: FolderMappings,
}

impl RepoSource {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            label: None,
            base_url: None,
            branch: None,
            folder_mappings: FolderMappings::new(),
        }
    }

    /// Parse an `owner/repo` reference
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim().trim_end_matches(".git");
        match trimmed.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self::new(owner, repo))
            }
            _ => Err(HubError::InvalidRepoRef {
                value: value.to_string(),
            }),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mapping(mut self, category: Category, target: FolderTarget) -> Self {
        self.folder_mappings.insert(category, target);
        self
    }

    /// Normalized enterprise base URL, if any
    pub fn enterprise_base(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }

    /// Whether requests go to a host other than the public one
    pub fn is_enterprise(&self) -> bool {
        match self.enterprise_base() {
            None => false,
            Some(base) => match url::Url::parse(base) {
                Ok(parsed) => !parsed
                    .host_str()
                    .map(|h| PUBLIC_HOSTS.contains(&h.to_ascii_lowercase().as_str()))
                    .unwrap_or(false),
                Err(_) => true,
            },
        }
    }

    /// Stable identity: `(baseUrl|default-host)/owner/repo`
    pub fn identity(&self) -> String {
        let host = if self.is_enterprise() {
            self.enterprise_base().unwrap_or(DEFAULT_HOST)
        } else {
            DEFAULT_HOST
        };
        format!("{}/{}/{}", host, self.owner, self.repo)
    }

    /// Short `owner/repo` form used in display names
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn display_name(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.slug())
    }
}

impl fmt::Display for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}
