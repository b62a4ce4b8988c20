use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_TTL;
use crate::category::Category;
use crate::download::{LocalLayout, DEFAULT_MAX_CONCURRENCY, DEFAULT_TARGET_ROOT};
use crate::error::{HubError, Result};
use crate::remote::{ClientSettings, REQUEST_TIMEOUT};
use crate::repo::{FolderTarget, RepoSource};

const CONFIG_FILE: &str = "config.toml";
const BASE_DIR_NAME: &str = ".content-hub";

/// Overrides the base directory
pub const BASE_DIR_ENV: &str = "CONTENT_HUB_BASE";

/// Overrides `enterprise.token` when set
pub const ENTERPRISE_TOKEN_ENV: &str = "CONTENT_HUB_ENTERPRISE_TOKEN";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# content-hub configuration file
# Location: ~/.content-hub/config.toml

[cache]
# How long a repository listing stays fresh, in milliseconds
ttl_ms = 3600000

[network]
# Per-request timeout in seconds
timeout_secs = 10
# Directory listings fetched in parallel while walking a bundle
max_concurrency = 8

[enterprise]
# Token for enterprise hosts (or set CONTENT_HUB_ENTERPRISE_TOKEN)
# token = ""
# Skip certificate validation for enterprise hosts only
allow_insecure_tls = false

[download]
# Local root; content lands in {target_root}/{category}/
target_root = ".github"

# Repositories to discover content in.
# folder_mappings: category = "path" | "root" | "none"
[[repos]]
owner = "github"
repo = "awesome-copilot"
"#;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub enterprise: EnterpriseConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default = "default_repos")]
    pub repos: Vec<RepoSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnterpriseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Never applies to the public host
    #[serde(default)]
    pub allow_insecure_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_target_root")]
    pub target_root: PathBuf,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    REQUEST_TIMEOUT.as_secs()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_target_root() -> PathBuf {
    PathBuf::from(DEFAULT_TARGET_ROOT)
}

fn default_repos() -> Vec<RepoSource> {
    vec![RepoSource::new("github", "awesome-copilot")]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            target_root: default_target_root(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            network: NetworkConfig::default(),
            enterprise: EnterpriseConfig::default(),
            download: DownloadConfig::default(),
            repos: default_repos(),
        }
    }
}

impl Config {
    /// `$CONTENT_HUB_BASE`, else `~/.content-hub`
    pub fn default_base_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(BASE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        dirs::home_dir()
            .map(|home| home.join(BASE_DIR_NAME))
            .ok_or(HubError::HomeNotFound)
    }

    /// Load config from base directory
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| HubError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| HubError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        self.list()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set a config value by dot-notation key
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "cache.ttl_ms" => self.cache.ttl_ms = parse_number(key, value)?,
            "network.timeout_secs" => {
                let secs: u64 = parse_number(key, value)?;
                if secs == 0 {
                    return Err(invalid(key, "must be at least 1"));
                }
                self.network.timeout_secs = secs;
            }
            "network.max_concurrency" => {
                let limit: usize = parse_number(key, value)?;
                if limit == 0 {
                    return Err(invalid(key, "must be at least 1"));
                }
                self.network.max_concurrency = limit;
            }
            "enterprise.token" => {
                self.enterprise.token = Some(value.to_string()).filter(|v| !v.is_empty());
            }
            "enterprise.allow_insecure_tls" => {
                self.enterprise.allow_insecure_tls = parse_bool(key, value)?;
            }
            "download.target_root" => {
                if value.is_empty() {
                    return Err(invalid(key, "must not be empty"));
                }
                self.download.target_root = PathBuf::from(value);
            }
            _ => {
                return Err(HubError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("cache.ttl_ms".to_string(), self.cache.ttl_ms.to_string()),
            (
                "network.timeout_secs".to_string(),
                self.network.timeout_secs.to_string(),
            ),
            (
                "network.max_concurrency".to_string(),
                self.network.max_concurrency.to_string(),
            ),
            (
                "enterprise.token".to_string(),
                match &self.enterprise.token {
                    Some(_) => "(set)".to_string(),
                    None => "(unset)".to_string(),
                },
            ),
            (
                "enterprise.allow_insecure_tls".to_string(),
                self.enterprise.allow_insecure_tls.to_string(),
            ),
            (
                "download.target_root".to_string(),
                self.download.target_root.display().to_string(),
            ),
        ]
    }

    // ========== Repositories ==========

    /// Repository matching `owner/repo` or a full identity
    pub fn find_repo(&self, name: &str) -> Option<&RepoSource> {
        self.repos.iter().find(|r| repo_matches(r, name))
    }

    pub fn add_repo(&mut self, repo: RepoSource) -> Result<()> {
        if self.repos.iter().any(|r| r.identity() == repo.identity()) {
            return Err(HubError::RepoAlreadyExists {
                name: repo.display_name(),
            });
        }
        self.repos.push(repo);
        Ok(())
    }

    pub fn remove_repo(&mut self, name: &str) -> Result<RepoSource> {
        let index = self
            .repos
            .iter()
            .position(|r| repo_matches(r, name))
            .ok_or_else(|| HubError::RepoNotFound {
                name: name.to_string(),
            })?;
        Ok(self.repos.remove(index))
    }

    /// Set (or with `None`, reset to default) where `category` lives in `name`
    pub fn map_folder(
        &mut self,
        name: &str,
        category: Category,
        target: Option<FolderTarget>,
    ) -> Result<&RepoSource> {
        let repo = self
            .repos
            .iter_mut()
            .find(|r| repo_matches(r, name))
            .ok_or_else(|| HubError::RepoNotFound {
                name: name.to_string(),
            })?;
        match target {
            Some(target) => {
                repo.folder_mappings.insert(category, target);
            }
            None => {
                repo.folder_mappings.remove(&category);
            }
        }
        Ok(repo)
    }

    // ========== Derived settings ==========

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    /// Client settings; the environment token wins over the file
    pub fn client_settings(&self) -> ClientSettings {
        let env_token = std::env::var(ENTERPRISE_TOKEN_ENV).ok();
        self.client_settings_with(env_token)
    }

    fn client_settings_with(&self, env_token: Option<String>) -> ClientSettings {
        ClientSettings {
            enterprise_token: env_token
                .filter(|t| !t.trim().is_empty())
                .or_else(|| self.enterprise.token.clone()),
            allow_insecure_enterprise_tls: self.enterprise.allow_insecure_tls,
            timeout: Duration::from_secs(self.network.timeout_secs.max(1)),
        }
    }

    pub fn layout(&self, workdir: &Path) -> LocalLayout {
        LocalLayout::under(workdir, &self.download.target_root)
    }
}

fn repo_matches(repo: &RepoSource, name: &str) -> bool {
    let name = name.trim();
    repo.slug() == name || repo.identity() == name
}

fn invalid(key: &str, message: &str) -> HubError {
    HubError::ConfigValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(key, &format!("'{}' is not a number: {}", value, e)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, &format!("'{}' is not a boolean", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_matches_defaults() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        let defaults = Config::default();
        assert_eq!(config.list(), defaults.list());
        assert_eq!(config.repos, defaults.repos);
    }

    #[test]
    fn init_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = Config::init(dir.path()).unwrap();
        fs::write(&path, "[cache]\nttl_ms = 5\n").unwrap();

        Config::init(dir.path()).unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.cache.ttl_ms, 5);
        assert_eq!(config.repos, default_repos());
    }

    #[test]
    fn config_get_set() {
        let mut config = Config::default();

        config.set("cache.ttl_ms", "1000").unwrap();
        config.set("enterprise.allow_insecure_tls", "yes").unwrap();
        config.set("download.target_root", "content").unwrap();

        assert_eq!(config.get("cache.ttl_ms").as_deref(), Some("1000"));
        assert_eq!(config.ttl(), Duration::from_millis(1000));
        assert!(config.enterprise.allow_insecure_tls);
        assert_eq!(config.layout(Path::new("/w")).root(), Path::new("/w/content"));
    }

    #[test]
    fn config_set_rejects_bad_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("cache.ttl_ms", "soon"),
            Err(HubError::ConfigValue { .. })
        ));
        assert!(matches!(
            config.set("network.max_concurrency", "0"),
            Err(HubError::ConfigValue { .. })
        ));
        assert!(matches!(
            config.set("nope.key", "1"),
            Err(HubError::ConfigKeyNotFound { .. })
        ));
    }

    #[test]
    fn token_is_masked_in_listing() {
        let mut config = Config::default();
        config.set("enterprise.token", "secret").unwrap();
        assert_eq!(config.get("enterprise.token").as_deref(), Some("(set)"));
        config.set("enterprise.token", "").unwrap();
        assert_eq!(config.enterprise.token, None);
    }

    #[test]
    fn env_token_wins() {
        let mut config = Config::default();
        config.enterprise.token = Some("file".to_string());

        let settings = config.client_settings_with(Some("env".to_string()));
        assert_eq!(settings.enterprise_token.as_deref(), Some("env"));

        let settings = config.client_settings_with(Some("  ".to_string()));
        assert_eq!(settings.enterprise_token.as_deref(), Some("file"));
    }

    #[test]
    fn repo_add_remove_map() {
        let mut config = Config::default();
        config
            .add_repo(RepoSource::new("acme", "prompts").with_base_url("https://ghe.acme"))
            .unwrap();
        assert!(matches!(
            config.add_repo(RepoSource::new("github", "awesome-copilot")),
            Err(HubError::RepoAlreadyExists { .. })
        ));

        config
            .map_folder("acme/prompts", Category::Agents, Some(FolderTarget::Excluded))
            .unwrap();
        config
            .map_folder("acme/prompts", Category::Skills, Some(FolderTarget::Root))
            .unwrap();

        let dir = TempDir::new().unwrap();
        config.save(dir.path()).unwrap();
        let saved = fs::read_to_string(Config::path(dir.path())).unwrap();
        assert!(saved.contains("agents = \"none\""));
        assert!(saved.contains("skills = \"root\""));

        let loaded = Config::load(dir.path()).unwrap();
        let repo = loaded.find_repo("acme/prompts").unwrap();
        assert_eq!(
            repo.folder_mappings.get(&Category::Agents),
            Some(&FolderTarget::Excluded)
        );

        let mut loaded = loaded;
        loaded
            .map_folder("acme/prompts", Category::Agents, None)
            .unwrap();
        loaded.remove_repo("acme/prompts").unwrap();
        assert!(matches!(
            loaded.remove_repo("acme/prompts"),
            Err(HubError::RepoNotFound { .. })
        ));
    }

    #[test]
    fn bad_toml_reports_path() {
        let dir = TempDir::new().unwrap();
        fs::write(Config::path(dir.path()), "[cache\n").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, HubError::ConfigParse { .. }));
    }
}
