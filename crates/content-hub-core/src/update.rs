//! Download ledger and update detection
//!
//! Every successful download leaves a [`DownloadRecord`] keyed by item id.
//! A later listing that reports a different remote sha for the same id is an
//! available update.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::category::Category;
use crate::content::ContentEntry;
use crate::error::Result;

pub const LEDGER_FILENAME: &str = "downloads.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

impl DownloadRecord {
    pub fn new(item_id: impl Into<String>, sha: Option<String>, content: Option<&[u8]>) -> Self {
        Self {
            item_id: item_id.into(),
            sha,
            content_hash: content.map(compute_hash),
            downloaded_at: Utc::now(),
        }
    }
}

/// Entry whose remote version moved past the recorded one
#[derive(Debug, Clone)]
pub struct UpdateCandidate {
    pub entry: ContentEntry,
    pub category: Category,
    pub recorded: DownloadRecord,
}

pub trait UpdateDetector {
    fn record(&mut self, record: DownloadRecord);

    /// `true` only when both shas are known and differ
    fn has_update(&self, item_id: &str, remote_sha: Option<&str>) -> bool;
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DownloadLedger {
    #[serde(default)]
    records: BTreeMap<String, DownloadRecord>,
}

impl DownloadLedger {
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(LEDGER_FILENAME)
    }

    /// Load from `base_dir`; a missing file is an empty ledger
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = Self::path(base_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir)?;
        let content = toml::to_string_pretty(self)?;
        fs::write(Self::path(base_dir), content)?;
        Ok(())
    }

    pub fn get(&self, item_id: &str) -> Option<&DownloadRecord> {
        self.records.get(item_id)
    }

    pub fn remove(&mut self, item_id: &str) -> Option<DownloadRecord> {
        self.records.remove(item_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &DownloadRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entries of `category` that were downloaded before and changed since
    pub fn check(&self, entries: &[ContentEntry], category: Category) -> Vec<UpdateCandidate> {
        entries
            .iter()
            .filter_map(|entry| {
                let id = entry.item_id(category);
                if !self.has_update(&id, entry.sha.as_deref()) {
                    return None;
                }
                self.records.get(&id).map(|recorded| UpdateCandidate {
                    entry: entry.clone(),
                    category,
                    recorded: recorded.clone(),
                })
            })
            .collect()
    }
}

impl UpdateDetector for DownloadLedger {
    fn record(&mut self, record: DownloadRecord) {
        self.records.insert(record.item_id.clone(), record);
    }

    fn has_update(&self, item_id: &str, remote_sha: Option<&str>) -> bool {
        match (self.records.get(item_id).and_then(|r| r.sha.as_deref()), remote_sha) {
            (Some(recorded), Some(remote)) => recorded != remote,
            _ => false,
        }
    }
}

pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{test_entry, EntryKind};
    use crate::repo::RepoSource;
    use tempfile::TempDir;

    #[test]
    fn hash_is_prefixed_sha256() {
        let hash = compute_hash(b"hello");
        assert_eq!(
            hash,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn update_requires_both_shas() {
        let mut ledger = DownloadLedger::default();
        ledger.record(DownloadRecord::new("a", Some("v1".into()), None));
        ledger.record(DownloadRecord::new("b", None, Some(b"x".as_slice())));

        assert!(!ledger.has_update("a", Some("v1")));
        assert!(ledger.has_update("a", Some("v2")));
        assert!(!ledger.has_update("a", None));
        assert!(!ledger.has_update("b", Some("v2")));
        assert!(!ledger.has_update("missing", Some("v2")));
    }

    #[test]
    fn check_reports_changed_entries_only() {
        let repo = RepoSource::new("o", "r");
        let mut changed = test_entry(&repo, "agents/a.md", EntryKind::File);
        let same = test_entry(&repo, "agents/b.md", EntryKind::File);
        let never = test_entry(&repo, "agents/c.md", EntryKind::File);

        let mut ledger = DownloadLedger::default();
        ledger.record(DownloadRecord::new(
            changed.item_id(Category::Agents),
            changed.sha.clone(),
            None,
        ));
        ledger.record(DownloadRecord::new(
            same.item_id(Category::Agents),
            same.sha.clone(),
            None,
        ));
        changed.sha = Some("newer".to_string());

        let updates = ledger.check(&[changed, same, never], Category::Agents);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].entry.path, "agents/a.md");
        assert_eq!(updates[0].recorded.sha.as_deref(), Some("sha-agents/a.md"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut ledger = DownloadLedger::default();
        ledger.record(DownloadRecord::new(
            "default-host/o/r|skills|skills/x",
            Some("abc".into()),
            Some(b"body".as_slice()),
        ));
        ledger.save(dir.path()).unwrap();

        let loaded = DownloadLedger::load(dir.path()).unwrap();
        let record = loaded.get("default-host/o/r|skills|skills/x").unwrap();
        assert_eq!(record.sha.as_deref(), Some("abc"));
        assert_eq!(record.content_hash.as_deref(), Some(compute_hash(b"body").as_str()));
    }

    #[test]
    fn missing_ledger_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(DownloadLedger::load(dir.path()).unwrap().is_empty());
    }
}
