//! In-memory listing cache with TTL and an in-flight request guard
//!
//! Both are owned by a single `ContentService`; nothing else mutates them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use crate::category::Category;
use crate::content::ContentEntry;

/// Default time-to-live for cached listings (one hour)
pub const DEFAULT_TTL: Duration = Duration::from_millis(3_600_000);

/// Cache key for a (repository, category) listing
pub fn cache_key(repo_identity: &str, category: Category) -> String {
    format!("{}|{}", repo_identity, category)
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub category: Category,
    pub repo: String,
    pub data: Vec<ContentEntry>,
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(category: Category, repo: impl Into<String>, data: Vec<ContentEntry>) -> Self {
        Self {
            category,
            repo: repo.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

/// TTL-bounded listing cache keyed by `"{repoIdentity}|{category}"`
#[derive(Debug)]
pub struct ContentCache {
    entries: BTreeMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ContentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.get_at(key, Utc::now())
    }

    /// Entry for `key` if it is still fresh at `now`
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        self.entries
            .get(key)
            .filter(|entry| entry.age_at(now) < ttl)
    }

    pub fn set(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry belonging to one repository
    pub fn invalidate_repo(&mut self, repo_identity: &str) -> usize {
        let prefix = format!("{}|", repo_identity);
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(&prefix));
        before - self.entries.len()
    }

    pub fn invalidate_key(&mut self, repo_identity: &str, category: Category) -> bool {
        self.invalidate(&cache_key(repo_identity, category))
    }

    /// Drop one category across all repositories
    pub fn invalidate_category(&mut self, category: Category) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.category != category);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diagnostic summary: one line per key with item count and age
    pub fn status(&self) -> String {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> String {
        if self.entries.is_empty() {
            return "Cache is empty".to_string();
        }

        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let mut lines = vec![format!(
            "{} cached listing(s), ttl {}s",
            self.entries.len(),
            self.ttl.as_secs()
        )];
        for (key, entry) in &self.entries {
            let age = entry.age_at(now);
            let state = if age < ttl { "" } else { " (expired)" };
            lines.push(format!(
                "  {}: {} item(s), age {}s{}",
                key,
                entry.data.len(),
                age.num_seconds().max(0),
                state
            ));
        }
        lines.join("\n")
    }
}

/// Guarantees at most one outstanding fetch per cache key.
///
/// A second caller for the same key waits on the first caller's permit, then
/// re-reads the cache instead of issuing its own request.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held while a fetch for `key` is outstanding
#[derive(Debug)]
pub struct InFlightPermit {
    _guard: OwnedMutexGuard<()>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> InFlightPermit {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.to_string()).or_default().clone()
        };
        InFlightPermit {
            _guard: lock.lock_owned().await,
        }
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Keys currently being fetched
    pub fn in_flight_keys(&self) -> Vec<String> {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = locks
            .iter()
            .filter(|(_, lock)| lock.try_lock().is_err())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(category: Category, repo: &str) -> CacheEntry {
        CacheEntry::new(category, repo, Vec::new())
    }

    #[test]
    fn fresh_entry_is_returned() {
        let mut cache = ContentCache::new(Duration::from_secs(60));
        cache.set("r|agents", entry(Category::Agents, "r"));
        assert!(cache.get("r|agents").is_some());
    }

    #[test]
    fn expired_entry_is_hidden() {
        let mut cache = ContentCache::new(Duration::from_secs(60));
        cache.set("r|agents", entry(Category::Agents, "r"));

        let later = Utc::now() + chrono::Duration::seconds(61);
        assert!(cache.get_at("r|agents", later).is_none());
        assert!(cache.status_at(later).contains("(expired)"));
    }

    #[test]
    fn invalidate_by_repo_prefix() {
        let mut cache = ContentCache::default();
        cache.set(cache_key("h/a/b", Category::Agents), entry(Category::Agents, "h/a/b"));
        cache.set(cache_key("h/a/b", Category::Skills), entry(Category::Skills, "h/a/b"));
        cache.set(cache_key("h/a/bc", Category::Agents), entry(Category::Agents, "h/a/bc"));

        assert_eq!(cache.invalidate_repo("h/a/b"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&cache_key("h/a/bc", Category::Agents)).is_some());
    }

    #[test]
    fn invalidate_by_key_and_category() {
        let mut cache = ContentCache::default();
        cache.set(cache_key("x", Category::Agents), entry(Category::Agents, "x"));
        cache.set(cache_key("y", Category::Agents), entry(Category::Agents, "y"));
        cache.set(cache_key("y", Category::Prompts), entry(Category::Prompts, "y"));

        assert!(cache.invalidate_key("x", Category::Agents));
        assert!(!cache.invalidate_key("x", Category::Agents));
        assert_eq!(cache.invalidate_category(Category::Agents), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.status(), "Cache is empty");
    }

    #[test]
    fn status_lists_counts() {
        let mut cache = ContentCache::default();
        cache.set("k|agents", entry(Category::Agents, "k"));
        let status = cache.status();
        assert!(status.contains("1 cached listing(s)"));
        assert!(status.contains("k|agents: 0 item(s)"));
    }

    #[tokio::test]
    async fn in_flight_guard_serializes_same_key() {
        let guard = InFlightGuard::new();
        let permit = guard.acquire("a").await;
        assert!(guard.is_in_flight("a"));
        assert!(!guard.is_in_flight("b"));
        assert_eq!(guard.in_flight_keys(), vec!["a".to_string()]);

        drop(permit);
        assert!(!guard.is_in_flight("a"));
        let _again = guard.acquire("a").await;
    }
}
