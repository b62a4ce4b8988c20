//! Cached, deduplicated listings across every configured repository

use std::sync::{Mutex, PoisonError, RwLock};

use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::cache::{cache_key, CacheEntry, ContentCache, InFlightGuard};
use crate::category::Category;
use crate::content::{assign_display_names, ContentEntry};
use crate::download::{BundleDownloader, LocalLayout};
use crate::error::{HubError, Result};
use crate::interaction::SignInReason;
use crate::remote::RemoteContentClient;
use crate::repo::RepoSource;

/// Listing merged over all repositories.
///
/// A failing repository does not hide the others; its error is kept here.
#[derive(Debug, Default)]
pub struct CategoryListing {
    pub category: Option<Category>,
    pub entries: Vec<ContentEntry>,
    pub errors: Vec<HubError>,
}

impl CategoryListing {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sole owner of the listing cache and the in-flight guard
pub struct ContentService {
    client: RemoteContentClient,
    repos: RwLock<Vec<RepoSource>>,
    cache: Mutex<ContentCache>,
    in_flight: InFlightGuard,
    auth_checked: OnceCell<()>,
    max_concurrency: usize,
}

impl ContentService {
    pub fn new(client: RemoteContentClient, repos: Vec<RepoSource>, cache: ContentCache) -> Self {
        Self {
            client,
            repos: RwLock::new(repos),
            cache: Mutex::new(cache),
            in_flight: InFlightGuard::new(),
            auth_checked: OnceCell::new(),
            max_concurrency: crate::download::DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn client(&self) -> &RemoteContentClient {
        &self.client
    }

    pub fn repos(&self) -> Vec<RepoSource> {
        self.repos
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the repository list. Repositories that were removed, or whose
    /// branch or folder mappings changed, lose their cached listings.
    pub fn set_repos(&self, repos: Vec<RepoSource>) {
        let mut current = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        for old in current.iter() {
            let identity = old.identity();
            let unchanged = repos.iter().any(|new| {
                new.identity() == identity
                    && new.folder_mappings == old.folder_mappings
                    && new.branch == old.branch
            });
            if !unchanged {
                let dropped = cache.invalidate_repo(&identity);
                debug!("Invalidated {} cached listings for {}", dropped, identity);
            }
        }
        *current = repos;
    }

    // ========== Listings ==========

    /// One repository, one category. Served from cache while fresh; concurrent
    /// callers for the same key share a single remote request.
    pub async fn fetch_category(
        &self,
        repo: &RepoSource,
        category: Category,
    ) -> Result<Vec<ContentEntry>> {
        let key = cache_key(&repo.identity(), category);
        if let Some(hit) = self.cached(&key) {
            debug!("Cache hit: {}", key);
            return Ok(hit);
        }

        let _permit = self.in_flight.acquire(&key).await;
        if let Some(hit) = self.cached(&key) {
            debug!("Cache filled while waiting: {}", key);
            return Ok(hit);
        }

        debug!("Cache miss: {}", key);
        let entries = self.client.list_category(repo, category).await?;
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(
                key,
                CacheEntry::new(category, repo.identity(), entries.clone()),
            );
        Ok(entries)
    }

    /// All repositories for `category`, with colliding names disambiguated
    pub async fn fetch_merged(&self, category: Category) -> CategoryListing {
        self.ensure_authenticated().await;

        let repos = self.repos();
        let results = join_all(repos.iter().map(|repo| self.fetch_category(repo, category))).await;

        let mut listing = CategoryListing {
            category: Some(category),
            ..CategoryListing::default()
        };
        for result in results {
            match result {
                Ok(entries) => listing.entries.extend(entries),
                Err(e) => listing.errors.push(e),
            }
        }
        assign_display_names(&mut listing.entries);
        listing
    }

    /// Find an entry by display name or plain name, optionally restricted to
    /// one repository (`owner/repo`).
    pub async fn find_entry(
        &self,
        category: Category,
        name: &str,
        repo: Option<&str>,
    ) -> Result<ContentEntry> {
        let listing = self.fetch_merged(category).await;
        let candidates: Vec<&ContentEntry> = listing
            .entries
            .iter()
            .filter(|e| repo.map_or(true, |slug| e.repo.slug() == slug))
            .collect();

        if let Some(exact) = candidates.iter().find(|e| e.display_name == name) {
            return Ok((*exact).clone());
        }
        let mut by_name = candidates.iter().filter(|e| e.name == name);
        match (by_name.next(), by_name.next()) {
            (Some(only), None) => Ok((*only).clone()),
            (Some(_), Some(_)) => Err(HubError::ContentNotFound {
                name: format!("{} is ambiguous; pass --repo owner/repo", name),
            }),
            (None, _) => match listing.errors.into_iter().next() {
                Some(err) => Err(err),
                None => Err(HubError::ContentNotFound {
                    name: format!("{} in {}", name, category),
                }),
            },
        }
    }

    /// Before the first bulk fetch: when no repository has any credential,
    /// offer sign-in once. Later calls are no-ops.
    pub async fn ensure_authenticated(&self) {
        self.auth_checked
            .get_or_init(|| async {
                let repos = self.repos();
                for repo in &repos {
                    if self.client.has_credential(repo).await {
                        return;
                    }
                }
                if !self
                    .client
                    .interaction()
                    .offer_sign_in(&SignInReason::NoCredentials)
                {
                    debug!("Continuing without credentials");
                    return;
                }
                let target = repos
                    .first()
                    .cloned()
                    .unwrap_or_else(|| RepoSource::new("github", "github"));
                if self.client.sign_in(&target).await {
                    info!("Signed in");
                }
            })
            .await;
    }

    // ========== Downloads ==========

    pub fn downloader(&self, layout: LocalLayout) -> BundleDownloader<'_> {
        BundleDownloader::new(&self.client, layout).with_max_concurrency(self.max_concurrency)
    }

    // ========== Cache surface ==========

    fn cached(&self, key: &str) -> Option<Vec<ContentEntry>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| entry.data.clone())
    }

    pub fn invalidate_repo(&self, repo: &RepoSource) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate_repo(&repo.identity())
    }

    pub fn invalidate_key(&self, repo: &RepoSource, category: Category) -> bool {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate_key(&repo.identity(), category)
    }

    pub fn invalidate_category(&self, category: Category) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .invalidate_category(category)
    }

    pub fn clear_cache(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Cached keys with item counts and ages, then any fetches in flight
    pub fn cache_status(&self) -> String {
        let mut status = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .status();
        for key in self.in_flight.in_flight_keys() {
            status.push_str(&format!("\n{} (fetching)", key));
        }
        status
    }
}
