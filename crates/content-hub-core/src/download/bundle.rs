use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::category::Category;
use crate::content::ContentEntry;
use crate::error::{HubError, Result};
use crate::manifest::{manifest_path, parse_manifest, ItemKind, ManifestError, PluginItem};
use crate::remote::{RemoteContentClient, RemoteFile};
use crate::repo::RepoSource;
use crate::update::DownloadRecord;

use super::companion::{companion_note, COMPANION_NOTE};
use super::layout::{has_extension, last_segment, safe_join, LocalLayout};
use super::listing::{list_recursive, relative_path, DEFAULT_MAX_CONCURRENCY};

const MANIFEST_COPY: &str = "plugin.json";
const README: &str = "README.md";
const STAGING_PREFIX: &str = ".content-hub-staging-";

/// Progress of one download invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStage {
    Idle,
    Resolving,
    Fetching,
    Writing,
    Recorded,
    Done,
}

impl fmt::Display for BundleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Writing => "writing",
            Self::Recorded => "recorded",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

struct StageLog<'a> {
    bundle: &'a str,
    current: BundleStage,
}

impl<'a> StageLog<'a> {
    fn new(bundle: &'a str) -> Self {
        Self {
            bundle,
            current: BundleStage::Idle,
        }
    }

    fn enter(&mut self, next: BundleStage) {
        debug!("{}: {} -> {}", self.bundle, self.current, next);
        self.current = next;
    }
}

/// Outcome of a directory or plugin download.
///
/// Partial failure is not an error: failed items are counted here.
#[derive(Debug, Default)]
pub struct BundleReport {
    pub bundle_id: String,
    pub target: PathBuf,
    pub downloaded_count: usize,
    pub error_count: usize,
    pub failed_paths: Vec<String>,
    pub written: Vec<PathBuf>,
    pub records: Vec<DownloadRecord>,
    /// The user declined to replace an existing folder
    pub skipped: bool,
}

impl BundleReport {
    fn new(bundle_id: &str, target: PathBuf) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            target,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.skipped && self.error_count == 0
    }
}

/// Outcome of a single-file download
#[derive(Debug)]
pub enum DownloadOutcome {
    Written {
        path: PathBuf,
        record: DownloadRecord,
    },
    /// Target existed and overwrite was declined
    Skipped { path: PathBuf },
    /// No filename was chosen
    Cancelled,
}

#[derive(Debug)]
pub enum Download {
    File(DownloadOutcome),
    Bundle(BundleReport),
}

impl Download {
    pub fn records(&self) -> Vec<DownloadRecord> {
        match self {
            Self::File(DownloadOutcome::Written { record, .. }) => vec![record.clone()],
            Self::File(_) => Vec::new(),
            Self::Bundle(report) => report.records.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Keep paths relative to the bundle root
    Mirror,
    /// Drop directory structure, keep file names
    Flatten,
}

#[derive(Default)]
struct TreeTally {
    written: Vec<PathBuf>,
    failed: Vec<(String, HubError)>,
}

impl TreeTally {
    fn into_result(self) -> Result<Vec<PathBuf>> {
        let mut failed = self.failed.into_iter();
        match failed.next() {
            None => Ok(self.written),
            Some((_, first)) => Err(first),
        }
    }
}

/// Materializes remote files, directories and plugins under a [`LocalLayout`]
pub struct BundleDownloader<'a> {
    client: &'a RemoteContentClient,
    layout: LocalLayout,
    max_concurrency: usize,
}

impl<'a> BundleDownloader<'a> {
    pub fn new(client: &'a RemoteContentClient, layout: LocalLayout) -> Self {
        Self {
            client,
            layout,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    pub fn layout(&self) -> &LocalLayout {
        &self.layout
    }

    /// Pick the algorithm from the entry kind and category
    pub async fn download(&self, entry: &ContentEntry, category: Category) -> Result<Download> {
        if !entry.is_dir() {
            return Ok(Download::File(self.download_file(entry, category).await?));
        }
        let report = if category == Category::Plugins {
            self.download_plugin(entry).await?
        } else {
            self.download_directory(entry, category).await?
        };
        Ok(Download::Bundle(report))
    }

    // ========== Single file ==========

    pub async fn download_file(
        &self,
        entry: &ContentEntry,
        category: Category,
    ) -> Result<DownloadOutcome> {
        let interaction = self.client.interaction();
        let Some(filename) = interaction.choose_filename(&entry.name) else {
            return Ok(DownloadOutcome::Cancelled);
        };
        let filename = filename.trim();
        if filename.is_empty() {
            return Ok(DownloadOutcome::Cancelled);
        }
        if filename.contains(['/', '\\']) {
            return Err(HubError::PathTraversal {
                path: filename.to_string(),
            });
        }

        let target = safe_join(&self.layout.category_dir(category), filename)?;
        if fs::try_exists(&target).await? && !interaction.confirm_overwrite(&target) {
            debug!("Keeping existing {}", target.display());
            return Ok(DownloadOutcome::Skipped { path: target });
        }

        let file = self.write_remote_file(&entry.repo, &entry.path, &target).await?;
        let record = DownloadRecord::new(
            entry.item_id(category),
            entry.sha.clone().or(file.sha),
            Some(file.bytes.as_slice()),
        );
        info!("Downloaded {} to {}", entry.path, target.display());
        Ok(DownloadOutcome::Written {
            path: target,
            record,
        })
    }

    // ========== Directory bundle ==========

    pub async fn download_directory(
        &self,
        entry: &ContentEntry,
        category: Category,
    ) -> Result<BundleReport> {
        let mut stage = StageLog::new(&entry.name);
        stage.enter(BundleStage::Resolving);

        let target = safe_join(&self.layout.category_dir(category), &entry.name)?;
        let mut report = BundleReport::new(&entry.name, target.clone());
        let exists = fs::try_exists(&target).await?;
        if exists && !self.client.interaction().confirm_replace_dir(&target) {
            report.skipped = true;
            stage.enter(BundleStage::Done);
            return Ok(report);
        }
        let files =
            list_recursive(self.client, &entry.repo, &entry.path, self.max_concurrency).await?;

        stage.enter(BundleStage::Fetching);
        let tally = self
            .replace_tree(&entry.repo, &entry.path, files, &target)
            .await?;

        stage.enter(BundleStage::Writing);
        report.downloaded_count = tally.written.len();
        report.error_count = tally.failed.len();
        report.written = tally.written;
        for (path, err) in tally.failed {
            warn!("Failed to download {}: {}", path, err);
            report.failed_paths.push(path);
        }
        report.failed_paths.sort();

        if report.error_count == 0 {
            stage.enter(BundleStage::Recorded);
            report.records.push(DownloadRecord::new(
                entry.item_id(category),
                entry.sha.clone(),
                None,
            ));
        }
        stage.enter(BundleStage::Done);
        info!(
            "{}: {} files downloaded, {} failed",
            entry.name, report.downloaded_count, report.error_count
        );
        Ok(report)
    }

    // ========== Plugin bundle ==========

    /// Only manifest resolution is fatal; item failures are counted.
    pub async fn download_plugin(&self, entry: &ContentEntry) -> Result<BundleReport> {
        let mut stage = StageLog::new(&entry.name);
        stage.enter(BundleStage::Resolving);

        let manifest_file = self
            .client
            .fetch_file(&entry.repo, &manifest_path(&entry.path))
            .await?;
        let raw = std::str::from_utf8(&manifest_file.bytes)
            .map_err(|e| ManifestError::InvalidJson(e.to_string()))?;
        let manifest = parse_manifest(raw, &entry.path)?;
        let plugin_dir = self.layout.plugin_dir(&manifest.id)?;
        let mut report = BundleReport::new(&manifest.id, plugin_dir.clone());

        stage.enter(BundleStage::Fetching);
        let results: Vec<(PluginItem, Result<Vec<PathBuf>>)> = stream::iter(manifest.items.clone())
            .map(|item| async move {
                let outcome = self.download_item(&entry.repo, &item).await;
                (item, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (item, outcome) in results {
            match outcome {
                Ok(paths) => {
                    report.downloaded_count += 1;
                    report.written.extend(paths);
                }
                Err(e) => {
                    warn!("Plugin {}: {} {} failed: {}", manifest.id, item.kind, item.path, e);
                    report.error_count += 1;
                    report.failed_paths.push(item.path);
                }
            }
        }
        report.failed_paths.sort();

        stage.enter(BundleStage::Writing);
        self.persist_plugin_files(entry, &manifest.id, &plugin_dir, &manifest_file, &mut report)
            .await;

        stage.enter(BundleStage::Recorded);
        report.records.push(DownloadRecord::new(
            entry.item_id(Category::Plugins),
            entry.sha.clone().or_else(|| manifest_file.sha.clone()),
            Some(manifest_file.bytes.as_slice()),
        ));

        stage.enter(BundleStage::Done);
        info!(
            "Plugin {}: {} items downloaded, {} failed",
            manifest.id, report.downloaded_count, report.error_count
        );
        Ok(report)
    }

    async fn download_item(&self, repo: &RepoSource, item: &PluginItem) -> Result<Vec<PathBuf>> {
        let category_dir = self.layout.category_dir(item.kind.category());

        if item.kind == ItemKind::Skill {
            let target = safe_join(&category_dir, last_segment(&item.path))?;
            let files =
                list_recursive(self.client, repo, &item.path, self.max_concurrency).await?;
            self.replace_tree(repo, &item.path, files, &target)
                .await?
                .into_result()
        } else if !has_extension(&item.path) {
            self.fetch_tree(repo, &item.path, &category_dir, Placement::Flatten)
                .await?
                .into_result()
        } else {
            let target = safe_join(&category_dir, last_segment(&item.path))?;
            self.write_remote_file(repo, &item.path, &target).await?;
            Ok(vec![target])
        }
    }

    /// Manifest copy, README and usage note. Failures are logged only.
    async fn persist_plugin_files(
        &self,
        entry: &ContentEntry,
        bundle_id: &str,
        plugin_dir: &Path,
        manifest_file: &RemoteFile,
        report: &mut BundleReport,
    ) {
        if let Err(e) = fs::create_dir_all(plugin_dir).await {
            warn!("Cannot create {}: {}", plugin_dir.display(), e);
            return;
        }

        write_best_effort(&plugin_dir.join(MANIFEST_COPY), &manifest_file.bytes, report).await;

        let readme_path = format!("{}/{}", entry.path.trim_end_matches('/'), README);
        let readme = match self.client.fetch_file(&entry.repo, &readme_path).await {
            Ok(file) => Some(String::from_utf8_lossy(&file.bytes).into_owned()),
            Err(e) if e.is_not_found() => {
                debug!("{} has no README", bundle_id);
                None
            }
            Err(e) => {
                warn!("Could not fetch README for {}: {}", bundle_id, e);
                None
            }
        };
        if let Some(text) = &readme {
            write_best_effort(&plugin_dir.join(README), text.as_bytes(), report).await;
        }

        let note = companion_note(bundle_id, readme.as_deref());
        write_best_effort(&plugin_dir.join(COMPANION_NOTE), note.as_bytes(), report).await;
    }

    // ========== Shared ==========

    async fn fetch_tree(
        &self,
        repo: &RepoSource,
        remote_root: &str,
        dest: &Path,
        placement: Placement,
    ) -> Result<TreeTally> {
        let files = list_recursive(self.client, repo, remote_root, self.max_concurrency).await?;
        Ok(self.write_tree(repo, remote_root, files, dest, placement).await)
    }

    /// Mirror `files` into a staging folder next to `target`, then swap it in.
    ///
    /// The previous folder survives when every file failed.
    async fn replace_tree(
        &self,
        repo: &RepoSource,
        remote_root: &str,
        files: Vec<ContentEntry>,
        target: &Path,
    ) -> Result<TreeTally> {
        let parent = target.parent().ok_or_else(|| HubError::PathTraversal {
            path: target.display().to_string(),
        })?;
        fs::create_dir_all(parent).await?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(parent)?;

        let mut tally = self
            .write_tree(repo, remote_root, files, staging.path(), Placement::Mirror)
            .await;
        if tally.written.is_empty() && !tally.failed.is_empty() {
            debug!("Keeping {}: nothing was downloaded", target.display());
            return Ok(tally);
        }

        if fs::try_exists(target).await? {
            fs::remove_dir_all(target).await?;
        }
        fs::rename(staging.path(), target).await?;
        tally.written = tally
            .written
            .into_iter()
            .map(|path| {
                let rebased = path.strip_prefix(staging.path()).ok().map(|rel| target.join(rel));
                rebased.unwrap_or(path)
            })
            .collect();
        Ok(tally)
    }

    async fn write_tree(
        &self,
        repo: &RepoSource,
        remote_root: &str,
        files: Vec<ContentEntry>,
        dest: &Path,
        placement: Placement,
    ) -> TreeTally {
        let mut tally = TreeTally::default();

        // Flattening can map two remote files onto one local name; the first
        // in path order wins.
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();
        let mut planned = Vec::with_capacity(files.len());
        for file in files {
            let relative = match placement {
                Placement::Mirror => relative_path(remote_root, &file.path),
                Placement::Flatten => last_segment(&file.path),
            };
            let target = match safe_join(dest, relative) {
                Ok(target) => target,
                Err(e) => {
                    tally.failed.push((file.path, e));
                    continue;
                }
            };
            match claimed.entry(target.clone()) {
                Entry::Occupied(kept) => {
                    let err = HubError::NameCollision {
                        path: file.path.clone(),
                        kept: kept.get().clone(),
                    };
                    tally.failed.push((file.path, err));
                }
                Entry::Vacant(slot) => {
                    slot.insert(file.path.clone());
                    planned.push((file.path, target));
                }
            }
        }

        let results: Vec<(String, Result<PathBuf>)> = stream::iter(planned)
            .map(|(path, target)| async move {
                let outcome = self
                    .write_remote_file(repo, &path, &target)
                    .await
                    .map(|_| target);
                (path, outcome)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (path, outcome) in results {
            match outcome {
                Ok(target) => tally.written.push(target),
                Err(e) => tally.failed.push((path, e)),
            }
        }
        tally.written.sort();
        tally
    }

    async fn write_remote_file(
        &self,
        repo: &RepoSource,
        remote_path: &str,
        target: &Path,
    ) -> Result<RemoteFile> {
        let file = self.client.fetch_file(repo, remote_path).await?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(target, &file.bytes).await?;
        Ok(file)
    }
}

async fn write_best_effort(path: &Path, bytes: &[u8], report: &mut BundleReport) {
    match fs::write(path, bytes).await {
        Ok(()) => report.written.push(path.to_path_buf()),
        Err(e) => warn!("Could not write {}: {}", path.display(), e),
    }
}
