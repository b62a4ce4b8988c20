//! Discovery, caching and download of agent content hosted in GitHub
//! repositories.
//!
//! Content comes in five categories (agents, instructions, plugins, prompts,
//! skills). [`ContentService`] lists them across every configured
//! [`RepoSource`], [`BundleDownloader`] writes them to disk, and
//! [`DownloadLedger`] remembers what was downloaded so newer remote versions
//! can be reported.

pub mod cache;
pub mod category;
pub mod config;
pub mod content;
pub mod download;
pub mod error;
pub mod interaction;
pub mod manifest;
pub mod remote;
pub mod repo;
pub mod resolver;
pub mod service;
pub mod update;

pub use cache::{cache_key, CacheEntry, ContentCache, InFlightGuard, DEFAULT_TTL};
pub use category::Category;
pub use config::Config;
pub use content::{assign_display_names, ContentEntry, EntryKind};
pub use download::{
    BundleDownloader, BundleReport, BundleStage, Download, DownloadOutcome, LocalLayout,
};
pub use error::{ErrorClass, HubError, Result};
pub use interaction::{Interaction, NonInteractive, SignInReason};
pub use manifest::{parse_manifest, ItemKind, ManifestError, PluginItem, PluginManifest};
pub use remote::{
    ClientSettings, CredentialProvider, GhCliCredentials, RemoteContentClient, ReqwestTransport,
    StaticCredentials, TlsPolicy, Transport,
};
pub use repo::{FolderMappings, FolderTarget, RepoSource};
pub use resolver::resolve;
pub use service::{CategoryListing, ContentService};
pub use update::{compute_hash, DownloadLedger, DownloadRecord, UpdateCandidate, UpdateDetector};
