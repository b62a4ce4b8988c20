//! Materializing remote content on disk
//!
//! - `layout`: where each category lands locally
//! - `listing`: bounded recursive listing of remote directories
//! - `bundle`: single files, directory bundles and plugin bundles
//! - `companion`: usage note generated for plugins

mod bundle;
mod companion;
mod layout;
mod listing;

pub use bundle::{BundleDownloader, BundleReport, BundleStage, Download, DownloadOutcome};
pub use companion::{advertised_commands, companion_note, COMPANION_NOTE};
pub use layout::{safe_join, LocalLayout, DEFAULT_TARGET_ROOT};
pub use listing::{list_recursive, relative_path, DEFAULT_MAX_CONCURRENCY};
