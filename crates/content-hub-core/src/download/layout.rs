//! Local destination layout

use std::path::{Component, Path, PathBuf};

use crate::category::Category;
use crate::error::{HubError, Result};

pub const DEFAULT_TARGET_ROOT: &str = ".github";

/// `{root}/{category}/` on disk, independent of remote folder mappings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLayout {
    root: PathBuf,
}

impl LocalLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `target_root` beneath `workdir` unless it is already absolute
    pub fn under(workdir: &Path, target_root: &Path) -> Self {
        if target_root.is_absolute() {
            Self::new(target_root)
        } else {
            Self::new(workdir.join(target_root))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Local folder holding a plugin's manifest copy, README and usage note
    pub fn plugin_dir(&self, bundle_id: &str) -> Result<PathBuf> {
        safe_join(&self.category_dir(Category::Plugins), bundle_id)
    }
}

/// Join a remote-supplied relative path, rejecting anything that would
/// escape `base`.
pub fn safe_join(base: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    let mut joined = base.to_path_buf();
    let mut depth = 0usize;

    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(HubError::PathTraversal {
                    path: relative.to_string(),
                });
            }
        }
    }

    if depth == 0 {
        return Err(HubError::PathTraversal {
            path: relative.to_string(),
        });
    }
    Ok(joined)
}

/// Final segment of a repository path
pub fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}

/// Whether the final segment looks like a file name
pub fn has_extension(path: &str) -> bool {
    let last = last_segment(path);
    matches!(last.rfind('.'), Some(i) if i > 0 && i + 1 < last.len())
}
