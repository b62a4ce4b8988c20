//! Remote content entries and cross-repository merging

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::repo::RepoSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

/// A file or directory discovered in a remote repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    /// Repository-relative path
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    /// Raw download locator (absent for directories)
    pub download_url: Option<String>,
    pub sha: Option<String>,
    pub repo: RepoSource,
    /// Name shown to users; disambiguated after merging
    pub display_name: String,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// Key used by the download ledger
    pub fn item_id(&self, category: Category) -> String {
        format!("{}|{}|{}", self.repo.identity(), category, self.path)
    }
}

/// Disambiguate names that occur in more than one repository.
///
/// Every entry whose name is shared by at least two distinct repositories is
/// renamed to `"{name} ({owner}/{repo})"`; the rest keep their plain name.
pub fn assign_display_names(entries: &mut [ContentEntry]) {
    let mut repos_by_name: HashMap<&str, HashSet<String>> = HashMap::new();
    for entry in entries.iter() {
        repos_by_name
            .entry(entry.name.as_str())
            .or_default()
            .insert(entry.repo.identity());
    }

    let colliding: HashSet<String> = repos_by_name
        .into_iter()
        .filter(|(_, repos)| repos.len() >= 2)
        .map(|(name, _)| name.to_string())
        .collect();

    for entry in entries.iter_mut() {
        entry.display_name = if colliding.contains(&entry.name) {
            format!("{} ({})", entry.name, entry.repo.slug())
        } else {
            entry.name.clone()
        };
    }
}

#[cfg(test)]
pub(crate) fn test_entry(repo: &RepoSource, path: &str, kind: EntryKind) -> ContentEntry {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    ContentEntry {
        display_name: name.clone(),
        name,
        path: path.to_string(),
        kind,
        size: 0,
        download_url: None,
        sha: Some(format!("sha-{path}")),
        repo: repo.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colliding_names_get_repo_suffix() {
        let a = RepoSource::new("alice", "one");
        let b = RepoSource::new("bob", "two");
        let mut entries = vec![
            test_entry(&a, "agents/x.md", EntryKind::File),
            test_entry(&b, "agents/x.md", EntryKind::File),
            test_entry(&a, "agents/unique.md", EntryKind::File),
        ];

        assign_display_names(&mut entries);

        assert_eq!(entries[0].display_name, "x.md (alice/one)");
        assert_eq!(entries[1].display_name, "x.md (bob/two)");
        assert_eq!(entries[2].display_name, "unique.md");
    }

    #[test]
    fn same_name_within_one_repo_is_not_a_collision() {
        let a = RepoSource::new("alice", "one");
        let mut entries = vec![
            test_entry(&a, "agents/x.md", EntryKind::File),
            test_entry(&a, "other/x.md", EntryKind::File),
        ];

        assign_display_names(&mut entries);

        assert!(entries.iter().all(|e| e.display_name == "x.md"));
    }

    #[test]
    fn item_id_includes_repo_and_category() {
        let a = RepoSource::new("alice", "one");
        let entry = test_entry(&a, "prompts/p.prompt.md", EntryKind::File);
        assert_eq!(
            entry.item_id(Category::Prompts),
            "default-host/alice/one|prompts|prompts/p.prompt.md"
        );
    }
}
