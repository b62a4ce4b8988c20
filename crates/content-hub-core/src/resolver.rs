//! Remote path resolution for (repository, category) pairs

use crate::category::Category;
use crate::repo::{FolderTarget, RepoSource};

/// Remote folder backing `category` in `repo`.
///
/// `None` means the category is excluded for this repository and no request
/// must be issued. `Some("")` means the repository root.
pub fn resolve(repo: &RepoSource, category: Category) -> Option<String> {
    match repo.folder_mappings.get(&category) {
        Some(FolderTarget::Excluded) => None,
        Some(FolderTarget::Root) => Some(String::new()),
        Some(FolderTarget::Path(path)) if !path.trim().is_empty() => {
            Some(path.trim().to_string())
        }
        _ => Some(category.dir_name().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn category_strategy() -> impl Strategy<Value = Category> {
        prop::sample::select(Category::ALL.to_vec())
    }

    #[test]
    fn default_is_category_name() {
        let repo = RepoSource::new("o", "r");
        assert_eq!(resolve(&repo, Category::Prompts).as_deref(), Some("prompts"));
    }

    #[test]
    fn blank_mapping_falls_back_to_default() {
        let repo = RepoSource::new("o", "r")
            .with_mapping(Category::Agents, FolderTarget::Path("   ".to_string()));
        assert_eq!(resolve(&repo, Category::Agents).as_deref(), Some("agents"));
    }

    #[test]
    fn custom_mapping_is_trimmed() {
        let repo = RepoSource::new("o", "r")
            .with_mapping(Category::Skills, FolderTarget::Path(" .github/skills ".into()));
        assert_eq!(
            resolve(&repo, Category::Skills).as_deref(),
            Some(".github/skills")
        );
    }

    proptest! {
        #[test]
        fn excluded_always_resolves_to_none(category in category_strategy()) {
            let repo = RepoSource::new("o", "r").with_mapping(category, FolderTarget::Excluded);
            prop_assert_eq!(resolve(&repo, category), None);
        }

        #[test]
        fn root_always_resolves_to_empty(category in category_strategy()) {
            let repo = RepoSource::new("o", "r").with_mapping(category, FolderTarget::Root);
            prop_assert_eq!(resolve(&repo, category), Some(String::new()));
        }

        #[test]
        fn custom_path_resolves_trimmed(
            category in category_strategy(),
            path in "[a-z][a-z0-9/_-]{0,20}",
            pad in " {0,3}",
        ) {
            let mapped = format!("{pad}{path}{pad}");
            let repo = RepoSource::new("o", "r")
                .with_mapping(category, FolderTarget::Path(mapped));
            prop_assert_eq!(resolve(&repo, category), Some(path));
        }

        #[test]
        fn mapping_for_other_category_is_ignored(
            mapped in category_strategy(),
            queried in category_strategy(),
        ) {
            prop_assume!(mapped != queried);
            let repo = RepoSource::new("o", "r").with_mapping(mapped, FolderTarget::Excluded);
            prop_assert_eq!(
                resolve(&repo, queried),
                Some(queried.dir_name().to_string())
            );
        }
    }
}
