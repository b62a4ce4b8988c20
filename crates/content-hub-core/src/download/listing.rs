//! Recursive remote listing with a bounded worker pool

use futures::stream::{self, StreamExt};
use tracing::debug;

use crate::content::{ContentEntry, EntryKind};
use crate::error::Result;
use crate::remote::RemoteContentClient;
use crate::repo::RepoSource;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Every file beneath `root`, breadth first.
///
/// Each level lists at most `limit` directories at once. The first listing
/// error aborts the walk.
pub async fn list_recursive(
    client: &RemoteContentClient,
    repo: &RepoSource,
    root: &str,
    limit: usize,
) -> Result<Vec<ContentEntry>> {
    let mut files = Vec::new();
    let mut frontier = vec![root.trim_matches('/').to_string()];
    let mut level = 0usize;

    while !frontier.is_empty() {
        debug!("Listing {} dirs at depth {} under {}", frontier.len(), level, root);
        let listings: Vec<Result<Vec<ContentEntry>>> =
            stream::iter(std::mem::take(&mut frontier))
                .map(|dir| async move { client.list_directory(repo, &dir).await })
                .buffer_unordered(limit.max(1))
                .collect()
                .await;

        for listing in listings {
            for entry in listing? {
                match entry.kind {
                    EntryKind::Dir => frontier.push(entry.path),
                    EntryKind::File => files.push(entry),
                }
            }
        }
        level += 1;
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// `path` relative to `root`; paths outside `root` keep their final segment
pub fn relative_path<'a>(root: &str, path: &'a str) -> &'a str {
    let root = root.trim_matches('/');
    if root.is_empty() {
        return path.trim_start_matches('/');
    }
    path.strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or_else(|| super::layout::last_segment(path))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::interaction::NonInteractive;
    use crate::remote::testing::{contents_url, listing_json, FakeTransport};
    use crate::remote::{ClientSettings, StaticCredentials};

    fn client(transport: Arc<FakeTransport>) -> RemoteContentClient {
        RemoteContentClient::new(
            transport,
            Arc::new(StaticCredentials::anonymous()),
            Arc::new(NonInteractive::default()),
            ClientSettings::default(),
        )
    }

    #[tokio::test]
    async fn walks_nested_directories() {
        let repo = RepoSource::new("o", "r");
        let transport = Arc::new(FakeTransport::new());
        transport.json(
            &contents_url(&repo, "skills/s"),
            listing_json(&[("skills/s/SKILL.md", "file"), ("skills/s/refs", "dir")]),
        );
        transport.json(
            &contents_url(&repo, "skills/s/refs"),
            listing_json(&[("skills/s/refs/a.md", "file"), ("skills/s/refs/deep", "dir")]),
        );
        transport.json(
            &contents_url(&repo, "skills/s/refs/deep"),
            listing_json(&[("skills/s/refs/deep/b.md", "file")]),
        );

        let files = list_recursive(&client(transport), &repo, "skills/s", 4)
            .await
            .unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "skills/s/SKILL.md",
                "skills/s/refs/a.md",
                "skills/s/refs/deep/b.md"
            ]
        );
    }

    #[tokio::test]
    async fn fan_out_respects_limit() {
        let repo = RepoSource::new("o", "r");
        let transport = Arc::new(FakeTransport::with_delay(Duration::from_millis(20)));
        let dirs: Vec<String> = (0..10).map(|i| format!("root/d{i}")).collect();
        let pairs: Vec<(&str, &str)> = dirs.iter().map(|d| (d.as_str(), "dir")).collect();
        transport.json(&contents_url(&repo, "root"), listing_json(&pairs));
        for dir in &dirs {
            let file = format!("{dir}/f.md");
            transport.json(&contents_url(&repo, dir), listing_json(&[(file.as_str(), "file")]));
        }

        let files = list_recursive(&client(transport.clone()), &repo, "root", 3)
            .await
            .unwrap();

        assert_eq!(files.len(), 10);
        assert!(transport.peak_concurrency() <= 3);
        assert!(transport.peak_concurrency() >= 2);
    }

    #[tokio::test]
    async fn listing_error_aborts() {
        let repo = RepoSource::new("o", "r");
        let transport = Arc::new(FakeTransport::new());
        let err = list_recursive(&client(transport), &repo, "missing", 2)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn relative_paths_strip_root() {
        assert_eq!(relative_path("skills/s", "skills/s/refs/a.md"), "refs/a.md");
        assert_eq!(relative_path("skills/s/", "skills/s/SKILL.md"), "SKILL.md");
        assert_eq!(relative_path("", "a/b.md"), "a/b.md");
        assert_eq!(relative_path("skills/s", "skills/sx/a.md"), "a.md");
    }
}
