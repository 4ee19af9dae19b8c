//! Core domain types for dxtscout.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DxtScoutError, Result};

/// `owner/name`, as GitHub spells a repository's `full_name`.
static REPO_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?/[A-Za-z0-9._-]+$")
        .expect("repository identifier regex is valid")
});

/// Split a repository identifier into `(owner, name)`, rejecting anything that
/// could escape the `/repos/{owner}/{name}` path.
pub fn parse_repo_identifier(repo: &str) -> Result<(&str, &str)> {
    if !REPO_IDENTIFIER.is_match(repo) {
        return Err(DxtScoutError::validation(format!(
            "invalid repository identifier '{repo}': expected owner/name"
        )));
    }
    let (owner, name) = repo
        .split_once('/')
        .ok_or_else(|| DxtScoutError::validation(format!("missing '/' in '{repo}'")))?;
    if name == "." || name == ".." {
        return Err(DxtScoutError::validation(format!(
            "invalid repository name in '{repo}'"
        )));
    }
    Ok((owner, name))
}

// ---------------------------------------------------------------------------
// Candidate / RepoMetadata
// ---------------------------------------------------------------------------

/// A repository surfaced by search, not yet confirmed to hold a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// `owner/name`; the natural key across the whole system.
    pub repo_identifier: String,
    /// Browser URL of the repository.
    pub url: String,
    pub star_count: u64,
    /// Best-effort timestamp from the search index; may be stale or absent.
    pub last_updated: Option<String>,
}

impl Candidate {
    /// Fold another sighting of the same repository into this one.
    ///
    /// Code search results usually omit stars and timestamps, so the richer
    /// sighting wins field by field.
    pub fn merge(&mut self, other: Candidate) {
        self.star_count = self.star_count.max(other.star_count);
        if self.url.is_empty() {
            self.url = other.url;
        }
        if self.last_updated.is_none() {
            self.last_updated = other.last_updated;
        }
    }

    /// Repository metadata as known from search alone.
    pub fn metadata(&self) -> RepoMetadata {
        RepoMetadata {
            url: self.url.clone(),
            stars: self.star_count,
            updated_at: self.last_updated.clone(),
        }
    }
}

/// Repository-derived fields of an [`ExtensionRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub url: String,
    pub stars: u64,
    pub updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// KnownRepos
// ---------------------------------------------------------------------------

/// Immutable snapshot of every repository a run must not check again:
/// confirmed extensions plus recorded non-matches. Built once per run.
#[derive(Debug, Clone, Default)]
pub struct KnownRepos {
    keys: HashSet<String>,
}

impl KnownRepos {
    /// Union the confirmed and rejected key sets.
    pub fn new(confirmed: HashSet<String>, rejected: HashSet<String>) -> Self {
        let mut keys = confirmed;
        keys.extend(rejected);
        Self { keys }
    }

    pub fn contains(&self, repo: &str) -> bool {
        self.keys.contains(repo)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ExtensionRecord
// ---------------------------------------------------------------------------

/// The canonical, discovery-owned representation of one confirmed extension.
///
/// String fields are never null: absent manifest values become `""` so that
/// downstream consumers always see the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// `owner/name` (unique across the store).
    pub repo_name: String,
    pub repo_url: String,
    pub stars: u64,
    /// Empty when GitHub did not report a timestamp.
    pub repo_updated_at: String,
    /// When this record was produced by the normalizer.
    pub discovered_at: DateTime<Utc>,

    pub name: String,
    pub display_name: String,
    pub version: String,
    pub description: String,
    pub long_description: String,
    pub author_name: String,
    pub author_email: String,
    pub author_url: String,
    pub homepage: String,
    pub documentation: String,
    pub keywords: Vec<String>,
    pub license: String,
    pub server_type: String,
    /// Tool names, in manifest order.
    pub tools: Vec<String>,
    /// Length of the manifest's declared tools array.
    pub tools_count: usize,
    pub has_user_config: bool,
    /// Value of the manifest's `dxt_version` marker.
    pub schema_version: String,
    /// Pretty-printed JSON snapshot of the manifest as fetched.
    pub manifest_raw: String,
    /// Repository path the manifest was read from.
    pub manifest_path: String,
}

/// Fields owned by the downstream categorization and digest transforms.
/// Discovery reads them only to display them and never writes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestState {
    pub category: Option<String>,
    pub category_reasoning: Option<String>,
    pub featured_in_newsletter: bool,
    pub newsletter_date: Option<String>,
    pub featured_in_issue: Option<i64>,
}

/// An extension row as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredExtension {
    pub record: ExtensionRecord,
    pub digest: DigestState,
    /// Last time discovery re-normalized this repository.
    pub last_checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_identifier_accepts_github_names() {
        assert_eq!(
            parse_repo_identifier("acme/tool").unwrap(),
            ("acme", "tool")
        );
        assert_eq!(
            parse_repo_identifier("some-org/my.repo_v2").unwrap(),
            ("some-org", "my.repo_v2")
        );
    }

    #[test]
    fn repo_identifier_rejects_path_tricks() {
        assert!(parse_repo_identifier("acme").is_err());
        assert!(parse_repo_identifier("acme/..").is_err());
        assert!(parse_repo_identifier("acme/tool/contents").is_err());
        assert!(parse_repo_identifier("../etc/passwd").is_err());
        assert!(parse_repo_identifier("acme/tool?x=1").is_err());
    }

    #[test]
    fn candidate_merge_keeps_richest_fields() {
        let mut from_code = Candidate {
            repo_identifier: "acme/tool".into(),
            url: "https://github.com/acme/tool".into(),
            star_count: 0,
            last_updated: None,
        };
        from_code.merge(Candidate {
            repo_identifier: "acme/tool".into(),
            url: "https://github.com/acme/tool".into(),
            star_count: 42,
            last_updated: Some("2025-06-01T00:00:00Z".into()),
        });
        assert_eq!(from_code.star_count, 42);
        assert_eq!(from_code.last_updated.as_deref(), Some("2025-06-01T00:00:00Z"));
    }

    #[test]
    fn known_repos_is_union_of_both_sets() {
        let confirmed = HashSet::from(["a/one".to_string()]);
        let rejected = HashSet::from(["b/two".to_string(), "a/one".to_string()]);
        let known = KnownRepos::new(confirmed, rejected);
        assert_eq!(known.len(), 2);
        assert!(known.contains("a/one"));
        assert!(known.contains("b/two"));
        assert!(!known.contains("c/three"));
    }
}
