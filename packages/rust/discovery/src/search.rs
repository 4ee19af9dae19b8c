//! Candidate search over GitHub's repository and code search surfaces.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use dxtscout_shared::{Candidate, KnownRepos};

use crate::client::{FetchOutcome, GitHubClient, Surface};

/// Result of running every discovery query.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Deduplicated candidates, none of them in the excluded snapshot.
    pub candidates: Vec<Candidate>,
    /// Search requests that failed or were throttled.
    pub failed_requests: usize,
    /// Result items dropped because the repository was already known.
    pub skipped_known: usize,
}

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeItem {
    repository: RepoItem,
}

impl From<RepoItem> for Candidate {
    fn from(item: RepoItem) -> Self {
        Candidate {
            repo_identifier: item.full_name,
            url: item.html_url,
            star_count: item.stargazers_count,
            last_updated: item.updated_at.filter(|s| !s.is_empty()),
        }
    }
}

/// Run every query against both search surfaces and merge the hits.
///
/// Only the first page of each search is read. Repositories in `excluded`
/// never appear in the output; the rest appear once each, ordered by stars
/// descending.
#[instrument(skip_all, fields(queries = queries.len(), excluded = excluded.len()))]
pub async fn find_candidates(
    client: &GitHubClient,
    queries: &[String],
    excluded: &KnownRepos,
) -> SearchOutcome {
    let mut merged: HashMap<String, Candidate> = HashMap::new();
    let mut outcome = SearchOutcome::default();
    let per_page = client.per_page().to_string();

    for query in queries {
        info!(%query, "searching");

        let repo_url = client.endpoint(["search", "repositories"]);
        let repo_params = [
            ("q", query.clone()),
            ("sort", "updated".to_string()),
            ("per_page", per_page.clone()),
        ];
        let repos = search_page::<RepoItem>(client, repo_url, &repo_params, &mut outcome).await;

        let code_url = client.endpoint(["search", "code"]);
        let code_params = [("q", query.clone()), ("per_page", per_page.clone())];
        let files = search_page::<CodeItem>(client, code_url, &code_params, &mut outcome).await;

        let hits = repos
            .into_iter()
            .chain(files.into_iter().map(|file| file.repository))
            .map(Candidate::from);

        for candidate in hits {
            if excluded.contains(&candidate.repo_identifier) {
                outcome.skipped_known += 1;
                continue;
            }
            match merged.get_mut(&candidate.repo_identifier) {
                Some(existing) => existing.merge(candidate),
                None => {
                    merged.insert(candidate.repo_identifier.clone(), candidate);
                }
            }
        }
    }

    let mut candidates: Vec<Candidate> = merged.into_values().collect();
    candidates.sort_by(|a, b| {
        b.star_count
            .cmp(&a.star_count)
            .then_with(|| a.repo_identifier.cmp(&b.repo_identifier))
    });
    outcome.candidates = candidates;

    info!(
        candidates = outcome.candidates.len(),
        skipped_known = outcome.skipped_known,
        failed_requests = outcome.failed_requests,
        "search complete"
    );
    outcome
}

/// Fetch one search page; failures are counted and yield no items.
async fn search_page<T: for<'de> Deserialize<'de>>(
    client: &GitHubClient,
    url: url::Url,
    params: &[(&str, String)],
    outcome: &mut SearchOutcome,
) -> Vec<T> {
    let endpoint = url.path().to_string();
    match client.fetch(Surface::Search, url, params).await {
        FetchOutcome::Success(body) => match serde_json::from_str::<SearchPage<T>>(&body) {
            Ok(page) => {
                debug!(%endpoint, items = page.items.len(), "search page");
                page.items
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "unreadable search response");
                outcome.failed_requests += 1;
                Vec::new()
            }
        },
        FetchOutcome::NotFound => {
            warn!(%endpoint, "search endpoint returned 404");
            outcome.failed_requests += 1;
            Vec::new()
        }
        FetchOutcome::RateLimited => {
            outcome.failed_requests += 1;
            Vec::new()
        }
        FetchOutcome::TransientError(reason) => {
            warn!(%endpoint, %reason, "search request failed");
            outcome.failed_requests += 1;
            Vec::new()
        }
    }
}
