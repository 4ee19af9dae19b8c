//! Rate-limited GitHub REST client.
//!
//! Every request passes through one of two shared [`RateGate`]s and comes back
//! as a [`FetchOutcome`]. A 404 is an ordinary outcome, not an error: probing
//! for files that are not there is most of what this client does.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use dxtscout_shared::{DxtScoutError, GitHubOptions, RepoMetadata, Result, parse_repo_identifier};

use crate::gate::RateGate;

/// User-Agent string for API requests (GitHub rejects requests without one).
const USER_AGENT: &str = concat!("dxtscout/", env!("CARGO_PKG_VERSION"));

/// REST API version pinned for response shapes.
const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// FetchOutcome
// ---------------------------------------------------------------------------

/// Classified result of a single API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx with the response body.
    Success(String),
    /// 404: the resource does not exist.
    NotFound,
    /// 429, or 403 with an exhausted rate-limit budget.
    RateLimited,
    /// Any other status, a connection failure, or a timeout.
    TransientError(String),
}

/// Which rate gate a request is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// `/search/*` endpoints (low ceiling).
    Search,
    /// Contents and repository reads.
    Content,
}

/// Map a response status to an outcome class, ignoring the body.
fn classify(status: StatusCode, ratelimit_remaining: Option<&str>) -> FetchOutcome {
    if status.is_success() {
        return FetchOutcome::Success(String::new());
    }
    match status {
        StatusCode::NOT_FOUND => FetchOutcome::NotFound,
        StatusCode::TOO_MANY_REQUESTS => FetchOutcome::RateLimited,
        StatusCode::FORBIDDEN if ratelimit_remaining.map(str::trim) == Some("0") => {
            FetchOutcome::RateLimited
        }
        other => FetchOutcome::TransientError(format!("HTTP {other}")),
    }
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// GitHub API client with per-surface request pacing.
#[derive(Debug)]
pub struct GitHubClient {
    client: Client,
    api_base: Url,
    per_page: u32,
    search_gate: RateGate,
    content_gate: RateGate,
}

impl GitHubClient {
    /// Build a client authenticated with `token`.
    pub fn new(opts: &GitHubOptions, token: &str) -> Result<Self> {
        let api_base = Url::parse(&opts.api_base).map_err(|e| {
            DxtScoutError::config(format!("invalid GitHub API base '{}': {e}", opts.api_base))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(DxtScoutError::config(format!(
                "GitHub API base '{api_base}' cannot carry a path"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| DxtScoutError::config("GitHub token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| DxtScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base,
            per_page: opts.per_page,
            search_gate: RateGate::from_millis(opts.search_delay_ms),
            content_gate: RateGate::from_millis(opts.content_delay_ms),
        })
    }

    /// Search page size.
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Join path segments onto the API base, percent-encoding each one.
    pub(crate) fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Issue a GET, waiting on the surface's gate first.
    ///
    /// Never returns an error: every failure is folded into the outcome.
    pub async fn fetch(
        &self,
        surface: Surface,
        url: Url,
        query: &[(&str, String)],
    ) -> FetchOutcome {
        match surface {
            Surface::Search => self.search_gate.wait().await,
            Surface::Content => self.content_gate.wait().await,
        }

        debug!(%url, ?surface, "GET");
        let response = match self.client.get(url.clone()).query(query).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return FetchOutcome::TransientError(format!("{url}: request timed out"));
            }
            Err(e) => return FetchOutcome::TransientError(format!("{url}: {e}")),
        };

        let status = response.status();
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match classify(status, remaining.as_deref()) {
            FetchOutcome::Success(_) => match response.text().await {
                Ok(body) => FetchOutcome::Success(body),
                Err(e) => FetchOutcome::TransientError(format!("{url}: failed to read body: {e}")),
            },
            FetchOutcome::RateLimited => {
                let reset = response
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                warn!(%url, %status, reset, "GitHub rate limit hit");
                FetchOutcome::RateLimited
            }
            other => other,
        }
    }

    /// Read `path` from a repository's default branch via the contents API.
    pub async fn get_contents(&self, repo: &str, path: &str) -> Result<FetchOutcome> {
        let (owner, name) = parse_repo_identifier(repo)?;
        let segments = ["repos", owner, name, "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let url = self.endpoint(segments);
        Ok(self.fetch(Surface::Content, url, &[]).await)
    }

    /// Fetch fresh repository metadata. `None` when GitHub did not answer with it.
    pub async fn repo_details(&self, repo: &str) -> Result<Option<RepoMetadata>> {
        let (owner, name) = parse_repo_identifier(repo)?;
        let url = self.endpoint(["repos", owner, name]);

        match self.fetch(Surface::Content, url, &[]).await {
            FetchOutcome::Success(body) => match serde_json::from_str::<RepoDetails>(&body) {
                Ok(details) => Ok(Some(details.into())),
                Err(e) => {
                    warn!(repo, error = %e, "unreadable repository details");
                    Ok(None)
                }
            },
            FetchOutcome::NotFound => {
                debug!(repo, "repository not found (deleted or private)");
                Ok(None)
            }
            FetchOutcome::RateLimited => Ok(None),
            FetchOutcome::TransientError(reason) => {
                warn!(repo, %reason, "could not fetch repository details");
                Ok(None)
            }
        }
    }
}

/// Subset of `GET /repos/{owner}/{repo}` that we keep.
#[derive(Debug, Deserialize)]
struct RepoDetails {
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<RepoDetails> for RepoMetadata {
    fn from(details: RepoDetails) -> Self {
        Self {
            url: details.html_url,
            stars: details.stargazers_count,
            updated_at: details.updated_at,
        }
    }
}
