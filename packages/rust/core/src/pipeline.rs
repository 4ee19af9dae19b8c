//! End-to-end discovery run: snapshot → search → resolve → normalize → persist.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use dxtscout_discovery::{GitHubClient, Resolution, find_candidates, resolve};
use dxtscout_shared::{Candidate, KnownRepos, RepoMetadata, Result, RunOptions};
use dxtscout_storage::Storage;

use crate::normalize::normalize;
use crate::reconcile::{PersistOutcome, persist};

// ---------------------------------------------------------------------------
// Outcomes & report
// ---------------------------------------------------------------------------

/// Terminal state of one candidate within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// A valid manifest was found and written (`Inserted` or `Updated`).
    Persisted(PersistOutcome),
    /// Every path answered and none held a valid manifest.
    MarkedNonMatch,
    /// Probing hit only transient failures; nothing was written.
    Abandoned(String),
    /// The store rejected a write.
    Failed(String),
}

impl CandidateOutcome {
    fn from_persist(outcome: PersistOutcome) -> Self {
        match outcome {
            PersistOutcome::Failed(reason) => Self::Failed(reason),
            written => Self::Persisted(written),
        }
    }

    /// Short label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted(PersistOutcome::Inserted) => "inserted",
            Self::Persisted(_) => "updated",
            Self::MarkedNonMatch => "non-match",
            Self::Abandoned(_) => "abandoned",
            Self::Failed(_) => "failed",
        }
    }
}

/// Summary of a discovery run. Also stored as the run journal's stats.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Journal entry ID, when the journal could be written.
    pub run_id: Option<String>,
    /// Repositories excluded by the known snapshot.
    pub known_at_start: usize,
    pub candidates_found: usize,
    pub checked: usize,
    pub inserted: usize,
    pub updated: usize,
    pub marked_non_match: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub search_failures: usize,
    /// True when the stop flag cut the run short.
    pub stopped: bool,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl DiscoveryReport {
    fn record(&mut self, outcome: &CandidateOutcome) {
        self.checked += 1;
        match outcome {
            CandidateOutcome::Persisted(PersistOutcome::Inserted) => self.inserted += 1,
            CandidateOutcome::Persisted(_) => self.updated += 1,
            CandidateOutcome::MarkedNonMatch => self.marked_non_match += 1,
            CandidateOutcome::Abandoned(_) => self.abandoned += 1,
            CandidateOutcome::Failed(_) => self.failed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a candidate reaches its terminal state.
    fn candidate_processed(
        &self,
        repo: &str,
        outcome: &CandidateOutcome,
        current: usize,
        total: usize,
    );
    /// Called when the run completes.
    fn done(&self, report: &DiscoveryReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn candidate_processed(
        &self,
        _repo: &str,
        _outcome: &CandidateOutcome,
        _current: usize,
        _total: usize,
    ) {
    }
    fn done(&self, _report: &DiscoveryReport) {}
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Load the confirmed-or-rejected snapshot that search excludes.
///
/// With a TTL, non-matches older than that many days are left out so the
/// run checks them again.
pub async fn known_repos(
    storage: &Storage,
    non_match_ttl_days: Option<u32>,
) -> Result<KnownRepos> {
    let confirmed = storage.extension_keys().await?;
    let cutoff =
        non_match_ttl_days.map(|days| Utc::now() - chrono::Duration::days(i64::from(days)));
    let rejected = storage.non_match_keys(cutoff).await?;
    Ok(KnownRepos::new(confirmed, rejected))
}

/// Run one discovery pass.
///
/// Only a store that cannot produce the initial snapshot fails the run;
/// every per-candidate failure is folded into the report. Setting `stop`
/// prevents further candidates from starting while in-flight ones finish.
#[instrument(skip_all, fields(concurrency = opts.concurrency, limit = ?opts.limit))]
pub async fn run_discovery(
    client: Arc<GitHubClient>,
    storage: Arc<Storage>,
    opts: &RunOptions,
    stop: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<DiscoveryReport> {
    let start = Instant::now();
    let mut report = DiscoveryReport::default();

    progress.phase("Loading known repositories");
    let known = known_repos(&storage, opts.non_match_ttl_days).await?;
    report.known_at_start = known.len();
    info!(known = known.len(), "snapshot loaded");

    report.run_id = match storage.insert_run().await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(error = %e, "could not open run journal");
            None
        }
    };

    progress.phase("Searching GitHub");
    let search = find_candidates(&client, &opts.queries, &known).await;
    report.candidates_found = search.candidates.len();
    report.search_failures = search.failed_requests;

    let mut candidates = search.candidates;
    if let Some(limit) = opts.limit {
        candidates.truncate(limit);
    }
    let total = candidates.len();

    progress.phase("Probing repositories");
    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1) as usize));
    let mut tasks: JoinSet<(String, CandidateOutcome)> = JoinSet::new();
    let mut completed = 0usize;

    for candidate in candidates {
        if stop.load(Ordering::SeqCst) {
            report.stopped = true;
            break;
        }
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        // Stop may have been requested while waiting for a worker.
        if stop.load(Ordering::SeqCst) {
            report.stopped = true;
            break;
        }

        let client = Arc::clone(&client);
        let storage = Arc::clone(&storage);
        tasks.spawn(async move {
            let repo = candidate.repo_identifier.clone();
            let outcome = process_candidate(&client, &storage, &candidate).await;
            drop(permit);
            (repo, outcome)
        });

        while let Some(joined) = tasks.try_join_next() {
            completed += 1;
            handle_joined(joined, &mut report, progress, completed, total);
        }
    }

    while let Some(joined) = tasks.join_next().await {
        completed += 1;
        handle_joined(joined, &mut report, progress, completed, total);
    }

    report.elapsed = start.elapsed();

    if let Some(run_id) = &report.run_id {
        let stats = serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());
        if let Err(e) = storage.finish_run(run_id, &stats).await {
            warn!(error = %e, "could not close run journal");
        }
    }

    info!(
        checked = report.checked,
        inserted = report.inserted,
        updated = report.updated,
        non_matches = report.marked_non_match,
        abandoned = report.abandoned,
        failed = report.failed,
        stopped = report.stopped,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "discovery run complete"
    );

    progress.done(&report);
    Ok(report)
}

fn handle_joined(
    joined: std::result::Result<(String, CandidateOutcome), tokio::task::JoinError>,
    report: &mut DiscoveryReport,
    progress: &dyn ProgressReporter,
    current: usize,
    total: usize,
) {
    match joined {
        Ok((repo, outcome)) => {
            report.record(&outcome);
            progress.candidate_processed(&repo, &outcome, current, total);
        }
        Err(e) => {
            warn!(error = %e, "candidate task did not complete");
            report.record(&CandidateOutcome::Failed(e.to_string()));
        }
    }
}

/// Drive one candidate to its terminal state.
#[instrument(skip_all, fields(repo = %candidate.repo_identifier))]
pub async fn process_candidate(
    client: &GitHubClient,
    storage: &Storage,
    candidate: &Candidate,
) -> CandidateOutcome {
    let repo = candidate.repo_identifier.as_str();

    match resolve(client, repo).await {
        Resolution::Found { manifest, path } => {
            info!(%path, "manifest found");
            let meta = fresh_metadata(client, candidate).await;
            let record = normalize(repo, &manifest, &meta, &path, Utc::now());
            CandidateOutcome::from_persist(persist(storage, &record).await)
        }
        Resolution::Absent => match storage.insert_non_match(repo).await {
            Ok(()) => {
                debug!("marked as non-match");
                CandidateOutcome::MarkedNonMatch
            }
            Err(e) => {
                warn!(error = %e, "could not record non-match");
                CandidateOutcome::Failed(e.to_string())
            }
        },
        Resolution::Inconclusive { failures } => {
            warn!(failures = failures.len(), "candidate abandoned");
            CandidateOutcome::Abandoned(failures.join("; "))
        }
    }
}

/// Repository metadata from the repository endpoint, falling back to what
/// search reported.
async fn fresh_metadata(client: &GitHubClient, candidate: &Candidate) -> RepoMetadata {
    let fallback = candidate.metadata();
    match client.repo_details(&candidate.repo_identifier).await {
        Ok(Some(mut fresh)) => {
            if fresh.url.is_empty() {
                fresh.url = fallback.url;
            }
            if fresh.updated_at.is_none() {
                fresh.updated_at = fallback.updated_at;
            }
            fresh
        }
        Ok(None) => fallback,
        Err(e) => {
            debug!(error = %e, "using search metadata");
            fallback
        }
    }
}
