//! Backfill of repository metadata for records saved without a timestamp.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, instrument, warn};

use dxtscout_discovery::GitHubClient;
use dxtscout_shared::Result;
use dxtscout_storage::Storage;

/// Counts from a refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Records that had no `repo_updated_at`.
    pub missing: usize,
    pub updated: usize,
    /// GitHub reported nothing usable (deleted, private, throttled).
    pub unavailable: usize,
    pub failed: usize,
}

/// Re-fetch stars, URL and update time for every record missing a timestamp.
///
/// Only the repository-derived columns are written. Records GitHub cannot
/// describe are left as they are for a later pass.
#[instrument(skip_all)]
pub async fn refresh_repo_metadata(
    client: &GitHubClient,
    storage: &Storage,
    stop: Arc<AtomicBool>,
) -> Result<RefreshReport> {
    let repos = storage.extensions_missing_repo_timestamp().await?;
    let mut report = RefreshReport {
        missing: repos.len(),
        ..RefreshReport::default()
    };
    info!(missing = repos.len(), "refreshing repository metadata");

    for repo in &repos {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let meta = match client.repo_details(repo).await {
            Ok(Some(meta)) if meta.updated_at.is_some() => meta,
            Ok(_) => {
                report.unavailable += 1;
                continue;
            }
            Err(e) => {
                warn!(%repo, error = %e, "skipping record");
                report.failed += 1;
                continue;
            }
        };

        match storage.update_repo_metadata(repo, &meta).await {
            Ok(true) => {
                info!(%repo, stars = meta.stars, "repository metadata refreshed");
                report.updated += 1;
            }
            Ok(false) => report.unavailable += 1,
            Err(e) => {
                warn!(%repo, error = %e, "store rejected metadata update");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dxtscout_discovery::Manifest;
    use dxtscout_shared::RepoMetadata;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::normalize::normalize;
    use crate::tests::{test_client, test_storage};

    async fn seed(storage: &Storage, repo: &str, updated_at: Option<&str>) {
        let manifest = Manifest::parse(r#"{"dxt_version":"1"}"#).unwrap();
        let meta = RepoMetadata {
            url: String::new(),
            stars: 1,
            updated_at: updated_at.map(str::to_owned),
        };
        let record = normalize(repo, &manifest, &meta, "manifest.json", Utc::now());
        storage.upsert_extension(&record).await.unwrap();
    }

    #[tokio::test]
    async fn fills_missing_timestamps_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/stale"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "html_url": "https://github.com/acme/stale",
                "stargazers_count": 77,
                "updated_at": "2025-09-01T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(path("/repos/acme/fresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let storage = test_storage().await;
        seed(&storage, "acme/stale", None).await;
        seed(&storage, "acme/fresh", Some("2025-01-01T00:00:00Z")).await;
        storage.set_category("acme/stale", "Data", "").await.unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let report = refresh_repo_metadata(&test_client(&server), &storage, stop)
            .await
            .unwrap();
        assert_eq!(
            report,
            RefreshReport {
                missing: 1,
                updated: 1,
                unavailable: 0,
                failed: 0
            }
        );

        let stale = storage.get_extension("acme/stale").await.unwrap().unwrap();
        assert_eq!(stale.record.stars, 77);
        assert_eq!(stale.record.repo_updated_at, "2025-09-01T12:00:00Z");
        assert_eq!(stale.digest.category.as_deref(), Some("Data"));
    }

    #[tokio::test]
    async fn deleted_repositories_are_left_alone() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/acme/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let storage = test_storage().await;
        seed(&storage, "acme/gone", None).await;

        let stop = Arc::new(AtomicBool::new(false));
        let report = refresh_repo_metadata(&test_client(&server), &storage, stop)
            .await
            .unwrap();
        assert_eq!(report.unavailable, 1);
        assert_eq!(
            storage.extensions_missing_repo_timestamp().await.unwrap(),
            vec!["acme/gone".to_string()]
        );
    }
}
