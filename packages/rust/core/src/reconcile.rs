//! Insert-or-update of normalized records against the store.

use serde::Serialize;
use tracing::{debug, warn};

use dxtscout_shared::ExtensionRecord;
use dxtscout_storage::Storage;

/// Result of persisting one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum PersistOutcome {
    Inserted,
    Updated,
    /// The store rejected the write; the repository is left for the next run.
    Failed(String),
}

/// Write `record`, reporting whether it created or refreshed a row.
///
/// The lookup only decides which outcome to report. The write itself is an
/// upsert keyed on the repository, so two runs racing on the same
/// repository still end with one row, and neither touches the
/// categorization or digest columns.
pub async fn persist(storage: &Storage, record: &ExtensionRecord) -> PersistOutcome {
    let existed = match storage.get_extension(&record.repo_name).await {
        Ok(found) => found.is_some(),
        Err(e) => {
            warn!(repo = %record.repo_name, error = %e, "lookup failed");
            return PersistOutcome::Failed(e.to_string());
        }
    };

    if let Err(e) = storage.upsert_extension(record).await {
        warn!(repo = %record.repo_name, error = %e, "store rejected extension record");
        return PersistOutcome::Failed(e.to_string());
    }

    // A repository that gained a manifest should no longer be suppressed.
    match storage.clear_non_match(&record.repo_name).await {
        Ok(true) => debug!(repo = %record.repo_name, "cleared stale non-match"),
        Ok(false) => {}
        Err(e) => debug!(repo = %record.repo_name, error = %e, "could not clear non-match"),
    }

    if existed {
        PersistOutcome::Updated
    } else {
        PersistOutcome::Inserted
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dxtscout_discovery::Manifest;
    use dxtscout_shared::RepoMetadata;

    use super::*;
    use crate::normalize::normalize;
    use crate::tests::test_storage;

    fn record(description: &str) -> ExtensionRecord {
        let manifest = Manifest::parse(&format!(
            r#"{{"dxt_version":"1.0","name":"Tool","description":"{description}"}}"#
        ))
        .unwrap();
        normalize(
            "acme/tool",
            &manifest,
            &RepoMetadata::default(),
            "manifest.json",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn insert_then_update() {
        let storage = test_storage().await;
        assert_eq!(persist(&storage, &record("v1")).await, PersistOutcome::Inserted);
        assert_eq!(persist(&storage, &record("v2")).await, PersistOutcome::Updated);

        let stored = storage.get_extension("acme/tool").await.unwrap().unwrap();
        assert_eq!(stored.record.description, "v2");
        assert_eq!(storage.extension_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_leaves_downstream_fields() {
        let storage = test_storage().await;
        persist(&storage, &record("v1")).await;
        storage
            .set_category("acme/tool", "Developer Tools", "ships a linter")
            .await
            .unwrap();
        storage.mark_featured("acme/tool", 7, "2025-07-04").await.unwrap();

        assert_eq!(persist(&storage, &record("v2")).await, PersistOutcome::Updated);

        let stored = storage.get_extension("acme/tool").await.unwrap().unwrap();
        assert_eq!(stored.digest.category.as_deref(), Some("Developer Tools"));
        assert_eq!(stored.digest.category_reasoning.as_deref(), Some("ships a linter"));
        assert!(stored.digest.featured_in_newsletter);
        assert_eq!(stored.digest.newsletter_date.as_deref(), Some("2025-07-04"));
        assert_eq!(stored.digest.featured_in_issue, Some(7));
    }

    #[tokio::test]
    async fn persisting_clears_non_match() {
        let storage = test_storage().await;
        storage.insert_non_match("acme/tool").await.unwrap();
        persist(&storage, &record("v1")).await;
        assert!(storage.non_match_keys(None).await.unwrap().is_empty());
    }
}
