//! libSQL record store for discovered extensions.
//!
//! The [`Storage`] struct wraps a libSQL database (a remote Turso database in
//! production, a local file in tests and offline use) holding:
//! - `extensions`: one row per repository with a valid manifest
//! - `non_matches`: repositories checked without finding one
//! - `discovery_runs`: a journal of pipeline runs
//!
//! **Ownership rules:** discovery writes only its own columns of `extensions`.
//! `category*` and `featured*` columns are written solely through
//! [`Storage::set_category`] and [`Storage::mark_featured`], which exist for
//! the downstream transforms.

mod migrations;

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use dxtscout_shared::{
    DigestState, DxtScoutError, ExtensionRecord, RepoMetadata, Result, StoredExtension,
};
use libsql::{Connection, Database, params};
use tracing::debug;
use uuid::Uuid;

/// Columns selected for every [`StoredExtension`] read, in `row_to_extension` order.
const EXTENSION_COLUMNS: &str = "repo_name, repo_url, stars, repo_updated_at, discovered_at, \
     last_checked_at, name, display_name, version, description, long_description, author_name, \
     author_email, author_url, homepage, documentation, keywords, license, server_type, tools, \
     tools_count, has_user_config, schema_version, manifest_raw, manifest_path, category, \
     category_reasoning, featured_in_newsletter, newsletter_date, featured_in_issue";

fn storage_err(e: impl std::fmt::Display) -> DxtScoutError {
    DxtScoutError::Storage(e.to_string())
}

/// Fixed-width UTC timestamp, so stored values compare correctly as text.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DxtScoutError::Storage(format!("invalid date '{s}': {e}")))
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open the store named by a configured URL.
    ///
    /// `file:` URLs open a local database; anything else is treated as a
    /// remote libSQL endpoint authenticated with `auth_token`.
    pub async fn connect(url: &str, auth_token: &str) -> Result<Self> {
        match url.strip_prefix("file:") {
            Some(path) => Self::open(Path::new(path)).await,
            None => Self::open_remote(url, auth_token).await,
        }
    }

    /// Open or create a local database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DxtScoutError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        Self::from_database(db).await
    }

    /// Open a remote libSQL database.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DxtScoutError::Storage(format!("cannot reach store at {url}: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: Database) -> Result<Self> {
        let conn = db.connect().map_err(storage_err)?;
        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DxtScoutError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    async fn query_keys(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<HashSet<String>> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        let mut keys = HashSet::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            keys.insert(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(keys)
    }

    // -----------------------------------------------------------------------
    // Extension operations
    // -----------------------------------------------------------------------

    /// Every repository with a stored extension record.
    pub async fn extension_keys(&self) -> Result<HashSet<String>> {
        self.query_keys("SELECT repo_name FROM extensions", params![])
            .await
    }

    /// Look up one extension by repository.
    pub async fn get_extension(&self, repo_name: &str) -> Result<Option<StoredExtension>> {
        let sql = format!("SELECT {EXTENSION_COLUMNS} FROM extensions WHERE repo_name = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![repo_name])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_extension(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a record, or overwrite the discovery-owned columns of an existing one.
    ///
    /// The conflict clause makes this safe against a concurrent run inserting
    /// the same repository. On update, `discovered_at` keeps its original value
    /// and `last_checked_at` takes the record's timestamp; downstream-owned
    /// columns are not part of the statement.
    pub async fn upsert_extension(&self, record: &ExtensionRecord) -> Result<()> {
        let keywords = serde_json::to_string(&record.keywords).map_err(storage_err)?;
        let tools = serde_json::to_string(&record.tools).map_err(storage_err)?;
        let checked_at = timestamp(&record.discovered_at);

        self.conn
            .execute(
                "INSERT INTO extensions (
                    repo_name, repo_url, stars, repo_updated_at, discovered_at, last_checked_at,
                    name, display_name, version, description, long_description,
                    author_name, author_email, author_url, homepage, documentation,
                    keywords, license, server_type, tools, tools_count, has_user_config,
                    schema_version, manifest_raw, manifest_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)
                 ON CONFLICT(repo_name) DO UPDATE SET
                   repo_url = excluded.repo_url,
                   stars = excluded.stars,
                   repo_updated_at = excluded.repo_updated_at,
                   last_checked_at = excluded.last_checked_at,
                   name = excluded.name,
                   display_name = excluded.display_name,
                   version = excluded.version,
                   description = excluded.description,
                   long_description = excluded.long_description,
                   author_name = excluded.author_name,
                   author_email = excluded.author_email,
                   author_url = excluded.author_url,
                   homepage = excluded.homepage,
                   documentation = excluded.documentation,
                   keywords = excluded.keywords,
                   license = excluded.license,
                   server_type = excluded.server_type,
                   tools = excluded.tools,
                   tools_count = excluded.tools_count,
                   has_user_config = excluded.has_user_config,
                   schema_version = excluded.schema_version,
                   manifest_raw = excluded.manifest_raw,
                   manifest_path = excluded.manifest_path",
                params![
                    record.repo_name.as_str(),
                    record.repo_url.as_str(),
                    record.stars as i64,
                    record.repo_updated_at.as_str(),
                    checked_at.as_str(),
                    checked_at.as_str(),
                    record.name.as_str(),
                    record.display_name.as_str(),
                    record.version.as_str(),
                    record.description.as_str(),
                    record.long_description.as_str(),
                    record.author_name.as_str(),
                    record.author_email.as_str(),
                    record.author_url.as_str(),
                    record.homepage.as_str(),
                    record.documentation.as_str(),
                    keywords.as_str(),
                    record.license.as_str(),
                    record.server_type.as_str(),
                    tools.as_str(),
                    record.tools_count as i64,
                    i64::from(record.has_user_config),
                    record.schema_version.as_str(),
                    record.manifest_raw.as_str(),
                    record.manifest_path.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Extensions in digest order: stars descending, then newest discovery first.
    pub async fn list_extensions(&self, limit: u32) -> Result<Vec<StoredExtension>> {
        let sql = format!(
            "SELECT {EXTENSION_COLUMNS} FROM extensions
             ORDER BY stars DESC, discovered_at DESC LIMIT ?1"
        );
        self.query_extensions(&sql, params![i64::from(limit)]).await
    }

    /// Extensions the categorization transform has not handled yet.
    pub async fn list_uncategorized(&self, limit: u32) -> Result<Vec<StoredExtension>> {
        let sql = format!(
            "SELECT {EXTENSION_COLUMNS} FROM extensions WHERE category IS NULL
             ORDER BY stars DESC, discovered_at DESC LIMIT ?1"
        );
        self.query_extensions(&sql, params![i64::from(limit)]).await
    }

    async fn query_extensions(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<StoredExtension>> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_extension(&row)?);
        }
        Ok(results)
    }

    /// Repositories whose `repo_updated_at` was never filled in.
    pub async fn extensions_missing_repo_timestamp(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT repo_name FROM extensions WHERE repo_updated_at = '' ORDER BY repo_name",
                params![],
            )
            .await
            .map_err(storage_err)?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            names.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(names)
    }

    /// Overwrite the repository-derived columns only. An empty URL keeps the stored one.
    /// Returns whether a row was updated.
    pub async fn update_repo_metadata(&self, repo_name: &str, meta: &RepoMetadata) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE extensions SET
                   stars = ?1,
                   repo_updated_at = ?2,
                   repo_url = CASE WHEN ?3 = '' THEN repo_url ELSE ?3 END
                 WHERE repo_name = ?4",
                params![
                    meta.stars as i64,
                    meta.updated_at.as_deref().unwrap_or(""),
                    meta.url.as_str(),
                    repo_name
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Downstream-owned columns
    // -----------------------------------------------------------------------

    /// Record the categorization transform's verdict.
    pub async fn set_category(
        &self,
        repo_name: &str,
        category: &str,
        reasoning: &str,
    ) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE extensions SET category = ?1, category_reasoning = ?2 WHERE repo_name = ?3",
                params![category, reasoning, repo_name],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    /// Record that the digest generator featured an extension.
    pub async fn mark_featured(&self, repo_name: &str, issue: i64, date: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE extensions SET featured_in_newsletter = 1, newsletter_date = ?1,
                   featured_in_issue = ?2
                 WHERE repo_name = ?3",
                params![date, issue, repo_name],
            )
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }

    // -----------------------------------------------------------------------
    // Non-match operations
    // -----------------------------------------------------------------------

    /// Repositories recorded as non-matches.
    ///
    /// With `expired_before`, entries checked before that instant are left out
    /// so that the next run checks them again.
    pub async fn non_match_keys(
        &self,
        expired_before: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>> {
        match expired_before {
            Some(cutoff) => {
                self.query_keys(
                    "SELECT repo_name FROM non_matches WHERE checked_at >= ?1",
                    params![timestamp(&cutoff)],
                )
                .await
            }
            None => {
                self.query_keys("SELECT repo_name FROM non_matches", params![])
                    .await
            }
        }
    }

    /// Record a non-match. An existing entry only has `checked_at` refreshed.
    pub async fn insert_non_match(&self, repo_name: &str) -> Result<()> {
        let now = timestamp(&Utc::now());
        self.conn
            .execute(
                "INSERT INTO non_matches (repo_name, checked_at) VALUES (?1, ?2)
                 ON CONFLICT(repo_name) DO UPDATE SET checked_at = excluded.checked_at",
                params![repo_name, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Remove one non-match. Returns whether it existed.
    pub async fn clear_non_match(&self, repo_name: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM non_matches WHERE repo_name = ?1",
                params![repo_name],
            )
            .await
            .map_err(storage_err)?;
        Ok(removed > 0)
    }

    /// Remove every non-match. Returns how many were removed.
    pub async fn clear_all_non_matches(&self) -> Result<u64> {
        self.conn
            .execute("DELETE FROM non_matches", params![])
            .await
            .map_err(storage_err)
    }

    // -----------------------------------------------------------------------
    // Run journal
    // -----------------------------------------------------------------------

    /// Start a journal entry for a discovery run. Returns the generated run ID.
    pub async fn insert_run(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = timestamp(&Utc::now());
        self.conn
            .execute(
                "INSERT INTO discovery_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        debug!(run_id = %id, "run journal opened");
        Ok(id)
    }

    /// Close a journal entry with the run's statistics.
    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = timestamp(&Utc::now());
        self.conn
            .execute(
                "UPDATE discovery_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Stats JSON of a finished run, if any.
    pub async fn run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM discovery_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }
}

/// Convert a row selected with [`EXTENSION_COLUMNS`] to a [`StoredExtension`].
fn row_to_extension(row: &libsql::Row) -> Result<StoredExtension> {
    let text = |idx: i32| row.get::<String>(idx).map_err(storage_err);
    let int = |idx: i32| row.get::<i64>(idx).map_err(storage_err);
    let list = |idx: i32| -> Result<Vec<String>> {
        serde_json::from_str(&text(idx)?).map_err(storage_err)
    };

    let record = ExtensionRecord {
        repo_name: text(0)?,
        repo_url: text(1)?,
        stars: int(2)?.max(0) as u64,
        repo_updated_at: text(3)?,
        discovered_at: parse_timestamp(&text(4)?)?,
        name: text(6)?,
        display_name: text(7)?,
        version: text(8)?,
        description: text(9)?,
        long_description: text(10)?,
        author_name: text(11)?,
        author_email: text(12)?,
        author_url: text(13)?,
        homepage: text(14)?,
        documentation: text(15)?,
        keywords: list(16)?,
        license: text(17)?,
        server_type: text(18)?,
        tools: list(19)?,
        tools_count: int(20)?.max(0) as usize,
        has_user_config: int(21)? != 0,
        schema_version: text(22)?,
        manifest_raw: text(23)?,
        manifest_path: text(24)?,
    };

    let digest = DigestState {
        category: row.get::<String>(25).ok(),
        category_reasoning: row.get::<String>(26).ok(),
        featured_in_newsletter: int(27)? != 0,
        newsletter_date: row.get::<String>(28).ok(),
        featured_in_issue: row.get::<i64>(29).ok(),
    };

    Ok(StoredExtension {
        record,
        digest,
        last_checked_at: parse_timestamp(&text(5)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("dxtscout_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn sample_record(repo: &str) -> ExtensionRecord {
        ExtensionRecord {
            repo_name: repo.into(),
            repo_url: format!("https://github.com/{repo}"),
            stars: 3,
            repo_updated_at: "2025-06-01T00:00:00Z".into(),
            discovered_at: Utc::now(),
            name: "tool".into(),
            display_name: "Tool".into(),
            version: "1.0.0".into(),
            description: "Does things".into(),
            long_description: String::new(),
            author_name: "Jane".into(),
            author_email: String::new(),
            author_url: String::new(),
            homepage: String::new(),
            documentation: String::new(),
            keywords: vec!["files".into(), "search".into()],
            license: "MIT".into(),
            server_type: "node".into(),
            tools: vec!["read".into(), "write".into()],
            tools_count: 2,
            has_user_config: true,
            schema_version: "0.1".into(),
            manifest_raw: "{}".into(),
            manifest_path: "manifest.json".into(),
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("dxtscout_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn connect_with_file_url() {
        let tmp = std::env::temp_dir().join(format!("dxtscout_test_{}.db", Uuid::now_v7()));
        let url = format!("file:{}", tmp.display());
        let storage = Storage::connect(&url, "unused").await.expect("connect");
        assert!(storage.extension_keys().await.unwrap().is_empty());
        assert!(tmp.exists());
    }

    #[tokio::test]
    async fn extension_roundtrip() {
        let storage = test_storage().await;
        let record = sample_record("acme/tool");
        storage.upsert_extension(&record).await.expect("insert");

        let stored = storage
            .get_extension("acme/tool")
            .await
            .expect("get")
            .expect("present");
        assert_eq!(stored.record.keywords, record.keywords);
        assert_eq!(stored.record.tools, record.tools);
        assert!(stored.record.has_user_config);
        assert_eq!(stored.record.stars, 3);
        assert_eq!(stored.digest, DigestState::default());

        assert!(storage.get_extension("acme/other").await.unwrap().is_none());
        assert_eq!(
            storage.extension_keys().await.unwrap(),
            HashSet::from(["acme/tool".to_string()])
        );
    }

    #[tokio::test]
    async fn upsert_keeps_discovered_at_and_downstream_columns() {
        let storage = test_storage().await;
        let first = sample_record("acme/tool");
        storage.upsert_extension(&first).await.unwrap();
        storage
            .set_category("acme/tool", "Productivity", "file tools")
            .await
            .unwrap();
        storage
            .mark_featured("acme/tool", 3, "2025-07-01")
            .await
            .unwrap();

        let second = ExtensionRecord {
            description: "Does more things".into(),
            stars: 10,
            discovered_at: first.discovered_at + Duration::hours(5),
            ..first.clone()
        };
        storage.upsert_extension(&second).await.unwrap();

        let stored = storage.get_extension("acme/tool").await.unwrap().unwrap();
        assert_eq!(stored.record.description, "Does more things");
        assert_eq!(stored.record.stars, 10);
        assert_eq!(
            timestamp(&stored.record.discovered_at),
            timestamp(&first.discovered_at)
        );
        assert_eq!(timestamp(&stored.last_checked_at), timestamp(&second.discovered_at));
        assert_eq!(stored.digest.category.as_deref(), Some("Productivity"));
        assert_eq!(stored.digest.category_reasoning.as_deref(), Some("file tools"));
        assert!(stored.digest.featured_in_newsletter);
        assert_eq!(stored.digest.featured_in_issue, Some(3));
        assert_eq!(stored.digest.newsletter_date.as_deref(), Some("2025-07-01"));
        assert_eq!(storage.extension_keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn digest_order_and_uncategorized() {
        let storage = test_storage().await;
        let mut low = sample_record("a/low");
        low.stars = 1;
        let mut high = sample_record("b/high");
        high.stars = 100;
        let mut tie_old = sample_record("c/tie-old");
        tie_old.stars = 1;
        tie_old.discovered_at = low.discovered_at - Duration::days(1);
        for r in [&low, &high, &tie_old] {
            storage.upsert_extension(r).await.unwrap();
        }
        storage.set_category("b/high", "Dev", "").await.unwrap();

        let listed: Vec<String> = storage
            .list_extensions(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.record.repo_name)
            .collect();
        assert_eq!(listed, vec!["b/high", "a/low", "c/tie-old"]);

        let uncategorized = storage.list_uncategorized(10).await.unwrap();
        assert_eq!(uncategorized.len(), 2);
        assert!(uncategorized.iter().all(|e| e.digest.category.is_none()));

        assert_eq!(storage.list_extensions(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repo_metadata_refresh() {
        let storage = test_storage().await;
        let mut record = sample_record("acme/tool");
        record.repo_updated_at = String::new();
        storage.upsert_extension(&record).await.unwrap();
        storage
            .upsert_extension(&sample_record("acme/fresh"))
            .await
            .unwrap();

        assert_eq!(
            storage.extensions_missing_repo_timestamp().await.unwrap(),
            vec!["acme/tool".to_string()]
        );

        let meta = RepoMetadata {
            url: String::new(),
            stars: 99,
            updated_at: Some("2025-08-01T00:00:00Z".into()),
        };
        assert!(storage.update_repo_metadata("acme/tool", &meta).await.unwrap());
        assert!(!storage.update_repo_metadata("acme/none", &meta).await.unwrap());

        let stored = storage.get_extension("acme/tool").await.unwrap().unwrap();
        assert_eq!(stored.record.stars, 99);
        assert_eq!(stored.record.repo_updated_at, "2025-08-01T00:00:00Z");
        assert_eq!(stored.record.repo_url, "https://github.com/acme/tool");
        assert!(storage.extensions_missing_repo_timestamp().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_match_lifecycle() {
        let storage = test_storage().await;
        storage.insert_non_match("acme/empty").await.expect("insert");
        // Duplicate writes are harmless.
        storage.insert_non_match("acme/empty").await.expect("insert again");
        storage.insert_non_match("acme/bad").await.unwrap();

        let keys = storage.non_match_keys(None).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("acme/empty"));

        // Everything was checked just now, so a cutoff in the past keeps it all
        // and a cutoff in the future expires it all.
        let past = Utc::now() - Duration::days(1);
        let future = Utc::now() + Duration::days(1);
        assert_eq!(storage.non_match_keys(Some(past)).await.unwrap().len(), 2);
        assert!(storage.non_match_keys(Some(future)).await.unwrap().is_empty());

        assert!(storage.clear_non_match("acme/empty").await.unwrap());
        assert!(!storage.clear_non_match("acme/empty").await.unwrap());
        assert_eq!(storage.clear_all_non_matches().await.unwrap(), 1);
        assert!(storage.non_match_keys(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_journal_lifecycle() {
        let storage = test_storage().await;
        let run_id = storage.insert_run().await.expect("insert run");
        assert!(!run_id.is_empty());
        assert!(storage.run_stats(&run_id).await.unwrap().is_none());

        storage
            .finish_run(&run_id, r#"{"inserted": 2}"#)
            .await
            .expect("finish run");
        let stats = storage.run_stats(&run_id).await.unwrap().unwrap();
        assert!(stats.contains("inserted"));
    }
}
