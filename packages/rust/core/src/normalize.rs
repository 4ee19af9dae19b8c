//! Manifest → [`ExtensionRecord`] normalization.

use chrono::{DateTime, Utc};

use dxtscout_discovery::Manifest;
use dxtscout_shared::{ExtensionRecord, RepoMetadata};

/// Build the canonical record for a confirmed extension.
///
/// Pure: the same inputs always produce the same record, and `now` is the
/// only source of the discovery timestamp. Absent strings become `""`,
/// an absent `display_name` falls back to `name`.
pub fn normalize(
    repo_name: &str,
    manifest: &Manifest,
    repo: &RepoMetadata,
    manifest_path: &str,
    now: DateTime<Utc>,
) -> ExtensionRecord {
    let name = manifest.name.clone().unwrap_or_default();
    let display_name = manifest.display_name.clone().unwrap_or_else(|| name.clone());
    let author = manifest.author.clone().unwrap_or_default();

    let tools = manifest.tool_names();
    let manifest_raw =
        serde_json::to_string_pretty(&manifest.raw).unwrap_or_else(|_| manifest.raw.to_string());

    let repo_url = if repo.url.is_empty() {
        format!("https://github.com/{repo_name}")
    } else {
        repo.url.clone()
    };

    ExtensionRecord {
        repo_name: repo_name.to_string(),
        repo_url,
        stars: repo.stars,
        repo_updated_at: repo.updated_at.clone().unwrap_or_default(),
        discovered_at: now,
        name,
        display_name,
        version: manifest.version.clone().unwrap_or_default(),
        description: manifest.description.clone().unwrap_or_default(),
        long_description: manifest.long_description.clone().unwrap_or_default(),
        author_name: author.name.unwrap_or_default(),
        author_email: author.email.unwrap_or_default(),
        author_url: author.url.unwrap_or_default(),
        homepage: manifest.homepage.clone().unwrap_or_default(),
        documentation: manifest.documentation.clone().unwrap_or_default(),
        keywords: manifest.keywords.clone(),
        license: manifest.license.clone().unwrap_or_default(),
        server_type: manifest.server_type.clone().unwrap_or_default(),
        tools_count: manifest.tools.len(),
        tools,
        has_user_config: manifest.has_user_config(),
        schema_version: manifest.dxt_version.clone(),
        manifest_raw,
        manifest_path: manifest_path.to_string(),
    }
}
