//! Desktop Extension manifest model and repository probing.
//!
//! A document counts as a manifest only if it is a JSON object carrying the
//! `dxt_version` marker. Every other field is optional; values of unexpected
//! JSON types are coerced here so that normalization never has to care.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use dxtscout_shared::{DxtScoutError, Result};

use crate::client::{FetchOutcome, GitHubClient};

/// Field whose presence marks a JSON document as a Desktop Extension manifest.
pub const VERSION_MARKER: &str = "dxt_version";

/// Paths tried, in order, for a manifest.
pub const MANIFEST_PATHS: [&str; 4] = [
    "manifest.json",
    "dxt/manifest.json",
    "extension/manifest.json",
    "src/manifest.json",
];

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A validated manifest with explicit optional fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// The version marker's value, rendered as text.
    pub dxt_version: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub long_description: Option<String>,
    pub author: Option<ManifestAuthor>,
    pub homepage: Option<String>,
    pub documentation: Option<String>,
    pub keywords: Vec<String>,
    pub license: Option<String>,
    /// `server.type`.
    pub server_type: Option<String>,
    /// Declared tools, one entry per element of the `tools` array.
    pub tools: Vec<ManifestTool>,
    pub user_config: Option<Map<String, Value>>,
    /// The document exactly as decoded.
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestTool {
    pub name: Option<String>,
}

impl Manifest {
    /// Decode manifest text. Fails on invalid JSON, a non-object root, or a
    /// missing version marker.
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let value: Value = serde_json::from_str(source)
            .map_err(|e| DxtScoutError::manifest(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Validate and extract a decoded document.
    pub fn from_value(raw: Value) -> Result<Self> {
        let Some(obj) = raw.as_object() else {
            return Err(DxtScoutError::manifest("document root is not an object"));
        };
        let Some(marker) = obj.get(VERSION_MARKER) else {
            return Err(DxtScoutError::manifest(format!(
                "missing `{VERSION_MARKER}` field"
            )));
        };

        let author = match obj.get("author") {
            Some(Value::Object(a)) => Some(ManifestAuthor {
                name: text(a.get("name")),
                email: text(a.get("email")),
                url: text(a.get("url")),
            }),
            Some(Value::String(name)) => Some(ManifestAuthor {
                name: Some(name.clone()),
                ..ManifestAuthor::default()
            }),
            _ => None,
        };

        let keywords = match obj.get("keywords") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|k| k.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        };

        let tools = match obj.get("tools") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|tool| ManifestTool {
                    name: match tool {
                        Value::Object(t) => text(t.get("name")),
                        other => text(Some(other)),
                    },
                })
                .collect(),
            _ => Vec::new(),
        };

        let server_type = match obj.get("server") {
            Some(Value::Object(s)) => text(s.get("type")),
            _ => None,
        };

        let user_config = match obj.get("user_config") {
            Some(Value::Object(c)) => Some(c.clone()),
            _ => None,
        };

        Ok(Self {
            dxt_version: text(Some(marker)).unwrap_or_default(),
            name: text(obj.get("name")),
            display_name: text(obj.get("display_name")),
            version: text(obj.get("version")),
            description: text(obj.get("description")),
            long_description: text(obj.get("long_description")),
            author,
            homepage: text(obj.get("homepage")),
            documentation: text(obj.get("documentation")),
            keywords,
            license: text(obj.get("license")),
            server_type,
            tools,
            user_config,
            raw,
        })
    }

    /// Tool names in declaration order; unnamed tools become `""`.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.name.clone().unwrap_or_default())
            .collect()
    }

    /// True iff `user_config` is a non-empty mapping.
    pub fn has_user_config(&self) -> bool {
        self.user_config.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Scalar coercion: strings as-is, numbers and booleans rendered, anything else absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Contents API decoding
// ---------------------------------------------------------------------------

/// Body of `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentEntry {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// What a contents response held.
#[derive(Debug, PartialEq, Eq)]
enum FileBody {
    File(String),
    /// A directory listing, symlink, or submodule at the requested path.
    NotAFile,
}

fn decode_contents(body: &str) -> Result<FileBody> {
    // Directories come back as a JSON array of entries.
    if body.trim_start().starts_with('[') {
        return Ok(FileBody::NotAFile);
    }
    let entry: ContentEntry = serde_json::from_str(body)
        .map_err(|e| DxtScoutError::manifest(format!("unreadable contents response: {e}")))?;
    if entry.kind != "file" {
        return Ok(FileBody::NotAFile);
    }

    let content = entry.content.unwrap_or_default();
    let bytes = match entry.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = content.split_ascii_whitespace().collect();
            STANDARD
                .decode(compact)
                .map_err(|e| DxtScoutError::manifest(format!("invalid base64 content: {e}")))?
        }
        Some(other) => {
            return Err(DxtScoutError::manifest(format!(
                "unsupported content encoding '{other}'"
            )));
        }
    };

    String::from_utf8(bytes)
        .map(FileBody::File)
        .map_err(|e| DxtScoutError::manifest(format!("content is not UTF-8: {e}")))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Outcome of probing one repository for a manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A valid manifest at `path`; later paths were not tried.
    Found { manifest: Manifest, path: String },
    /// Every path answered, and none held a valid manifest.
    Absent,
    /// No valid manifest, and at least one path could not be checked.
    Inconclusive { failures: Vec<String> },
}

/// Try [`MANIFEST_PATHS`] in order and return the first valid manifest.
pub async fn resolve(client: &GitHubClient, repo: &str) -> Resolution {
    resolve_paths(client, repo, &MANIFEST_PATHS).await
}

/// Try `paths` in order and return the first valid manifest.
///
/// Malformed documents count as absent. Rate-limited or failed requests are
/// remembered: if nothing valid turns up, the result is
/// [`Resolution::Inconclusive`] rather than [`Resolution::Absent`], so that
/// a network hiccup is never recorded as a non-match.
#[instrument(skip(client, paths))]
pub async fn resolve_paths(client: &GitHubClient, repo: &str, paths: &[&str]) -> Resolution {
    let mut failures = Vec::new();

    for path in paths {
        let outcome = match client.get_contents(repo, path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "cannot check repository");
                return Resolution::Inconclusive {
                    failures: vec![e.to_string()],
                };
            }
        };

        match outcome {
            FetchOutcome::Success(body) => {
                let parsed = decode_contents(&body).and_then(|file| match file {
                    FileBody::File(text) => Manifest::parse(&text).map(Some),
                    FileBody::NotAFile => Ok(None),
                });
                match parsed {
                    Ok(Some(manifest)) => {
                        info!(path, "manifest found");
                        return Resolution::Found {
                            manifest,
                            path: path.to_string(),
                        };
                    }
                    Ok(None) => debug!(path, "not a file"),
                    Err(e) => warn!(path, error = %e, "rejected manifest candidate"),
                }
            }
            FetchOutcome::NotFound => debug!(path, "no file"),
            FetchOutcome::RateLimited => failures.push(format!("{path}: rate limited")),
            FetchOutcome::TransientError(reason) => {
                warn!(path, %reason, "manifest fetch failed");
                failures.push(format!("{path}: {reason}"));
            }
        }
    }

    if failures.is_empty() {
        Resolution::Absent
    } else {
        Resolution::Inconclusive { failures }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;
    use wiremock::matchers::path;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::test_client;

    /// A contents-API response body wrapping `text`, line-wrapped like GitHub's.
    pub(crate) fn contents_body(text: &str) -> Value {
        let encoded = STANDARD.encode(text);
        let wrapped = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        json!({ "type": "file", "encoding": "base64", "content": wrapped })
    }

    async fn mount_file(server: &MockServer, repo: &str, file: &str, text: &str) {
        Mock::given(path(format!("/repos/{repo}/contents/{file}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(contents_body(text)))
            .mount(server)
            .await;
    }

    #[test]
    fn parse_minimal_manifest() {
        let m = Manifest::parse(r#"{"dxt_version":"1.0","name":"Tool"}"#).unwrap();
        assert_eq!(m.dxt_version, "1.0");
        assert_eq!(m.name.as_deref(), Some("Tool"));
        assert!(m.display_name.is_none());
        assert!(m.tools.is_empty());
        assert!(!m.has_user_config());
    }

    #[test]
    fn marker_is_required() {
        let err = Manifest::parse(r#"{"name":"X","tools":[{"name":"a"}]}"#).unwrap_err();
        assert!(err.to_string().contains("dxt_version"));
        assert!(Manifest::parse(r#"["dxt_version"]"#).is_err());
        assert!(Manifest::parse("not json").is_err());
    }

    #[test]
    fn marker_value_is_coerced() {
        assert_eq!(Manifest::parse(r#"{"dxt_version":0.1}"#).unwrap().dxt_version, "0.1");
        assert_eq!(Manifest::parse(r#"{"dxt_version":null}"#).unwrap().dxt_version, "");
    }

    #[test]
    fn loose_field_types_are_coerced() {
        let m = Manifest::parse(
            r#"{
                "dxt_version": "0.1",
                "version": 2,
                "author": "Jane Doe",
                "keywords": ["files", 3, "search"],
                "tools": [{"name": "read"}, "write", {"description": "nameless"}],
                "server": {"type": "node"},
                "user_config": {"root": {"type": "directory"}},
                "license": {"spdx": "MIT"}
            }"#,
        )
        .unwrap();
        assert_eq!(m.version.as_deref(), Some("2"));
        assert_eq!(m.author.as_ref().unwrap().name.as_deref(), Some("Jane Doe"));
        assert_eq!(m.keywords, vec!["files", "search"]);
        assert_eq!(m.tool_names(), vec!["read", "write", ""]);
        assert_eq!(m.tools.len(), 3);
        assert_eq!(m.server_type.as_deref(), Some("node"));
        assert!(m.has_user_config());
        assert!(m.license.is_none());
    }

    #[test]
    fn empty_user_config_does_not_count() {
        let m = Manifest::parse(r#"{"dxt_version":"1","user_config":{}}"#).unwrap();
        assert!(!m.has_user_config());
    }

    #[test]
    fn decode_handles_wrapped_base64_and_non_files() {
        let body = contents_body(r#"{"dxt_version":"1"}"#).to_string();
        assert_eq!(
            decode_contents(&body).unwrap(),
            FileBody::File(r#"{"dxt_version":"1"}"#.into())
        );
        assert_eq!(
            decode_contents(r#"{"type":"dir"}"#).unwrap(),
            FileBody::NotAFile
        );
        assert_eq!(decode_contents(r#"[{"type":"file"}]"#).unwrap(), FileBody::NotAFile);
        assert!(decode_contents(r#"{"type":"file","content":"!!!"}"#).is_err());
    }

    #[tokio::test]
    async fn first_valid_path_wins() {
        let server = MockServer::start().await;
        // Path 1 is malformed, paths 2 and 3 are both valid.
        mount_file(&server, "acme/multi", "manifest.json", "{ not json").await;
        let second = r#"{"dxt_version":"1","name":"Second"}"#;
        mount_file(&server, "acme/multi", "dxt/manifest.json", second).await;
        Mock::given(path("/repos/acme/multi/contents/extension/manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(contents_body(
                r#"{"dxt_version":"1","name":"Third"}"#,
            )))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server);
        match resolve(&client, "acme/multi").await {
            Resolution::Found { manifest, path } => {
                assert_eq!(path, "dxt/manifest.json");
                assert_eq!(manifest.name.as_deref(), Some("Second"));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_marker_everywhere_is_absent() {
        let server = MockServer::start().await;
        mount_file(&server, "acme/bad", "manifest.json", r#"{"name":"X"}"#).await;

        let client = test_client(&server);
        assert_eq!(resolve(&client, "acme/bad").await, Resolution::Absent);
    }

    #[tokio::test]
    async fn no_files_is_absent() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(4)
            .mount(&server)
            .await;

        let client = test_client(&server);
        assert_eq!(resolve(&client, "acme/empty").await, Resolution::Absent);
    }

    #[tokio::test]
    async fn transient_failures_are_inconclusive() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/acme/flaky/contents/dxt/manifest.json"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(path("/repos/acme/flaky/contents/src/manifest.json"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = test_client(&server);
        match resolve(&client, "acme/flaky").await {
            Resolution::Inconclusive { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("dxt/manifest.json"));
                assert!(failures[1].contains("rate limited"));
            }
            other => panic!("expected Inconclusive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_manifest_after_a_failure_is_still_found() {
        let server = MockServer::start().await;
        Mock::given(path("/repos/acme/tool/contents/manifest.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        mount_file(&server, "acme/tool", "dxt/manifest.json", r#"{"dxt_version":"1"}"#).await;

        let client = test_client(&server);
        assert!(matches!(
            resolve(&client, "acme/tool").await,
            Resolution::Found { .. }
        ));
    }
}
