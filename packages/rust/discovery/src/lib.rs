//! GitHub-side discovery: paced API access, candidate search, manifest probing.
//!
//! The flow for one run is [`find_candidates`] once, then [`resolve`] per
//! candidate. Neither function returns an error for network trouble; failures
//! are folded into [`SearchOutcome`] counts and [`Resolution::Inconclusive`].

mod client;
mod gate;
mod manifest;
mod search;

pub use client::{FetchOutcome, GitHubClient, Surface};
pub use gate::RateGate;
pub use manifest::{
    MANIFEST_PATHS, Manifest, ManifestAuthor, ManifestTool, Resolution, VERSION_MARKER, resolve,
    resolve_paths,
};
pub use search::{SearchOutcome, find_candidates};

/// Test helpers shared with downstream crates' tests.
#[doc(hidden)]
pub mod testing {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    /// A contents-API JSON body carrying `text` as base64.
    pub fn contents_json(text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "file",
            "encoding": "base64",
            "content": STANDARD.encode(text),
        })
    }
}
