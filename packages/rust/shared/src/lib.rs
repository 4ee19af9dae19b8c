//! Shared types, error model, and configuration for dxtscout.
//!
//! This crate is the foundation depended on by all other dxtscout crates.
//! It provides:
//! - [`DxtScoutError`]: the unified error type
//! - Domain types ([`Candidate`], [`ExtensionRecord`], [`KnownRepos`], ...)
//! - Configuration ([`AppConfig`], runtime options, credential resolution)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, Credentials, DEFAULT_QUERIES, DiscoverySettings, GitHubConfig, GitHubOptions,
    RunOptions, StoreConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_credentials, resolve_credentials_with,
};
pub use error::{DxtScoutError, Result};
pub use types::{
    Candidate, DigestState, ExtensionRecord, KnownRepos, RepoMetadata, StoredExtension,
    parse_repo_identifier,
};
