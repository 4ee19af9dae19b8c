//! Core pipeline orchestration and domain logic for dxtscout.
//!
//! This crate ties together GitHub discovery and the record store into
//! end-to-end workflows ([`run_discovery`], [`refresh_repo_metadata`]).

pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod refresh;

pub use normalize::normalize;
pub use pipeline::{
    CandidateOutcome, DiscoveryReport, ProgressReporter, SilentProgress, known_repos,
    process_candidate, run_discovery,
};
pub use reconcile::{PersistOutcome, persist};
pub use refresh::{RefreshReport, refresh_repo_metadata};
