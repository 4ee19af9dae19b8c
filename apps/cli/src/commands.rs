//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{ArgGroup, Parser, Subcommand};
use color_eyre::eyre::{Report, Result, eyre};
use dxtscout_core::{CandidateOutcome, DiscoveryReport, ProgressReporter};
use dxtscout_discovery::GitHubClient;
use dxtscout_shared::{
    AppConfig, Credentials, DxtScoutError, GitHubOptions, RunOptions, init_config, load_config,
    load_config_from, resolve_credentials,
};
use dxtscout_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// dxtscout: find and track Desktop Extensions published on GitHub.
#[derive(Parser)]
#[command(
    name = "dxtscout",
    version,
    about = "Discover DXT extension manifests on GitHub and keep a deduplicated record store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.dxtscout/dxtscout.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search GitHub, check new repositories, and store what is found.
    Discover {
        /// Candidates checked at once (overrides the config file).
        #[arg(long)]
        concurrency: Option<u32>,

        /// Check at most this many candidates, highest stars first.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Backfill stars and update times for records saved without them.
    Refresh,

    /// List stored extensions in digest order.
    List {
        /// Maximum number of rows.
        #[arg(long, default_value = "50")]
        limit: u32,

        /// Only extensions without a category.
        #[arg(long)]
        uncategorized: bool,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Manage the non-match cache.
    NonMatch {
        #[command(subcommand)]
        action: NonMatchAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Non-match subcommands.
#[derive(Subcommand)]
pub(crate) enum NonMatchAction {
    /// Forget non-matches so the next run checks those repositories again.
    #[command(group(ArgGroup::new("target").required(true).args(["repo", "all"])))]
    Clear {
        /// Repository (`owner/name`) to forget.
        repo: Option<String>,

        /// Forget every non-match.
        #[arg(long)]
        all: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "dxtscout=info",
        1 => "dxtscout=debug",
        _ => "dxtscout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Discover { concurrency, limit } => {
            cmd_discover(config_path, concurrency, limit).await
        }
        Command::Refresh => cmd_refresh(config_path).await,
        Command::List {
            limit,
            uncategorized,
            json,
        } => cmd_list(config_path, limit, uncategorized, json).await,
        Command::NonMatch { action } => match action {
            NonMatchAction::Clear { repo, all } => {
                cmd_non_match_clear(config_path, repo.as_deref(), all).await
            }
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Startup helpers
// ---------------------------------------------------------------------------

/// Attach a hint saying whether the user must fix something or can simply retry.
fn explain(err: DxtScoutError) -> Report {
    if err.is_fatal() {
        Report::new(err).wrap_err("startup aborted: fix the configuration and try again")
    } else {
        Report::new(err).wrap_err("run failed: stored records are intact, re-run to retry")
    }
}

fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    match config_path {
        Some(path) => load_config_from(&path),
        None => load_config(),
    }
    .map_err(explain)
}

/// Config plus every credential, checked before any network call.
fn startup(config_path: Option<PathBuf>) -> Result<(AppConfig, Credentials)> {
    let config = load(config_path)?;
    let credentials = resolve_credentials(&config).map_err(explain)?;
    Ok((config, credentials))
}

fn github_client(config: &AppConfig, credentials: &Credentials) -> Result<GitHubClient> {
    GitHubClient::new(&GitHubOptions::from(config), &credentials.github_token).map_err(explain)
}

async fn open_store(credentials: &Credentials) -> Result<Storage> {
    Storage::connect(&credentials.store_url, &credentials.store_token)
        .await
        .map_err(explain)
}

/// Stop flag set by the first Ctrl-C.
fn stop_on_ctrl_c() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight candidates");
            flag.store(true, Ordering::SeqCst);
        }
    });
    stop
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_discover(
    config_path: Option<PathBuf>,
    concurrency: Option<u32>,
    limit: Option<usize>,
) -> Result<()> {
    let (config, credentials) = startup(config_path)?;

    let mut opts = RunOptions::from(&config);
    if let Some(n) = concurrency {
        opts.concurrency = n.max(1);
    }
    opts.limit = limit;

    let client = github_client(&config, &credentials)?;
    let storage = open_store(&credentials).await?;

    info!(
        queries = opts.queries.len(),
        concurrency = opts.concurrency,
        "starting discovery"
    );

    let reporter = CliProgress::new();
    let report = dxtscout_core::run_discovery(
        Arc::new(client),
        Arc::new(storage),
        &opts,
        stop_on_ctrl_c(),
        &reporter,
    )
    .await
    .map_err(explain)?;

    println!();
    println!("  Discovery {}", if report.stopped { "stopped early" } else { "complete" });
    println!("  Candidates: {}", report.candidates_found);
    println!("  Checked:    {}", report.checked);
    println!("  Inserted:   {}", report.inserted);
    println!("  Updated:    {}", report.updated);
    println!("  Non-match:  {}", report.marked_non_match);
    println!("  Abandoned:  {}", report.abandoned);
    println!("  Failed:     {}", report.failed);
    if report.search_failures > 0 {
        println!("  Failed searches: {}", report.search_failures);
    }
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_refresh(config_path: Option<PathBuf>) -> Result<()> {
    let (config, credentials) = startup(config_path)?;
    let client = github_client(&config, &credentials)?;
    let storage = open_store(&credentials).await?;

    let report = dxtscout_core::refresh_repo_metadata(&client, &storage, stop_on_ctrl_c())
        .await
        .map_err(explain)?;

    println!();
    println!("  Missing timestamps: {}", report.missing);
    println!("  Updated:            {}", report.updated);
    println!("  Unavailable:        {}", report.unavailable);
    println!("  Failed:             {}", report.failed);
    println!();
    Ok(())
}

async fn cmd_list(
    config_path: Option<PathBuf>,
    limit: u32,
    uncategorized: bool,
    json: bool,
) -> Result<()> {
    let (_config, credentials) = startup(config_path)?;
    let storage = open_store(&credentials).await?;

    let extensions = if uncategorized {
        storage.list_uncategorized(limit).await?
    } else {
        storage.list_extensions(limit).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&extensions)?);
        return Ok(());
    }

    if extensions.is_empty() {
        println!("No extensions stored.");
        return Ok(());
    }

    println!("{:>7}  {:<40}  {:<30}  {:<10}  CATEGORY", "STARS", "REPOSITORY", "NAME", "VERSION");
    for ext in &extensions {
        let r = &ext.record;
        println!(
            "{:>7}  {:<40}  {:<30}  {:<10}  {}",
            r.stars,
            r.repo_name,
            r.display_name,
            r.version,
            ext.digest.category.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn cmd_non_match_clear(
    config_path: Option<PathBuf>,
    repo: Option<&str>,
    all: bool,
) -> Result<()> {
    let (_config, credentials) = startup(config_path)?;
    let storage = open_store(&credentials).await?;

    if all {
        let removed = storage.clear_all_non_matches().await?;
        println!("Cleared {removed} non-match entries.");
        return Ok(());
    }

    let repo = repo.ok_or_else(|| eyre!("give a repository or --all"))?;
    dxtscout_shared::parse_repo_identifier(repo)?;
    if storage.clear_non_match(repo).await? {
        println!("Cleared non-match for {repo}.");
    } else {
        println!("{repo} was not marked as a non-match.");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = load(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn candidate_processed(
        &self,
        repo: &str,
        outcome: &CandidateOutcome,
        current: usize,
        total: usize,
    ) {
        self.spinner.set_message(format!(
            "Probing [{current}/{total}] {repo} ({})",
            outcome.label()
        ));
    }

    fn done(&self, _report: &DiscoveryReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_discover_flags() {
        let cli = Cli::try_parse_from([
            "dxtscout", "-vv", "discover", "--concurrency", "4", "--limit", "10",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Discover { concurrency, limit } => {
                assert_eq!(concurrency, Some(4));
                assert_eq!(limit, Some(10));
            }
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn non_match_clear_needs_a_target() {
        assert!(Cli::try_parse_from(["dxtscout", "non-match", "clear"]).is_err());
        assert!(Cli::try_parse_from(["dxtscout", "non-match", "clear", "a/b", "--all"]).is_err());
        assert!(Cli::try_parse_from(["dxtscout", "non-match", "clear", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["dxtscout", "non-match", "clear", "acme/tool"]).is_ok());
    }

    #[test]
    fn config_errors_are_reported_as_startup_aborts() {
        let fatal = explain(DxtScoutError::config("GITHUB_TOKEN is not set"));
        assert!(fatal.to_string().starts_with("startup aborted"));
        assert!(format!("{fatal:?}").contains("GITHUB_TOKEN"));

        let retryable = explain(DxtScoutError::Storage("database is locked".into()));
        assert!(retryable.to_string().starts_with("run failed"));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dxtscout",
            "list",
            "--uncategorized",
            "--config",
            "/tmp/x.toml",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.toml")));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
