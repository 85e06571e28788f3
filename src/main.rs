//! plugin-drift - breaking-change tracker for lockfile-pinned Neovim plugins

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use plugin_drift::analysis::AnalysisPipeline;
use plugin_drift::client::GitHubClient;
use plugin_drift::config::{default_cache_dir, ClientConfig};
use plugin_drift::lockfile::{default_config_dir, find_lockfile, parse_lockfile};
use plugin_drift::render::{to_json, Filter, Renderer};
use plugin_drift::{AnalysisEvent, AnalysisExecutor, Dependency, RemoteSource};

#[derive(Parser)]
#[command(name = "plugin-drift")]
#[command(about = "Check lockfile-pinned plugins for upstream breaking changes", long_about = None)]
struct Cli {
    /// Path to lazy-lock.json [default: $XDG_CONFIG_HOME/nvim or ~/.config/nvim]
    #[arg(short, long, value_name = "FILE")]
    lockfile: Option<PathBuf>,

    /// Neovim config directory scanned for "owner/repo" plugin specs
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// GitHub token for higher rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Bypass the response cache entirely
    #[arg(long)]
    no_cache: bool,

    /// Response cache directory [default: <user cache dir>/plugin-drift]
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Which plugins to list
    #[arg(short, long, value_enum, default_value_t = Filter::All)]
    filter: Filter,

    /// Print a detail section for every listed plugin
    #[arg(short, long)]
    details: bool,

    /// Print ranked reports as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Look up the default branch for plugins whose lockfile branch is empty
    #[arg(long)]
    resolve_branch: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Logs go to stderr; stdout carries the report.
fn init_tracing(verbose: u8) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,plugin_drift=info".to_string(),
            2 => "info,plugin_drift=debug".to_string(),
            _ => "debug,plugin_drift=trace".to_string(),
        },
    };
    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(verbose >= 3)
                .with_line_number(verbose >= 3)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

/// Fills in empty branches from the repository's default branch.
async fn resolve_branches(client: &GitHubClient, dependencies: &mut [Dependency]) {
    for dep in dependencies.iter_mut().filter(|d| d.branch.is_empty()) {
        match client.repository_info(&dep.owner, &dep.repo).await {
            Ok(info) => dep.branch = info.default_branch,
            Err(e) => warn!(dependency = %dep.name, error = %e, "could not resolve default branch"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let lockfile = find_lockfile(cli.lockfile.as_deref())?;
    let config_dir = cli.config_dir.clone().or_else(default_config_dir);
    let mut dependencies = parse_lockfile(&lockfile, config_dir.as_deref())
        .wrap_err_with(|| format!("loading {}", lockfile.display()))?;

    let config = ClientConfig::default()
        .with_token(cli.token.clone())
        .with_cache(!cli.no_cache)
        .with_cache_dir(cli.cache_dir.clone().unwrap_or_else(default_cache_dir));
    if config.token.is_none() {
        info!("no GITHUB_TOKEN set, using unauthenticated rate limits");
    }
    let client = GitHubClient::new(config).wrap_err("building GitHub client")?;

    if cli.resolve_branch {
        resolve_branches(&client, &mut dependencies).await;
    }

    let total = dependencies.len();
    let renderer = Renderer::new(std::io::stdout().is_terminal());
    let pipeline = Arc::new(AnalysisPipeline::new(client));
    let mut handle = AnalysisExecutor::new().spawn(pipeline, dependencies);
    let stopper = handle.stop_handle();

    let mut interrupted = false;
    let outcome = loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(AnalysisEvent::Analyzed { index, report }) => {
                    eprintln!("{}", renderer.progress_line(index, total, &report));
                }
                Some(AnalysisEvent::Finished(outcome)) => break Some(outcome),
                None => break None,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                eprintln!("stopping after the current plugin...");
                interrupted = true;
                stopper.stop();
            }
        }
    };

    let Some(outcome) = outcome else {
        color_eyre::eyre::bail!("analysis task ended without a result");
    };

    if cli.json {
        println!("{}", to_json(&outcome.reports)?);
        return Ok(());
    }

    println!();
    println!("{}", renderer.summary_line(&outcome.reports));
    println!();
    print!("{}", renderer.table(&outcome.reports, cli.filter));

    if cli.details {
        for report in outcome.reports.iter().filter(|r| cli.filter.matches(r)) {
            println!();
            print!("{}", renderer.detail(report));
        }
    }

    if outcome.stopped {
        eprintln!("\nstopped early: {}/{} plugins analyzed", outcome.stats.analyzed, total);
    }
    Ok(())
}
