//! feedsync - package feed mirroring and validation
//!
//! ## Commands
//!
//! - `run`: execute configured actions (all enabled ones, or those named)
//! - `list`: show configured actions
//! - `check`: validate the configuration and resolve every action without running it

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};

use feedsync_core::{ActionProcessor, ActionScope, ActionStatus, AppConfig, BatchReport, Registry};
use feedsync_plugins::builtin_registry;

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Package feed mirroring and validation", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, env = "FEEDSYNC_CONFIG", default_value = "feedsync.json")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and a JSON run summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run actions
    Run {
        /// Action names to run; all enabled actions when omitted
        actions: Vec<String>,
    },

    /// List configured actions
    List,

    /// Validate the configuration without touching any feed
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    feedsync_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(&cli.config)?;
    let registry = builtin_registry();

    match cli.command {
        Commands::Run { actions } => cmd_run(config, registry, &actions, cli.json).await,
        Commands::List => {
            print!("{}", render_list(&config));
            Ok(())
        }
        Commands::Check => cmd_check(&config, &registry),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::from_json_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

async fn cmd_run(config: AppConfig, registry: Registry, actions: &[String], json: bool) -> Result<()> {
    let processor = ActionProcessor::new(Arc::new(config), Arc::new(registry));
    let report = processor
        .execute(actions)
        .await
        .context("Failed to start actions")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_summary(&report));
    }
    Ok(())
}

fn cmd_check(config: &AppConfig, registry: &Registry) -> Result<()> {
    for action in &config.actions {
        ActionScope::build(config, action, registry)
            .with_context(|| format!("Action '{}' cannot be built", action.name))?;
        info!(action = %action.name, "Action resolves");
    }
    println!(
        "Configuration OK: {} feed(s), {} action(s)",
        config.feeds.len(),
        config.actions.len()
    );
    Ok(())
}

fn render_list(config: &AppConfig) -> String {
    if config.actions.is_empty() {
        return "No actions configured.\n".to_string();
    }
    let mut out = String::new();
    for action in &config.actions {
        let target = action
            .target_feed
            .as_deref()
            .map(|t| format!(" -> {}", t))
            .unwrap_or_default();
        out.push_str(&format!(
            "{:<24} {:<8} {:<9} {}{}\n",
            action.name,
            action.action_type.to_ascii_lowercase(),
            if action.enabled { "enabled" } else { "disabled" },
            action.source_feed,
            target
        ));
    }
    out
}

fn render_summary(report: &BatchReport) -> String {
    if report.is_empty() {
        return "No actions ran.\n".to_string();
    }
    let mut out = String::new();
    for outcome in &report.outcomes {
        let status = match &outcome.status {
            ActionStatus::Completed => "completed".to_string(),
            ActionStatus::Stopped => "stopped".to_string(),
            ActionStatus::Failed(message) => format!("failed: {}", message),
        };
        let s = &outcome.stats;
        out.push_str(&format!(
            "{} ({}) {}\n  processed {}  succeeded {}  failed {}  ignored {}  added {}  deleted {}  [{} ms]\n",
            outcome.name,
            outcome.action_type,
            status,
            s.processed,
            s.succeeded,
            s.failed,
            s.ignored,
            s.added,
            s.deleted,
            outcome.duration_ms
        ));
    }
    out
}
