//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentbridge_converters::registry;
use agentbridge_core::{
    Outcome, ProgressReporter, RunReport, SourceStatus, StatusReport, TargetResult, all_targets,
    build_tree, collect_status, remove_targets, render_targets, sync_sources,
};
use agentbridge_shared::{AppConfig, BridgeHome, SourceRecord};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// agent-bridge: one source of truth for agents, skills, and workflows.
#[derive(Parser)]
#[command(
    name = "agent-bridge",
    version,
    about = "Merge agent knowledge from several sources and render it for AI coding tools.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
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
    /// Fetch or refresh registered sources (all enabled sources by default).
    Sync {
        /// Source names to sync.
        names: Vec<String>,
    },

    /// Merge every layer and render it for the given targets.
    Render {
        /// Target identifiers (see `agent-bridge targets`).
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        targets: Vec<String>,

        /// Render the configured default targets, or every target.
        #[arg(long)]
        all: bool,

        /// Directory the target folders are written into.
        #[arg(long, default_value = ".")]
        dest: PathBuf,

        /// Project root holding the project-local knowledge directory.
        #[arg(long, default_value = ".")]
        project: PathBuf,
    },

    /// Delete everything previously rendered for the given targets.
    Remove {
        /// Target identifiers.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        targets: Vec<String>,

        /// Remove every registered target.
        #[arg(long)]
        all: bool,

        /// Directory the targets were rendered into.
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// List available targets.
    Targets,

    /// Show sources, rendered targets, and the merged tree.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Project root holding the project-local knowledge directory.
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Directory the targets were rendered into.
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Manage registered knowledge sources.
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Source registry subcommands.
#[derive(Subcommand)]
pub(crate) enum SourceAction {
    /// List registered sources in merge order.
    List,
    /// Register a new source.
    Add {
        /// Unique source name.
        name: String,

        /// Git URL or local directory.
        origin: String,

        /// Merge priority; lower numbers win.
        #[arg(short, long, default_value_t = 100)]
        priority: u32,

        /// Knowledge roots inside the source (repeatable).
        #[arg(long = "root")]
        roots: Vec<String>,

        /// Free-form description.
        #[arg(short, long, default_value = "")]
        description: String,

        /// Register without enabling.
        #[arg(long)]
        disabled: bool,
    },
    /// Unregister a source and delete its cache.
    Remove {
        /// Source name.
        name: String,
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
        0 => "agent_bridge=info,agentbridge=info",
        1 => "agent_bridge=debug,agentbridge=debug",
        _ => "agent_bridge=trace,agentbridge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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

/// Run the CLI command and report how it went.
pub(crate) async fn run(cli: Cli) -> Result<Outcome> {
    let home = BridgeHome::discover()?;
    match cli.command {
        Command::Sync { names } => cmd_sync(&home, &names).await,
        Command::Render {
            targets,
            all,
            dest,
            project,
        } => cmd_render(&home, targets, all, &dest, &project).await,
        Command::Remove { targets, all, dest } => cmd_remove(targets, all, &dest),
        Command::Targets => cmd_targets(),
        Command::Status {
            json,
            project,
            dest,
        } => cmd_status(&home, json, &project, &dest),
        Command::Source { action } => match action {
            SourceAction::List => cmd_source_list(&home),
            SourceAction::Add {
                name,
                origin,
                priority,
                roots,
                description,
                disabled,
            } => {
                let mut record = SourceRecord::new(name, origin).with_priority(priority);
                record.description = description;
                record.enabled = !disabled;
                if !roots.is_empty() {
                    record.roots = roots;
                }
                cmd_source_add(&home, record)
            }
            SourceAction::Remove { name } => cmd_source_remove(&home, &name),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&home),
            ConfigAction::Show => cmd_config_show(&home),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(home: &BridgeHome, names: &[String]) -> Result<Outcome> {
    let mut config = home.load_config()?;
    if names.is_empty() && config.sources.is_empty() {
        println!("No sources registered. Add one with `agent-bridge source add`.");
        return Ok(Outcome::Succeeded);
    }

    let progress = CliProgress::new();
    let report = sync_sources(&mut config, home, names, &progress).await?;
    home.save_config(&config)?;

    println!();
    for source in &report.sources {
        let status = match &source.status {
            SourceStatus::Cloned => "cloned".to_string(),
            SourceStatus::Updated => "updated".to_string(),
            SourceStatus::Current => "up to date".to_string(),
            SourceStatus::Failed { error } => format!("failed: {error}"),
        };
        println!("  {:<20} {status}", source.name);
    }
    println!();
    print_warnings(&report);
    Ok(report.outcome())
}

/// Resolve `--all` to the configured defaults, or every registered target.
fn requested_targets(config: &AppConfig, targets: Vec<String>, all: bool) -> Vec<String> {
    if !all {
        return targets;
    }
    if config.defaults.targets.is_empty() {
        all_targets()
    } else {
        config.defaults.targets.clone()
    }
}

async fn cmd_render(
    home: &BridgeHome,
    targets: Vec<String>,
    all: bool,
    dest: &Path,
    project: &Path,
) -> Result<Outcome> {
    let config = home.load_config()?;
    let targets = requested_targets(&config, targets, all);
    if targets.is_empty() {
        return Err(eyre!("no targets requested"));
    }

    info!(targets = ?targets, dest = %dest.display(), "rendering");

    let progress = CliProgress::new();
    let built = build_tree(&config, home, project, &progress)?;
    let tree = Arc::new(built.tree);
    let outcomes =
        render_targets(tree, &targets, dest, config.concurrency(), &progress).await;

    let report = RunReport {
        warnings: built.warnings,
        targets: outcomes,
        ..RunReport::default()
    };
    progress.done(&report);

    println!();
    for target in &report.targets {
        match &target.result {
            TargetResult::Rendered {
                files,
                written,
                removed,
            } => println!(
                "  {:<10} {files} files ({written} written, {removed} removed)",
                target.target
            ),
            TargetResult::Removed { files } => {
                println!("  {:<10} {files} files removed", target.target)
            }
            TargetResult::Failed { error } => println!("  {:<10} FAILED: {error}", target.target),
        }
    }
    println!();
    print_warnings(&report);
    Ok(report.outcome())
}

fn cmd_remove(targets: Vec<String>, all: bool, dest: &Path) -> Result<Outcome> {
    let targets = if all { all_targets() } else { targets };
    let progress = CliProgress::new();
    let report = RunReport {
        targets: remove_targets(&targets, dest, &progress),
        ..RunReport::default()
    };
    progress.done(&report);

    for target in &report.targets {
        match &target.result {
            TargetResult::Removed { files } => {
                println!("  {:<10} {files} files removed", target.target)
            }
            TargetResult::Failed { error } => println!("  {:<10} FAILED: {error}", target.target),
            TargetResult::Rendered { .. } => {}
        }
    }
    Ok(report.outcome())
}

fn cmd_targets() -> Result<Outcome> {
    println!();
    println!("  {:<10} {:<16} {:<20} STATUS", "ID", "NAME", "OUTPUT");
    for info in registry().infos() {
        println!(
            "  {:<10} {:<16} {:<20} {}",
            info.name, info.display_name, info.output_dir, info.status
        );
    }
    println!();
    Ok(Outcome::Succeeded)
}

fn cmd_status(home: &BridgeHome, json: bool, project: &Path, dest: &Path) -> Result<Outcome> {
    let config = home.load_config()?;
    let status = collect_status(&config, home, project, dest)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(Outcome::Succeeded)
}

fn print_status(status: &StatusReport) {
    println!();
    println!("  Config:   {}", status.config_file.display());
    println!("  Project:  {}", status.project_dir.display());
    println!("  Bundle:   v{}", status.bundle_version);
    println!();
    println!("  Sources:");
    for source in &status.sources {
        let priority = source
            .priority
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = match (source.enabled, source.present) {
            (false, _) => "disabled",
            (true, true) => "ready",
            (true, false) => "not synced",
        };
        let synced = source
            .last_synced
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        println!(
            "    {:<16} {:<8} {:>4}  {:<10} {synced}",
            source.name, source.origin_kind, priority, state
        );
    }
    println!();
    println!("  Targets:");
    for target in &status.targets {
        if target.rendered {
            println!("    {:<10} {} files", target.target, target.files);
        } else {
            println!("    {:<10} not rendered", target.target);
        }
    }
    println!();
    println!(
        "  Units:    {} agents, {} skills, {} workflows",
        status.units.agents, status.units.skills, status.units.workflows
    );
    if !status.mcp_servers.is_empty() {
        println!("  MCP:      {}", status.mcp_servers.join(", "));
    }
    for warning in &status.warnings {
        println!("  warning: {warning}");
    }
    println!();
}

fn cmd_source_list(home: &BridgeHome) -> Result<Outcome> {
    let config = home.load_config()?;
    let sources = config.enabled_sources();
    if config.sources.is_empty() {
        println!("No sources registered.");
        return Ok(Outcome::Succeeded);
    }
    for record in &sources {
        println!("  {:>4}  {:<16} {}", record.priority, record.name, record.origin);
    }
    for record in config.sources.iter().filter(|r| !r.enabled) {
        println!("     -  {:<16} {} (disabled)", record.name, record.origin);
    }
    Ok(Outcome::Succeeded)
}

fn cmd_source_add(home: &BridgeHome, record: SourceRecord) -> Result<Outcome> {
    let mut config = home.load_config()?;
    let name = record.name.clone();
    config.add_source(record)?;
    home.save_config(&config)?;
    println!("Added source '{name}'. Run `agent-bridge sync {name}` to fetch it.");
    Ok(Outcome::Succeeded)
}

fn cmd_source_remove(home: &BridgeHome, name: &str) -> Result<Outcome> {
    let mut config = home.load_config()?;
    config.remove_source(name)?;
    home.save_config(&config)?;
    let cache_removed = home.remove_cache(name)?;
    if cache_removed {
        println!("Removed source '{name}' and its cache.");
    } else {
        println!("Removed source '{name}'.");
    }
    Ok(Outcome::Succeeded)
}

fn cmd_config_init(home: &BridgeHome) -> Result<Outcome> {
    let path = home.init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(Outcome::Succeeded)
}

fn cmd_config_show(home: &BridgeHome) -> Result<Outcome> {
    let config = home.load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(Outcome::Succeeded)
}

/// Surface every warning once, after the per-item results.
fn print_warnings(report: &RunReport) {
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
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

    fn source_synced(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Syncing [{current}/{total}] {name}"));
    }

    fn target_done(&self, target: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Rendering [{current}/{total}] {target}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}
