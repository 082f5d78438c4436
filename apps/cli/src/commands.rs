//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Notify;
use tracing::{info, warn};
use url::Url;

use tabharvest_artifacts::{ArtifactSink, DirectorySink};
use tabharvest_core::{
    ArtifactStatus, AutoConfirm, GateAnswer, HarvestReport, ProcessController, ProgressReporter,
    UserPrompt, WarmupSummary,
};
use tabharvest_extractor::{ExtractionAgent, MagnetAgent};
use tabharvest_host::SessionHost;
use tabharvest_shared::{
    AppConfig, Context, HarvestConfig, HarvestError, PageContent, ResultSet, load_config,
    load_config_from,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tabharvest: collect magnet links from every open page at once.
#[derive(Parser)]
#[command(
    name = "tabharvest",
    version,
    about = "Collect magnet links from every context of a browser session.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.tabharvest/tabharvest.toml).
    #[arg(long, env = "TABHARVEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

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
    /// Warm up every context of a session, confirm, then extract and save.
    Harvest {
        /// Session file describing the open contexts.
        #[arg(short, long)]
        session: PathBuf,

        /// Confirm automatically and save without asking for a filename.
        #[arg(short, long)]
        yes: bool,

        /// Directory the artifact is saved into.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Sort identifiers before writing.
        #[arg(long)]
        sort: bool,

        /// Maximum concurrent extractions (0 = unbounded).
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Run the extraction agent over local HTML files and print the results.
    Extract {
        /// HTML files to scan.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
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
        0 => "tabharvest=info",
        1 => "tabharvest=debug",
        _ => "tabharvest=trace",
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
        Command::Harvest {
            session,
            yes,
            out,
            sort,
            concurrency,
        } => {
            let app = resolve_config(config_path.as_deref())?;
            cmd_harvest(&app, &session, yes, out, sort, concurrency).await
        }
        Command::Extract { files } => cmd_extract(&files).await,
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_harvest(
    app: &AppConfig,
    session: &Path,
    yes: bool,
    out: Option<PathBuf>,
    sort: bool,
    concurrency: Option<usize>,
) -> Result<()> {
    let mut config = HarvestConfig::from(app);
    if let Some(out) = out {
        config.output_dir = out;
    }
    if sort {
        config.sort_output = true;
    }
    if let Some(n) = concurrency {
        config.max_concurrency = (n > 0).then_some(n);
    }

    let host = SessionHost::open(session, &app.fetch)?;

    info!(
        session = %session.display(),
        out = %config.output_dir.display(),
        auto_confirm = yes,
        "starting harvest"
    );

    let progress = Arc::new(CliProgress::new());
    let directory = DirectorySink::new(config.output_dir.clone());

    let (prompt, sink): (Arc<dyn UserPrompt>, Arc<dyn ArtifactSink>) = if yes {
        (Arc::new(AutoConfirm), Arc::new(directory))
    } else {
        (
            Arc::new(DialoguerPrompt {
                spinner: progress.spinner.clone(),
            }),
            Arc::new(PromptingSink {
                spinner: progress.spinner.clone(),
                directory,
            }),
        )
    };

    let controller = ProcessController::new(Arc::new(host), prompt, sink, config)
        .with_progress(progress.clone());

    controller.signals().start_process();
    let settled = Arc::clone(&progress);
    controller.run(async move { settled.wait().await }).await;

    progress.print_summary();
    Ok(())
}

async fn cmd_extract(files: &[PathBuf]) -> Result<()> {
    let agent = MagnetAgent;
    let mut set = ResultSet::new();

    for file in files {
        let html = tokio::fs::read_to_string(file)
            .await
            .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
        let page = PageContent {
            address: file_address(file),
            html,
        };

        let found = agent.extract(&page);
        info!(file = %file.display(), found = found.len(), "scanned");
        set.extend(found);
    }

    for identifier in set.iter() {
        println!("{identifier}");
    }
    Ok(())
}

/// `file://` address of a local document, used as the base for relative links.
fn file_address(file: &Path) -> String {
    std::fs::canonicalize(file)
        .ok()
        .and_then(|absolute| Url::from_file_path(absolute).ok())
        .map(String::from)
        .unwrap_or_default()
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Interactive collaborators
// ---------------------------------------------------------------------------

/// Confirmation gate shown on the terminal.
struct DialoguerPrompt {
    spinner: ProgressBar,
}

#[async_trait]
impl UserPrompt for DialoguerPrompt {
    async fn confirm(&self, context: &Context, message: &str) -> Option<bool> {
        let spinner = self.spinner.clone();
        let prompt = format!("{message}\n(prompt shown for {})", context.address);

        let answer = tokio::task::spawn_blocking(move || {
            spinner.suspend(|| {
                Confirm::new()
                    .with_prompt(prompt)
                    .default(true)
                    .interact_opt()
            })
        })
        .await;

        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!(error = %e, "confirmation prompt failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "confirmation prompt task failed");
                None
            }
        }
    }
}

/// Asks for the filename before writing into the output directory.
struct PromptingSink {
    spinner: ProgressBar,
    directory: DirectorySink,
}

#[async_trait]
impl ArtifactSink for PromptingSink {
    async fn save_as(&self, filename: &str, content: &str) -> tabharvest_shared::Result<PathBuf> {
        let spinner = self.spinner.clone();
        let suggested = filename.to_string();

        let chosen = tokio::task::spawn_blocking(move || {
            spinner.suspend(|| {
                Input::<String>::new()
                    .with_prompt("Save as")
                    .default(suggested)
                    .interact_text()
            })
        })
        .await
        .map_err(|e| HarvestError::Task(e.to_string()))?
        .map_err(|e| HarvestError::Artifact(format!("save prompt failed: {e}")))?;

        let chosen = chosen.trim();
        if chosen.is_empty() {
            return Err(HarvestError::Artifact("no filename given".into()));
        }
        self.directory.save_as(chosen, content).await
    }

    async fn notify_empty(&self) {
        self.spinner.suspend(|| println!("  No magnet links found."));
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    settled: Notify,
    warmup: Mutex<Option<WarmupSummary>>,
    answer: Mutex<Option<GateAnswer>>,
    report: Mutex<Option<HarvestReport>>,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            settled: Notify::new(),
            warmup: Mutex::new(None),
            answer: Mutex::new(None),
            report: Mutex::new(None),
        }
    }

    /// Resolves once the cycle can make no further progress.
    async fn wait(&self) {
        self.settled.notified().await;
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
        self.settled.notify_one();
    }

    fn print_summary(&self) {
        let report = self.report.lock().ok().and_then(|r| r.clone());
        let answer = self.answer.lock().ok().and_then(|a| *a);
        let warmup = self.warmup.lock().ok().and_then(|w| w.clone());

        println!();
        let Some(report) = report else {
            match (answer, warmup) {
                (Some(GateAnswer::Declined), _) => println!("  Extraction declined."),
                (Some(GateAnswer::Unanswered), _) => println!("  No answer given, nothing extracted."),
                (_, Some(w)) if !w.checkpoint_injected => println!(
                    "  No scriptable active context to confirm in; activated {} context(s).",
                    w.activated.len()
                ),
                _ => println!("  Harvest did not run."),
            }
            println!();
            return;
        };

        println!("  Harvest complete!");
        println!("  Run:       {}", report.run_id);
        println!(
            "  Contexts:  {} scanned of {}",
            report.contexts_scanned, report.contexts_total
        );
        println!("  Found:     {}", report.identifiers);
        if !report.failures.is_empty() {
            println!("  Failures:  {}", report.failures.len());
            for failure in &report.failures {
                println!("    {} {}: {}", failure.id, failure.address, failure.reason);
            }
        }
        match &report.artifact {
            ArtifactStatus::Saved { path, .. } => println!("  Saved:     {}", path.display()),
            ArtifactStatus::Empty => println!("  Saved:     nothing (no magnet links found)"),
            ArtifactStatus::Failed(reason) => println!("  Saved:     failed ({reason})"),
        }
        println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
        println!();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn context_activated(&self, address: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Activating [{current}/{total}] {address}"));
    }

    fn warmup_done(&self, summary: &WarmupSummary) {
        if let Ok(mut slot) = self.warmup.lock() {
            *slot = Some(summary.clone());
        }
        if summary.checkpoint_injected {
            self.spinner.set_message("Waiting for confirmation");
        } else {
            self.finish();
        }
    }

    fn gate(&self, answer: GateAnswer) {
        if let Ok(mut slot) = self.answer.lock() {
            *slot = Some(answer);
        }
        if answer != GateAnswer::Confirmed {
            self.finish();
        }
    }

    fn context_extracted(&self, address: &str, found: usize, settled: usize, total: usize) {
        self.spinner.set_message(format!(
            "Extracting [{settled}/{total}] {address} ({found} found)"
        ));
    }

    fn done(&self, report: &HarvestReport) {
        if let Ok(mut slot) = self.report.lock() {
            *slot = Some(report.clone());
        }
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_address_is_percent_encoded() {
        let dir = std::env::temp_dir().join(format!("th-cli-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("saved page #1.html");
        std::fs::write(&path, "<p></p>").unwrap();

        let address = file_address(&path);
        assert!(address.starts_with("file://"));
        assert!(address.ends_with("/saved%20page%20%231.html"));
        assert_eq!(
            Url::parse(&address).unwrap().to_file_path().unwrap(),
            std::fs::canonicalize(&path).unwrap()
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_has_no_address() {
        assert_eq!(file_address(Path::new("/definitely/not/here.html")), "");
    }
}
