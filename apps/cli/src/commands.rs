//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use storycheck_core::{CheckOptions, CheckReport, ProgressReporter, run_check};
use storycheck_evaluator::{EvaluationSource, FileEvaluator, HttpEvaluator};
use storycheck_shared::{
    AppConfig, CATEGORIES, DocumentTree, EvaluatorConfig, PLACEHOLDER_TEXT, init_config,
    load_config, lookup_category,
};
use storycheck_structure::{ClassifierConfig, build_with};
use tracing::info;

use crate::document::JsonDocument;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// StoryCheck: structure and rhetoric review for business documents.
#[derive(Parser)]
#[command(
    name = "storycheck",
    version,
    about = "Review the Summary/Story/Body structure of a document and annotate it with findings.",
    long_about = None,
)]
pub(crate) struct Cli {
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
    /// Evaluate a document and write the findings back as annotations.
    Check {
        /// Document JSON file.
        #[arg(short, long)]
        document: PathBuf,

        /// Use a saved service response instead of calling the service.
        #[arg(short, long)]
        evaluations: Option<PathBuf>,

        /// Only show findings of this category (e.g. SUMMARY_LOGIC_FLOW).
        #[arg(short, long)]
        category: Option<String>,

        /// Where to write the annotated document (defaults to the input file).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Evaluation service base URL (overrides the config file).
        #[arg(long, env = "STORYCHECK_BASE_URL")]
        base_url: Option<String>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the structure tree of a document.
    Tree {
        /// Document JSON file.
        #[arg(short, long)]
        document: PathBuf,
    },

    /// Check that the evaluation service is reachable.
    Health {
        /// Evaluation service base URL (overrides the config file).
        #[arg(long, env = "STORYCHECK_BASE_URL")]
        base_url: Option<String>,
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
        0 => "storycheck=info",
        1 => "storycheck=debug",
        _ => "storycheck=trace",
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
    match cli.command {
        Command::Check {
            document,
            evaluations,
            category,
            out,
            base_url,
            json,
        } => {
            cmd_check(
                &document,
                evaluations.as_deref(),
                category,
                out.as_deref(),
                base_url.as_deref(),
                json,
            )
            .await
        }
        Command::Tree { document } => cmd_tree(&document).await,
        Command::Health { base_url } => cmd_health(base_url.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_check(
    document_path: &Path,
    evaluations: Option<&Path>,
    category: Option<String>,
    out: Option<&Path>,
    base_url: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;

    if let Some(id) = category.as_deref().filter(|id| lookup_category(id).is_none()) {
        return Err(eyre!(
            "unknown category '{id}': expected one of {}",
            CATEGORIES
                .iter()
                .map(|c| c.id)
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    let document = JsonDocument::load(document_path)?;
    let options = CheckOptions::from(&config).with_category(category);

    info!(
        document = %document_path.display(),
        source = if evaluations.is_some() { "file" } else { "service" },
        "checking document"
    );

    let report = match evaluations {
        Some(path) => check_with(&document, &FileEvaluator::new(path), &options).await?,
        None => {
            let evaluator = HttpEvaluator::new(EvaluatorConfig::resolve(&config, base_url)?)?;
            check_with(&document, &evaluator, &options).await?
        }
    };

    let out = out.unwrap_or(document.path());
    document.save(out).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  Check complete ({})", report.pass_id);
    println!("  Title:        {}", report.title);
    println!(
        "  Structure:    {} summaries, {} stories, {} bodies ({} placeholders)",
        report.tree_counts.summaries,
        report.tree_counts.stories,
        report.tree_counts.bodies,
        report.tree_counts.placeholders
    );
    println!("  Total score:  {}/100", report.total_score);
    for score in &report.category_scores {
        println!("    {:<28} {:>3}", score.display_name, score.score);
    }
    println!(
        "  Shown:        {} of {} evaluations (score {:.2})",
        report.display.selected, report.evaluations, report.display.overall_score
    );
    println!(
        "  Annotations:  {} written, {} unplaced, {} failed",
        report.display.annotations_written,
        report.display.routing_misses,
        report.display.write_failures.len()
    );
    println!("  Saved to:     {}", out.display());
    println!();
    Ok(())
}

async fn check_with<S: EvaluationSource>(
    document: &JsonDocument,
    source: &S,
    options: &CheckOptions,
) -> Result<CheckReport> {
    let reporter = CliProgress::new();
    let result = run_check(document, source, options, &reporter).await;
    if result.is_err() {
        reporter.spinner.finish_and_clear();
    }
    Ok(result?)
}

async fn cmd_tree(document_path: &Path) -> Result<()> {
    let config = load_config()?;
    let document = JsonDocument::load(document_path)?;
    let tree = build_with(document.paragraphs(), &ClassifierConfig::from(&config));
    print!("{}", render_tree(&tree));
    Ok(())
}

/// Indented outline of the tree; placeholder nodes are marked.
fn render_tree(tree: &DocumentTree) -> String {
    fn line(out: &mut String, depth: usize, label: &str, text: &str, index: Option<usize>) {
        let position = match index {
            Some(i) => format!("#{i}"),
            None => "--".to_string(),
        };
        let text = if index.is_none() && text == PLACEHOLDER_TEXT {
            format!("({text})")
        } else {
            text.to_string()
        };
        out.push_str(&format!("{:indent$}{position:>4} {label}: {text}\n", "", indent = depth * 2));
    }

    let mut out = String::new();
    line(&mut out, 0, "Title", &tree.title, tree.title_paragraph_index);
    for summary in &tree.summaries {
        line(&mut out, 1, "Summary", &summary.text, summary.source_paragraph_index);
        for story in &summary.stories {
            line(&mut out, 2, "Story", &story.text, story.source_paragraph_index);
            for body in &story.bodies {
                line(&mut out, 3, "Body", &body.text, body.source_paragraph_index);
            }
        }
    }
    out
}

async fn cmd_health(base_url: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let evaluator = HttpEvaluator::new(EvaluatorConfig::resolve(&config, base_url)?)?;
    let url = evaluator.config().endpoint(&evaluator.config().health_path)?;

    if evaluator.health().await {
        println!("Evaluation service is healthy ({url})");
        Ok(())
    } else {
        Err(eyre!("evaluation service is not reachable at {url}"))
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
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

    fn done(&self, _report: &CheckReport) {
        self.spinner.finish_and_clear();
    }
}
