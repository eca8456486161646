//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use answerforge_core::generator::{GeneratorConfig, QuestionStrategy};
use answerforge_core::runner::{ProgressReporter, RunConfig, RunOutcome, RunStatus};
use answerforge_core::synthesizer::Synthesizer;
use answerforge_core::{generator, output, runner, timing};
use answerforge_llm::CompletionClient;
use answerforge_search::SearchClient;
use answerforge_shared::{
    AppConfig, PersonaRegistry, QuestionId, init_config, load_config, search_credentials,
    validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AnswerForge: persona-conditioned batch Q&A generation.
#[derive(Parser)]
#[command(
    name = "answerforge",
    version,
    about = "Generate persona-conditioned answer datasets from question files.",
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
    /// Process a question dataset into persona-conditioned answers.
    Run {
        /// Dataset file (csv/json/txt). Defaults to the configured path.
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Persona key (see `answerforge personas`).
        #[arg(short, long)]
        persona: Option<String>,

        /// Disable search enrichment.
        #[arg(long)]
        no_search: bool,

        /// Skip this many leading questions (resume support).
        #[arg(long, default_value_t = 0)]
        start_from: usize,

        /// Process at most this many questions.
        #[arg(long)]
        max_questions: Option<usize>,

        /// Output file. Defaults to the configured path.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List available personas and exit.
    Personas,

    /// Generate a question dataset about a topic.
    Generate {
        /// Topic to generate questions about.
        #[arg(short, long)]
        topic: String,

        /// Question strategies to run (can be repeated).
        #[arg(long = "type", value_enum, default_value = "comprehensive")]
        types: Vec<StrategyArg>,

        /// Target number of questions across all strategies.
        #[arg(short, long, default_value_t = 5000)]
        count: usize,

        /// Questions requested per completion call.
        #[arg(long, default_value_t = generator::GENERATION_BATCH_SIZE)]
        batch_size: usize,

        /// Output file. Defaults to output/<topic>_questions.jsonl.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Compute timing statistics over a produced answers file.
    Timing {
        /// Answers JSONL file.
        file: PathBuf,

        /// Include interval distribution and extreme intervals.
        #[arg(long)]
        detailed: bool,
    },

    /// Reduce an answers file to bare question/answer pairs.
    Clean {
        /// Input answers JSONL file.
        input: PathBuf,

        /// Output pairs JSONL file.
        output: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Question strategy flag values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum StrategyArg {
    Comprehensive,
    Expert,
    Personal,
}

impl From<StrategyArg> for QuestionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Comprehensive => Self::Comprehensive,
            StrategyArg::Expert => Self::Expert,
            StrategyArg::Personal => Self::Personal,
        }
    }
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
        0 => "answerforge=info",
        1 => "answerforge=debug",
        _ => "answerforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Run {
            dataset,
            persona,
            no_search,
            start_from,
            max_questions,
            out,
        } => {
            cmd_run(
                dataset,
                persona.as_deref(),
                no_search,
                start_from,
                max_questions,
                out,
            )
            .await
        }
        Command::Personas => cmd_personas(),
        Command::Generate {
            topic,
            types,
            count,
            batch_size,
            out,
        } => cmd_generate(&topic, &types, count, batch_size, out).await,
        Command::Timing { file, detailed } => cmd_timing(&file, detailed),
        Command::Clean { input, output } => cmd_clean(&input, &output),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(
    dataset: Option<PathBuf>,
    persona: Option<&str>,
    no_search: bool,
    start_from: usize,
    max_questions: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let registry = PersonaRegistry::builtin().with_overrides(&config.personas);

    let persona_key = persona
        .map(String::from)
        .unwrap_or_else(|| config.defaults.persona.clone());

    if !registry.contains(&persona_key) {
        let available: Vec<&str> = registry.iter().map(|p| p.key.as_str()).collect();
        return Err(eyre!(
            "unknown persona '{persona_key}'. Available: {}",
            available.join(", ")
        ));
    }

    // Validate the completion key before doing anything else.
    let api_key = validate_api_key(&config)?;
    let completion = CompletionClient::new(&config.completion, api_key)?;

    let search = if no_search {
        None
    } else {
        match search_credentials(&config) {
            Some((key, cx)) => Some(SearchClient::new(&config.search, key, cx)?),
            None => {
                warn!(
                    "search credentials not set ({} / {}); continuing without enrichment",
                    config.search.api_key_env, config.search.engine_id_env
                );
                None
            }
        }
    };
    let enrichment_enabled = search.is_some();

    let synthesizer = Synthesizer::new(completion, search, registry);

    let run_config = RunConfig {
        dataset_path: dataset
            .unwrap_or_else(|| PathBuf::from(&config.defaults.dataset_path)),
        persona_key: persona_key.clone(),
        start_offset: start_from,
        max_count: max_questions,
        enrichment_enabled,
        output_path: out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_path)),
        checkpoint_every: config.defaults.checkpoint_every,
        request_delay: Duration::from_millis(config.defaults.request_delay_ms),
    };

    info!(
        dataset = %run_config.dataset_path.display(),
        persona = %persona_key,
        enrichment = enrichment_enabled,
        "starting answer generation"
    );

    let interrupt = spawn_interrupt_handler();
    let reporter = CliProgress::new();

    let outcome = runner::run(&run_config, &synthesizer, interrupt, &reporter).await?;

    let error_count = outcome.answers.iter().filter(|a| a.error).count();

    println!();
    match outcome.status {
        RunStatus::Completed => {
            println!("  Batch run complete!");
            println!("  Run:     {}", outcome.run_id);
            println!("  Answers: {}", outcome.answers.len());
            println!("  Errors:  {error_count}");
            println!("  Output:  {}", outcome.written_to.display());
            println!("  Time:    {:.1}s", outcome.elapsed.as_secs_f64());
        }
        RunStatus::Interrupted => {
            println!(
                "  Run interrupted: {} answers salvaged",
                outcome.answers.len()
            );
            println!("  Salvaged to: {}", outcome.written_to.display());
            println!("  Resume with: --start-from {}", start_from + outcome.answers.len());
        }
    }
    println!();

    Ok(())
}

/// Flip an interrupt flag on the first ctrl-C; the runner observes it
/// before each record starts.
fn spawn_interrupt_handler() -> Arc<AtomicBool> {
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, flushing salvage file after the current record");
            flag.store(true, Ordering::SeqCst);
        }
    });
    interrupt
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_processed(&self, current: usize, total: usize, id: &QuestionId) {
        self.spinner
            .set_message(format!("Answering [{current}/{total}] question {id}"));
    }

    fn done(&self, _outcome: &RunOutcome) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// personas
// ---------------------------------------------------------------------------

fn cmd_personas() -> Result<()> {
    let config = load_config()?;
    let registry = PersonaRegistry::builtin().with_overrides(&config.personas);

    println!("Available personas:");
    for persona in registry.iter() {
        println!("  {:12} {}", persona.key, persona.name);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    topic: &str,
    types: &[StrategyArg],
    count: usize,
    batch_size: usize,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let api_key = validate_api_key(&config)?;
    let client = CompletionClient::new(&config.completion, api_key)?;

    let output_path = out.unwrap_or_else(|| default_questions_path(topic));

    let generator_config = GeneratorConfig {
        topic: topic.to_string(),
        strategies: types.iter().map(|&t| t.into()).collect(),
        target_count: count,
        batch_size,
        output_path,
        batch_delay: Duration::from_secs(2),
    };

    info!(topic, count, "starting question generation");

    let interrupt = spawn_interrupt_handler();
    let reporter = CliProgress::new();

    let outcome =
        generator::generate_dataset(&generator_config, &client, interrupt, &reporter).await?;
    reporter.spinner.finish_and_clear();

    println!();
    match outcome.status {
        RunStatus::Completed => {
            println!("  Question generation complete!");
            println!("  Questions:  {}", outcome.questions.len());
            println!("  Duplicates: {} removed", outcome.duplicates_removed);
            println!("  Output:     {}", outcome.written_to.display());
            println!("  Time:       {:.1}s", outcome.elapsed.as_secs_f64());
        }
        RunStatus::Interrupted => {
            println!(
                "  Generation interrupted: {} questions salvaged",
                outcome.questions.len()
            );
            println!("  Salvaged to: {}", outcome.written_to.display());
        }
    }
    println!();

    Ok(())
}

fn default_questions_path(topic: &str) -> PathBuf {
    let slug = topic.to_lowercase().replace(' ', "_");
    PathBuf::from(format!("output/{slug}_questions.jsonl"))
}

// ---------------------------------------------------------------------------
// timing
// ---------------------------------------------------------------------------

fn cmd_timing(file: &PathBuf, detailed: bool) -> Result<()> {
    let answers = output::read_answers(file)?;

    let Some(report) = timing::analyze(&answers) else {
        println!("Not enough timestamps to calculate intervals");
        return Ok(());
    };

    println!("Timing analysis for {} answers:", report.answer_count);
    println!("  Total time span:  {:.2} hours", report.total_span_hours);
    println!(
        "  Average interval: {:.2} minutes ({:.1}s)",
        report.mean_minutes,
        report.mean_minutes * 60.0
    );
    println!(
        "  Median interval:  {:.2} minutes ({:.1}s)",
        report.median_minutes,
        report.median_minutes * 60.0
    );
    println!("  Minimum interval: {:.2} minutes", report.min_minutes);
    println!("  Maximum interval: {:.2} minutes", report.max_minutes);
    println!();
    println!("  First answer: {}", report.first);
    println!("  Last answer:  {}", report.last);

    if detailed {
        println!();
        println!("Interval distribution:");
        for bucket in &report.distribution {
            println!(
                "  {:14} {} intervals ({:.1}%)",
                bucket.label, bucket.count, bucket.percentage
            );
        }

        println!();
        println!(
            "  Longest interval:  {:.2} minutes (Q{} to Q{})",
            report.longest.minutes, report.longest.from_id, report.longest.to_id
        );
        println!(
            "  Shortest interval: {:.2} minutes (Q{} to Q{})",
            report.shortest.minutes, report.shortest.from_id, report.shortest.to_id
        );

        if !report.long_gaps.is_empty() {
            println!();
            println!("Long intervals (> 2x median):");
            for gap in &report.long_gaps {
                println!(
                    "  Q{} to Q{}: {:.2} minutes",
                    gap.from_id, gap.to_id, gap.minutes
                );
            }
        }

        println!();
        println!(
            "  Estimated time per answer: {:.2} minutes",
            report.estimated_minutes_per_answer
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// clean
// ---------------------------------------------------------------------------

fn cmd_clean(input: &PathBuf, output_path: &PathBuf) -> Result<()> {
    let summary = output::extract_qa_pairs(input, output_path)?;
    println!(
        "Cleaned {} pairs to {} ({} lines skipped)",
        summary.kept,
        output_path.display(),
        summary.skipped
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
