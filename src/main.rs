//! TriageDash - operational dashboard for email-triage logs
//!
//! A CLI that loads the records written by the triage pipeline, filters
//! them, and renders the dashboard views: KPIs, per-day volume,
//! per-template breakdowns, record listings, and assistant answers.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (source, config, validation, webhook failure, etc.)
//!   2 - Response rate below the --fail-below threshold

mod analysis;
mod assistant;
mod cli;
mod config;
mod models;
mod report;
mod source;

use anyhow::{Context, Result};
use assistant::{AssistantClient, AssistantContext};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use models::{FilterCriteria, LogRecord};
use source::{ConfiguredSource, PostgresSource, RecordSource};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Config decides the log level, so it loads before logging starts
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&config, args.quiet);

    info!("TriageDash v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .triagedash.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Point [source] at a JSON export or a spreadsheet range to get started.");
    Ok(())
}

/// Initialize logging on stderr so command output stays clean on stdout.
fn init_logging(config: &Config, quiet: bool) {
    let level = config.log_level(quiet);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run a data command. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    if matches!(args.command, Command::PingDb) {
        let output = ping_database(&config, args.quiet).await?;
        emit(&output, args.output.as_deref())?;
        return Ok(0);
    }

    let Some(filters) = args.command.filters() else {
        return Ok(0);
    };
    let criteria = filters
        .to_criteria(config.filter.search_mode)
        .context("Invalid filter")?;

    let records = load_records(&config, args.quiet).await?;
    let matching = analysis::filter(&records, &criteria);
    log_filter_result(&criteria, records.len(), matching.len());

    let format = config.general.format;
    let (output, exit_code) = match &args.command {
        Command::Logs { .. } => (render_logs(matching, format)?, 0),
        Command::Kpis { fail_below, .. } => render_kpis(&matching, &config, format, *fail_below)?,
        Command::Daily { .. } => {
            let series = analysis::daily_series(&matching);
            let output = match format {
                OutputFormat::Json => report::generate_json(&series)?,
                OutputFormat::Markdown => report::generate_daily_markdown(&series),
                OutputFormat::Csv => report::daily_to_csv(&series),
            };
            (output, 0)
        }
        Command::Templates { .. } => {
            let stats = analysis::template_stats(&matching);
            let output = match format {
                OutputFormat::Json => report::generate_json(&stats)?,
                OutputFormat::Markdown => report::generate_templates_markdown(&stats),
                OutputFormat::Csv => report::templates_to_csv(&stats),
            };
            (output, 0)
        }
        Command::Ask { message, .. } => {
            (ask_assistant(message, &matching, &config, format, args.quiet).await?, 0)
        }
        Command::PingDb | Command::InitConfig => return Ok(0),
    };

    emit(&output, args.output.as_deref())?;
    Ok(exit_code)
}

fn log_filter_result(criteria: &FilterCriteria, total: usize, kept: usize) {
    if criteria.is_empty() {
        info!("Showing all {} records", total);
    } else {
        info!("{} of {} records match the filters", kept, total);
    }
}

fn render_logs(mut records: Vec<LogRecord>, format: OutputFormat) -> Result<String> {
    analysis::sort_newest_first(&mut records);
    Ok(match format {
        OutputFormat::Json => report::generate_json(&records)?,
        OutputFormat::Markdown => report::generate_records_markdown(&records),
        OutputFormat::Csv => report::records_to_csv(&records),
    })
}

fn render_kpis(
    records: &[LogRecord],
    config: &Config,
    format: OutputFormat,
    fail_below: Option<f64>,
) -> Result<(String, i32)> {
    let kpis = analysis::calculate_kpis(records);

    let output = match format {
        OutputFormat::Json => report::generate_json(&kpis)?,
        OutputFormat::Markdown => {
            let bands = analysis::confidence_bands(
                records,
                config.report.high_confidence,
                config.report.medium_confidence,
            );
            report::generate_kpi_markdown(&kpis, records, &bands)
        }
        OutputFormat::Csv => report::kpis_to_csv(&kpis),
    };

    let exit_code = match fail_below {
        Some(threshold) if kpis.response_rate < threshold => {
            warn!(
                "Response rate {:.1}% is below the {:.1}% threshold",
                kpis.response_rate, threshold
            );
            2
        }
        _ => 0,
    };

    Ok((output, exit_code))
}

async fn ask_assistant(
    message: &str,
    records: &[LogRecord],
    config: &Config,
    format: OutputFormat,
    quiet: bool,
) -> Result<String> {
    let client = AssistantClient::new(&config.assistant)?;
    let context = AssistantContext::from_records(records);

    let spinner = spinner("Asking the assistant...", quiet);
    let reply = client.ask(message, &context).await;
    spinner.finish_and_clear();

    let reply = reply.context("Failed to process request")?;
    Ok(match format {
        OutputFormat::Json => report::generate_json(&reply)?,
        OutputFormat::Markdown | OutputFormat::Csv => format!("{}\n", reply.reply),
    })
}

/// Check database connectivity with `SELECT NOW()`.
async fn ping_database(config: &Config, quiet: bool) -> Result<String> {
    let source = PostgresSource::from_config(&config.source)
        .context("Failed to set up the database connection")?;

    let spinner = spinner("Contacting the database...", quiet);
    let now = source.ping().await;
    spinner.finish_and_clear();

    let now = now.context("DB connection failed")?;
    info!("Database answered at {}", now);
    Ok(match config.general.format {
        OutputFormat::Json => report::generate_json(&serde_json::json!({ "ok": true, "now": now }))?,
        OutputFormat::Markdown | OutputFormat::Csv => format!("Database OK ({})\n", now),
    })
}

/// Fetch the full record collection from the configured source.
async fn load_records(config: &Config, quiet: bool) -> Result<Vec<LogRecord>> {
    let source = ConfiguredSource::from_config(&config.source)
        .context("Failed to set up the record source")?;
    info!("Loading records from {}", source.describe());

    let spinner = spinner("Loading records...", quiet);
    let records = source.fetch_all().await;
    spinner.finish_and_clear();

    records.context("Failed to load data")
}

fn spinner(message: &'static str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Write command output to a file, or stdout when no file was given.
fn emit(output: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output saved to {}", path.display());
        }
        None => {
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}. Using defaults.", CONFIG_FILE, e);
            Ok(Config::default())
        }
    }
}
