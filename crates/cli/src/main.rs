use clap::{Parser, Subcommand};
use coin_pulse_core::{AppConfig, ConfigLoader, StopFlag};
use coin_pulse_scheduler::PipelineJob;

mod commands;

use commands::{BackfillSeriesArgs, DataStatusArgs, DetectTrendsArgs, ImportChatArgs, RunArgs};

#[derive(Parser)]
#[command(name = "coin-pulse")]
#[command(
    about = "Community chat annotation, mention linking and trend detection",
    long_about = None
)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = coin_pulse_core::config_loader::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Optional log file path (appends instead of logging to stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every job on its cron schedule (daemon mode)
    Run(RunArgs),
    /// Apply pending database migrations
    Migrate,
    /// Extract word classes for events that have none
    AnnotateMorphology,
    /// Label sentiment for events that have none
    AnnotateSentiment,
    /// Link annotated events to the entities they mention
    LinkMentions,
    /// Compare mention windows and append trend signals
    DetectTrends(DetectTrendsArgs),
    /// Fetch the latest hourly candles of every tracked entity
    RefreshSeries,
    /// Walk hourly candle history backward
    BackfillSeries(BackfillSeriesArgs),
    /// Load Telegram chat exports into the raw event table
    ImportChat(ImportChatArgs),
    /// Show row counts and time bounds of the pipeline tables
    DataStatus(DataStatusArgs),
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Sets the stop flag on Ctrl-C so running jobs end at their next boundary.
fn spawn_stop_listener(stop: StopFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, stopping at the next batch boundary");
            stop.stop();
        }
    });
}

fn load_config(path: &str) -> anyhow::Result<AppConfig> {
    tracing::debug!("Loading config from {}", path);
    ConfigLoader::load_from(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = load_config(&cli.config)?;
    let stop = StopFlag::new();
    spawn_stop_listener(stop.clone());

    match cli.command {
        Commands::Run(args) => commands::run_daemon(&config, args, stop).await?,
        Commands::Migrate => commands::run_migrate(&config).await?,
        Commands::AnnotateMorphology => {
            commands::run_job(&config, PipelineJob::Morphology, stop).await?;
        }
        Commands::AnnotateSentiment => {
            commands::run_job(&config, PipelineJob::Sentiment, stop).await?;
        }
        Commands::LinkMentions => commands::run_job(&config, PipelineJob::Mentions, stop).await?,
        Commands::DetectTrends(args) => commands::run_detect_trends(&config, args, stop).await?,
        Commands::RefreshSeries => {
            commands::run_job(&config, PipelineJob::SeriesRefresh, stop).await?;
        }
        Commands::BackfillSeries(args) => {
            commands::run_backfill_series(&config, args, stop).await?;
        }
        Commands::ImportChat(args) => commands::run_import_chat(&config, args).await?,
        Commands::DataStatus(args) => commands::run_data_status(&config, args).await?,
    }

    Ok(())
}
