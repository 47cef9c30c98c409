//! Data status CLI command.
//!
//! Shows row counts and time bounds of the pipeline tables, annotation
//! coverage, per-entity candle history, and the latest trend signals.
//! Used to check that each job is keeping up before trusting its output.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use coin_pulse_core::{AppConfig, DbRole};
use coin_pulse_data::{CandleStore, DatabaseClient, TableSummary, TrendSignalRecord};

/// Arguments for the data-status command.
#[derive(Args, Debug, Clone)]
pub struct DataStatusArgs {
    /// Number of most recent trend signals to show
    #[arg(long, default_value = "10")]
    pub signals: i64,
}

/// Candle history of one entity.
#[derive(Debug)]
struct EntityStatus {
    symbol: String,
    name: String,
    candles: i64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

fn format_date(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn format_count(count: i64) -> String {
    let digits = count.abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if count < 0 {
        out.insert(0, '-');
    }
    out
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Runs the data-status command.
///
/// # Errors
/// Returns an error if the database connection or a query fails.
pub async fn run_data_status(config: &AppConfig, args: DataStatusArgs) -> Result<()> {
    let client = DatabaseClient::connect(&config.database, DbRole::Scheduler).await?;
    let repos = client.repositories();
    tracing::info!("Connected to database");

    let events = repos.events.summary().await?;
    let (with_morphology, with_sentiment) = repos.annotations.coverage().await?;
    let mentions = repos.mentions.count().await?;

    let mut entities = Vec::new();
    for entity in repos.candles.list_entities().await? {
        let candles = repos.candles.count_records(entity.coin_id).await?;
        let bounds = repos.candles.get_data_bounds(entity.coin_id).await?;
        entities.push(EntityStatus {
            symbol: entity.symbol,
            name: entity.coin_name,
            candles,
            earliest: bounds.map(|(earliest, _)| earliest),
            latest: bounds.map(|(_, latest)| latest),
        });
    }

    let signals = repos.trends.get_recent(args.signals.max(0)).await?;

    print_tables(&events, with_morphology, with_sentiment, mentions);
    print_entities(&entities);
    print_signals(&signals);

    Ok(())
}

fn print_tables(events: &TableSummary, with_morphology: i64, with_sentiment: i64, mentions: i64) {
    println!();
    println!("{}", "=".repeat(80));
    println!("DATA STATUS REPORT");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "{:<28} {:>12} {:>22} {:>22}",
        "Table", "Records", "Earliest", "Latest"
    );
    println!("{}", "-".repeat(80));
    println!(
        "{:<28} {:>12} {:>22} {:>22}",
        "community_reactions",
        format_count(events.rows),
        format_date(events.earliest),
        format_date(events.latest)
    );
    println!(
        "{:<28} {:>12}",
        "community_analysis_coins",
        format_count(mentions)
    );
    println!();

    println!("ANNOTATION COVERAGE:");
    println!("{}", "-".repeat(60));
    println!(
        "  Morphology: {:>12} ({:.1}%)",
        format_count(with_morphology),
        percent(with_morphology, events.rows)
    );
    println!(
        "  Sentiment:  {:>12} ({:.1}%)",
        format_count(with_sentiment),
        percent(with_sentiment, events.rows)
    );
    println!();
}

fn print_entities(entities: &[EntityStatus]) {
    println!("CANDLES BY ENTITY:");
    println!("{}", "-".repeat(80));
    if entities.is_empty() {
        println!("  No tracked entities");
    }
    for entity in entities {
        println!(
            "  {:<8} {:<14} {:>10} {:>22} {:>22}",
            entity.symbol,
            entity.name,
            format_count(entity.candles),
            format_date(entity.earliest),
            format_date(entity.latest)
        );
    }
    println!();
}

fn print_signals(signals: &[TrendSignalRecord]) {
    println!("RECENT TREND SIGNALS:");
    println!("{}", "-".repeat(80));
    if signals.is_empty() {
        println!("  None recorded");
    }
    for signal in signals {
        println!(
            "  {:<20} coin {:<6} {}",
            format_date(Some(signal.timestamp)),
            signal.coin_id,
            signal.reason
        );
    }
    println!();
}
