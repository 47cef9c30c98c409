//! Chat export import command.

use anyhow::{bail, Result};
use clap::Args;
use coin_pulse_core::{AppConfig, DbRole, StopFlag};
use coin_pulse_pipeline::ImportStats;
use std::path::PathBuf;

use super::job::connect_jobs;

/// Arguments for the import-chat command.
#[derive(Args, Debug, Clone)]
pub struct ImportChatArgs {
    /// Telegram Desktop export files (`result.json`)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

fn add(total: &mut ImportStats, stats: &ImportStats) {
    total.files += stats.files;
    total.messages += stats.messages;
    total.skipped += stats.skipped;
    total.inserted += stats.inserted;
}

/// Imports every file, continuing past files that fail.
///
/// # Errors
/// Returns an error if the store is unreachable or any file failed.
pub async fn run_import_chat(config: &AppConfig, args: ImportChatArgs) -> Result<()> {
    let jobs = connect_jobs(config, DbRole::Scheduler, StopFlag::new()).await?;
    let importer = jobs.importer();

    let mut total = ImportStats::default();
    let mut failed = 0usize;

    for path in &args.files {
        match importer.import_file(path).await {
            Ok(stats) => add(&mut total, &stats),
            Err(e) => {
                tracing::error!(path = %path.display(), "Import failed: {e:#}");
                failed += 1;
            }
        }
    }

    println!("import-chat: {}", total.summary());
    if failed > 0 {
        bail!("{failed} of {} file(s) failed to import", args.files.len());
    }
    Ok(())
}
