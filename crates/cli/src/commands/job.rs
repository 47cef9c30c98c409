//! Single-shot job commands.

use anyhow::Result;
use coin_pulse_core::{AppConfig, DbRole, StopFlag};
use coin_pulse_data::DatabaseClient;
use coin_pulse_scheduler::{PipelineJob, PipelineJobs, Stores};

/// Connects as `role` and wires every job onto that pool.
///
/// # Errors
/// Returns an error if the store is unreachable or a client cannot be built.
pub async fn connect_jobs(config: &AppConfig, role: DbRole, stop: StopFlag) -> Result<PipelineJobs> {
    let stores = Stores::for_role(&config.database, role).await?;
    PipelineJobs::from_config(&stores, config, stop)
}

/// Runs one job to completion and prints its statistics.
///
/// # Errors
/// Returns an error if setup fails or the job aborts.
pub async fn run_job(config: &AppConfig, job: PipelineJob, stop: StopFlag) -> Result<()> {
    tracing::info!(%job, "Starting");
    let jobs = connect_jobs(config, job.role(), stop).await?;
    let summary = jobs.run(job).await?;

    println!("{job}: {summary}");
    Ok(())
}

/// Applies pending migrations with the scheduler role.
///
/// # Errors
/// Returns an error if the connection or a migration fails.
pub async fn run_migrate(config: &AppConfig) -> Result<()> {
    let client = DatabaseClient::connect(&config.database, DbRole::Scheduler).await?;
    client.migrate().await?;

    tracing::info!("Migrations applied");
    Ok(())
}
