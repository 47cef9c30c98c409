//! Periodic pipeline runs.
//!
//! The scheduler owns no pipeline logic; it invokes the same job entry
//! points the CLI exposes on fixed cron schedules and logs the outcome.

pub mod jobs;
pub mod scheduler;

pub use jobs::{PipelineJob, PipelineJobs, Stores};
pub use scheduler::PipelineScheduler;
