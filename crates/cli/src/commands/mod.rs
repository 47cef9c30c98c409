//! CLI commands for the annotation and trend pipeline.

pub mod backfill_series;
pub mod data_status;
pub mod detect_trends;
pub mod import_chat;
pub mod job;
pub mod run;

pub use backfill_series::{run_backfill_series, BackfillSeriesArgs};
pub use data_status::{run_data_status, DataStatusArgs};
pub use detect_trends::{run_detect_trends, DetectTrendsArgs};
pub use import_chat::{run_import_chat, ImportChatArgs};
pub use job::{run_job, run_migrate};
pub use run::{run_daemon, RunArgs};
