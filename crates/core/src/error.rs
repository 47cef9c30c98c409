use thiserror::Error;

/// Errors callers branch on.
///
/// Everything else travels as `anyhow::Error` with context attached.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration; fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run's stop flag was raised before the unit finished.
    #[error("Stopped before completion")]
    Stopped,

    /// A single input or response record could not be interpreted.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}
