//! Error types shared across Anitemp crates.

use std::path::PathBuf;

/// Top-level error type for Anitemp operations.
///
/// The first group of variants is the composition-job taxonomy: every one of
/// them is fatal to the job that raised it.
#[derive(Debug, thiserror::Error)]
pub enum AnitempError {
    #[error("No video segments to process")]
    EmptyInput,

    #[error("Failed to load segment {index} ({locator}): {message}")]
    LoadFailure {
        index: usize,
        locator: String,
        message: String,
    },

    #[error("Media engine failed to load: {message}")]
    EngineLoadFailure { message: String },

    #[error("Media engine {step} step failed: {message}")]
    ExecFailure { step: String, message: String },

    #[error("Normalized segment {index} failed verification: {message}")]
    VerificationFailure { index: usize, message: String },

    #[error("A composition job is already running")]
    Busy,

    #[error("Invalid edit list: {message}")]
    InvalidEditList { message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AnitempError.
pub type AnitempResult<T> = Result<T, AnitempError>;

impl AnitempError {
    pub fn load_failure(
        index: usize,
        locator: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::LoadFailure {
            index,
            locator: locator.into(),
            message: msg.into(),
        }
    }

    pub fn engine_load(msg: impl Into<String>) -> Self {
        Self::EngineLoadFailure {
            message: msg.into(),
        }
    }

    pub fn exec(step: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExecFailure {
            step: step.into(),
            message: msg.into(),
        }
    }

    pub fn verification(index: usize, msg: impl Into<String>) -> Self {
        Self::VerificationFailure {
            index,
            message: msg.into(),
        }
    }

    pub fn invalid_edit_list(msg: impl Into<String>) -> Self {
        Self::InvalidEditList {
            message: msg.into(),
        }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Short machine-readable kind, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::LoadFailure { .. } => "load_failure",
            Self::EngineLoadFailure { .. } => "engine_load_failure",
            Self::ExecFailure { .. } => "exec_failure",
            Self::VerificationFailure { .. } => "verification_failure",
            Self::Busy => "busy",
            Self::InvalidEditList { .. } => "invalid_edit_list",
            Self::Template { .. } => "template",
            Self::Config { .. } => "config",
            Self::FileNotFound { .. } => "file_not_found",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
