//! Error kinds shared across the tool.
//!
//! Library code returns these typed errors so callers can tell a missing
//! credential from a failed generation or a half-applied edit. The binary
//! wraps them in `anyhow` for reporting.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration is missing, unreadable or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{provider} credentials are not configured. {hint}")]
    MissingCredentials {
        provider: &'static str,
        hint: &'static str,
    },

    #[error("unsupported provider: {0} (expected openai, gemini, gateway or mock)")]
    UnknownProvider(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("could not find home directory")]
    NoHomeDir,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A content provider call failed or produced nothing usable.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("API error: status {status}, body: {body}")]
    Status { status: u16, body: String },

    #[error("API returned error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("provider returned an empty response")]
    Empty,
}

/// Failures of the staging area. These are the workflow's I/O errors.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("failed to write staged file {path}: {source}")]
    WriteScratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read original file {path}: {source}")]
    ReadOriginal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("diff command failed for {path}: {reason}")]
    DiffTool { path: PathBuf, reason: String },

    #[error("failed to write diff output: {0}")]
    Output(#[source] io::Error),

    #[error(
        "failed to apply changes to {path} after {applied} of {total} files were written: {source}"
    )]
    Apply {
        path: PathBuf,
        applied: usize,
        total: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove staging directory: {0}")]
    Cleanup(#[source] io::Error),
}

/// Errors that end an edit workflow. A rejected approval is not one of them.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("refactoring instructions cannot be empty")]
    EmptyInstructions,

    #[error("no files specified and no input from pipe")]
    NoTargets,

    #[error("failed to read {file}: {source}")]
    ReadInput {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to refactor {file}: {source}")]
    Provider {
        file: String,
        #[source]
        source: ProviderError,
    },

    #[error("cancelled while processing {file}")]
    Cancelled { file: String },

    #[error("interrupted at the approval prompt; no changes were applied")]
    Interrupted,

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}
