//! Error types for the nxtransfer core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.
//!
//! Per-task failures ([`TransferError`]) are isolated by the pipeline and
//! never abort a run; everything surfaced as a [`RunError`] does.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Run(#[from] RunError),
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Network-level failures from a single HTTP exchange.
///
/// A non-2xx status is *not* a transport error; callers decide which
/// statuses count as success for their protocol.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request URL could not be parsed.
    #[error("invalid request URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// Connection refused, DNS failure, timeout, TLS failure, etc.
    #[error("{method} {url} failed: {source}")]
    Request {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read.
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// ---------------------------------------------------------------------------
// Per-task transfer errors
// ---------------------------------------------------------------------------

/// Failure of a single download or upload task.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status the format does not accept.
    #[error("unexpected HTTP status {status} {reason}{}", format_body(.body))]
    UnexpectedStatus {
        status: u16,
        reason: String,
        body: Option<String>,
    },

    /// The file does not lie under the configured import root.
    #[error("file path '{}' is not under import root '{}'", .path.display(), .root.display())]
    OutsideImportRoot { path: PathBuf, root: PathBuf },

    /// The file's location does not match the layout the format expects.
    #[error("invalid {format} layout for '{path}': {detail}")]
    InvalidLayout {
        format: String,
        path: String,
        detail: String,
    },

    /// Reading the source file or writing the destination failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker owning the task terminated before recording an outcome.
    #[error("task was not completed: {0}")]
    Abandoned(String),
}

fn format_body(body: &Option<String>) -> String {
    match body {
        Some(b) if !b.trim().is_empty() => format!(", body: {}", b.trim()),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Enumeration errors
// ---------------------------------------------------------------------------

/// Errors from the paginated asset search.
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// Transport failure while fetching a page.
    #[error("failed to fetch assets: {0}")]
    Transport(#[from] TransportError),

    /// The search endpoint answered with a non-200 status.
    #[error("failed to fetch assets: HTTP {status}{}", format_body(.body))]
    Status { status: u16, body: Option<String> },

    /// The page body was not a valid search result.
    #[error("failed to decode search response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The repository type has no uploader.
    #[error("unsupported repository type '{tag}' (supported: {supported})")]
    UnsupportedRepoType { tag: String, supported: String },

    /// A required run parameter was not supplied.
    #[error("missing required value '{0}'")]
    MissingValue(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Profile file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A referenced environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// Generic I/O error reading the profile file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The shared HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

// ---------------------------------------------------------------------------
// Run errors
// ---------------------------------------------------------------------------

/// Errors that end an export or import run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// The export root could not be created.
    #[error("failed to create export directory '{}': {source}", .path.display())]
    ExportDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The import tree could not be walked.
    #[error("failed to walk import directory '{}': {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some tasks failed; every other task was still attempted.
    #[error("{failed} of {total} files failed to {verb}")]
    PartialFailure {
        failed: usize,
        total: usize,
        verb: &'static str,
    },
}
