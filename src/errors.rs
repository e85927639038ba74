//! Error types for ytdlp_queue
//!
//! This module defines the error types for all components of the application.
//! Per-job failures are recorded on the job itself; these types describe the
//! failures of operations (enqueueing, launching, persisting, loading settings).

use std::path::PathBuf;
use thiserror::Error;

/// External tool discovery errors
#[derive(Error, Debug, Clone)]
pub enum ToolError {
    /// Executable could not be located anywhere in the search order
    #[error("{tool} executable not found (searched: {searched})")]
    NotFound { tool: String, searched: String },

    /// Version probe failed
    #[error("Failed to query {tool} version: {reason}")]
    VersionProbe { tool: String, reason: String },
}

/// Process runner errors (launch and metadata queries; exit codes of
/// downloads are outcomes, not errors)
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Download tool missing
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Child process could not be spawned
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output directory could not be prepared
    #[error("Output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Child did not expose a piped stream
    #[error("Child process has no {stream} pipe")]
    MissingPipe { stream: &'static str },

    /// Metadata query failed or returned unreadable output
    #[error("Could not read media info for {url}: {reason}")]
    Info { url: String, reason: String },
}

impl RunnerError {
    /// Whether this launch failure means the download tool is missing
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, RunnerError::Tool(ToolError::NotFound { .. }))
    }
}

/// Queue persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O error on the queue file
    #[error("Queue file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Queue file is not a JSON array of records
    #[error("Queue file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the queue failed
    #[error("Failed to serialize queue")]
    Serialize(#[from] serde_json::Error),

    /// Atomic replace of the queue file failed
    #[error("Could not replace queue file {path}: {reason}")]
    AtomicReplace { path: PathBuf, reason: String },
}

/// Queue manager operation errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// URL rejected at enqueue time
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No job with this identifier
    #[error("Job not found: {id}")]
    JobNotFound { id: String },

    /// Operation not allowed in the job's current status
    #[error("Cannot {action} job {id} while it is {status}")]
    InvalidTransition {
        id: String,
        action: &'static str,
        status: String,
    },

    /// Invalid clip range
    #[error("Invalid clip range: {reason}")]
    InvalidClip { reason: String },

    /// Invalid queue configuration
    #[error("Invalid queue configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Another process holds the queue file
    #[error("Queue {path} is in use by another process")]
    InUse { path: PathBuf },

    /// Lock file could not be opened
    #[error("Failed to lock queue {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Download tool missing; scheduling halted
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Batch import errors
#[derive(Error, Debug)]
pub enum ImportError {
    /// Import file could not be read
    #[error("Failed to read import file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Platform config directory unknown
    #[error("Could not determine user config directory")]
    NoConfigDir,

    /// Configuration file I/O
    #[error("Configuration file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Serializing the configuration failed
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Unknown dotted key
    #[error("Unknown configuration key: {key}")]
    UnknownKey { key: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Tool discovery error
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// Process runner error
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// Queue error
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Persistence error
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Import error
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable without user intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Persistence(PersistenceError::Io { .. })
            | AppError::Persistence(PersistenceError::AtomicReplace { .. })
            | AppError::Runner(RunnerError::Spawn { .. })
            | AppError::Queue(QueueError::InUse { .. }) => true,

            AppError::Tool(ToolError::NotFound { .. })
            | AppError::Queue(QueueError::Tool(_))
            | AppError::Queue(QueueError::InvalidUrl { .. })
            | AppError::Config(ConfigError::InvalidFormat(_)) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Tool(_) => "tool",
            AppError::Runner(_) => "runner",
            AppError::Queue(_) => "queue",
            AppError::Persistence(_) => "persistence",
            AppError::Import(_) => "import",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Runner result type alias
pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

/// Queue result type alias
pub type QueueResult<T> = std::result::Result<T, QueueError>;

/// Persistence result type alias
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

/// Config result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
