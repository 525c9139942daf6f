//! Centralized error types for logtriage using thiserror.
//!
//! Most of these never escape a run: the pipeline downgrades them into
//! error-severity triage results, boolean delivery failures or log lines.
//! Only configuration and lock-file errors are fatal.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid email address in '{field}': {message}")]
    InvalidAddress { field: String, message: String },
    #[error("invalid SMTP settings: {0}")]
    InvalidSmtp(String),
}

/// Errors raised while collecting the log digest.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("failed to spawn digest command: {0}")]
    Spawn(String),
    #[error("digest command timed out after {0} seconds")]
    Timeout(u64),
    #[error("digest command exited with code {code}: {stderr}")]
    ExitStatus { code: i32, stderr: String },
}

/// Errors from a single call to the triage backend.
///
/// Every variant counts as one failed attempt in the retry loop.
#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("request timed out after {0} seconds")]
    Timeout(u64),
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("backend returned an empty completion")]
    EmptyCompletion,
    #[error("invalid triage response: {0}")]
    InvalidResponse(String),
}

/// Errors related to email notification sending.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to build email: {0}")]
    BuildFailed(String),
    #[error("failed to send notification: {0}")]
    SendFailed(String),
}

/// Errors related to report rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template '{name}' not found")]
    NotFound { name: String },
    #[error("template render failed: {message}")]
    RenderFailed { message: String },
}

/// Errors related to the run lock.
#[derive(Error, Debug)]
pub enum LockError {
    #[error("cannot open lock file '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot lock '{path}': {source}")]
    Lock {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
