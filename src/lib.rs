// src/lib.rs
//! logtriage - LLM triage of the daily logwatch digest with email alerts.

pub mod classify;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod gate;
pub mod lock;
pub mod notify;
pub mod pipeline;
pub mod ratelimit;
pub mod report;
pub mod snapshot;
pub mod triage;

// Re-export commonly used types
pub use classify::{ClassifierClient, OpenAiBackend, RetryPolicy, TriageBackend, backoff_delay};
pub use cli::LogFormat;
pub use digest::{DigestSource, LogwatchDigest};
pub use gate::AlertPolicy;
pub use lock::RunLock;
pub use notify::{EmailNotifier, EmailTransport, Notifier};
pub use pipeline::{Pipeline, RunOutcome};
pub use ratelimit::{RateLimitResult, RateLimiter, RateLimits};
pub use report::{ReportContext, ReportFormat, ReportRenderer};
pub use triage::{Severity, TriageResult};
