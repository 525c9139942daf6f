//! Orchestration of a single triage run.
//!
//! # Architecture
//!
//! ```text
//! main.rs
//!     |
//!     v
//! pipeline.rs (Pipeline::run)
//!     |
//!     +-- lock.rs       acquire, or exit quietly if another run holds it
//!     +-- digest.rs     fetch the logwatch digest
//!     +-- classify/     rate limit, then triage with retries
//!     +-- snapshot.rs   persist the result
//!     +-- gate.rs       severity vs threshold
//!     +-- notify/       email the report
//! ```
//!
//! Every stage after the lock degrades instead of failing, so the only error
//! a run can return is failing to open the lock file. The lock is released
//! on every exit path when the guard drops.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::classify::{ClassifierClient, TriageBackend};
use crate::config::Config;
use crate::digest::DigestSource;
use crate::error::LockError;
use crate::gate::AlertPolicy;
use crate::lock::RunLock;
use crate::notify::{Notifier, notify};
use crate::snapshot;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another run holds the lock; nothing was done.
    LockBusy,
    /// The digest was empty; nothing was triaged.
    NoDigest,
    /// Triage completed below the alert threshold.
    Skipped,
    /// An email was attempted.
    Notified { delivered: bool },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::LockBusy => write!(f, "lock busy"),
            RunOutcome::NoDigest => write!(f, "no digest"),
            RunOutcome::Skipped => write!(f, "skipped"),
            RunOutcome::Notified { delivered: true } => write!(f, "notified"),
            RunOutcome::Notified { delivered: false } => write!(f, "notification failed"),
        }
    }
}

/// One configured run.
pub struct Pipeline {
    lock_path: PathBuf,
    analysis_path: PathBuf,
    digest: Arc<dyn DigestSource>,
    classifier: ClassifierClient,
    gate: AlertPolicy,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    /// Assemble a run from configuration and its external collaborators.
    pub fn from_config(
        config: &Config,
        digest: Arc<dyn DigestSource>,
        backend: Arc<dyn TriageBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            lock_path: config.lock_file.clone(),
            analysis_path: config.analysis_file.clone(),
            digest,
            classifier: ClassifierClient::from_config(config, backend),
            gate: AlertPolicy::from_config(config),
            notifier,
        }
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] if the lock file cannot be opened. Contention is
    /// not an error: it yields [`RunOutcome::LockBusy`].
    pub async fn run(&self) -> Result<RunOutcome, LockError> {
        tracing::info!("Starting logwatch triage run");

        let Some(_lock) = RunLock::acquire(&self.lock_path)? else {
            tracing::warn!(
                lock_file = %self.lock_path.display(),
                "Another instance is already running, exiting to prevent duplicate API calls"
            );
            return Ok(RunOutcome::LockBusy);
        };

        tracing::info!("Running logwatch");
        let digest = self.digest.fetch().await;
        if digest.trim().is_empty() {
            tracing::error!("No logwatch output to analyze");
            return Ok(RunOutcome::NoDigest);
        }

        tracing::info!("Analyzing digest");
        let result = self.classifier.classify(&digest).await;

        snapshot::write_json_pretty(&self.analysis_path, &result);

        if !self.gate.should_notify(&result) {
            tracing::info!(
                severity = %result.severity,
                threshold = %self.gate.threshold,
                "No alert needed"
            );
            return Ok(RunOutcome::Skipped);
        }

        tracing::info!(severity = %result.severity, "Sending alert");
        let delivered = notify(self.notifier.as_ref(), &result).await;

        Ok(RunOutcome::Notified { delivered })
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("lock_path", &self.lock_path)
            .field("analysis_path", &self.analysis_path)
            .field("classifier", &self.classifier)
            .field("gate", &self.gate)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}
