//! Alert gate: decides whether a triage result is worth an email.

use crate::config::Config;
use crate::triage::{Severity, TriageResult};

/// Threshold policy for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub threshold: Severity,
    /// Notify on every run regardless of severity.
    pub always_notify: bool,
}

impl AlertPolicy {
    pub fn new(threshold: Severity, always_notify: bool) -> Self {
        Self {
            threshold,
            always_notify,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.alert_threshold, config.always_send_summary)
    }

    /// `true` if `result` should be delivered.
    ///
    /// Severities are compared by rank, so `error` passes any threshold up to
    /// and including `critical`.
    pub fn should_notify(&self, result: &TriageResult) -> bool {
        if self.always_notify {
            return true;
        }
        result.severity.rank() >= self.threshold.rank()
    }
}

/// Convenience form of [`AlertPolicy::should_notify`] driven by configuration.
pub fn should_notify(result: &TriageResult, config: &Config) -> bool {
    AlertPolicy::from_config(config).should_notify(result)
}
