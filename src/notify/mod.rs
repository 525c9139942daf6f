//! Delivery of triage results to a human operator.
//!
//! The only channel is email ([`EmailNotifier`]). Delivery failures never
//! propagate past [`notify`]: the run logs them and carries on.
//!
//! # Architecture
//!
//! ```text
//! gate.rs -> notify/ -> report.rs (render) -> EmailTransport (SMTP)
//! ```

pub mod email;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::triage::TriageResult;

pub use email::{EmailNotifier, EmailTransport, SmtpTransport};

/// A channel that can deliver a triage result.
///
/// # Example
///
/// ```ignore
/// use logtriage::notify::Notifier;
///
/// struct StdoutNotifier;
///
/// #[async_trait]
/// impl Notifier for StdoutNotifier {
///     fn name(&self) -> &str { "stdout" }
///     async fn send(&self, result: &TriageResult) -> Result<(), NotifyError> {
///         println!("{}", result.summary);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs.
    fn name(&self) -> &str;

    /// Deliver `result`. Implementations make a single attempt.
    async fn send(&self, result: &TriageResult) -> Result<(), NotifyError>;
}

impl std::fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("name", &self.name())
            .finish()
    }
}

/// Deliver `result` and report success as a boolean.
pub async fn notify(notifier: &dyn Notifier, result: &TriageResult) -> bool {
    match notifier.send(result).await {
        Ok(()) => {
            tracing::info!(
                notifier = notifier.name(),
                severity = %result.severity,
                "Notification sent"
            );
            true
        }
        Err(e) => {
            tracing::error!(notifier = notifier.name(), error = %e, "Failed to send notification");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::Severity;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingNotifier {
        fail: bool,
        sends: AtomicU32,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _result: &TriageResult) -> Result<(), NotifyError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::SendFailed("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn result() -> TriageResult {
        TriageResult {
            severity: Severity::High,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn notify_reports_success() {
        let notifier = CountingNotifier {
            fail: false,
            sends: AtomicU32::new(0),
        };
        assert!(notify(&notifier, &result()).await);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn notify_swallows_errors() {
        let notifier = CountingNotifier {
            fail: true,
            sends: AtomicU32::new(0),
        };
        assert!(!notify(&notifier, &result()).await);
        assert_eq!(notifier.sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dyn_notifier_debug_shows_name() {
        let notifier: Box<dyn Notifier> = Box::new(CountingNotifier {
            fail: false,
            sends: AtomicU32::new(0),
        });
        assert!(format!("{:?}", notifier).contains("counting"));
    }
}
