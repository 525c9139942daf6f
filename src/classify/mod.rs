//! Classifier client: turns a digest into a [`TriageResult`].
//!
//! [`ClassifierClient::classify`] never fails. Every failure path produces a
//! valid result with [`Severity::Error`], so a broken backend still reaches
//! the operator as an alert instead of silence.
//!
//! # Flow
//!
//! ```text
//! empty digest ──────────────► error result (no request)
//! rate limiter denies ───────► error result (no request, no retry)
//! otherwise ─► prompt ─► backend ─┬─ ok ──────────► result
//!                 ▲               └─ err ─► backoff ┘ (up to max_retries attempts)
//! ```
//!
//! [`Severity::Error`]: crate::triage::Severity::Error

mod backend;
mod prompt;

pub use backend::{OpenAiBackend, TriageBackend};
pub use prompt::{MAX_DIGEST_CHARS, TriagePrompt, truncate_chars};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, TriagePolicy};
use crate::ratelimit::RateLimiter;
use crate::triage::TriageResult;

/// Upper bound on a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Calculate exponential backoff delay.
///
/// Formula: `min(base * 2^attempt, max)`
///
/// # Arguments
///
/// * `attempt` - Current attempt number (0-indexed)
/// * `base` - Base delay duration
/// * `max` - Maximum delay cap
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = base.saturating_mul(2_u32.saturating_pow(attempt));
    std::cmp::min(delay, max)
}

/// Bounded retry schedule for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_delay(),
        }
    }

    /// Sleep after failed attempt `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay, MAX_BACKOFF)
    }
}

/// Rate-limited, retrying front end to a [`TriageBackend`].
pub struct ClassifierClient {
    backend: Arc<dyn TriageBackend>,
    limiter: RateLimiter,
    policy: TriagePolicy,
    retry: RetryPolicy,
}

impl ClassifierClient {
    pub fn new(
        backend: Arc<dyn TriageBackend>,
        limiter: RateLimiter,
        policy: TriagePolicy,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            limiter,
            policy,
            retry,
        }
    }

    pub fn from_config(config: &Config, backend: Arc<dyn TriageBackend>) -> Self {
        Self::new(
            backend,
            RateLimiter::from_config(config),
            config.triage_policy.clone(),
            RetryPolicy::from_config(config),
        )
    }

    /// Triage `digest` now.
    pub async fn classify(&self, digest: &str) -> TriageResult {
        self.classify_at(digest, Utc::now()).await
    }

    /// Triage `digest`, charging the rate limiter at `now`.
    pub async fn classify_at(&self, digest: &str, now: DateTime<Utc>) -> TriageResult {
        if digest.trim().is_empty() {
            tracing::warn!("Empty digest, nothing to triage");
            return TriageResult::error("No logwatch output to analyze", Vec::new(), Vec::new());
        }

        if !self.limiter.admit(now) {
            return TriageResult::error(
                "Rate limit exceeded: triage skipped to prevent API overuse",
                vec!["Rate limit protection triggered".to_string()],
                vec!["Wait for the next run or adjust the rate limits in the configuration".to_string()],
            );
        }

        let prompt = prompt::build(&self.policy, digest);
        let attempts = self.retry.max_attempts;
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.backend.complete(&prompt).await {
                Ok(result) => {
                    tracing::info!(
                        severity = %result.severity,
                        attempt = attempt + 1,
                        "AI analysis complete"
                    );
                    return result;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "Triage request failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt + 1 < attempts {
                let delay = self.retry.delay(attempt);
                tracing::info!(delay_secs = delay.as_secs(), "Retrying triage request");
                tokio::time::sleep(delay).await;
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        tracing::error!(attempts, error = %last_error, "All triage attempts failed");

        TriageResult::error(
            format!("AI analysis failed after {} attempts: {}", attempts, last_error),
            vec!["Failed to analyze logs with AI after multiple retries".to_string()],
            vec!["Check OpenAI API key, connectivity, and rate limits".to_string()],
        )
    }
}

impl std::fmt::Debug for ClassifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierClient")
            .field("limiter", &self.limiter)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifyError;
    use crate::ratelimit::{Ledger, RateLimits};
    use crate::triage::Severity;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Backend that replays scripted outcomes and records call times.
    struct ScriptedBackend {
        outcomes: Mutex<Vec<Result<TriageResult, ClassifyError>>>,
        calls: Mutex<Vec<Instant>>,
        prompts: Mutex<Vec<TriagePrompt>>,
    }

    impl ScriptedBackend {
        fn new(mut outcomes: Vec<Result<TriageResult, ClassifyError>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Self::new(Vec::new())
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TriageBackend for ScriptedBackend {
        async fn complete(&self, prompt: &TriagePrompt) -> Result<TriageResult, ClassifyError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.prompts.lock().unwrap().push(prompt.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ClassifyError::Request("connection refused".to_string())))
        }
    }

    fn limits() -> RateLimits {
        RateLimits {
            min_interval: TimeDelta::minutes(5),
            max_per_hour: 10,
            max_per_day: 50,
        }
    }

    fn client(
        backend: Arc<ScriptedBackend>,
        dir: &tempfile::TempDir,
        max_attempts: u32,
    ) -> ClassifierClient {
        ClassifierClient::new(
            backend,
            RateLimiter::new(dir.path().join("ratelimit.json"), limits()),
            TriagePolicy::default(),
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_secs(30),
            },
        )
    }

    /// Paused-clock timers fire on millisecond ticks.
    fn assert_about(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(10),
            "expected ~{:?}, got {:?}",
            expected,
            actual
        );
    }

    fn high() -> TriageResult {
        TriageResult {
            severity: Severity::High,
            issues_found: true,
            summary: "Disk usage 92%".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let base = Duration::from_secs(30);
        assert_eq!(backoff_delay(0, base, MAX_BACKOFF), Duration::from_secs(30));
        assert_eq!(backoff_delay(1, base, MAX_BACKOFF), Duration::from_secs(60));
        assert_eq!(backoff_delay(2, base, MAX_BACKOFF), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_capped_and_overflow_safe() {
        let base = Duration::from_secs(30);
        assert_eq!(backoff_delay(10, base, MAX_BACKOFF), MAX_BACKOFF);
        assert_eq!(backoff_delay(100, base, MAX_BACKOFF), MAX_BACKOFF);
    }

    #[test]
    fn retry_policy_from_config() {
        let config = Config::default();
        let retry = RetryPolicy::from_config(&config);
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.delay(1), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn empty_digest_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![Ok(high())]);
        let client = client(backend.clone(), &dir, 3);

        let result = client.classify("").await;
        assert_eq!(result.severity, Severity::Error);
        assert!(result.issues_found);
        assert_eq!(backend.call_count(), 0);

        let result = client.classify("  \n\t").await;
        assert_eq!(result.severity, Severity::Error);
        assert_eq!(backend.call_count(), 0);

        // No quota consumed either.
        assert!(!dir.path().join("ratelimit.json").exists());
    }

    #[tokio::test]
    async fn rate_limited_request_is_not_sent_or_retried() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        Ledger::new(vec![now - TimeDelta::minutes(1)])
            .save(&dir.path().join("ratelimit.json"))
            .unwrap();
        let backend = ScriptedBackend::new(vec![Ok(high())]);
        let client = client(backend.clone(), &dir, 3);

        let result = client.classify_at("sshd: lots", now).await;

        assert_eq!(result.severity, Severity::Error);
        assert_eq!(result.critical_issues, vec!["Rate limit protection triggered"]);
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![Ok(high())]);
        let client = client(backend.clone(), &dir, 3);

        let result = client.classify("/dev/sda1 92% used").await;

        assert_eq!(result, high());
        assert_eq!(backend.call_count(), 1);
        let prompts = backend.prompts.lock().unwrap();
        assert!(prompts[0].user.ends_with("/dev/sda1 92% used"));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_retry_with_doubling_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::failing();
        let client = client(backend.clone(), &dir, 3);

        let result = client.classify("kernel: oops").await;

        assert_eq!(result.severity, Severity::Error);
        assert!(result.summary.contains("after 3 attempts"));
        assert!(result.summary.contains("connection refused"));
        assert_eq!(
            result.recommendations,
            vec!["Check OpenAI API key, connectivity, and rate limits"]
        );

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_about(calls[1] - calls[0], Duration::from_secs(30));
        assert_about(calls[2] - calls[1], Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_last_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::failing();
        let client = client(backend.clone(), &dir, 2);

        let start = Instant::now();
        client.classify("kernel: oops").await;

        assert_eq!(backend.call_count(), 2);
        assert_about(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![
            Err(ClassifyError::Backend {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Err(ClassifyError::InvalidResponse("expected value".to_string())),
            Ok(high()),
        ]);
        let client = client(backend.clone(), &dir, 3);

        let result = client.classify("df: /var 92%").await;

        assert_eq!(result.severity, Severity::High);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_consume_a_single_rate_limit_slot() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::failing();
        let client = client(backend.clone(), &dir, 3);

        client.classify("kernel: oops").await;

        assert_eq!(Ledger::load(&dir.path().join("ratelimit.json")).len(), 1);
    }
}
