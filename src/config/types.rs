//! Core configuration type and loading.

use super::env::{ENV_OPENAI_API_KEY, resolve_secret};
use super::policy::TriagePolicy;
use super::secret::SecretString;
use crate::error::ConfigError;
use crate::triage::Severity;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/logtriage/config.json";

/// Port on which SMTP is spoken over implicit TLS (SMTPS).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Configuration for one run.
///
/// Every field has a default, and a JSON document overrides individual keys:
/// `{"alert_threshold": "high"}` is a complete, valid configuration. The
/// struct is never mutated after loading.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the triage backend. Empty means "read `OPENAI_API_KEY`".
    pub openai_api_key: SecretString,
    /// Model identifier sent with every request.
    pub openai_model: String,
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub openai_base_url: String,
    /// Timeout for a single backend request.
    pub request_timeout_seconds: u64,
    /// Response-size cap for the completion.
    pub max_completion_tokens: u32,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: SecretString,
    /// Upgrade a plain connection with STARTTLS (ignored on port 465).
    pub smtp_use_tls: bool,
    /// Verify the SMTP server certificate when TLS is in use.
    pub smtp_tls_verify: bool,
    pub from_email: String,
    pub to_emails: Vec<String>,

    /// Minimum severity that triggers an email.
    pub alert_threshold: Severity,
    /// Email every run regardless of severity.
    pub always_send_summary: bool,

    pub max_requests_per_hour: u32,
    pub max_requests_per_day: u32,
    pub min_interval_minutes: u64,
    /// Total backend attempts per run (not additional retries).
    pub max_retries: u32,
    /// Base backoff delay, doubled after each failed attempt.
    pub retry_delay_seconds: u64,

    /// Digest tool executable.
    pub logwatch_path: PathBuf,
    /// Raw digest snapshot, overwritten each run.
    pub logwatch_output_file: PathBuf,
    /// Latest triage result snapshot, overwritten each run.
    pub analysis_file: PathBuf,
    /// Rate-limit ledger.
    pub rate_limit_file: PathBuf,
    /// Advisory lock file guarding the whole run.
    pub lock_file: PathBuf,

    pub triage_policy: TriagePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: SecretString::default(),
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_seconds: 30,
            max_completion_tokens: 1000,
            smtp_host: "localhost".to_string(),
            smtp_port: 25,
            smtp_user: String::new(),
            smtp_password: SecretString::default(),
            smtp_use_tls: false,
            smtp_tls_verify: true,
            from_email: "logtriage@localhost".to_string(),
            to_emails: vec!["root@localhost".to_string()],
            alert_threshold: Severity::Medium,
            always_send_summary: false,
            max_requests_per_hour: 10,
            max_requests_per_day: 50,
            min_interval_minutes: 5,
            max_retries: 3,
            retry_delay_seconds: 30,
            logwatch_path: PathBuf::from("/usr/sbin/logwatch"),
            logwatch_output_file: PathBuf::from("/var/log/logwatch_output.txt"),
            analysis_file: PathBuf::from("/var/log/logtriage-analysis.json"),
            rate_limit_file: PathBuf::from("/var/log/logtriage-ratelimit.json"),
            lock_file: PathBuf::from("/var/lock/logtriage.lock"),
            triage_policy: TriagePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file merged over the defaults.
    ///
    /// A missing file is not an error: the defaults are returned.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file exists but cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the JSON is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&content)
    }

    /// Load configuration, falling back to the defaults on any load error.
    ///
    /// Used for scheduled runs, where a broken config file must not stop the
    /// run from reporting.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load config, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document merged over the defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the JSON is invalid.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// API key with `${VAR}` references resolved and the env fallback applied.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(&self.openai_api_key, Some(ENV_OPENAI_API_KEY))
    }

    /// SMTP credentials, present only when both username and password are set.
    pub fn smtp_credentials(&self) -> Result<Option<(String, SecretString)>, ConfigError> {
        let user = resolve_secret(&SecretString::new(self.smtp_user.clone()), None)?;
        let password = resolve_secret(&self.smtp_password, None)?;
        if user.is_empty() || password.is_empty() {
            return Ok(None);
        }
        Ok(Some((user.expose().to_string(), password)))
    }

    /// Whether the SMTP port calls for implicit TLS rather than STARTTLS.
    pub fn smtp_implicit_tls(&self) -> bool {
        self.smtp_port == IMPLICIT_TLS_PORT
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }
}
