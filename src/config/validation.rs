//! Semantic validation of a loaded configuration.

use super::types::Config;
use crate::error::ConfigError;
use crate::ratelimit::MAX_MIN_INTERVAL_MINUTES;
use crate::triage::Severity;
use lettre::message::Mailbox;

impl Config {
    /// Validate the configuration.
    ///
    /// All problems are collected so the operator sees every error at once.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.alert_threshold == Severity::Unknown {
            errors.push(ConfigError::ValidationError(format!(
                "alert_threshold must be one of: {}",
                Severity::RANKED
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if let Err(e) = validate_mailbox("from_email", &self.from_email) {
            errors.push(e);
        }

        if self.to_emails.is_empty() {
            errors.push(ConfigError::ValidationError(
                "to_emails must contain at least one email address".to_string(),
            ));
        }
        for addr in &self.to_emails {
            if let Err(e) = validate_mailbox("to_emails", addr) {
                errors.push(e);
            }
        }

        if self.smtp_host.trim().is_empty() {
            errors.push(ConfigError::InvalidSmtp("smtp_host is empty".to_string()));
        }

        for (name, value) in [
            ("max_retries", self.max_retries),
            ("max_requests_per_hour", self.max_requests_per_hour),
            ("max_requests_per_day", self.max_requests_per_day),
        ] {
            if value == 0 {
                errors.push(ConfigError::ValidationError(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        if self.min_interval_minutes > MAX_MIN_INTERVAL_MINUTES {
            errors.push(ConfigError::ValidationError(format!(
                "min_interval_minutes must be at most {}, got {}",
                MAX_MIN_INTERVAL_MINUTES, self.min_interval_minutes
            )));
        }

        if self.request_timeout_seconds == 0 {
            errors.push(ConfigError::ValidationError(
                "request_timeout_seconds must be at least 1".to_string(),
            ));
        }

        if !self.openai_base_url.starts_with("http://")
            && !self.openai_base_url.starts_with("https://")
        {
            errors.push(ConfigError::ValidationError(format!(
                "openai_base_url '{}' must start with http:// or https://",
                self.openai_base_url
            )));
        }

        let disk = self.triage_policy.disk_usage_threshold_percent;
        if disk == 0 || disk > 100 {
            errors.push(ConfigError::ValidationError(format!(
                "triage_policy.disk_usage_threshold_percent must be within 1..=100, got {}",
                disk
            )));
        }

        if let Err(e) = self.api_key() {
            errors.push(ConfigError::ValidationError(format!("openai_api_key: {}", e)));
        }
        if let Err(e) = self.smtp_credentials() {
            errors.push(ConfigError::InvalidSmtp(format!("credentials: {}", e)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validates that an address parses as an RFC 5322 mailbox.
pub(crate) fn validate_mailbox(field: &str, addr: &str) -> Result<Mailbox, ConfigError> {
    addr.parse::<Mailbox>()
        .map_err(|e| ConfigError::InvalidAddress {
            field: field.to_string(),
            message: format!("'{}': {}", addr, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_mailbox_accepts_plain_and_named_addresses() {
        assert!(validate_mailbox("to_emails", "ops@example.com").is_ok());
        assert!(validate_mailbox("to_emails", "Ops Team <ops@example.com>").is_ok());
        assert!(validate_mailbox("to_emails", "root@localhost").is_ok());
    }

    #[test]
    fn validate_mailbox_rejects_garbage() {
        let err = validate_mailbox("from_email", "not an address").unwrap_err();
        assert!(err.to_string().contains("from_email"));
        assert!(validate_mailbox("to_emails", "").is_err());
    }
}
