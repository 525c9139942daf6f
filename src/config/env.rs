//! Environment variable substitution for secrets.

use super::secret::SecretString;
use crate::error::ConfigError;
use regex::Regex;
use std::sync::LazyLock;

/// Environment variable consulted when no API key is configured.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

static ENV_VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

/// Resolves `${VAR_NAME}` patterns in a string.
///
/// All undefined variables are reported in a single error.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let mut result = value.to_string();
    let mut errors = Vec::new();

    for cap in ENV_VAR_REGEX.captures_iter(value) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        match std::env::var(var_name) {
            Ok(var_value) => {
                result = result.replace(full_match, &var_value);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if errors.len() > 1 { "s" } else { "" },
            errors.join(", ")
        )))
    }
}

/// Resolves a configured secret, falling back to `fallback_env` when empty.
pub fn resolve_secret(
    value: &SecretString,
    fallback_env: Option<&str>,
) -> Result<SecretString, ConfigError> {
    let resolved = resolve_env_vars(value.expose())?;
    if resolved.is_empty()
        && let Some(var) = fallback_env
    {
        return Ok(SecretString::new(std::env::var(var).unwrap_or_default()));
    }
    Ok(SecretString::new(resolved))
}
