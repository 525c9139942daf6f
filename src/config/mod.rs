//! Configuration loading and validation for logtriage.
//!
//! This module handles loading the optional JSON configuration file over
//! built-in defaults, validation, and resolving secrets from the environment.

mod env;
mod policy;
mod secret;
mod types;
mod validation;

// Re-exports publics
pub use env::{ENV_OPENAI_API_KEY, resolve_env_vars, resolve_secret};
pub use policy::TriagePolicy;
pub use secret::SecretString;
pub use types::{Config, DEFAULT_CONFIG_PATH, IMPLICIT_TLS_PORT};
pub(crate) use validation::validate_mailbox;
