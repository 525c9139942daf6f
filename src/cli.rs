//! Command-line interface for logtriage using clap.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format for journalctl (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Triage yesterday's logwatch digest with an LLM and email problems.
#[derive(Parser, Debug)]
#[command(name = "logtriage")]
#[command(version)]
#[command(about = "Triage the daily logwatch digest with an LLM and email only real problems")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Validate configuration and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Also append log lines to this file.
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}
