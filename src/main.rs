//! logtriage - LLM triage of the daily logwatch digest with email alerts.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use logtriage::cli::{Cli, LogFormat};
use logtriage::config::Config;
use logtriage::{EmailNotifier, LogwatchDigest, OpenAiBackend, Pipeline};

/// Initialize the tracing subscriber with the specified log format.
///
/// Logs go to stderr, and are also appended to `log_file` when given.
fn init_logging(format: LogFormat, log_file: Option<&Path>) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("cannot open log file '{}': {}", path.display(), e);
                None
            }
        }
    });
    let ansi = file.is_none();
    let writer = match file {
        Some(file) => BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(writer)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format, cli.log_file.as_deref());

    info!(config_path = %cli.config.display(), "Loading configuration");

    // A broken file only stops --validate; scheduled runs fall back to defaults.
    let config = if cli.validate {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
                std::process::exit(1);
            }
        }
    } else {
        Config::load_or_default(&cli.config)
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    if cli.validate {
        print_summary(&cli.config, &config);
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config))
}

fn print_summary(path: &Path, config: &Config) {
    println!("Configuration is valid: {}", path.display());
    println!(
        "  Model: {} ({})",
        config.openai_model, config.openai_base_url
    );
    println!(
        "  SMTP: {}:{} ({})",
        config.smtp_host,
        config.smtp_port,
        if config.smtp_implicit_tls() {
            "implicit TLS"
        } else if config.smtp_use_tls {
            "STARTTLS"
        } else {
            "plain"
        }
    );
    println!("  Recipients: {}", config.to_emails.join(", "));
    println!(
        "  Alert threshold: {}{}",
        config.alert_threshold,
        if config.always_send_summary {
            " (always send summary)"
        } else {
            ""
        }
    );
    println!(
        "  Rate limits: {} min interval, {}/hour, {}/day",
        config.min_interval_minutes, config.max_requests_per_hour, config.max_requests_per_day
    );
}

/// Main async entry point.
async fn run(config: Config) -> Result<()> {
    let digest = Arc::new(LogwatchDigest::from_config(&config));
    let backend = Arc::new(OpenAiBackend::from_config(&config)?);
    let notifier = Arc::new(EmailNotifier::from_config(&config)?);

    let pipeline = Pipeline::from_config(&config, digest, backend, notifier);

    match pipeline.run().await {
        Ok(outcome) => {
            info!(outcome = %outcome, "Logwatch triage run complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Fatal error");
            Err(anyhow::anyhow!("Run failed: {}", e))
        }
    }
}
