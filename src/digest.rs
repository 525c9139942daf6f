//! Collection of the daily log digest.
//!
//! The digest comes from running `logwatch` as a child process. Any failure
//! (spawn error, non-zero exit, timeout) yields an empty digest, which the
//! pipeline treats as "nothing to triage".

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;
use crate::error::DigestError;
use crate::snapshot;

/// Arguments passed to logwatch on every run.
pub const LOGWATCH_ARGS: [&str; 8] = [
    "--output", "stdout", "--format", "text", "--range", "yesterday", "--detail", "10",
];

/// Wall-clock limit for the digest command.
pub const DIGEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of the text to triage.
#[async_trait]
pub trait DigestSource: Send + Sync {
    /// Fetch the digest. Failures are logged and produce an empty string.
    async fn fetch(&self) -> String;
}

/// Digest produced by running an external command.
#[derive(Debug, Clone)]
pub struct LogwatchDigest {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    snapshot_path: Option<PathBuf>,
}

impl LogwatchDigest {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            snapshot_path: None,
        }
    }

    /// logwatch with the standard argument set, snapshotting to `logwatch_output_file`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.logwatch_path.clone(),
            LOGWATCH_ARGS.iter().map(|a| a.to_string()).collect(),
            DIGEST_TIMEOUT,
        )
        .with_snapshot(config.logwatch_output_file.clone())
    }

    /// Write every successful digest to `path`, overwriting the previous one.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Run the command and capture its stdout.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn run(&self) -> Result<String, DigestError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DigestError::Spawn(format!("{}: {}", self.program.display(), e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DigestError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| DigestError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(DigestError::ExitStatus {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DigestSource for LogwatchDigest {
    async fn fetch(&self) -> String {
        match self.run().await {
            Ok(text) => {
                tracing::info!(
                    program = %self.program.display(),
                    chars = text.chars().count(),
                    "Digest collected"
                );
                if let Some(path) = &self.snapshot_path {
                    snapshot::write_text(path, &text);
                }
                text
            }
            Err(e) => {
                tracing::error!(program = %self.program.display(), error = %e, "Digest command failed");
                String::new()
            }
        }
    }
}

/// Digest with fixed content.
#[derive(Debug, Clone, Default)]
pub struct StaticDigest(pub String);

#[async_trait]
impl DigestSource for StaticDigest {
    async fn fetch(&self) -> String {
        self.0.clone()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> LogwatchDigest {
        LogwatchDigest::new(
            "/bin/sh",
            vec!["-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[tokio::test]
    async fn captures_stdout() {
        let digest = shell("printf 'sshd: 3 failed logins\\n'", Duration::from_secs(5));
        assert_eq!(digest.run().await.unwrap(), "sshd: 3 failed logins\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_and_fetches_empty() {
        let digest = shell("echo partial; echo broken >&2; exit 3", Duration::from_secs(5));

        match digest.run().await {
            Err(DigestError::ExitStatus { code, stderr }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("Expected ExitStatus, got {:?}", other),
        }
        assert_eq!(digest.fetch().await, "");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let digest = LogwatchDigest::new("/nonexistent/logwatch", vec![], Duration::from_secs(5));
        assert!(matches!(digest.run().await, Err(DigestError::Spawn(_))));
        assert_eq!(digest.fetch().await, "");
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let digest = shell("sleep 5", Duration::from_millis(100));
        assert!(matches!(digest.run().await, Err(DigestError::Timeout(_))));
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let digest = shell("printf 'ok \\377 end'", Duration::from_secs(5));
        let text = digest.run().await.unwrap();
        assert!(text.starts_with("ok "));
        assert!(text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn successful_fetch_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logwatch_output.txt");
        let digest = shell("echo digest body", Duration::from_secs(5)).with_snapshot(&path);

        assert_eq!(digest.fetch().await, "digest body\n");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "digest body\n");
    }

    #[tokio::test]
    async fn failed_fetch_leaves_snapshot_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logwatch_output.txt");
        std::fs::write(&path, "previous").unwrap();
        let digest = shell("exit 1", Duration::from_secs(5)).with_snapshot(&path);

        assert_eq!(digest.fetch().await, "");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    }

    #[test]
    fn from_config_uses_fixed_arguments() {
        let config = Config::default();
        let digest = LogwatchDigest::from_config(&config);
        assert_eq!(digest.program, PathBuf::from("/usr/sbin/logwatch"));
        assert_eq!(
            digest.args.join(" "),
            "--output stdout --format text --range yesterday --detail 10"
        );
        assert_eq!(digest.timeout, Duration::from_secs(60));
        assert_eq!(
            digest.snapshot_path,
            Some(PathBuf::from("/var/log/logwatch_output.txt"))
        );
    }
}
