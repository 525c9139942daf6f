//! Triage policy: the operational judgment the classifier is instructed with.
//!
//! Kept as data so operators can tune what counts as routine noise without
//! rebuilding. The defaults target an internet-facing server where scans and
//! brute-force attempts are constant background.

use serde::{Deserialize, Serialize};

/// Instructions embedded in every triage request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriagePolicy {
    /// System instruction sent with every request.
    pub system_prompt: String,
    /// Events the backend must not report as issues.
    pub ignore: Vec<String>,
    /// The only conditions that may be reported as critical issues.
    pub flag: Vec<String>,
    /// Disk usage above this percentage is actionable, below it is noise.
    pub disk_usage_threshold_percent: u8,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            system_prompt: "You are a Linux system security expert. Provide concise, \
                            practical analysis."
                .to_string(),
            ignore: [
                "Failed SSH login attempts (blocked attacks)",
                "HTTP requests answered with 400/401/404 (scanner bots are routine)",
                "Vulnerability scans for /.env, /.git/config, /phpMyAdmin and similar paths (all failed)",
                "\"Attempts to use known hacks\" reports (the attempts failed)",
                "Connection attempts to mod_proxy",
                "fail2ban blocks",
                "Routine service restarts",
                "Scheduled cron job runs",
                "Package updates and installations",
                "Normal mail delivery",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            flag: [
                "Suspicious activity after a successful authentication",
                "Unexpected successful logins as root or an administrator",
                "Services that stopped or crashed abnormally (not restarts)",
                "Kernel panics or OOM killer activity",
                "Database corruption or crashes",
                "Filesystem errors",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            disk_usage_threshold_percent: 85,
        }
    }
}
