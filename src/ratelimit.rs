//! Persistent rate limiting of triage backend calls.
//!
//! Every accepted request is recorded in a JSON ledger on disk so that quota
//! is enforced across separate, short-lived runs. Three budgets apply:
//!
//! - a minimum interval since the last accepted request,
//! - a maximum number of requests in the trailing hour,
//! - a maximum number of requests in the trailing 24 hours.
//!
//! # Example
//!
//! ```ignore
//! use logtriage::ratelimit::{RateLimiter, RateLimits};
//!
//! let limiter = RateLimiter::new("/var/log/logtriage-ratelimit.json", RateLimits::from_config(&config));
//! if limiter.admit(chrono::Utc::now()) {
//!     // call the backend
//! }
//! ```
//!
//! The ledger has a single writer at a time because the whole run is guarded
//! by [`crate::lock::RunLock`].

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;

/// How far back the ledger remembers requests.
const RETENTION: TimeDelta = TimeDelta::days(1);

/// Window for the hourly budget.
const HOUR: TimeDelta = TimeDelta::hours(1);

/// Longest accepted `min_interval_minutes`; the ledger only remembers a day.
pub const MAX_MIN_INTERVAL_MINUTES: u64 = 24 * 60;

/// Request budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub min_interval: TimeDelta,
    pub max_per_hour: u32,
    pub max_per_day: u32,
}

impl RateLimits {
    pub fn from_config(config: &Config) -> Self {
        let minutes = i64::try_from(config.min_interval_minutes).unwrap_or(i64::MAX / 60_000);
        Self {
            min_interval: TimeDelta::try_minutes(minutes).unwrap_or(RETENTION),
            max_per_hour: config.max_requests_per_hour,
            max_per_day: config.max_requests_per_day,
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request may proceed; a slot has been consumed.
    Admitted,
    /// Request must not be sent.
    Denied(DenyReason),
}

/// Which budget denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MinInterval { remaining: TimeDelta },
    HourlyCap { limit: u32 },
    DailyCap { limit: u32 },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::MinInterval { remaining } => write!(
                f,
                "minimum interval not met, wait {:.1} more minutes",
                remaining.num_seconds() as f64 / 60.0
            ),
            DenyReason::HourlyCap { limit } => write!(f, "hourly limit ({}) reached", limit),
            DenyReason::DailyCap { limit } => write!(f, "daily limit ({}) reached", limit),
        }
    }
}

/// On-disk shape of the ledger.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    requests: Vec<String>,
}

/// Timestamps of past accepted requests, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<DateTime<Utc>>,
}

impl Ledger {
    pub fn new(mut entries: Vec<DateTime<Utc>>) -> Self {
        entries.sort();
        Self { entries }
    }

    /// Load the ledger from disk.
    ///
    /// A missing or corrupt file yields an empty ledger: losing history only
    /// makes the limiter more permissive for one window, which is preferable
    /// to failing the run.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read rate limit ledger");
                return Self::default();
            }
        };

        let file: LedgerFile = match serde_json::from_str(&content) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Rate limit ledger is corrupt, starting empty");
                return Self::default();
            }
        };

        let entries = file
            .requests
            .iter()
            .filter_map(|raw| {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    tracing::warn!(entry = %raw, "Dropping unparseable rate limit entry");
                }
                parsed
            })
            .collect();

        Self::new(entries)
    }

    /// Persist the ledger, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = LedgerFile {
            requests: self.entries.iter().map(|t| t.to_rfc3339()).collect(),
        };
        let json = serde_json::to_string(&file).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Drop entries at or beyond the retention window.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - RETENTION;
        self.entries.retain(|t| *t > cutoff);
    }

    pub fn record(&mut self, now: DateTime<Utc>) {
        self.entries.push(now);
        self.entries.sort();
    }

    pub fn entries(&self) -> &[DateTime<Utc>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one interpreted as local time.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| naive.and_local_timezone(Local).earliest())
        .map(|t| t.with_timezone(&Utc))
}

/// Decide whether a request at `now` fits the budgets.
///
/// `ledger` must already be pruned to the retention window. Pure: the caller
/// records the admission.
pub fn evaluate(ledger: &Ledger, now: DateTime<Utc>, limits: &RateLimits) -> RateLimitResult {
    if let Some(last) = ledger.entries().last() {
        // An interval past the end of representable time never elapses.
        let Some(earliest_next) = last.checked_add_signed(limits.min_interval) else {
            return RateLimitResult::Denied(DenyReason::MinInterval {
                remaining: limits.min_interval,
            });
        };
        if earliest_next > now {
            return RateLimitResult::Denied(DenyReason::MinInterval {
                remaining: earliest_next - now,
            });
        }
    }

    let hour_ago = now - HOUR;
    let last_hour = ledger.entries().iter().filter(|t| **t > hour_ago).count();
    if last_hour >= limits.max_per_hour as usize {
        return RateLimitResult::Denied(DenyReason::HourlyCap {
            limit: limits.max_per_hour,
        });
    }

    if ledger.len() >= limits.max_per_day as usize {
        return RateLimitResult::Denied(DenyReason::DailyCap {
            limit: limits.max_per_day,
        });
    }

    RateLimitResult::Admitted
}

/// Rate limiter backed by a ledger file.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    path: PathBuf,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(path: impl Into<PathBuf>, limits: RateLimits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.rate_limit_file.clone(), RateLimits::from_config(config))
    }

    /// Check the budgets and, if admitted, record the request.
    ///
    /// Denials leave the ledger file untouched. A failure to persist an
    /// admission is logged; the admission still stands.
    pub fn check(&self, now: DateTime<Utc>) -> RateLimitResult {
        let mut ledger = Ledger::load(&self.path);
        ledger.prune(now);

        let result = evaluate(&ledger, now, &self.limits);
        match result {
            RateLimitResult::Admitted => {
                ledger.record(now);
                if let Err(e) = ledger.save(&self.path) {
                    tracing::error!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to save rate limit ledger"
                    );
                }
                tracing::debug!(
                    requests_last_day = ledger.len(),
                    max_per_day = self.limits.max_per_day,
                    "Rate limit admitted request"
                );
            }
            RateLimitResult::Denied(reason) => {
                tracing::warn!(reason = %reason, "Rate limit denied request");
            }
        }
        result
    }

    /// `true` if the request is admitted.
    pub fn admit(&self, now: DateTime<Utc>) -> bool {
        self.check(now) == RateLimitResult::Admitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
