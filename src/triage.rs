//! Triage result model shared by the classifier, gate, renderer and notifier.
//!
//! A [`TriageResult`] is produced once per run, written to the analysis
//! snapshot, and never mutated afterwards.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Severity reported by the triage backend.
///
/// The ordering `None < Low < Medium < High < Critical` is the one the alert
/// gate compares against. `Error` is out-of-band (the pipeline itself failed)
/// and ranks with `Critical`. `Unknown` covers any string the backend invents
/// and ranks with `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
    Error,
    Unknown,
}

/// Visual emphasis tier used by the HTML report header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityTier {
    Informational,
    Cautionary,
    Urgent,
}

impl Severity {
    /// All severities that have a defined rank, lowest first.
    pub const RANKED: [Severity; 6] = [
        Severity::None,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
        Severity::Error,
    ];

    /// Parse a severity name. Case-insensitive; unrecognized names map to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Severity::None,
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            "error" => Severity::Error,
            _ => Severity::Unknown,
        }
    }

    /// Numeric rank used for threshold comparisons.
    pub fn rank(self) -> u8 {
        match self {
            Severity::None | Severity::Unknown => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical | Severity::Error => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Unknown => "unknown",
        }
    }

    /// Human-readable label for reports and subject lines.
    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "Normal",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
            Severity::Error => "Error",
            Severity::Unknown => "Unknown",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::None => "\u{2705}",
            Severity::Low => "\u{1F4CB}",
            Severity::Medium => "\u{26A0}\u{FE0F}",
            Severity::High => "\u{1F534}",
            Severity::Critical => "\u{1F6A8}",
            Severity::Error => "\u{274C}",
            Severity::Unknown => "\u{2753}",
        }
    }

    pub fn tier(self) -> SeverityTier {
        match self {
            Severity::None => SeverityTier::Informational,
            Severity::High | Severity::Critical => SeverityTier::Urgent,
            Severity::Low | Severity::Medium | Severity::Error | Severity::Unknown => {
                SeverityTier::Cautionary
            }
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(raw) => Ok(Severity::parse(&raw)),
            _ => Ok(Severity::Unknown),
        }
    }
}

/// Deserialize `null` as the type's default, like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Structured triage of one digest.
///
/// Field names match the JSON object the backend is asked to produce, so the
/// same type parses the completion and serializes the audit snapshot. Missing
/// and `null` fields take their defaults; the backend is not trusted to be
/// complete.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageResult {
    pub severity: Severity,
    #[serde(deserialize_with = "null_as_default")]
    pub issues_found: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub critical_issues: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub statistics: Map<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
}

impl TriageResult {
    /// Build a degraded result for a run that could not be triaged normally.
    pub fn error(
        summary: impl Into<String>,
        critical_issues: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            issues_found: true,
            summary: summary.into(),
            critical_issues,
            warnings: Vec::new(),
            statistics: Map::new(),
            recommendations,
        }
    }

    /// Parse a backend completion into a result.
    pub fn from_completion(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}
