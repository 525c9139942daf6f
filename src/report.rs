//! Report rendering for notification emails.
//!
//! A [`TriageResult`] becomes a subject line, a plain-text body and an HTML
//! body, using minijinja templates compiled into the binary. Rendering is
//! pure: hostname and time come in through a [`ReportContext`].
//!
//! # Example
//!
//! ```ignore
//! use logtriage::report::{ReportContext, ReportRenderer};
//!
//! let renderer = ReportRenderer::new()?;
//! let report = renderer.render_report(&result, &ReportContext::current());
//! println!("{}", report.subject);
//! ```

use chrono::{Local, NaiveDateTime};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use serde_json::Value;

use crate::error::TemplateError;
use crate::triage::{SeverityTier, TriageResult};

const SUBJECT_TEMPLATE: &str = "subject.txt";
const TEXT_TEMPLATE: &str = "report.txt";
const HTML_TEMPLATE: &str = "report.html";

const SUBJECT_SOURCE: &str =
    "{{ icon }} [{{ hostname }}] Logwatch AI report - severity: {{ severity }} - {{ date }}";

const TEXT_SOURCE: &str = r#"{{ icon }} LOGWATCH AI REPORT - {{ timestamp }}
============================================================
Host: {{ hostname }}
Severity: {{ severity }}
Summary: {{ summary or "No summary available" }}

{% if critical_issues %}
🚨 Critical issues requiring action:
{% for issue in critical_issues %}
  • {{ issue }}
{% endfor %}

{% endif %}
{% if warnings %}
⚠️ Warnings:
{% for warning in warnings %}
  • {{ warning }}
{% endfor %}

{% endif %}
{% if statistics %}
📊 Statistics:
{% for stat in statistics %}
  • {{ stat.label }}: {{ stat.value }}
{% endfor %}

{% endif %}
{% if recommendations %}
💡 Recommendations:
{% for rec in recommendations %}
  • {{ rec }}
{% endfor %}
{% endif %}
"#;

const HTML_SOURCE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; }
        .header { background: {{ header_color }}; padding: 15px; border-radius: 5px; margin-bottom: 20px; }
        .severity { font-size: 24px; font-weight: bold; }
        .section { margin: 20px 0; }
        .issues { background: #f8f9fa; padding: 10px; border-left: 4px solid #dc3545; }
        .warnings { background: #f8f9fa; padding: 10px; border-left: 4px solid #ffc107; }
        .stats { background: #e9ecef; padding: 10px; border-radius: 5px; }
        ul { margin: 10px 0; }
    </style>
</head>
<body>
    <div class="header">
        <div class="severity">{{ icon }} Severity: {{ severity }}</div>
        <div>Host: {{ hostname }}</div>
        <div>Date: {{ timestamp }}</div>
    </div>

    <div class="section">
        <h2>📝 Summary</h2>
        <p>{{ summary or "No summary available" }}</p>
    </div>
{% if critical_issues %}

    <div class="section issues">
        <h3>🚨 Critical issues requiring action</h3>
        <ul>
{% for issue in critical_issues %}
            <li>{{ issue }}</li>
{% endfor %}
        </ul>
    </div>
{% endif %}
{% if warnings %}

    <div class="section warnings">
        <h3>⚠️ Warnings</h3>
        <ul>
{% for warning in warnings %}
            <li>{{ warning }}</li>
{% endfor %}
        </ul>
    </div>
{% endif %}
{% if statistics %}

    <div class="section stats">
        <h3>📊 Statistics</h3>
        <ul>
{% for stat in statistics %}
            <li><strong>{{ stat.label }}:</strong> {{ stat.value }}</li>
{% endfor %}
        </ul>
    </div>
{% endif %}
{% if recommendations %}

    <div class="section">
        <h3>💡 Recommendations</h3>
        <ul>
{% for rec in recommendations %}
            <li>{{ rec }}</li>
{% endfor %}
        </ul>
    </div>
{% endif %}
</body>
</html>
"#;

/// Output variant of a report body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Html,
}

impl ReportFormat {
    fn template_name(self) -> &'static str {
        match self {
            ReportFormat::Text => TEXT_TEMPLATE,
            ReportFormat::Html => HTML_TEMPLATE,
        }
    }
}

/// Facts about the run that appear in the report header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub hostname: String,
    /// Local wall-clock time of the run.
    pub timestamp: NaiveDateTime,
}

impl ReportContext {
    pub fn new(hostname: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            hostname: hostname.into(),
            timestamp,
        }
    }

    /// This host, now.
    pub fn current() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read hostname");
                "localhost".to_string()
            });
        Self::new(hostname, Local::now().naive_local())
    }
}

/// Subject and both bodies of a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Serialize)]
struct StatRow {
    label: String,
    value: String,
}

/// Template context built from a result and a run context.
#[derive(Debug, Serialize)]
struct ReportView<'a> {
    hostname: &'a str,
    timestamp: String,
    date: String,
    severity: &'static str,
    icon: &'static str,
    header_color: &'static str,
    summary: &'a str,
    critical_issues: &'a [String],
    warnings: &'a [String],
    statistics: Vec<StatRow>,
    recommendations: &'a [String],
}

impl<'a> ReportView<'a> {
    fn new(result: &'a TriageResult, ctx: &'a ReportContext) -> Self {
        Self {
            hostname: &ctx.hostname,
            timestamp: ctx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            date: ctx.timestamp.format("%Y-%m-%d").to_string(),
            severity: result.severity.label(),
            icon: result.severity.icon(),
            header_color: header_color(result.severity.tier()),
            summary: &result.summary,
            critical_issues: &result.critical_issues,
            warnings: &result.warnings,
            statistics: result
                .statistics
                .iter()
                .map(|(key, value)| StatRow {
                    label: stat_label(key),
                    value: stat_value(value),
                })
                .collect(),
            recommendations: &result.recommendations,
        }
    }
}

/// HTML header background for a severity tier.
pub fn header_color(tier: SeverityTier) -> &'static str {
    match tier {
        SeverityTier::Informational => "#d4edda",
        SeverityTier::Cautionary => "#fff3cd",
        SeverityTier::Urgent => "#f8d7da",
    }
}

/// Display label for a statistics key.
pub fn stat_label(key: &str) -> String {
    match key {
        "ssh_attempts" => "SSH attempts".to_string(),
        "blocked_ips" => "Blocked IPs".to_string(),
        "disk_usage_percent" => "Disk usage (%)".to_string(),
        "errors_count" => "Errors".to_string(),
        other => title_case(other),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn stat_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders triage results with the embedded templates.
///
/// HTML output is auto-escaped: everything in a result comes from the
/// backend and is treated as untrusted.
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    /// Create a renderer with the built-in templates.
    pub fn new() -> Result<Self, TemplateError> {
        Self::with_templates(SUBJECT_SOURCE, TEXT_SOURCE, HTML_SOURCE)
    }

    fn with_templates(
        subject: &'static str,
        text: &'static str,
        html: &'static str,
    ) -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_auto_escape_callback(|name| {
            if name.ends_with(".html") {
                AutoEscape::Html
            } else {
                AutoEscape::None
            }
        });

        for (name, source) in [
            (SUBJECT_TEMPLATE, subject),
            (TEXT_TEMPLATE, text),
            (HTML_TEMPLATE, html),
        ] {
            env.add_template(name, source)
                .map_err(|e| TemplateError::RenderFailed {
                    message: format!("{}: {}", name, e),
                })?;
        }

        Ok(Self { env })
    }

    fn render_template(&self, name: &str, view: &ReportView<'_>) -> Result<String, TemplateError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::NotFound {
                name: name.to_string(),
            })?;
        template
            .render(view)
            .map_err(|e| TemplateError::RenderFailed {
                message: e.to_string(),
            })
    }

    /// Render one body variant.
    pub fn render(
        &self,
        result: &TriageResult,
        ctx: &ReportContext,
        format: ReportFormat,
    ) -> Result<String, TemplateError> {
        self.render_template(format.template_name(), &ReportView::new(result, ctx))
    }

    /// Render the subject line.
    pub fn subject(&self, result: &TriageResult, ctx: &ReportContext) -> Result<String, TemplateError> {
        self.render_template(SUBJECT_TEMPLATE, &ReportView::new(result, ctx))
            .map(|s| s.replace(['\r', '\n'], " "))
    }

    /// Render one body variant, falling back to a minimal body on error.
    ///
    /// The fallback never includes backend-provided lists, only the
    /// severity and, for text, the summary.
    pub fn render_with_fallback(
        &self,
        result: &TriageResult,
        ctx: &ReportContext,
        format: ReportFormat,
    ) -> String {
        match self.render(result, ctx, format) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    template = format.template_name(),
                    error = %e,
                    "Report render failed, using fallback"
                );
                match format {
                    ReportFormat::Text => format!(
                        "Severity: {}\nSummary: {}\n\nReport rendering failed: {}\nCheck logs for details.",
                        result.severity.label(),
                        result.summary,
                        e
                    ),
                    ReportFormat::Html => format!(
                        "<html><body><p><strong>Severity: {}</strong></p>\
                         <p>Report rendering failed. Check logs for details.</p></body></html>",
                        result.severity.label()
                    ),
                }
            }
        }
    }

    /// Subject and both bodies, never failing.
    pub fn render_report(&self, result: &TriageResult, ctx: &ReportContext) -> RenderedReport {
        let subject = self.subject(result, ctx).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Subject render failed, using fallback");
            format!(
                "{} [{}] Logwatch AI report - severity: {}",
                result.severity.icon(),
                ctx.hostname,
                result.severity.label()
            )
        });
        RenderedReport {
            subject,
            text: self.render_with_fallback(result, ctx, ReportFormat::Text),
            html: self.render_with_fallback(result, ctx, ReportFormat::Html),
        }
    }
}

impl std::fmt::Debug for ReportRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRenderer")
            .field(
                "templates",
                &[SUBJECT_TEMPLATE, TEXT_TEMPLATE, HTML_TEMPLATE],
            )
            .finish()
    }
}
