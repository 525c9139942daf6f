//! Email notifier.
//!
//! Sends one `multipart/alternative` message (plain text and HTML) to all
//! configured recipients. There is no retry: a failed send is reported to
//! the caller, which logs it.
//!
//! # Testability
//!
//! The SMTP connection sits behind [`EmailTransport`]:
//! - Production: [`SmtpTransport`] wrapping `AsyncSmtpTransport<Tokio1Executor>`
//! - Testing: any mock implementing the trait, via [`EmailNotifier::with_transport`]

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use crate::config::{Config, validate_mailbox};
use crate::error::{ConfigError, NotifyError};
use crate::notify::Notifier;
use crate::report::{RenderedReport, ReportContext, ReportRenderer};
use crate::triage::TriageResult;

// =============================================================================
// EmailTransport Trait
// =============================================================================

/// Async email transport abstraction.
///
/// Lets tests inject a mock while production uses the real SMTP transport.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send an email message.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Email accepted by the server
    /// * `Err(String)` - Error message describing the failure
    async fn send_email(&self, message: Message) -> Result<(), String>;
}

/// Real SMTP transport implementing [`EmailTransport`].
pub struct SmtpTransport {
    inner: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    pub fn new(transport: AsyncSmtpTransport<Tokio1Executor>) -> Self {
        Self { inner: transport }
    }

    /// Build the SMTP transport from configuration.
    ///
    /// Port 465 uses implicit TLS. Any other port speaks plain SMTP,
    /// upgraded with STARTTLS when `smtp_use_tls` is set. Credentials are
    /// sent only when both username and password are non-empty.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let host = config.smtp_host.as_str();
        let port = config.smtp_port;

        let tls_parameters = || {
            TlsParameters::builder(host.to_string())
                .dangerous_accept_invalid_certs(!config.smtp_tls_verify)
                .build()
                .map_err(|e| ConfigError::InvalidSmtp(format!("TLS configuration error: {}", e)))
        };

        let builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
        let builder = if config.smtp_implicit_tls() {
            builder.tls(Tls::Wrapper(tls_parameters()?))
        } else if config.smtp_use_tls {
            builder.tls(Tls::Required(tls_parameters()?))
        } else {
            builder
        };

        let builder = match config.smtp_credentials()? {
            Some((user, password)) => {
                builder.credentials(Credentials::new(user, password.expose().to_string()))
            }
            None => builder,
        };

        Ok(Self::new(builder.build()))
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send_email(&self, message: Message) -> Result<(), String> {
        self.inner
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Email notifier.
pub struct EmailNotifier {
    transport: Arc<dyn EmailTransport>,
    from: Mailbox,
    to: Vec<Mailbox>,
    renderer: ReportRenderer,
    /// Fixed header context; `None` reads hostname and clock at send time.
    context: Option<ReportContext>,
}

impl EmailNotifier {
    /// Create the notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unparseable addresses, an empty
    /// recipient list, unresolvable credentials or bad TLS settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let from = validate_mailbox("from_email", &config.from_email)?;
        let to = config
            .to_emails
            .iter()
            .map(|addr| validate_mailbox("to_emails", addr))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(ConfigError::ValidationError(
                "to_emails must contain at least one email address".to_string(),
            ));
        }

        let transport = SmtpTransport::from_config(config)?;
        let renderer = ReportRenderer::new()
            .map_err(|e| ConfigError::ValidationError(format!("report templates: {}", e)))?;

        Ok(Self::with_transport(Arc::new(transport), from, to, renderer))
    }

    /// Create a notifier over any transport.
    pub fn with_transport(
        transport: Arc<dyn EmailTransport>,
        from: Mailbox,
        to: Vec<Mailbox>,
        renderer: ReportRenderer,
    ) -> Self {
        Self {
            transport,
            from,
            to,
            renderer,
            context: None,
        }
    }

    /// Use a fixed hostname and timestamp in every report.
    pub fn with_context(mut self, context: ReportContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.to
    }

    /// Build the message for a rendered report.
    pub fn build_message(&self, report: &RenderedReport) -> Result<Message, NotifyError> {
        let builder = self
            .to
            .iter()
            .fold(Message::builder().from(self.from.clone()), |b, rcpt| {
                b.to(rcpt.clone())
            })
            .subject(report.subject.as_str());

        builder
            .multipart(MultiPart::alternative_plain_html(
                report.text.clone(),
                report.html.clone(),
            ))
            .map_err(|e| NotifyError::BuildFailed(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, result: &TriageResult) -> Result<(), NotifyError> {
        let context = self.context.clone().unwrap_or_else(ReportContext::current);
        let report = self.renderer.render_report(result, &context);
        let message = self.build_message(&report)?;

        self.transport
            .send_email(message)
            .await
            .map_err(NotifyError::SendFailed)?;

        tracing::info!(
            recipients = self.to.len(),
            subject = %report.subject,
            "Email sent"
        );
        Ok(())
    }
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Credentials live in the transport and are never printed.
        f.debug_struct("EmailNotifier")
            .field("from", &self.from.to_string())
            .field("to_count", &self.to.len())
            .finish()
    }
}
