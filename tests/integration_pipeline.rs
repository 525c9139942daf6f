//! End-to-end runs of the triage pipeline against a mocked backend and a
//! recording email transport.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use lettre::Message;
use lettre::message::Mailbox;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use logtriage::config::{Config, SecretString};
use logtriage::digest::StaticDigest;
use logtriage::{
    EmailNotifier, EmailTransport, OpenAiBackend, Pipeline, ReportContext, ReportRenderer,
    RunLock, RunOutcome, Severity, TriageResult,
};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send_email(&self, message: Message) -> Result<(), String> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

fn completion(content: serde_json::Value) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content.to_string() },
            "finish_reason": "stop"
        }]
    })
}

fn config_for(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    Config {
        openai_api_key: SecretString::new("sk-test".to_string()),
        openai_base_url: server.uri(),
        alert_threshold: Severity::Medium,
        max_retries: 1,
        lock_file: dir.path().join("run.lock"),
        analysis_file: dir.path().join("analysis.json"),
        rate_limit_file: dir.path().join("ratelimit.json"),
        logwatch_output_file: dir.path().join("logwatch_output.txt"),
        ..Config::default()
    }
}

fn email_notifier(transport: Arc<RecordingTransport>) -> EmailNotifier {
    let from: Mailbox = "logtriage@example.com".parse().unwrap();
    let to: Vec<Mailbox> = vec![
        "ops@example.com".parse().unwrap(),
        "security@example.com".parse().unwrap(),
    ];
    let timestamp = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(6, 25, 0)
        .unwrap();
    EmailNotifier::with_transport(transport, from, to, ReportRenderer::new().unwrap())
        .with_context(ReportContext::new("web-01", timestamp))
}

fn read_analysis(config: &Config) -> TriageResult {
    serde_json::from_str(&std::fs::read_to_string(&config.analysis_file).unwrap()).unwrap()
}

#[tokio::test]
async fn critical_disk_usage_sends_one_email_to_all_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "severity": "critical",
            "issues_found": true,
            "summary": "Root filesystem nearly full",
            "critical_issues": ["/ at 92% usage"],
            "warnings": [],
            "statistics": { "disk_usage": "92%" },
            "recommendations": ["Free space on /"]
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = Arc::new(RecordingTransport::default());

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(StaticDigest("/dev/sda1  50G  46G  4G  92% /".to_string())),
        Arc::new(OpenAiBackend::from_config(&config).unwrap()),
        Arc::new(email_notifier(transport.clone())),
    );

    let outcome = pipeline.run().await.unwrap();

    assert_eq!(outcome, RunOutcome::Notified { delivered: true });
    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "exactly one email per run");
    assert_eq!(sent[0].envelope().to().len(), 2);

    let saved = read_analysis(&config);
    assert_eq!(saved.severity, Severity::Critical);
    assert_eq!(saved.critical_issues, vec!["/ at 92% usage".to_string()]);
    assert!(config.rate_limit_file.exists());
}

#[tokio::test]
async fn quiet_digest_below_threshold_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "severity": "low",
            "issues_found": false,
            "summary": "Routine activity"
        }))))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = Arc::new(RecordingTransport::default());

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(StaticDigest("cron: 24 jobs ran".to_string())),
        Arc::new(OpenAiBackend::from_config(&config).unwrap()),
        Arc::new(email_notifier(transport.clone())),
    );

    assert_eq!(pipeline.run().await.unwrap(), RunOutcome::Skipped);
    assert!(transport.sent.lock().unwrap().is_empty());
    assert_eq!(read_analysis(&config).severity, Severity::Low);
}

#[tokio::test]
async fn backend_failure_is_reported_as_error_severity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = Arc::new(RecordingTransport::default());

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(StaticDigest("sshd: 4000 failed logins".to_string())),
        Arc::new(OpenAiBackend::from_config(&config).unwrap()),
        Arc::new(email_notifier(transport.clone())),
    );

    assert_eq!(
        pipeline.run().await.unwrap(),
        RunOutcome::Notified { delivered: true }
    );
    assert_eq!(transport.sent.lock().unwrap().len(), 1);

    let saved = read_analysis(&config);
    assert_eq!(saved.severity, Severity::Error);
    assert!(saved.summary.starts_with("AI analysis failed after 1 attempts"));
}

#[tokio::test]
async fn held_lock_skips_backend_and_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "severity": "critical"
        }))))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = Arc::new(RecordingTransport::default());
    let _held = RunLock::acquire(&config.lock_file).unwrap().unwrap();

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(StaticDigest("kernel: panic".to_string())),
        Arc::new(OpenAiBackend::from_config(&config).unwrap()),
        Arc::new(email_notifier(transport.clone())),
    );

    assert_eq!(pipeline.run().await.unwrap(), RunOutcome::LockBusy);
    assert!(transport.sent.lock().unwrap().is_empty());
    assert!(!config.analysis_file.exists());
}

#[tokio::test]
async fn second_run_inside_min_interval_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
            "severity": "none",
            "summary": "All quiet"
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);
    let transport = Arc::new(RecordingTransport::default());

    let pipeline = Pipeline::from_config(
        &config,
        Arc::new(StaticDigest("cron: ok".to_string())),
        Arc::new(OpenAiBackend::from_config(&config).unwrap()),
        Arc::new(email_notifier(transport.clone())),
    );

    assert_eq!(pipeline.run().await.unwrap(), RunOutcome::Skipped);
    assert_eq!(
        pipeline.run().await.unwrap(),
        RunOutcome::Notified { delivered: true }
    );

    let saved = read_analysis(&config);
    assert_eq!(saved.severity, Severity::Error);
    assert_eq!(
        saved.critical_issues,
        vec!["Rate limit protection triggered".to_string()]
    );
}
