//! Integration tests for the pipeline coordinator over in-memory fakes.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use shipgate_core::fakes::{AuditRecord, MemoryAuditSink, ScriptedAnalyzer, ScriptedTransport};
use shipgate_core::{
    BackoffPolicy, CancellationToken, Coordinator, DeploymentRequest, FinalStatus, GateConfig,
    NotifyConfig, PipelineConfig, PipelineError, QualityGate, Transport, TransportError,
    TriggerEvent, WireResponse,
};

fn test_config(max_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        branch: "main".to_string(),
        gate: GateConfig {
            analyzer_command: vec!["unused-by-fakes".to_string()],
            analyzer_timeout: Duration::from_secs(30),
            threshold: 8.0,
            code_set: vec![PathBuf::from("src")],
        },
        notify: NotifyConfig {
            endpoint: Url::parse("https://deploy.example/misc/update").unwrap(),
            secret: Some("test-key".to_string()),
            max_attempts,
            // Zero base keeps retry tests instant.
            backoff: BackoffPolicy::exponential(Duration::ZERO, Duration::ZERO),
            attempt_timeout: Duration::from_secs(5),
        },
    }
}

fn coordinator(
    config: PipelineConfig,
    analyzer: Arc<ScriptedAnalyzer>,
    transport: Arc<ScriptedTransport>,
    audit: Arc<MemoryAuditSink>,
) -> Coordinator {
    Coordinator::new(config, analyzer, transport, audit)
}

/// The verdict tracks the score/threshold comparison exactly; ties pass.
#[tokio::test]
async fn test_gate_policy_over_score_threshold_grid() {
    let code_set = vec![PathBuf::from("src")];
    for (score, threshold) in [
        (0.0, 0.0),
        (5.0, 5.0),
        (4.9, 5.0),
        (10.0, 10.0),
        (9.9, 10.0),
        (8.5, 8.0),
        (7.0, 8.0),
    ] {
        let analyzer = ScriptedAnalyzer::with_score(score);
        let report = QualityGate::evaluate(&analyzer, &code_set, threshold)
            .await
            .expect("evaluate failed");
        assert_eq!(
            report.passed,
            score >= threshold,
            "score {} vs threshold {}",
            score,
            threshold
        );
    }
}

/// A failing gate never reaches the network.
#[tokio::test]
async fn test_failed_gate_short_circuits() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(7.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport.clone(), audit.clone());

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Aborted);
    assert_eq!(result.outcome.attempt_count, 0);
    assert_eq!(transport.calls(), 0, "no network call on gate failure");
    assert!(result.outcome.reason.contains("below threshold"));

    // Both the report and the outcome must be audited.
    let records = audit.records();
    assert_eq!(records.len(), 2);
    assert!(matches!(records[0], AuditRecord::Report { .. }));
    assert!(matches!(records[1], AuditRecord::Outcome { .. }));
}

/// Persistent 5xx exhausts exactly the configured attempt budget.
#[tokio::test]
async fn test_persistent_5xx_exhausts_retries() {
    for max_attempts in [1u32, 2, 3, 5] {
        let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
        let transport = Arc::new(ScriptedTransport::with_statuses(&[503]));
        let audit = Arc::new(MemoryAuditSink::new());
        let pipeline = coordinator(
            test_config(max_attempts),
            analyzer,
            transport.clone(),
            audit,
        );

        let event = TriggerEvent::new("refs/heads/main", "alice");
        let result = pipeline
            .run(&event, &CancellationToken::new())
            .await
            .expect("pipeline failed");

        assert_eq!(result.outcome.final_status, FinalStatus::Failed);
        assert_eq!(result.outcome.attempt_count, max_attempts);
        assert_eq!(transport.calls(), max_attempts);
        assert_eq!(result.outcome.last_http_code, Some(503));
        assert!(result.outcome.reason.contains("retries exhausted"));
    }
}

/// A 4xx answer is permanent: one attempt, no retry.
#[tokio::test]
async fn test_4xx_is_not_retried() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[401]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(5), analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Failed);
    assert_eq!(result.outcome.attempt_count, 1);
    assert_eq!(transport.calls(), 1);
    assert_eq!(result.outcome.last_http_code, Some(401));
}

/// The first 2xx stops the retry loop.
#[tokio::test]
async fn test_success_stops_retrying() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[500, 200, 500]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(5), analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Success);
    assert_eq!(result.outcome.attempt_count, 2);
    assert_eq!(transport.calls(), 2, "no attempts after the first 2xx");
}

/// A missing credential fails before any network call.
#[tokio::test]
async fn test_missing_credential_is_auth_error() {
    let mut config = test_config(3);
    config.notify.secret = None;

    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(config, analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let err = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Auth(_)));
    assert_eq!(transport.calls(), 0, "auth failure must precede the wire");
}

/// A passing score deploys cleanly when the server answers 200 first try.
#[tokio::test]
async fn test_clean_deploy_scenario() {
    let mut config = test_config(3);
    config.gate.threshold = 8.0;

    let analyzer = Arc::new(ScriptedAnalyzer::with_score(8.5));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(config, analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    let report = result.report.expect("report missing");
    assert!(report.passed);
    assert_eq!(result.outcome.final_status, FinalStatus::Success);
    assert_eq!(result.outcome.attempt_count, 1);
    assert_eq!(result.outcome.last_http_code, Some(200));
}

/// Two 503s then a 200 succeed on the last attempt of a 3-attempt budget.
#[tokio::test]
async fn test_recovery_on_final_attempt() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[503, 503, 200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Success);
    assert_eq!(result.outcome.attempt_count, 3);
    assert_eq!(transport.calls(), 3);
}

/// Transport errors are transient and consume attempts like 5xx.
#[tokio::test]
async fn test_transport_errors_are_retried() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_results(vec![
        Err(TransportError::Timeout),
        Err(TransportError::Connection("connection refused".to_string())),
        Ok(WireResponse {
            status: 200,
            body: "return code 0".to_string(),
        }),
    ]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Success);
    assert_eq!(result.outcome.attempt_count, 3);
}

/// Pushes to other branches stop before the analyzer runs.
#[tokio::test]
async fn test_branch_filter_aborts_before_analysis() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(10.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(
        test_config(3),
        analyzer.clone(),
        transport.clone(),
        audit.clone(),
    );

    let event = TriggerEvent::new("refs/heads/feature/retry-budget", "alice");
    let result = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Aborted);
    assert!(result.report.is_none());
    assert_eq!(analyzer.calls(), 0);
    assert_eq!(transport.calls(), 0);
    assert!(result.outcome.reason.contains("not eligible"));
}

/// Empty source ref is rejected as an invalid event.
#[tokio::test]
async fn test_empty_source_ref_is_invalid() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(10.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport, audit);

    let event = TriggerEvent::new("  ", "alice");
    let err = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidEvent(_)));
}

/// Cancellation raised before the first attempt aborts without touching
/// the network.
#[tokio::test]
async fn test_cancel_before_first_attempt() {
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport.clone(), audit);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline.run(&event, &cancel).await.expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Aborted);
    assert_eq!(result.outcome.attempt_count, 0);
    assert_eq!(transport.calls(), 0);
}

/// Transport that reports 503 and cancels the run's token, so the retry
/// loop observes cancellation inside the backoff wait.
struct CancelOnSend {
    token: CancellationToken,
    calls: AtomicU32,
}

#[async_trait]
impl Transport for CancelOnSend {
    async fn send(&self, _request: &DeploymentRequest) -> Result<WireResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Ok(WireResponse {
            status: 503,
            body: String::new(),
        })
    }
}

/// Cancellation during backoff yields Aborted with the attempts made so far.
#[tokio::test]
async fn test_cancel_during_backoff() {
    let mut config = test_config(5);
    // A long backoff the select must never actually wait out.
    config.notify.backoff =
        BackoffPolicy::exponential(Duration::from_secs(60), Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let transport = Arc::new(CancelOnSend {
        token: cancel.clone(),
        calls: AtomicU32::new(0),
    });
    let analyzer = Arc::new(ScriptedAnalyzer::with_score(9.0));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = Coordinator::new(config, analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let result = pipeline.run(&event, &cancel).await.expect("pipeline failed");

    assert_eq!(result.outcome.final_status, FinalStatus::Aborted);
    assert_eq!(result.outcome.attempt_count, 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(result.outcome.reason.contains("cancelled"));
}

/// Analyzer faults surface as gate errors, not outcomes.
#[tokio::test]
async fn test_analyzer_fault_is_gate_error() {
    let analyzer = Arc::new(ScriptedAnalyzer::failing(
        shipgate_core::GateError::Analysis("pylint not found".to_string()),
    ));
    let transport = Arc::new(ScriptedTransport::with_statuses(&[200]));
    let audit = Arc::new(MemoryAuditSink::new());
    let pipeline = coordinator(test_config(3), analyzer, transport.clone(), audit);

    let event = TriggerEvent::new("refs/heads/main", "alice");
    let err = pipeline
        .run(&event, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Gate(_)));
    assert_eq!(transport.calls(), 0);
}
