//! Pipeline orchestration: lint gate, then deploy notification.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::cancel::CancellationToken;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::event::TriggerEvent;
use crate::gate::{Analyzer, QualityGate, QualityReport};
use crate::notify::{DeploymentOutcome, DeploymentRequest, Notifier, Transport};

/// Result of a complete pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Per-run identifier, also tagged on every audit record.
    pub run_id: Uuid,

    /// Gate verdict; `None` when the branch filter stopped the run before
    /// the analyzer was invoked.
    pub report: Option<QualityReport>,

    /// The notifier's outcome, unchanged, or a synthetic `Aborted`
    /// outcome when the notifier was never reached.
    pub outcome: DeploymentOutcome,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Sequences the quality gate and the deployment notifier for one
/// trigger event.
///
/// Deployment never proceeds on a failing quality score: a failed gate
/// short-circuits to an `Aborted` outcome without touching the network.
pub struct Coordinator {
    config: PipelineConfig,
    analyzer: Arc<dyn Analyzer>,
    notifier: Notifier,
    audit: Arc<dyn AuditSink>,
}

impl Coordinator {
    pub fn new(
        config: PipelineConfig,
        analyzer: Arc<dyn Analyzer>,
        transport: Arc<dyn Transport>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let notifier = Notifier::new(
            transport,
            config.notify.max_attempts,
            config.notify.backoff.clone(),
        );
        Self {
            config,
            analyzer,
            notifier,
            audit,
        }
    }

    /// Run the pipeline for one trigger event.
    ///
    /// Terminates with an outcome in every case the gate and notifier can
    /// express; only event validation, configuration and analyzer faults
    /// surface as errors.
    pub async fn run(
        &self,
        event: &TriggerEvent,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        if event.source_ref.trim().is_empty() {
            return Err(PipelineError::InvalidEvent(
                "source_ref is empty".to_string(),
            ));
        }

        info!(
            run_id = %run_id,
            source_ref = %event.source_ref,
            actor = %event.actor,
            "pipeline triggered"
        );

        if event.branch() != self.config.branch {
            let outcome = DeploymentOutcome::aborted(format!(
                "branch '{}' is not eligible for deployment (expected '{}')",
                event.branch(),
                self.config.branch
            ));
            self.audit.record_outcome(run_id, &outcome).await;
            return Ok(PipelineOutcome {
                run_id,
                report: None,
                outcome,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let report = QualityGate::evaluate(
            self.analyzer.as_ref(),
            &self.config.gate.code_set,
            self.config.gate.threshold,
        )
        .await?;
        self.audit.record_report(run_id, event, &report).await;

        if !report.passed {
            let outcome = DeploymentOutcome::aborted(format!(
                "quality score {:.2} below threshold {:.2}",
                report.score, report.threshold
            ));
            self.audit.record_outcome(run_id, &outcome).await;
            return Ok(PipelineOutcome {
                run_id,
                report: Some(report),
                outcome,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let request = DeploymentRequest::build(
            self.config.notify.endpoint.clone(),
            self.config.notify.secret.as_deref(),
        )?;

        let outcome = self.notifier.notify(&request, cancel).await;
        self.audit.record_outcome(run_id, &outcome).await;

        info!(
            run_id = %run_id,
            status = %outcome.final_status,
            attempts = outcome.attempt_count,
            "pipeline finished"
        );

        Ok(PipelineOutcome {
            run_id,
            report: Some(report),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
