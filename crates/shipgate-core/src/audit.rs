//! Audit sink for pipeline runs.
//!
//! The coordinator records every quality report and deployment outcome
//! through this seam. One sink instance may be shared by concurrent
//! pipeline runs, so implementations take `&self` and serialize
//! internally.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::event::TriggerEvent;
use crate::gate::QualityReport;
use crate::notify::DeploymentOutcome;

/// Observability seam for pipeline runs.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record the gate verdict for a run.
    async fn record_report(&self, run_id: Uuid, event: &TriggerEvent, report: &QualityReport);

    /// Record the terminal outcome for a run.
    async fn record_outcome(&self, run_id: Uuid, outcome: &DeploymentOutcome);
}

/// Production sink: structured tracing events.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_report(&self, run_id: Uuid, event: &TriggerEvent, report: &QualityReport) {
        info!(
            event = "gate.evaluated",
            run_id = %run_id,
            source_ref = %event.source_ref,
            actor = %event.actor,
            score = report.score,
            threshold = report.threshold,
            passed = report.passed,
            violations = report.violations.len(),
        );
    }

    async fn record_outcome(&self, run_id: Uuid, outcome: &DeploymentOutcome) {
        info!(
            event = "pipeline.finished",
            run_id = %run_id,
            status = %outcome.final_status,
            attempts = outcome.attempt_count,
            http_code = outcome.last_http_code,
            reason = %outcome.reason,
        );
    }
}
