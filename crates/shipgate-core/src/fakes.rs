//! In-memory fakes for the pipeline's trait seams (testing only)
//!
//! Provides `ScriptedAnalyzer`, `ScriptedTransport` and `MemoryAuditSink`
//! that satisfy the trait contracts without an analyzer binary or a
//! network.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::error::GateError;
use crate::event::TriggerEvent;
use crate::gate::{AnalysisReport, Analyzer, QualityReport};
use crate::notify::{DeploymentOutcome, DeploymentRequest, Transport, TransportError, WireResponse};

// ---------------------------------------------------------------------------
// ScriptedAnalyzer
// ---------------------------------------------------------------------------

/// Analyzer fake returning a fixed report (or error) on every call.
pub struct ScriptedAnalyzer {
    result: Result<AnalysisReport, GateError>,
    calls: AtomicU32,
}

impl ScriptedAnalyzer {
    /// Always report the given score with no violations.
    pub fn with_score(score: f64) -> Self {
        Self::with_report(AnalysisReport {
            score,
            violations: Vec::new(),
        })
    }

    /// Always return the given report.
    pub fn with_report(report: AnalysisReport) -> Self {
        Self {
            result: Ok(report),
            calls: AtomicU32::new(0),
        }
    }

    /// Always fail with the given error.
    pub fn failing(error: GateError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `analyze` calls made.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, _code_set: &[PathBuf]) -> Result<AnalysisReport, GateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

/// Transport fake that replays a queue of wire results and counts calls.
///
/// When the queue runs dry the last scripted result is repeated, so
/// "always 503" scenarios only need one entry.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<WireResponse, TransportError>>>,
    last: Mutex<Option<Result<WireResponse, TransportError>>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    /// Script a sequence of HTTP status codes (empty bodies).
    pub fn with_statuses(statuses: &[u16]) -> Self {
        Self::with_results(
            statuses
                .iter()
                .map(|&status| {
                    Ok(WireResponse {
                        status,
                        body: String::new(),
                    })
                })
                .collect(),
        )
    }

    /// Script an explicit sequence of wire results.
    pub fn with_results(results: Vec<Result<WireResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of `send` calls made.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: &DeploymentRequest) -> Result<WireResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(result) = script.pop_front() {
            *last = Some(result.clone());
            result
        } else {
            last.clone().unwrap_or(Err(TransportError::Connection(
                "scripted transport has no results".to_string(),
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditSink
// ---------------------------------------------------------------------------

/// A single audited fact.
#[derive(Debug, Clone)]
pub enum AuditRecord {
    Report {
        run_id: Uuid,
        event: TriggerEvent,
        report: QualityReport,
    },
    Outcome {
        run_id: Uuid,
        outcome: DeploymentOutcome,
    },
}

/// Audit sink that appends records to a mutex-guarded log.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_report(&self, run_id: Uuid, event: &TriggerEvent, report: &QualityReport) {
        self.records.lock().unwrap().push(AuditRecord::Report {
            run_id,
            event: event.clone(),
            report: report.clone(),
        });
    }

    async fn record_outcome(&self, run_id: Uuid, outcome: &DeploymentOutcome) {
        self.records.lock().unwrap().push(AuditRecord::Outcome {
            run_id,
            outcome: outcome.clone(),
        });
    }
}
