//! shipgate core - lint-gated deployment triggering
//!
//! Provides a pipeline coordinator that:
//! - Runs an external static analyzer and gates on a minimum score
//! - Notifies a remote deployment endpoint with bounded retry/backoff
//! - Records every verdict and outcome through an audit seam

pub mod audit;
pub mod backoff;
pub mod cancel;
pub mod config;
pub mod error;
pub mod event;
pub mod fakes;
pub mod gate;
pub mod notify;
pub mod pipeline;
pub mod telemetry;

// Re-export key types
pub use audit::{AuditSink, TracingAuditSink};
pub use backoff::BackoffPolicy;
pub use cancel::CancellationToken;
pub use config::{GateConfig, NotifyConfig, PipelineConfig};
pub use error::{GateError, NotifyError, PipelineError, Result};
pub use event::TriggerEvent;
pub use gate::{AnalysisReport, Analyzer, ProcessAnalyzer, QualityGate, QualityReport, Violation};
pub use notify::{
    DeploymentOutcome, DeploymentRequest, FinalStatus, HttpTransport, Notifier, Transport,
    TransportError, WireResponse,
};
pub use pipeline::{Coordinator, PipelineOutcome};
