//! Quality gate evaluation against a minimum-score threshold.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::GateError;

/// Upper bound of the analyzer score scale.
pub const SCORE_MAX: f64 = 10.0;

/// A single rule violation reported by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    /// File the violation was found in.
    pub file: String,

    /// 1-based line number.
    pub line: u32,

    /// Analyzer rule identifier, e.g. `missing-docstring`.
    pub rule: String,

    /// Human-readable message.
    pub message: String,
}

/// Raw analyzer output: a score on the [0, 10] scale plus violations,
/// ordered as the analyzer emitted them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub score: f64,

    #[serde(default)]
    pub violations: Vec<Violation>,
}

/// Gate verdict for one analyzer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score the analyzer produced.
    pub score: f64,

    /// Threshold the score was held against.
    pub threshold: f64,

    /// Whether the gate passed. Ties count as pass.
    pub passed: bool,

    /// Violations that contributed to the score (may be non-empty on pass).
    pub violations: Vec<Violation>,
}

/// External static-analysis collaborator.
///
/// Implementations run the analyzer over a code set and return its raw
/// report; the gate policy itself lives in [`QualityGate`].
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, code_set: &[PathBuf]) -> Result<AnalysisReport, GateError>;
}

/// Quality gate rules.
pub struct QualityGate;

impl QualityGate {
    /// Run the analyzer over `code_set` and apply the threshold policy.
    ///
    /// Gate rule: `passed = score >= threshold`. The code set must be
    /// non-empty and the threshold must lie in [0, 10].
    pub async fn evaluate(
        analyzer: &dyn Analyzer,
        code_set: &[PathBuf],
        threshold: f64,
    ) -> Result<QualityReport, GateError> {
        if code_set.is_empty() {
            return Err(GateError::EmptyCodeSet);
        }
        if !(0.0..=SCORE_MAX).contains(&threshold) {
            return Err(GateError::InvalidThreshold(threshold));
        }

        let report = analyzer.analyze(code_set).await?;
        let passed = report.score >= threshold;

        Ok(QualityReport {
            score: report.score,
            threshold,
            passed,
            violations: report.violations,
        })
    }
}

/// Analyzer that shells out to an external lint command.
///
/// The configured command is invoked with the code-set paths appended as
/// trailing arguments and must print an [`AnalysisReport`] as JSON on
/// stdout. The process exit code is ignored: linters conventionally exit
/// non-zero whenever they found anything, so the report is authoritative.
pub struct ProcessAnalyzer {
    command: Vec<String>,
    timeout: Duration,
}

impl ProcessAnalyzer {
    /// Create an analyzer from a command vector (first element is the
    /// executable) and a per-invocation timeout.
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl Analyzer for ProcessAnalyzer {
    async fn analyze(&self, code_set: &[PathBuf]) -> Result<AnalysisReport, GateError> {
        if self.command.is_empty() {
            return Err(GateError::Analysis("analyzer command is empty".to_string()));
        }

        let exe = &self.command[0];
        let args = &self.command[1..];

        let child = Command::new(exe)
            .args(args)
            .args(code_set)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GateError::Analysis(format!("failed to spawn '{}': {}", exe, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                GateError::Analysis(format!(
                    "analyzer timed out after {} seconds",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| GateError::Analysis(format!("failed to collect analyzer output: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            exit_code = output.status.code().unwrap_or(-1),
            bytes = stdout.len(),
            "analyzer finished"
        );

        serde_json::from_str(&stdout).map_err(|e| {
            GateError::Analysis(format!("analyzer output is not a valid report: {}", e))
        })
    }
}
