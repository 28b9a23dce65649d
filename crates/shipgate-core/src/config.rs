//! Pipeline configuration.
//!
//! Everything the coordinator needs is supplied externally: endpoint,
//! credential, threshold, branch filter, analyzer command, retry budget.
//! Values come from `SHIPGATE_*` environment variables with sensible
//! defaults; callers (the CLI) may override individual fields afterwards.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::backoff::BackoffPolicy;
use crate::error::PipelineError;

/// Quality gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Analyzer command; first element is the executable, code-set paths
    /// are appended at invocation time.
    pub analyzer_command: Vec<String>,

    /// Per-invocation analyzer timeout.
    pub analyzer_timeout: Duration,

    /// Minimum acceptable score in [0, 10]. Ties pass.
    pub threshold: f64,

    /// Paths handed to the analyzer.
    pub code_set: Vec<PathBuf>,
}

impl GateConfig {
    /// Load from `SHIPGATE_ANALYZER`, `SHIPGATE_ANALYZER_TIMEOUT_SECS`,
    /// `SHIPGATE_THRESHOLD` and `SHIPGATE_PATHS` (comma-separated).
    pub fn from_env() -> Result<Self, PipelineError> {
        let analyzer = require_env("SHIPGATE_ANALYZER")?;
        let analyzer_command: Vec<String> =
            analyzer.split_whitespace().map(str::to_string).collect();
        if analyzer_command.is_empty() {
            return Err(PipelineError::Config(
                "SHIPGATE_ANALYZER must name a command".to_string(),
            ));
        }

        let code_set = std::env::var("SHIPGATE_PATHS")
            .unwrap_or_else(|_| ".".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
            .collect();

        Ok(Self {
            analyzer_command,
            analyzer_timeout: Duration::from_secs(parse_env("SHIPGATE_ANALYZER_TIMEOUT_SECS", 300u64)?),
            threshold: parse_env("SHIPGATE_THRESHOLD", 8.0f64)?,
            code_set,
        })
    }
}

/// Deployment notifier configuration.
#[derive(Clone)]
pub struct NotifyConfig {
    /// Control-plane endpoint the PATCH is sent to.
    pub endpoint: Url,

    /// Shared admin secret; absence is reported by the notifier as an
    /// auth error, not here, so gate-only invocations work without it.
    pub secret: Option<String>,

    /// Total attempt budget, including the first attempt.
    pub max_attempts: u32,

    /// Retry backoff schedule.
    pub backoff: BackoffPolicy,

    /// Per-attempt HTTP timeout, distinct from the retry budget.
    pub attempt_timeout: Duration,
}

impl NotifyConfig {
    /// Load from `SHIPGATE_ENDPOINT`, `SHIPGATE_ADMIN_KEY`,
    /// `SHIPGATE_MAX_ATTEMPTS`, `SHIPGATE_BACKOFF_BASE_MS`,
    /// `SHIPGATE_BACKOFF_CAP_MS` and `SHIPGATE_HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_env_or(None)
    }

    /// Same as [`from_env`](Self::from_env), but an explicit endpoint takes
    /// precedence over `SHIPGATE_ENDPOINT`.
    pub fn from_env_or(endpoint: Option<Url>) -> Result<Self, PipelineError> {
        let endpoint = match endpoint {
            Some(url) => url,
            None => {
                let raw = require_env("SHIPGATE_ENDPOINT")?;
                Url::parse(&raw).map_err(|e| {
                    PipelineError::Config(format!("SHIPGATE_ENDPOINT is not a valid URL: {}", e))
                })?
            }
        };

        Ok(Self {
            endpoint,
            secret: std::env::var("SHIPGATE_ADMIN_KEY").ok(),
            max_attempts: parse_env("SHIPGATE_MAX_ATTEMPTS", 3u32)?,
            backoff: BackoffPolicy::exponential(
                Duration::from_millis(parse_env("SHIPGATE_BACKOFF_BASE_MS", 500u64)?),
                Duration::from_millis(parse_env("SHIPGATE_BACKOFF_CAP_MS", 8_000u64)?),
            ),
            attempt_timeout: Duration::from_secs(parse_env("SHIPGATE_HTTP_TIMEOUT_SECS", 10u64)?),
        })
    }

    /// Set the admin secret.
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = Some(secret.to_string());
        self
    }
}

// The secret stays out of logs and debug dumps.
impl std::fmt::Debug for NotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Only pushes to this branch trigger a deployment.
    pub branch: String,

    pub gate: GateConfig,
    pub notify: NotifyConfig,
}

impl PipelineConfig {
    /// Load the whole pipeline configuration from the environment.
    /// Branch filter comes from `SHIPGATE_BRANCH` (default `main`).
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_env_or(None)
    }

    /// Same as [`from_env`](Self::from_env), but an explicit endpoint takes
    /// precedence over `SHIPGATE_ENDPOINT`.
    pub fn from_env_or(endpoint: Option<Url>) -> Result<Self, PipelineError> {
        Ok(Self {
            branch: std::env::var("SHIPGATE_BRANCH").unwrap_or_else(|_| "main".to_string()),
            gate: GateConfig::from_env()?,
            notify: NotifyConfig::from_env_or(endpoint)?,
        })
    }
}

fn require_env(key: &str) -> Result<String, PipelineError> {
    std::env::var(key).map_err(|_| PipelineError::Config(format!("{} is not set", key)))
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, PipelineError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| PipelineError::Config(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}
