//! Deployment notification: one authenticated control-plane call with
//! bounded retry.
//!
//! The notifier walks a `Pending -> Attempting -> {Success | Failed |
//! Aborted}` state machine:
//! - 2xx stops immediately with `Success`
//! - transport errors and 5xx are transient and retried per the backoff
//!   policy, up to `max_attempts`
//! - any other status is permanent and stops with `Failed`
//! - cancellation before a successful attempt stops with `Aborted`
//!
//! Terminal states are final; a finished outcome is never revisited.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::cancel::CancellationToken;
use crate::error::NotifyError;

/// Header carrying the deployment credential.
pub const ADMIN_KEY_HEADER: &str = "X-Admin-Key";

/// The single HTTP method the control plane accepts.
pub const DEPLOY_METHOD: &str = "PATCH";

/// Terminal status of a notification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    Success,
    Failed,
    Aborted,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalStatus::Success => write!(f, "success"),
            FinalStatus::Failed => write!(f, "failed"),
            FinalStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// A fully-built control-plane request. Single use.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    /// Endpoint the PATCH is sent to.
    pub endpoint: Url,

    /// Headers, unique by key.
    pub headers: BTreeMap<String, String>,

    /// Request body; empty by default (the endpoint requires none).
    pub payload: Vec<u8>,
}

impl DeploymentRequest {
    /// Build the request from the endpoint and credential.
    ///
    /// Fails with [`NotifyError::Auth`] when the credential is absent,
    /// empty, or not representable as an HTTP header value. No network
    /// call is made here or after such a failure.
    pub fn build(endpoint: Url, secret: Option<&str>) -> Result<Self, NotifyError> {
        let secret =
            secret.ok_or_else(|| NotifyError::Auth("credential is not set".to_string()))?;
        if secret.is_empty() {
            return Err(NotifyError::Auth("credential is empty".to_string()));
        }
        if !secret.chars().all(|c| c.is_ascii_graphic()) {
            return Err(NotifyError::Auth(
                "credential contains characters not allowed in a header value".to_string(),
            ));
        }

        let mut headers = BTreeMap::new();
        headers.insert(ADMIN_KEY_HEADER.to_string(), secret.to_string());

        Ok(Self {
            endpoint,
            headers,
            payload: Vec::new(),
        })
    }

    /// Attach an opaque payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }
}

/// Outcome of a notification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    /// Network attempts made. At least 1 whenever any attempt was started;
    /// 0 only for outcomes that never reached the wire (gate abort, branch
    /// filter, cancellation before the first attempt).
    pub attempt_count: u32,

    /// Terminal status.
    pub final_status: FinalStatus,

    /// Status code of the last response, if any response arrived.
    pub last_http_code: Option<u16>,

    /// Human-readable termination reason.
    pub reason: String,
}

impl DeploymentOutcome {
    /// An outcome for a run that never reached the notifier.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self {
            attempt_count: 0,
            final_status: FinalStatus::Aborted,
            last_http_code: None,
            reason: reason.into(),
        }
    }

    /// Whether the deployment was acknowledged.
    pub fn is_success(&self) -> bool {
        self.final_status == FinalStatus::Success
    }
}

/// Response observed on the wire.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,

    /// Response body, logged for audit; never affects the outcome.
    pub body: String,
}

/// Transport-level failure. Always transient: the retry loop decides how
/// many of these to tolerate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),
}

/// Wire seam for the control-plane call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &DeploymentRequest) -> Result<WireResponse, TransportError>;
}

/// Production transport over reqwest with a per-attempt timeout.
///
/// Redirects are not followed: a redirected control call would replay the
/// credential against an address nobody vetted.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(attempt_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("shipgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &DeploymentRequest) -> Result<WireResponse, TransportError> {
        let mut builder = self.client.patch(request.endpoint.clone());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if !request.payload.is_empty() {
            builder = builder.body(request.payload.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        Ok(WireResponse { status, body })
    }
}

/// Issues the control-plane call with bounded retry.
pub struct Notifier {
    transport: Arc<dyn Transport>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl Notifier {
    /// Create a notifier. `max_attempts` is clamped to at least 1.
    pub fn new(transport: Arc<dyn Transport>, max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Send the request, retrying transient failures, and return the
    /// terminal outcome. Never returns an error: every failure mode is
    /// folded into the [`DeploymentOutcome`].
    pub async fn notify(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> DeploymentOutcome {
        let mut last_code: Option<u16> = None;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return DeploymentOutcome {
                    attempt_count: attempt - 1,
                    final_status: FinalStatus::Aborted,
                    last_http_code: last_code,
                    reason: "cancelled before deployment completed".to_string(),
                };
            }

            debug!(attempt, max_attempts = self.max_attempts, endpoint = %request.endpoint, "sending deployment notification");

            match self.transport.send(request).await {
                Ok(reply) if (200..300).contains(&reply.status) => {
                    info!(attempt, status = reply.status, body = %reply.body.trim(), "deployment acknowledged");
                    return DeploymentOutcome {
                        attempt_count: attempt,
                        final_status: FinalStatus::Success,
                        last_http_code: Some(reply.status),
                        reason: format!("deployment acknowledged with HTTP {}", reply.status),
                    };
                }
                Ok(reply) if (500..600).contains(&reply.status) => {
                    warn!(attempt, status = reply.status, "deployment endpoint unavailable");
                    last_code = Some(reply.status);
                }
                Ok(reply) => {
                    // 4xx and anything else that is neither success nor a
                    // server fault: retrying cannot change the answer.
                    warn!(attempt, status = reply.status, body = %reply.body.trim(), "deployment rejected");
                    return DeploymentOutcome {
                        attempt_count: attempt,
                        final_status: FinalStatus::Failed,
                        last_http_code: Some(reply.status),
                        reason: format!("deployment rejected with HTTP {}", reply.status),
                    };
                }
                Err(e) => {
                    warn!(attempt, error = %e, "deployment notification failed in transit");
                }
            }

            if attempt < self.max_attempts {
                let delay = self.backoff.delay_for(attempt);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return DeploymentOutcome {
                            attempt_count: attempt,
                            final_status: FinalStatus::Aborted,
                            last_http_code: last_code,
                            reason: "cancelled during retry backoff".to_string(),
                        };
                    }
                }
            }
        }

        DeploymentOutcome {
            attempt_count: self.max_attempts,
            final_status: FinalStatus::Failed,
            last_http_code: last_code,
            reason: format!("retries exhausted after {} attempts", self.max_attempts),
        }
    }
}
