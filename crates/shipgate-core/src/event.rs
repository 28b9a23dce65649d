//! Trigger events that start a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The event that triggers a pipeline run.
///
/// Immutable; consumed once by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Full source ref, e.g. `refs/heads/main`.
    pub source_ref: String,

    /// When the event was received.
    pub timestamp: DateTime<Utc>,

    /// Identity of whoever pushed (or "manual" for hand-triggered runs).
    pub actor: String,

    /// Head commit sha, when the event came from a push payload.
    pub head_sha: Option<String>,
}

/// Minimal push-payload shape accepted by [`TriggerEvent::from_push`].
///
/// Only the fields the pipeline consumes are declared; everything else in
/// the payload is ignored.
#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref")]
    source_ref: String,
    after: Option<String>,
    pusher: Option<Pusher>,
}

#[derive(Debug, Deserialize)]
struct Pusher {
    name: String,
}

impl TriggerEvent {
    /// Create an event from explicit values, stamped with the current time.
    pub fn new(source_ref: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            timestamp: Utc::now(),
            actor: actor.into(),
            head_sha: None,
        }
    }

    /// Parse a push-event payload into a trigger event.
    pub fn from_push(payload: &str) -> Result<Self, serde_json::Error> {
        let push: PushPayload = serde_json::from_str(payload)?;
        Ok(Self {
            source_ref: push.source_ref,
            timestamp: Utc::now(),
            actor: push
                .pusher
                .map(|p| p.name)
                .unwrap_or_else(|| "unknown".to_string()),
            head_sha: push.after,
        })
    }

    /// Branch name with any `refs/heads/` prefix stripped.
    pub fn branch(&self) -> &str {
        self.source_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.source_ref)
    }
}
