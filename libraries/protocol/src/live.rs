//! Live update events pushed over the `live/` event stream.
//!
//! On the wire an event is only distinguished by which optional field is
//! set. Decoding resolves that into [`LiveEvent`], checking `workflow`,
//! `progress`, `heartbeat` and `error` in that order, then the `action`
//! enum of newer servers, then the `type` enum of older ones.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Progress, Workflow, WorkflowEntry};

/// Who an event is addressed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScope {
    #[serde(default, deserialize_with = "crate::ids::optional")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "crate::ids::optional")]
    pub workflow_id: Option<String>,
}

impl EventScope {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            workflow_id: None,
        }
    }

    pub fn for_workflow(workflow_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            workflow_id: Some(workflow_id.into()),
        }
    }
}

/// Action enum sent by servers that do not inline the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveAction {
    WorkflowUpdate,
    ProgressUpdate,
    #[serde(other)]
    Unknown,
}

/// A decoded live update.
///
/// Update variants carry `None` when the server only announced the change
/// and the client has to fetch the new state itself.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent {
    WorkflowUpdate {
        scope: EventScope,
        workflow: Option<Box<WorkflowEntry>>,
    },
    ProgressUpdate {
        scope: EventScope,
        progress: Option<Progress>,
    },
    Heartbeat {
        scope: EventScope,
    },
    Error {
        scope: EventScope,
        kind: Option<String>,
        message: String,
    },
}

impl LiveEvent {
    pub fn scope(&self) -> &EventScope {
        match self {
            LiveEvent::WorkflowUpdate { scope, .. }
            | LiveEvent::ProgressUpdate { scope, .. }
            | LiveEvent::Heartbeat { scope }
            | LiveEvent::Error { scope, .. } => scope,
        }
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.scope().workflow_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.scope().user_id.as_deref()
    }

    /// Decode one stream message: a JSON array of records, or a single record.
    ///
    /// Records of an unknown shape are skipped as long as at least one record
    /// in the message decodes; a message made only of them is rejected.
    pub fn decode_message(payload: &str) -> Result<Vec<LiveEvent>, LiveDecodeError> {
        let value: Value = serde_json::from_str(payload)?;
        let records = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            single @ Value::Object(_) => vec![single],
            other => return Err(LiveDecodeError::UnexpectedShape(other.to_string())),
        };

        let total = records.len();
        let mut events = Vec::with_capacity(total);
        for record in records {
            match serde_json::from_value::<LiveRecord>(record)?.into_event() {
                Ok(event) => events.push(event),
                Err(LiveDecodeError::Unrecognized) => {}
                Err(err) => return Err(err),
            }
        }
        if total > 0 && events.is_empty() {
            return Err(LiveDecodeError::Unrecognized);
        }
        Ok(events)
    }
}

#[derive(Debug, Error)]
pub enum LiveDecodeError {
    #[error("malformed live payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected live payload shape: {0}")]
    UnexpectedShape(String),
    #[error("live record carries no recognizable payload")]
    Unrecognized,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveRecord {
    #[serde(flatten)]
    scope: EventScope,
    workflow: Option<Value>,
    progress: Option<Value>,
    heartbeat: Option<Value>,
    error: Option<Value>,
    action: Option<LiveAction>,
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WorkflowPayload {
    Entry(WorkflowEntry),
    Bare(Workflow),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl ErrorPayload {
    /// Servers send either `{type, message}` or the bare message text.
    fn from_value(raw: Value) -> Self {
        match raw {
            Value::String(text) => Self {
                kind: None,
                message: Some(text),
            },
            other => serde_json::from_value(other).unwrap_or_default(),
        }
    }
}

impl LiveRecord {
    fn into_event(self) -> Result<LiveEvent, LiveDecodeError> {
        let LiveRecord {
            mut scope,
            workflow,
            progress,
            heartbeat,
            error,
            action,
            kind,
            message,
        } = self;

        if let Some(raw) = workflow {
            let entry = match serde_json::from_value::<WorkflowPayload>(raw)? {
                WorkflowPayload::Entry(entry) => entry,
                WorkflowPayload::Bare(workflow) => WorkflowEntry {
                    workflow,
                    progress: None,
                },
            };
            if scope.workflow_id.is_none() {
                scope.workflow_id = Some(entry.id().to_string());
            }
            return Ok(LiveEvent::WorkflowUpdate {
                scope,
                workflow: Some(Box::new(entry)),
            });
        }

        if let Some(raw) = progress {
            return Ok(LiveEvent::ProgressUpdate {
                scope,
                progress: Some(serde_json::from_value(raw)?),
            });
        }

        if heartbeat.is_some() {
            return Ok(LiveEvent::Heartbeat { scope });
        }

        if let Some(raw) = error {
            let payload = ErrorPayload::from_value(raw);
            return Ok(LiveEvent::Error {
                scope,
                kind: payload.kind,
                message: payload
                    .message
                    .or(message)
                    .unwrap_or_else(|| "live stream error".to_string()),
            });
        }

        if let Some(message) = message {
            return Ok(LiveEvent::Error {
                scope,
                kind,
                message,
            });
        }

        match action {
            Some(LiveAction::WorkflowUpdate) => {
                return Ok(LiveEvent::WorkflowUpdate {
                    scope,
                    workflow: None,
                });
            }
            Some(LiveAction::ProgressUpdate) => {
                return Ok(LiveEvent::ProgressUpdate {
                    scope,
                    progress: None,
                });
            }
            Some(LiveAction::Unknown) | None => {}
        }

        match kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("workflow") => Ok(LiveEvent::WorkflowUpdate {
                scope,
                workflow: None,
            }),
            // task changes only surface through the progress counters
            Some("task") => Ok(LiveEvent::ProgressUpdate {
                scope,
                progress: None,
            }),
            Some("heartbeat") => Ok(LiveEvent::Heartbeat { scope }),
            Some("error") => Ok(LiveEvent::Error {
                scope,
                kind,
                message: "live stream error".to_string(),
            }),
            _ => Err(LiveDecodeError::Unrecognized),
        }
    }
}
