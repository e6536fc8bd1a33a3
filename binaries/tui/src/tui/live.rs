//! Live update handling: the push connection state machine and the
//! dispatcher that turns decoded events into list mutations.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use tower_protocol::LiveEvent;
use tracing::{debug, warn};

use super::{format, workflow_list::WorkflowListState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "offline",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "live",
            ConnectionState::Errored => "disconnected",
        }
    }
}

/// What the stream reader thread reports back to the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveSignal {
    Opened,
    Message(Vec<LiveEvent>),
    Failed(String),
    Closed,
}

/// Handle the reader thread polls to learn that it was torn down.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A started connection the caller has to back with a reader thread.
#[derive(Clone, Debug)]
pub struct ConnectTicket {
    pub generation: u64,
    pub cancel: CancelToken,
}

#[derive(Debug)]
pub struct LiveConnection {
    state: ConnectionState,
    generation: u64,
    cancel: Option<CancelToken>,
    last_seen: Option<Instant>,
}

impl Default for LiveConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveConnection {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            cancel: None,
            last_seen: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Header text: the state, plus how long ago the stream last spoke
    /// once that reaches a second.
    pub fn status_label(&self, now: Instant) -> String {
        let label = self.state.label();
        match (self.state, self.last_seen) {
            (ConnectionState::Connected, Some(seen)) => {
                let quiet_ms = now.saturating_duration_since(seen).as_millis() as u64;
                if quiet_ms < 1000 {
                    label.to_string()
                } else {
                    format!("{label} ({})", format::duration_ms(quiet_ms))
                }
            }
            _ => label.to_string(),
        }
    }

    /// Start connecting. Only acts from `Disconnected`, so repeated calls
    /// never open a second stream.
    pub fn connect(&mut self) -> Option<ConnectTicket> {
        if self.state != ConnectionState::Disconnected {
            return None;
        }
        self.generation += 1;
        let cancel = CancelToken::default();
        self.cancel = Some(cancel.clone());
        self.state = ConnectionState::Connecting;
        debug!(target: "live", generation = self.generation, "connecting");
        Some(ConnectTicket {
            generation: self.generation,
            cancel,
        })
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation && self.cancel.is_some()
    }

    pub fn on_open(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.last_seen = Some(Instant::now());
        }
    }

    pub fn on_activity(&mut self) {
        self.last_seen = Some(Instant::now());
    }

    /// Returns true on the transition into `Errored`; the caller notifies
    /// the user once for it.
    pub fn on_error(&mut self, reason: &str) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                warn!(target: "live", generation = self.generation, "stream failed: {reason}");
                self.state = ConnectionState::Errored;
                if let Some(cancel) = self.cancel.take() {
                    cancel.cancel();
                }
                true
            }
            ConnectionState::Disconnected | ConnectionState::Errored => false,
        }
    }

    pub fn teardown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.state = ConnectionState::Disconnected;
        self.last_seen = None;
    }
}

/// Effect of one event that the dispatcher cannot perform itself.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveReaction {
    /// Out of scope, heartbeat or ignored.
    None,
    ListUpdated,
    ProgressUpdated(String),
    Refetch(String),
    RefetchProgress(String),
    Terminate(String),
}

/// Routes events for the list (by user) and the detail pane (by workflow).
#[derive(Debug, Default)]
pub struct LiveDispatcher {
    user_id: Option<String>,
    watched_workflow: Option<String>,
    terminated: bool,
}

impl LiveDispatcher {
    pub fn new(user_id: Option<String>) -> Self {
        Self {
            user_id,
            watched_workflow: None,
            terminated: false,
        }
    }

    pub fn set_user(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    pub fn watch_workflow(&mut self, workflow_id: Option<String>) {
        self.watched_workflow = workflow_id;
    }

    pub fn watched_workflow(&self) -> Option<&str> {
        self.watched_workflow.as_deref()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn accepts(&self, event: &LiveEvent) -> bool {
        let for_user = match (&self.user_id, event.user_id()) {
            (Some(expected), Some(actual)) => expected == actual,
            (None, _) => true,
            (Some(_), None) => false,
        };
        let for_watched = matches!(
            (&self.watched_workflow, event.workflow_id()),
            (Some(expected), Some(actual)) if expected == actual
        );
        for_user || for_watched
    }

    pub fn dispatch(&mut self, event: LiveEvent, list: &mut WorkflowListState) -> LiveReaction {
        if self.terminated || !self.accepts(&event) {
            return LiveReaction::None;
        }

        match event {
            LiveEvent::WorkflowUpdate {
                workflow: Some(entry),
                ..
            } => {
                list.upsert(*entry);
                LiveReaction::ListUpdated
            }
            LiveEvent::WorkflowUpdate {
                scope,
                workflow: None,
            } => match scope.workflow_id {
                Some(workflow_id) => LiveReaction::Refetch(workflow_id),
                None => LiveReaction::None,
            },
            LiveEvent::ProgressUpdate {
                scope,
                progress: Some(progress),
            } => match scope.workflow_id {
                Some(workflow_id) if list.update_progress(&workflow_id, progress) => {
                    LiveReaction::ProgressUpdated(workflow_id)
                }
                _ => LiveReaction::None,
            },
            LiveEvent::ProgressUpdate {
                scope,
                progress: None,
            } => match scope.workflow_id {
                Some(workflow_id) if list.cached(&workflow_id).is_some() => {
                    LiveReaction::RefetchProgress(workflow_id)
                }
                _ => LiveReaction::None,
            },
            LiveEvent::Heartbeat { .. } => LiveReaction::None,
            LiveEvent::Error { message, kind, .. } => {
                warn!(target: "live", kind = kind.as_deref().unwrap_or("-"), "server error event: {message}");
                self.terminated = true;
                LiveReaction::Terminate(message)
            }
        }
    }
}
