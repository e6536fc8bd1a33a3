//! Runs blocking service calls off the UI thread.
//!
//! Every request gets its own thread and reports back through the
//! `StateUpdate` channel the UI loop drains on each tick.

use std::{
    sync::{Arc, mpsc::Sender},
    thread,
};

use tower_interface::{AccountService, LiveFeed, NotesService, WorkflowClient};
use tower_protocol::TasksQuery;
use tracing::{debug, warn};

#[cfg(feature = "protocol")]
use tower_protocol_client::{ProtocolClientError, ProtocolClients};

#[cfg(feature = "protocol")]
use crate::config::TowerConfig;

use super::{
    command_executor::{AccountSnapshot, CommandOutcome, StateUpdate},
    live::{ConnectTicket, LiveSignal},
    workflow_list::FetchRequest,
};

#[derive(Clone)]
pub struct ServiceBundle {
    pub workflow_client: Arc<dyn WorkflowClient>,
    pub notes_service: Arc<dyn NotesService>,
    pub account_service: Arc<dyn AccountService>,
    pub live_feed: Arc<dyn LiveFeed>,
}

#[cfg(feature = "protocol")]
pub fn protocol_service_bundle(config: &TowerConfig) -> Result<ServiceBundle, ProtocolClientError> {
    let clients = ProtocolClients::new(&config.api_url, config.access_token.as_deref())?
        .with_live_path(config.live_path.clone());
    debug!(target: "tui", base_url = %clients.base_url(), "protocol clients ready");

    Ok(ServiceBundle {
        workflow_client: clients.workflow_client(),
        notes_service: clients.notes_service(),
        account_service: clients.account_service(),
        live_feed: clients.live_feed(),
    })
}

/// Work the UI asks for that needs a service round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCommand {
    TagAdd { workflow_id: String, text: String },
    TagRemove { tag_id: u64 },
    Comment { workflow_id: String, text: String },
    CommentEdit { workflow_id: String, comment_id: u64, text: String },
    CommentRemove { workflow_id: String, comment_id: u64 },
    TokenCreate { name: String },
    TokenRemove { token_id: u64 },
    TeamCreate { name: String },
    TeamRemove { team_id: u64 },
}

#[derive(Clone)]
pub struct RequestRunner {
    services: ServiceBundle,
    updates: Sender<StateUpdate>,
}

impl RequestRunner {
    pub fn new(services: ServiceBundle, updates: Sender<StateUpdate>) -> Self {
        Self { services, updates }
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(&ServiceBundle) -> StateUpdate + Send + 'static,
    {
        let services = self.services.clone();
        let updates = self.updates.clone();
        thread::spawn(move || {
            let update = job(&services);
            if updates.send(update).is_err() {
                debug!(target: "tui", "UI loop gone, dropping request result");
            }
        });
    }

    pub fn resolve_user(&self) {
        self.spawn(|services| StateUpdate::UserResolved(services.account_service.current_user()));
    }

    pub fn fetch_workflows(&self, request: FetchRequest) {
        debug!(target: "tui", ticket = ?request.ticket, kind = ?request.kind, "fetching workflows");
        self.spawn(move |services| StateUpdate::WorkflowsFetched {
            ticket: request.ticket,
            result: services.workflow_client.list_workflows(&request.params),
        });
    }

    pub fn fetch_workflow(&self, workflow_id: String) {
        self.spawn(move |services| {
            let result = services.workflow_client.get_workflow(&workflow_id);
            StateUpdate::WorkflowFetched {
                workflow_id,
                result,
            }
        });
    }

    pub fn fetch_progress(&self, workflow_id: String) {
        self.spawn(move |services| {
            let result = services.workflow_client.get_progress(&workflow_id);
            StateUpdate::ProgressFetched {
                workflow_id,
                result,
            }
        });
    }

    /// Tags, comments and metrics of the workflow opened in the detail pane.
    pub fn fetch_detail(&self, workflow_id: String) {
        self.spawn(move |services| {
            let tags = services.notes_service.list_tags(&workflow_id);
            let comments = services.notes_service.list_comments(&workflow_id);
            let metrics = services
                .workflow_client
                .list_metrics(&workflow_id)
                .inspect_err(|err| debug!(target: "tui", %workflow_id, "no metrics: {err}"))
                .unwrap_or_default();
            StateUpdate::DetailFetched {
                workflow_id,
                tags,
                comments,
                metrics,
            }
        });
    }

    pub fn fetch_tasks(&self, workflow_id: String, query: TasksQuery) {
        self.spawn(move |services| {
            let result = services.workflow_client.list_tasks(&workflow_id, &query);
            StateUpdate::TasksFetched {
                workflow_id,
                start: query.start,
                result,
            }
        });
    }

    pub fn fetch_account(&self) {
        self.spawn(|services| {
            let account = &services.account_service;
            let result = account.list_teams().and_then(|teams| {
                let tokens = account.list_tokens()?;
                // a missing service info never fails the account fetch
                let service_info = account
                    .service_info()
                    .inspect_err(|err| warn!(target: "tui", "service info unavailable: {err}"))
                    .ok();
                Ok(AccountSnapshot {
                    teams,
                    tokens,
                    service_info,
                })
            });
            StateUpdate::AccountFetched(result)
        });
    }

    pub fn delete_workflow(&self, workflow_id: String) {
        self.spawn(move |services| {
            let result = services.workflow_client.delete_workflow(&workflow_id);
            StateUpdate::WorkflowDeleted {
                workflow_id,
                result,
            }
        });
    }

    pub fn execute(&self, command: ServiceCommand) {
        self.spawn(move |services| {
            let outcome = match command {
                ServiceCommand::TagAdd { workflow_id, text } => services
                    .notes_service
                    .create_tag(&workflow_id, &text)
                    .map(|tag| CommandOutcome::TagAdded { workflow_id, tag }),
                ServiceCommand::TagRemove { tag_id } => services
                    .notes_service
                    .delete_tag(tag_id)
                    .map(|()| CommandOutcome::TagRemoved { tag_id }),
                ServiceCommand::Comment { workflow_id, text } => services
                    .notes_service
                    .add_comment(&workflow_id, &text)
                    .map(|comment| CommandOutcome::CommentAdded {
                        workflow_id,
                        comment,
                    }),
                ServiceCommand::CommentEdit {
                    workflow_id,
                    comment_id,
                    text,
                } => services
                    .notes_service
                    .update_comment(&workflow_id, comment_id, &text)
                    .map(|()| CommandOutcome::CommentUpdated {
                        workflow_id,
                        comment_id,
                        text,
                    }),
                ServiceCommand::CommentRemove {
                    workflow_id,
                    comment_id,
                } => services
                    .notes_service
                    .delete_comment(&workflow_id, comment_id)
                    .map(|()| CommandOutcome::CommentRemoved {
                        workflow_id,
                        comment_id,
                    }),
                ServiceCommand::TokenCreate { name } => services
                    .account_service
                    .create_token(&name)
                    .map(CommandOutcome::TokenCreated),
                ServiceCommand::TokenRemove { token_id } => services
                    .account_service
                    .delete_token(token_id)
                    .map(|()| CommandOutcome::TokenRemoved(token_id)),
                ServiceCommand::TeamCreate { name } => services
                    .account_service
                    .create_team(&name)
                    .map(CommandOutcome::TeamCreated),
                ServiceCommand::TeamRemove { team_id } => services
                    .account_service
                    .delete_team(team_id)
                    .map(|()| CommandOutcome::TeamRemoved(team_id)),
            };
            StateUpdate::CommandFinished(outcome)
        });
    }

    /// Read the push stream until it ends, fails, or the ticket is cancelled.
    pub fn spawn_live_stream(&self, ticket: ConnectTicket) {
        let feed = Arc::clone(&self.services.live_feed);
        let updates = self.updates.clone();
        let ConnectTicket { generation, cancel } = ticket;

        thread::spawn(move || {
            let send = |signal: LiveSignal| {
                updates
                    .send(StateUpdate::Live { generation, signal })
                    .is_ok()
            };

            let messages = match feed.open() {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(target: "live", "failed to open live stream: {err}");
                    send(LiveSignal::Failed(err.user_message()));
                    return;
                }
            };
            if !send(LiveSignal::Opened) {
                return;
            }

            for message in messages {
                if cancel.is_cancelled() {
                    debug!(target: "live", generation, "reader cancelled");
                    return;
                }
                let signal = match message {
                    Ok(events) => LiveSignal::Message(events),
                    Err(err) => {
                        warn!(target: "live", "live stream failed: {err}");
                        send(LiveSignal::Failed(err.user_message()));
                        return;
                    }
                };
                if !send(signal) {
                    return;
                }
            }

            if !cancel.is_cancelled() {
                send(LiveSignal::Closed);
            }
        });
    }
}
