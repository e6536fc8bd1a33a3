//! Service contracts consumed by the Tower terminal UI.
//!
//! The UI only talks to these traits; the protocol client provides the HTTP
//! implementations and the `test-utils` feature provides in-memory mocks.

#[cfg(any(test, feature = "test-utils"))]
mod mock;

use thiserror::Error;
use tower_protocol::{
    AccessToken, FilteringParams, ListTasksResponse, LiveEvent, Progress, ServiceInfo, TasksQuery,
    Team, User, WorkflowComment, WorkflowEntry, WorkflowMetrics, WorkflowTag,
};

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockAccountService, MockLiveFeed, MockNotesService, MockWorkflowClient};

/// Errors surfaced to the UI layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{0}")]
    Message(String),
    #[error("operation not implemented")]
    Unimplemented,
}

impl InterfaceError {
    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            InterfaceError::Unauthorized(_) => "Session expired".to_string(),
            InterfaceError::Forbidden(_) => "Forbidden access".to_string(),
            InterfaceError::NotFound(message)
            | InterfaceError::Transport(message)
            | InterfaceError::Message(message) => message.clone(),
            InterfaceError::Unimplemented => self.to_string(),
        }
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, InterfaceError::Unauthorized(_))
    }
}

impl From<String> for InterfaceError {
    fn from(value: String) -> Self {
        InterfaceError::Message(value)
    }
}

impl From<&str> for InterfaceError {
    fn from(value: &str) -> Self {
        InterfaceError::Message(value.to_string())
    }
}

/// Workflow runs and their execution data.
pub trait WorkflowClient: Send + Sync {
    fn list_workflows(&self, params: &FilteringParams)
    -> Result<Vec<WorkflowEntry>, InterfaceError>;

    fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowEntry, InterfaceError>;

    fn get_progress(&self, workflow_id: &str) -> Result<Progress, InterfaceError>;

    fn delete_workflow(&self, workflow_id: &str) -> Result<(), InterfaceError>;

    fn list_tasks(
        &self,
        workflow_id: &str,
        query: &TasksQuery,
    ) -> Result<ListTasksResponse, InterfaceError>;

    fn list_metrics(&self, workflow_id: &str) -> Result<Vec<WorkflowMetrics>, InterfaceError>;
}

/// Comments and tags attached to workflows.
pub trait NotesService: Send + Sync {
    fn list_comments(&self, workflow_id: &str) -> Result<Vec<WorkflowComment>, InterfaceError>;

    fn add_comment(&self, workflow_id: &str, text: &str)
    -> Result<WorkflowComment, InterfaceError>;

    fn update_comment(
        &self,
        workflow_id: &str,
        comment_id: u64,
        text: &str,
    ) -> Result<(), InterfaceError>;

    fn delete_comment(&self, workflow_id: &str, comment_id: u64) -> Result<(), InterfaceError>;

    fn list_tags(&self, workflow_id: &str) -> Result<Vec<WorkflowTag>, InterfaceError>;

    fn create_tag(&self, workflow_id: &str, text: &str) -> Result<WorkflowTag, InterfaceError>;

    fn delete_tag(&self, tag_id: u64) -> Result<(), InterfaceError>;
}

/// The signed-in user, their teams and access tokens.
pub trait AccountService: Send + Sync {
    fn current_user(&self) -> Result<User, InterfaceError>;

    fn service_info(&self) -> Result<ServiceInfo, InterfaceError>;

    fn list_teams(&self) -> Result<Vec<Team>, InterfaceError>;

    fn create_team(&self, name: &str) -> Result<Team, InterfaceError>;

    fn delete_team(&self, team_id: u64) -> Result<(), InterfaceError>;

    fn list_tokens(&self) -> Result<Vec<AccessToken>, InterfaceError>;

    fn create_token(&self, name: &str) -> Result<AccessToken, InterfaceError>;

    fn delete_token(&self, token_id: u64) -> Result<(), InterfaceError>;
}

/// Blocking iterator over live stream messages; each item is one decoded
/// message, which may hold several events.
pub type LiveMessages = Box<dyn Iterator<Item = Result<Vec<LiveEvent>, InterfaceError>> + Send>;

/// Opens the server push stream.
///
/// `open` returning `Ok` is the transport "open" signal. The iterator ends
/// when the server closes the stream; an `Err` item is a transport failure.
pub trait LiveFeed: Send + Sync {
    fn open(&self) -> Result<LiveMessages, InterfaceError>;
}
