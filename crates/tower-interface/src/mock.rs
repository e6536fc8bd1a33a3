use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use tower_protocol::{
    AccessToken, FilteringParams, ListTasksResponse, LiveEvent, Progress, ServiceInfo, TasksQuery,
    Team, User, WorkflowComment, WorkflowEntry, WorkflowMetrics, WorkflowTag,
};

use crate::{
    AccountService, InterfaceError, LiveFeed, LiveMessages, NotesService, WorkflowClient,
};

type ListResult = Result<Vec<WorkflowEntry>, InterfaceError>;

/// In-memory [`WorkflowClient`] with scripted list responses.
#[derive(Default)]
pub struct MockWorkflowClient {
    list_results: Mutex<VecDeque<ListResult>>,
    list_requests: Mutex<Vec<FilteringParams>>,
    workflows: Mutex<HashMap<String, WorkflowEntry>>,
    progress: Mutex<HashMap<String, Progress>>,
    delete_error: Mutex<Option<InterfaceError>>,
    deleted: Mutex<Vec<String>>,
    tasks: Mutex<ListTasksResponse>,
    tasks_requests: Mutex<Vec<(String, TasksQuery)>>,
    metrics: Mutex<Vec<WorkflowMetrics>>,
}

impl MockWorkflowClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `list_workflows` call.
    pub fn push_list_result(&self, result: ListResult) {
        self.list_results.lock().unwrap().push_back(result);
    }

    pub fn insert_workflow(&self, entry: WorkflowEntry) {
        self.workflows
            .lock()
            .unwrap()
            .insert(entry.id().to_string(), entry);
    }

    pub fn set_progress(&self, workflow_id: &str, progress: Progress) {
        self.progress
            .lock()
            .unwrap()
            .insert(workflow_id.to_string(), progress);
    }

    pub fn fail_delete_with(&self, error: InterfaceError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn set_tasks(&self, tasks: ListTasksResponse) {
        *self.tasks.lock().unwrap() = tasks;
    }

    pub fn set_metrics(&self, metrics: Vec<WorkflowMetrics>) {
        *self.metrics.lock().unwrap() = metrics;
    }

    pub fn list_requests(&self) -> Vec<FilteringParams> {
        self.list_requests.lock().unwrap().clone()
    }

    pub fn tasks_requests(&self) -> Vec<(String, TasksQuery)> {
        self.tasks_requests.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl WorkflowClient for MockWorkflowClient {
    fn list_workflows(&self, params: &FilteringParams) -> ListResult {
        self.list_requests.lock().unwrap().push(params.clone());
        self.list_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowEntry, InterfaceError> {
        self.workflows
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| InterfaceError::NotFound(format!("workflow {workflow_id}")))
    }

    fn get_progress(&self, workflow_id: &str) -> Result<Progress, InterfaceError> {
        self.progress
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| InterfaceError::NotFound(format!("progress {workflow_id}")))
    }

    fn delete_workflow(&self, workflow_id: &str) -> Result<(), InterfaceError> {
        if let Some(error) = self.delete_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.workflows.lock().unwrap().remove(workflow_id);
        self.deleted.lock().unwrap().push(workflow_id.to_string());
        Ok(())
    }

    fn list_tasks(
        &self,
        workflow_id: &str,
        query: &TasksQuery,
    ) -> Result<ListTasksResponse, InterfaceError> {
        self.tasks_requests
            .lock()
            .unwrap()
            .push((workflow_id.to_string(), query.clone()));
        Ok(self.tasks.lock().unwrap().clone())
    }

    fn list_metrics(&self, _workflow_id: &str) -> Result<Vec<WorkflowMetrics>, InterfaceError> {
        Ok(self.metrics.lock().unwrap().clone())
    }
}

/// In-memory [`NotesService`].
#[derive(Default)]
pub struct MockNotesService {
    comments: Mutex<HashMap<String, Vec<WorkflowComment>>>,
    tags: Mutex<HashMap<String, Vec<WorkflowTag>>>,
    next_id: AtomicU64,
}

impl MockNotesService {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl NotesService for MockNotesService {
    fn list_comments(&self, workflow_id: &str) -> Result<Vec<WorkflowComment>, InterfaceError> {
        Ok(self
            .comments
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .unwrap_or_default())
    }

    fn add_comment(
        &self,
        workflow_id: &str,
        text: &str,
    ) -> Result<WorkflowComment, InterfaceError> {
        let comment = WorkflowComment {
            id: self.allocate_id(),
            text: text.to_string(),
            author: None,
            date_created: None,
            last_updated: None,
        };
        self.comments
            .lock()
            .unwrap()
            .entry(workflow_id.to_string())
            .or_default()
            .push(comment.clone());
        Ok(comment)
    }

    fn update_comment(
        &self,
        workflow_id: &str,
        comment_id: u64,
        text: &str,
    ) -> Result<(), InterfaceError> {
        let mut comments = self.comments.lock().unwrap();
        let comment = comments
            .get_mut(workflow_id)
            .and_then(|list| list.iter_mut().find(|comment| comment.id == comment_id))
            .ok_or_else(|| InterfaceError::NotFound(format!("comment {comment_id}")))?;
        comment.text = text.to_string();
        Ok(())
    }

    fn delete_comment(&self, workflow_id: &str, comment_id: u64) -> Result<(), InterfaceError> {
        if let Some(list) = self.comments.lock().unwrap().get_mut(workflow_id) {
            list.retain(|comment| comment.id != comment_id);
        }
        Ok(())
    }

    fn list_tags(&self, workflow_id: &str) -> Result<Vec<WorkflowTag>, InterfaceError> {
        Ok(self
            .tags
            .lock()
            .unwrap()
            .get(workflow_id)
            .cloned()
            .unwrap_or_default())
    }

    fn create_tag(&self, workflow_id: &str, text: &str) -> Result<WorkflowTag, InterfaceError> {
        let tag = WorkflowTag {
            id: self.allocate_id(),
            text: text.to_string(),
        };
        self.tags
            .lock()
            .unwrap()
            .entry(workflow_id.to_string())
            .or_default()
            .push(tag.clone());
        Ok(tag)
    }

    fn delete_tag(&self, tag_id: u64) -> Result<(), InterfaceError> {
        for list in self.tags.lock().unwrap().values_mut() {
            list.retain(|tag| tag.id != tag_id);
        }
        Ok(())
    }
}

/// In-memory [`AccountService`].
#[derive(Default)]
pub struct MockAccountService {
    user: Mutex<Option<Result<User, InterfaceError>>>,
    teams: Mutex<Vec<Team>>,
    tokens: Mutex<Vec<AccessToken>>,
    next_id: AtomicU64,
}

impl MockAccountService {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    pub fn set_user_result(&self, result: Result<User, InterfaceError>) {
        *self.user.lock().unwrap() = Some(result);
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl AccountService for MockAccountService {
    fn current_user(&self) -> Result<User, InterfaceError> {
        self.user
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(InterfaceError::Unauthorized("no user configured".into())))
    }

    fn service_info(&self) -> Result<ServiceInfo, InterfaceError> {
        Ok(ServiceInfo {
            version: Some("mock".into()),
            ..Default::default()
        })
    }

    fn list_teams(&self) -> Result<Vec<Team>, InterfaceError> {
        Ok(self.teams.lock().unwrap().clone())
    }

    fn create_team(&self, name: &str) -> Result<Team, InterfaceError> {
        let team = Team {
            id: self.allocate_id(),
            name: name.to_string(),
            description: None,
            email: None,
        };
        self.teams.lock().unwrap().push(team.clone());
        Ok(team)
    }

    fn delete_team(&self, team_id: u64) -> Result<(), InterfaceError> {
        self.teams.lock().unwrap().retain(|team| team.id != team_id);
        Ok(())
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, InterfaceError> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    fn create_token(&self, name: &str) -> Result<AccessToken, InterfaceError> {
        let id = self.allocate_id();
        let token = AccessToken {
            id,
            name: name.to_string(),
            token: Some(format!("mock-token-{id}")),
            date_created: None,
            last_used: None,
        };
        self.tokens.lock().unwrap().push(AccessToken {
            token: None,
            ..token.clone()
        });
        Ok(token)
    }

    fn delete_token(&self, token_id: u64) -> Result<(), InterfaceError> {
        self.tokens.lock().unwrap().retain(|token| token.id != token_id);
        Ok(())
    }
}

type ScriptedMessages = Vec<Result<Vec<LiveEvent>, InterfaceError>>;

/// [`LiveFeed`] that replays a scripted message sequence.
#[derive(Default)]
pub struct MockLiveFeed {
    script: Mutex<Option<Result<ScriptedMessages, InterfaceError>>>,
    opens: AtomicUsize,
}

impl MockLiveFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_messages(&self, messages: ScriptedMessages) {
        *self.script.lock().unwrap() = Some(Ok(messages));
    }

    pub fn fail_open_with(&self, error: InterfaceError) {
        *self.script.lock().unwrap() = Some(Err(error));
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl LiveFeed for MockLiveFeed {
    fn open(&self) -> Result<LiveMessages, InterfaceError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let messages = self.script.lock().unwrap().take().unwrap_or(Ok(Vec::new()))?;
        Ok(Box::new(messages.into_iter()))
    }
}
