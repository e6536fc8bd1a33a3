//! Protocol data contracts for the Tower API.
//!
//! These types mirror the JSON schema served by the Tower backend and are
//! shared between the protocol client and the terminal UI.

mod account;
mod ids;
mod live;
mod notes;
mod task;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use account::{
    AccessToken, CreateAccessTokenRequest, CreateAccessTokenResponse, CreateTeamRequest,
    CreateTeamResponse, GetUserResponse, ListAccessTokensResponse, ListTeamsResponse,
    ServiceInfo, ServiceInfoResponse, Team, User,
};
pub use live::{EventScope, LiveAction, LiveDecodeError, LiveEvent};
pub use notes::{
    AddCommentRequest, AddCommentResponse, CommentAuthor, CreateTagRequest, CreateTagResponse,
    ListCommentsResponse, ListTagsResponse, TagText, UpdateCommentRequest, WorkflowComment,
    WorkflowTag,
};
pub use task::{ListTasksResponse, Task, TaskEntry, TaskStatus, TasksQuery};

/// One tracked pipeline execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(alias = "id", deserialize_with = "ids::required")]
    pub workflow_id: String,
    pub run_name: Option<String>,
    pub session_id: Option<String>,
    pub project_name: Option<String>,
    pub user_name: Option<String>,
    /// Explicit status, when the server reports one.
    pub status: Option<WorkflowStatus>,
    pub submit: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub complete: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    pub duration: Option<u64>,
    pub success: Option<bool>,
    pub exit_status: Option<i32>,
    pub error_message: Option<String>,
    pub error_report: Option<String>,
    pub commit_id: Option<String>,
    pub revision: Option<String>,
    pub repository: Option<String>,
    pub project_dir: Option<String>,
    pub work_dir: Option<String>,
    pub launch_dir: Option<String>,
    pub container: Option<String>,
    pub container_engine: Option<String>,
    pub command_line: Option<String>,
    pub profile: Option<String>,
    pub script_name: Option<String>,
    pub resume: Option<bool>,
    pub params: Option<Value>,
    #[serde(default)]
    pub config_files: Vec<String>,
    pub manifest: Option<Manifest>,
    pub nextflow: Option<NextflowInfo>,
    pub stats: Option<WorkflowStats>,
}

impl Workflow {
    /// Status as reported by the server, or derived from the completion data.
    pub fn effective_status(&self) -> WorkflowStatus {
        if let Some(status) = self.status {
            return status;
        }
        match (self.complete, self.success) {
            (None, _) if self.start.is_none() => WorkflowStatus::Submitted,
            (None, _) => WorkflowStatus::Running,
            (Some(_), Some(true)) => WorkflowStatus::Succeeded,
            (Some(_), _) => WorkflowStatus::Failed,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.effective_status(),
            WorkflowStatus::Running | WorkflowStatus::Submitted
        )
    }

    /// A successful run whose stats report ignored task failures.
    pub fn is_partially_failed(&self) -> bool {
        self.effective_status() == WorkflowStatus::Succeeded
            && self
                .stats
                .as_ref()
                .is_some_and(|stats| stats.ignored_count > 0)
    }

    /// First six characters of the commit id.
    pub fn brief_commit_id(&self) -> Option<&str> {
        self.commit_id
            .as_deref()
            .map(|commit| commit.get(..6).unwrap_or(commit))
    }
}

/// Known lifecycle states for a workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Submitted,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Submitted => "submitted",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Succeeded => "succeeded",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub home_page: Option<String>,
    pub main_script: Option<String>,
    pub default_branch: Option<String>,
    pub nextflow_version: Option<String>,
    pub version: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextflowInfo {
    pub version: Option<String>,
    pub build: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Final task counters reported once a run completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowStats {
    pub succeed_count: u64,
    pub cached_count: u64,
    pub failed_count: u64,
    pub ignored_count: u64,
    pub succeed_pct: f64,
    pub cached_pct: f64,
    pub failed_pct: f64,
    pub ignored_pct: f64,
    pub compute_time_fmt: Option<String>,
}

/// A workflow together with its latest progress snapshot.
///
/// This is the shape returned by `GET workflow/{id}` and used for every
/// element of the list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEntry {
    pub workflow: Workflow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl WorkflowEntry {
    pub fn id(&self) -> &str {
        &self.workflow.workflow_id
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.workflow.start
    }
}

/// Response body of `GET workflow/list`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListWorkflowsResponse {
    #[serde(default)]
    pub workflows: Vec<WorkflowEntry>,
}

/// Response body of `GET workflow/{id}/progress`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GetProgressResponse {
    pub progress: Progress,
}

/// Live progress snapshot of a running workflow.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(alias = "tasksProgress")]
    pub workflow_progress: Option<ProgressRecord>,
    #[serde(default)]
    pub processes_progress: Vec<ProcessProgress>,
}

/// Task counters and resource totals, aggregated for a workflow or process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressRecord {
    pub pending: u64,
    pub submitted: u64,
    pub running: u64,
    pub cached: u64,
    pub succeeded: u64,
    pub failed: u64,

    pub cpus: u64,
    /// Accumulated CPU time in milliseconds.
    pub cpu_time: u64,
    pub cpu_load: f64,
    pub memory_rss: u64,
    pub memory_req: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub vol_ctx_switch: u64,
    pub inv_ctx_switch: u64,
    pub cpu_efficiency: f64,
    pub memory_efficiency: f64,

    pub load_cpus: u64,
    pub load_tasks: u64,
    pub load_memory: u64,
    pub peak_cpus: u64,
    pub peak_tasks: u64,
    pub peak_memory: u64,
}

impl ProgressRecord {
    pub fn total(&self) -> u64 {
        self.pending + self.submitted + self.running + self.cached + self.succeeded + self.failed
    }

    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.cached + self.succeeded + self.failed
    }

    pub fn cpu_hours(&self) -> f64 {
        self.cpu_time as f64 / 3_600_000.0
    }
}

/// Per-process progress counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessProgress {
    pub process: String,
    #[serde(flatten)]
    pub record: ProgressRecord,
}

/// Resource usage distribution for one process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetrics {
    pub process: String,
    pub cpu: Option<ResourceData>,
    pub mem: Option<ResourceData>,
    pub vmem: Option<ResourceData>,
    pub time: Option<ResourceData>,
    pub reads: Option<ResourceData>,
    pub writes: Option<ResourceData>,
    pub cpu_usage: Option<ResourceData>,
    pub mem_usage: Option<ResourceData>,
    pub time_usage: Option<ResourceData>,
}

/// Box-plot summary of a resource metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceData {
    pub mean: f64,
    pub min: f64,
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub max: f64,
    pub min_label: Option<String>,
    pub max_label: Option<String>,
}

/// Response body of `GET workflow/{id}/metrics`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMetricsResponse {
    #[serde(default)]
    pub metrics: Vec<WorkflowMetrics>,
}

/// Pagination and search parameters for the workflow list endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilteringParams {
    pub max: Option<u32>,
    pub offset: Option<u32>,
    pub search: Option<String>,
}

impl FilteringParams {
    pub fn new(max: Option<u32>, offset: Option<u32>, search: Option<String>) -> Self {
        Self {
            max,
            offset,
            search,
        }
    }

    /// True when a non-blank search text is set.
    pub fn is_search_text(&self) -> bool {
        self.search
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Query pairs in request order. An empty search is omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(max) = self.max {
            pairs.push(("max", max.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|text| !text.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}

/// Error body returned by the API on failed requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: Option<String>,
}
