use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single task execution belonging to a workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: u64,
    pub status: TaskStatus,
    pub hash: Option<String>,
    pub name: Option<String>,
    pub process: Option<String>,
    pub tag: Option<Value>,
    pub exit: Option<i32>,
    pub submit: Option<DateTime<Utc>>,
    pub start: Option<DateTime<Utc>>,
    pub complete: Option<DateTime<Utc>>,
    pub duration: Option<u64>,
    pub realtime: Option<u64>,
    pub container: Option<String>,
    pub workdir: Option<String>,
    pub attempt: Option<u32>,
    pub error_action: Option<String>,
    #[serde(default, deserialize_with = "crate::ids::optional")]
    pub native_id: Option<String>,
    pub cpus: Option<u32>,
    pub memory: Option<u64>,
    pub pcpu: Option<f64>,
    pub pmem: Option<f64>,
    pub rss: Option<u64>,
    pub peak_rss: Option<u64>,
    pub vmem: Option<u64>,
    pub peak_vmem: Option<u64>,
    pub rchar: Option<u64>,
    pub wchar: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
    pub vol_ctxt: Option<u64>,
    pub inv_ctxt: Option<u64>,
}

/// Lifecycle states for a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    New,
    Submitted,
    Running,
    Cached,
    Completed,
    Failed,
    Aborted,
}

impl TaskStatus {
    /// Progress counter a task in this status contributes to.
    pub fn progress_tag(&self) -> Option<&'static str> {
        match self {
            TaskStatus::New => Some("pending"),
            TaskStatus::Submitted => Some("submitted"),
            TaskStatus::Running => Some("running"),
            TaskStatus::Cached => Some("cached"),
            TaskStatus::Completed => Some("succeeded"),
            TaskStatus::Failed => Some("failed"),
            TaskStatus::Aborted => None,
        }
    }

    /// Label shown to users; NEW and COMPLETED use their progress names.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::New => "PENDING",
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Cached => "CACHED",
            TaskStatus::Completed => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Aborted => "ABORTED",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task: Task,
}

/// Response body of `GET workflow/{id}/tasks`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListTasksResponse {
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
    #[serde(default)]
    pub total: u64,
}

/// Server-side paging for the task table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TasksQuery {
    pub start: u32,
    pub length: u32,
    pub search: Option<String>,
}

impl TasksQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("start", self.start.to_string()),
            ("length", self.length.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|text| !text.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        pairs
    }
}
