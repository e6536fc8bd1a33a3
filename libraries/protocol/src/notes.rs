use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A free-text note attached to a workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowComment {
    pub id: u64,
    pub text: String,
    pub author: Option<CommentAuthor>,
    pub date_created: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: u64,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListCommentsResponse {
    #[serde(default)]
    pub comments: Vec<WorkflowComment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddCommentRequest {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddCommentResponse {
    pub comment: WorkflowComment,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    pub comment_id: u64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A short label attached to a workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTag {
    pub id: u64,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTagsResponse {
    #[serde(default)]
    pub workflow_tags: Vec<WorkflowTag>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagText {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagRequest {
    pub workflow_id: String,
    pub workflow_tag: TagText,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagResponse {
    pub workflow_tag: Option<WorkflowTag>,
}
