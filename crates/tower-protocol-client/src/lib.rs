mod error;
mod stream;

use std::sync::Arc;

use chrono::Utc;
use reqwest::{
    blocking::{Client, RequestBuilder, Response},
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use tower_interface::{
    AccountService, InterfaceError, LiveFeed, LiveMessages, NotesService, WorkflowClient,
};
use tower_protocol::{
    AccessToken, AddCommentRequest, AddCommentResponse, CreateAccessTokenRequest,
    CreateAccessTokenResponse, CreateTagRequest, CreateTagResponse, CreateTeamRequest,
    CreateTeamResponse, ErrorResponse, FilteringParams, GetProgressResponse, GetUserResponse,
    ListAccessTokensResponse, ListCommentsResponse, ListMetricsResponse, ListTagsResponse,
    ListTasksResponse, ListTeamsResponse, ListWorkflowsResponse, Progress, ServiceInfo,
    ServiceInfoResponse, TagText, TasksQuery, Team, UpdateCommentRequest, User, WorkflowComment,
    WorkflowEntry, WorkflowMetrics, WorkflowTag,
};
use tracing::debug;
use url::Url;

pub use error::ProtocolClientError;
pub use stream::LiveStream;

/// Default push stream location relative to the API base.
pub const DEFAULT_LIVE_PATH: &str = "live/";

#[derive(Clone)]
pub struct ProtocolClients {
    transport: Arc<Transport>,
    live_path: String,
}

impl ProtocolClients {
    pub fn new(
        base_url: impl AsRef<str>,
        access_token: Option<&str>,
    ) -> Result<Self, ProtocolClientError> {
        let base = normalize_base_url(base_url.as_ref())?;
        let headers = default_headers(access_token)?;
        let client = Client::builder()
            .no_proxy()
            .default_headers(headers.clone())
            .build()?;
        // the push stream stays open indefinitely, so it must not inherit
        // the request timeout
        let stream_client = Client::builder()
            .no_proxy()
            .default_headers(headers)
            .timeout(None)
            .build()?;
        Ok(Self {
            transport: Arc::new(Transport {
                client,
                stream_client,
                base,
            }),
            live_path: DEFAULT_LIVE_PATH.to_string(),
        })
    }

    /// Override the push stream path (older servers use `trace/live/`).
    pub fn with_live_path(mut self, path: impl Into<String>) -> Self {
        self.live_path = path.into();
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.transport.base
    }

    pub fn workflow_client(&self) -> Arc<dyn WorkflowClient> {
        Arc::new(ProtocolWorkflowClient {
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn notes_service(&self) -> Arc<dyn NotesService> {
        Arc::new(ProtocolNotesService {
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn account_service(&self) -> Arc<dyn AccountService> {
        Arc::new(ProtocolAccountService {
            transport: Arc::clone(&self.transport),
        })
    }

    pub fn live_feed(&self) -> Arc<dyn LiveFeed> {
        Arc::new(ProtocolLiveFeed {
            transport: Arc::clone(&self.transport),
            path: self.live_path.clone(),
        })
    }
}

fn default_headers(access_token: Option<&str>) -> Result<HeaderMap, ProtocolClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = access_token.filter(|token| !token.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| ProtocolClientError::Protocol(format!("invalid access token: {err}")))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

struct Transport {
    client: Client,
    stream_client: Client,
    base: Url,
}

impl Transport {
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProtocolClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProtocolClientError::Protocol(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ProtocolClientError> {
        check_status(request.send()?)
    }

    fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ProtocolClientError> {
        self.get_with_query(segments, &[])
    }

    fn get_with_query<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ProtocolClientError> {
        let url = self.endpoint(segments)?;
        debug!(target: "protocol", %url, "GET");
        let response = self.send(self.client.get(url).query(query))?;
        Ok(response.json()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ProtocolClientError> {
        let url = self.endpoint(segments)?;
        debug!(target: "protocol", %url, "POST");
        let response = self.send(self.client.post(url).json(body))?;
        Ok(response.json()?)
    }

    fn put<B: Serialize>(&self, segments: &[&str], body: &B) -> Result<(), ProtocolClientError> {
        let url = self.endpoint(segments)?;
        debug!(target: "protocol", %url, "PUT");
        self.send(self.client.put(url).json(body))?;
        Ok(())
    }

    fn delete(&self, segments: &[&str]) -> Result<(), ProtocolClientError> {
        let url = self.endpoint(segments)?;
        debug!(target: "protocol", %url, "DELETE");
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn get_stream(&self, segments: &[&str]) -> Result<Response, ProtocolClientError> {
        let url = self.endpoint(segments)?;
        debug!(target: "protocol", %url, "opening event stream");
        self.send(
            self.stream_client
                .get(url)
                .header(reqwest::header::ACCEPT, "text/event-stream"),
        )
    }
}

/// Turn non-success responses into errors carrying the server's message.
fn check_status(response: Response) -> Result<Response, ProtocolClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|err| err.message)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(ProtocolClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn normalize_base_url(raw: &str) -> Result<Url, ProtocolClientError> {
    let mut parsed = Url::parse(raw)?;
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

#[derive(Clone)]
struct ProtocolWorkflowClient {
    transport: Arc<Transport>,
}

impl WorkflowClient for ProtocolWorkflowClient {
    fn list_workflows(
        &self,
        params: &FilteringParams,
    ) -> Result<Vec<WorkflowEntry>, InterfaceError> {
        let list: ListWorkflowsResponse = self
            .transport
            .get_with_query(&["workflow", "list"], &params.to_query_pairs())?;
        Ok(list.workflows)
    }

    fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowEntry, InterfaceError> {
        Ok(self.transport.get(&["workflow", workflow_id])?)
    }

    fn get_progress(&self, workflow_id: &str) -> Result<Progress, InterfaceError> {
        let response: GetProgressResponse =
            self.transport.get(&["workflow", workflow_id, "progress"])?;
        Ok(response.progress)
    }

    fn delete_workflow(&self, workflow_id: &str) -> Result<(), InterfaceError> {
        Ok(self.transport.delete(&["workflow", workflow_id])?)
    }

    fn list_tasks(
        &self,
        workflow_id: &str,
        query: &TasksQuery,
    ) -> Result<ListTasksResponse, InterfaceError> {
        Ok(self
            .transport
            .get_with_query(&["workflow", workflow_id, "tasks"], &query.to_query_pairs())?)
    }

    fn list_metrics(&self, workflow_id: &str) -> Result<Vec<WorkflowMetrics>, InterfaceError> {
        let response: ListMetricsResponse =
            self.transport.get(&["workflow", workflow_id, "metrics"])?;
        Ok(response.metrics)
    }
}

#[derive(Clone)]
struct ProtocolNotesService {
    transport: Arc<Transport>,
}

impl NotesService for ProtocolNotesService {
    fn list_comments(&self, workflow_id: &str) -> Result<Vec<WorkflowComment>, InterfaceError> {
        let response: ListCommentsResponse =
            self.transport.get(&["workflow", workflow_id, "comments"])?;
        Ok(response.comments)
    }

    fn add_comment(
        &self,
        workflow_id: &str,
        text: &str,
    ) -> Result<WorkflowComment, InterfaceError> {
        let request = AddCommentRequest {
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        let response: AddCommentResponse = self
            .transport
            .post(&["workflow", workflow_id, "comment", "add"], &request)?;
        Ok(response.comment)
    }

    fn update_comment(
        &self,
        workflow_id: &str,
        comment_id: u64,
        text: &str,
    ) -> Result<(), InterfaceError> {
        let request = UpdateCommentRequest {
            comment_id,
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        Ok(self
            .transport
            .put(&["workflow", workflow_id, "comment"], &request)?)
    }

    fn delete_comment(&self, workflow_id: &str, comment_id: u64) -> Result<(), InterfaceError> {
        let comment_id = comment_id.to_string();
        Ok(self
            .transport
            .delete(&["workflow", workflow_id, "comment", comment_id.as_str()])?)
    }

    fn list_tags(&self, workflow_id: &str) -> Result<Vec<WorkflowTag>, InterfaceError> {
        let response: ListTagsResponse = self.transport.get(&["tag", "list", workflow_id])?;
        Ok(response.workflow_tags)
    }

    fn create_tag(&self, workflow_id: &str, text: &str) -> Result<WorkflowTag, InterfaceError> {
        let request = CreateTagRequest {
            workflow_id: workflow_id.to_string(),
            workflow_tag: TagText {
                text: text.to_string(),
            },
        };
        let response: CreateTagResponse = self.transport.post(&["tag", "create"], &request)?;
        response
            .workflow_tag
            .ok_or_else(|| InterfaceError::Message("server did not return the new tag".into()))
    }

    fn delete_tag(&self, tag_id: u64) -> Result<(), InterfaceError> {
        let tag_id = tag_id.to_string();
        Ok(self.transport.delete(&["tag", tag_id.as_str()])?)
    }
}

#[derive(Clone)]
struct ProtocolAccountService {
    transport: Arc<Transport>,
}

impl AccountService for ProtocolAccountService {
    fn current_user(&self) -> Result<User, InterfaceError> {
        let response: GetUserResponse = self.transport.get(&["user", ""])?;
        Ok(response.user)
    }

    fn service_info(&self) -> Result<ServiceInfo, InterfaceError> {
        let response: ServiceInfoResponse = self.transport.get(&["service-info"])?;
        Ok(response.service_info)
    }

    fn list_teams(&self) -> Result<Vec<Team>, InterfaceError> {
        let response: ListTeamsResponse = self.transport.get(&["team"])?;
        Ok(response.teams)
    }

    fn create_team(&self, name: &str) -> Result<Team, InterfaceError> {
        let request = CreateTeamRequest {
            name: name.to_string(),
        };
        let response: CreateTeamResponse = self.transport.post(&["team"], &request)?;
        Ok(response.team)
    }

    fn delete_team(&self, team_id: u64) -> Result<(), InterfaceError> {
        let team_id = team_id.to_string();
        Ok(self.transport.delete(&["team", team_id.as_str()])?)
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, InterfaceError> {
        let response: ListAccessTokensResponse = self.transport.get(&["token", "list"])?;
        Ok(response.tokens)
    }

    fn create_token(&self, name: &str) -> Result<AccessToken, InterfaceError> {
        let request = CreateAccessTokenRequest {
            name: name.to_string(),
        };
        let response: CreateAccessTokenResponse =
            self.transport.post(&["token", "create"], &request)?;
        Ok(response.token)
    }

    fn delete_token(&self, token_id: u64) -> Result<(), InterfaceError> {
        let token_id = token_id.to_string();
        Ok(self.transport.delete(&["token", "delete", token_id.as_str()])?)
    }
}

#[derive(Clone)]
struct ProtocolLiveFeed {
    transport: Arc<Transport>,
    path: String,
}

impl LiveFeed for ProtocolLiveFeed {
    fn open(&self) -> Result<LiveMessages, InterfaceError> {
        let segments: Vec<&str> = self.path.split('/').collect();
        let response = self.transport.get_stream(&segments)?;
        let stream = LiveStream::new(response).map(|item| item.map_err(InterfaceError::from));
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> Transport {
        Transport {
            client: Client::new(),
            stream_client: Client::new(),
            base: normalize_base_url(base).unwrap(),
        }
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = normalize_base_url("http://localhost:8000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/");
    }

    #[test]
    fn endpoint_appends_encoded_segments() {
        let transport = transport("http://localhost:8000/api");
        let url = transport.endpoint(&["workflow", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/workflow/a%20b%2Fc");
    }

    #[test]
    fn empty_trailing_segment_keeps_slash() {
        let transport = transport("http://localhost:8000/api/");
        assert_eq!(
            transport.endpoint(&["user", ""]).unwrap().as_str(),
            "http://localhost:8000/api/user/"
        );
        let live: Vec<&str> = "trace/live/".split('/').collect();
        assert_eq!(
            transport.endpoint(&live).unwrap().as_str(),
            "http://localhost:8000/api/trace/live/"
        );
    }

    #[test]
    fn blank_token_sends_no_authorization_header() {
        assert!(default_headers(Some("")).unwrap().is_empty());
        let headers = default_headers(Some("abc")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    }

    #[test]
    fn status_errors_map_to_interface_errors() {
        let err: InterfaceError = ProtocolClientError::Status {
            status: 401,
            message: "Unauthorized".into(),
        }
        .into();
        assert!(err.is_session_error());

        let err: InterfaceError = ProtocolClientError::Status {
            status: 500,
            message: "Oops".into(),
        }
        .into();
        assert_eq!(err, InterfaceError::Message("Oops".into()));
    }
}
