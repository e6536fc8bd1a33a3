use thiserror::Error;
use tower_interface::InterfaceError;
use tower_protocol::LiveDecodeError;

#[derive(Debug, Error)]
pub enum ProtocolClientError {
    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("failed to decode live event: {0}")]
    Live(#[from] LiveDecodeError),
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ProtocolClientError> for InterfaceError {
    fn from(value: ProtocolClientError) -> Self {
        match value {
            ProtocolClientError::Status {
                status: 401,
                message,
            } => InterfaceError::Unauthorized(message),
            ProtocolClientError::Status {
                status: 403,
                message,
            } => InterfaceError::Forbidden(message),
            ProtocolClientError::Status {
                status: 404,
                message,
            } => InterfaceError::NotFound(message),
            ProtocolClientError::Status { message, .. } => InterfaceError::Message(message),
            ProtocolClientError::Http(err) => InterfaceError::Transport(err.to_string()),
            ProtocolClientError::Io(err) => InterfaceError::Transport(err.to_string()),
            other => InterfaceError::Message(other.to_string()),
        }
    }
}
