use reqwest::StatusCode;
use thiserror::Error;

/// The one failure kind of the backend client.
///
/// Reads report a bare status; writes carry the raw response body so the
/// operator can see what the backend rejected.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}", status_text(.status, .message))]
    Status { status: StatusCode, message: String },

    #[error("unexpected response body from {url}: {detail}")]
    Decode { url: String, detail: String },
}

impl TransportError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn status_text(status: &StatusCode, message: &str) -> String {
    if message.trim().is_empty() {
        format!("backend returned {}", status)
    } else {
        message.trim().to_string()
    }
}
