//! Normalisation of generate-call failures into user-facing text.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Every failure of a request to the inference server, already worded for
/// display. The `Display` output is what ends up in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InferenceError {
    /// No response at all: refused, unreachable or timed out
    #[error("Cannot connect to Ollama. Make sure it is running on localhost:11434.")]
    Unreachable,

    #[error("Model not found. Please check the model name or pull it using: ollama pull {model}")]
    ModelNotFound { model: String },

    #[error("Server error. The model might be having issues processing your request.")]
    ServerError,

    #[error("Server returned code {status}: {message}")]
    Status { status: u16, message: String },

    /// Local failure that is not a server response (bad body, bad request)
    #[error("Error: {message}")]
    Client { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl InferenceError {
    /// Classify a transport error from `reqwest`.
    ///
    /// Timeouts and connections that break while the body is still being
    /// read count as the server being unreachable, same as a refused connect.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || caused_by_io(err) {
            return Self::Unreachable;
        }
        if err.is_builder() || err.is_decode() || err.is_body() {
            return Self::Client {
                message: err.to_string(),
            };
        }
        Self::Unreachable
    }

    /// Classify a non-success HTTP response.
    ///
    /// `body` is the raw response body; Ollama reports failures as
    /// `{"error": "..."}` and that text is preferred when present.
    pub fn from_status(status: StatusCode, model: &str, url: &str, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => Self::ModelNotFound {
                model: model.to_string(),
            },
            StatusCode::INTERNAL_SERVER_ERROR => Self::ServerError,
            _ => {
                let message = serde_json::from_str::<ErrorBody>(body)
                    .map(|b| b.error)
                    .unwrap_or_else(|_| format!("Http failure response for {}: {}", url, status));
                Self::Status {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

/// Whether an I/O error sits anywhere in the source chain of `err`.
fn caused_by_io(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.is::<std::io::Error>() {
            return true;
        }
        source = inner.source();
    }
    false
}
