use thiserror::Error;

/// Failure talking to the work item store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: request failed: {message}")]
    Request { context: String, message: String },
    #[error("{context}: HTTP {status}: {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },
    #[error("{context}: unexpected response: {message}")]
    Decode { context: String, message: String },
}

impl StoreError {
    pub fn request(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::Request {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn decode(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        StoreError::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

/// Failure reaching the completion service. Malformed completions are not
/// errors; they degrade to a no-op batch.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response had no text content")]
    Empty,
}

/// Failure of a whole instruction run. Per-item mutation failures are not
/// errors; they are reported in the results.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Keeps error bodies from flooding logs and the chat panel.
pub fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX).collect();
        format!("{head}...")
    }
}
