/// Error types for the extension core

/// Errors raised while talking to the monitoring service or the browser
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Server URL and API key must be configured")]
    Config,

    #[error("API request failed: {status} {status_text}{}", body_suffix(.body))]
    Http {
        status: u16,
        status_text: String,
        body: Option<String>,
    },

    #[error("Invalid watch data format: expected array or object, got {received_type}")]
    InvalidFormat { received_type: &'static str },

    #[error("Failed to save settings: {0}")]
    Storage(String),

    #[error("Network request failed: {0}")]
    Transport(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch {uuid} has no url, refusing to update it")]
    MissingUrl { uuid: String },

    #[error("Invalid watch id: {uuid}")]
    InvalidWatchId { uuid: String },

    #[error("Browser API call failed: {0}")]
    Browser(String),
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(text) if !text.is_empty() => format!(" - {}", text),
        _ => String::new(),
    }
}

/// Result type alias for extension operations
pub type Result<T> = std::result::Result<T, Error>;
