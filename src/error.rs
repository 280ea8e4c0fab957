//! Error types for each subsystem.
//!
//! None of these are fatal to the process: transport errors trigger a
//! reconnect, fetch/ack errors are logged and retried by the next
//! trigger event, and asset errors degrade to iconless notifications.

use thiserror::Error;

/// Connection-level errors on the push websocket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying websocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server closed the connection.
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Errors while fetching the undelivered message batch.
///
/// A failed or malformed fetch is never partially applied; the whole
/// batch is discarded and the next trigger event retries naturally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; the raw body is kept for diagnostics.
    #[error("message fetch failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Body did not parse as a message batch.
    #[error("malformed message payload: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

/// Errors while advancing the server-side high-water mark.
///
/// Not retried: a missed ack means the next fetch re-delivers
/// already-seen messages, which is an accepted at-least-once tradeoff.
#[derive(Debug, Error)]
pub enum AckError {
    /// Request-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status; the raw body is kept for diagnostics.
    #[error("head update failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors while fetching or storing a cached icon.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Request-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the icon host.
    #[error("icon fetch failed with status {status}")]
    Status { status: u16 },

    /// Filesystem failure in the cache directory.
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    /// Icon key is not a plain file name.
    #[error("invalid icon key: {0}")]
    InvalidKey(String),
}

/// Errors delivering a notification to the local sink.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The notification subsystem rejected the payload.
    #[error("notification sink error: {0}")]
    Sink(String),
}

/// Errors loading or validating settings at startup.
///
/// Missing required settings are the only process-fatal condition.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file exists but could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings file exists but is not valid JSON.
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is absent from both file and environment.
    #[error("a secret and deviceId must be provided (missing {0})")]
    Missing(&'static str),
}
