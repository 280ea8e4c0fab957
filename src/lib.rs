//! Desktop notification client for the Pushover Open Client API.
//!
//! Keeps one persistent websocket subscription alive per device,
//! reconciles missed messages over REST when the server signals new
//! data, forwards each message to the local notification subsystem,
//! and acknowledges the batch high-water mark back to the server.

/// REST client: message fetches and high-water-mark acks.
pub mod api;
/// Disk-backed icon cache.
pub mod cache;
/// Settings file and environment loading.
pub mod config;
/// Per-subsystem error types.
pub mod error;
/// Tracing bootstrap.
pub mod logging;
/// Notification payload mapping and batch dispatch.
pub mod notify;
/// Session controller state machine.
pub mod session;
/// Websocket transport session.
pub mod stream;
/// Wire types and control-frame parsing.
pub mod types;

pub use api::{ApiClient, MessageApi};
pub use cache::{DiskIconCache, IconCache};
pub use config::{EnvOverrides, Settings, SettingsFile, UnknownFramePolicy};
pub use error::{AckError, AssetError, FetchError, NotifyError, SettingsError, TransportError};
pub use notify::{DesktopSink, Dispatcher, NotificationPayload, NotificationSink};
pub use session::{SessionController, SessionState};
pub use stream::{PushTransport, StreamEvent, StreamHandle, Transport};
pub use types::{Frame, Message, MessageBatch, batch_high_water, login_frame};
