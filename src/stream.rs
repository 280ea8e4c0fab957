//! Persistent websocket session with the Pushover push endpoint.
//!
//! One [`StreamHandle`] corresponds to one underlying connection; the
//! session controller discards the handle and connects again on any
//! failure rather than reusing it.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::TransportError;
use crate::types::{Frame, login_frame};

/// An event delivered by a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The connection is open and the login frame has been sent.
    Opened,
    /// The server signalled that new messages are waiting.
    NewData,
    /// Keep-alive heartbeat.
    Heartbeat,
    /// An unrecognized frame; policy decides whether this is fatal.
    Unknown(String),
    /// The connection ended, normally or otherwise.
    Closed { reason: String },
}

/// Handle for a single connection attempt.
pub struct StreamHandle {
    /// Inbound session events.
    pub events: mpsc::Receiver<StreamEvent>,
    join_handle: tokio::task::JoinHandle<Result<(), TransportError>>,
}

impl StreamHandle {
    /// Build a handle around an already-running session task.
    #[must_use]
    pub fn new(
        events: mpsc::Receiver<StreamEvent>,
        join_handle: tokio::task::JoinHandle<Result<(), TransportError>>,
    ) -> Self {
        Self { events, join_handle }
    }

    /// Tear down the session task and its socket.
    ///
    /// Safe to call more than once; closing an already-closed session
    /// is a no-op.
    pub fn close(&self) {
        self.join_handle.abort();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// A source of push sessions. The concrete implementation dials the
/// Pushover websocket; tests substitute scripted event feeds.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one connection and return its event stream.
    async fn connect(&self) -> Result<StreamHandle, TransportError>;
}

/// Websocket transport against the real push endpoint.
pub struct PushTransport {
    url: String,
    device_id: String,
    secret: String,
}

impl PushTransport {
    /// Build a transport from validated settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            url: settings.push_url.clone(),
            device_id: settings.device_id.clone(),
            secret: settings.secret.clone(),
        }
    }
}

#[async_trait]
impl Transport for PushTransport {
    async fn connect(&self) -> Result<StreamHandle, TransportError> {
        info!(url = %self.url, "Connecting to push endpoint");
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;

        let (event_tx, event_rx) = mpsc::channel(64);
        let login = login_frame(&self.device_id, &self.secret);
        let join_handle = tokio::spawn(run_session(ws_stream, login, event_tx));

        Ok(StreamHandle::new(event_rx, join_handle))
    }
}

/// Drive one websocket session until it ends.
///
/// Sends the login frame first; nothing else is meaningful to the
/// server before it. Every inbound text or binary frame is parsed as a
/// control frame and forwarded as a [`StreamEvent`].
async fn run_session(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    login: String,
    event_tx: mpsc::Sender<StreamEvent>,
) -> Result<(), TransportError> {
    let (mut write, mut read) = ws_stream.split();

    write.send(WsMessage::Text(login.into())).await?;
    if event_tx.send(StreamEvent::Opened).await.is_err() {
        return Ok(());
    }
    info!("Websocket client connected, waiting for new messages");

    loop {
        match read.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if forward_frame(&event_tx, text.as_str()).await.is_err() {
                    return Ok(());
                }
            }
            Some(Ok(WsMessage::Binary(bytes))) => {
                // The server sends its single-character control frames
                // as binary.
                let text = String::from_utf8_lossy(&bytes).to_string();
                if forward_frame(&event_tx, &text).await.is_err() {
                    return Ok(());
                }
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "closed by server".to_string(),
                    |frame| frame.reason.to_string(),
                );
                info!(reason = %reason, "Websocket connection closed");
                let _ = event_tx.send(StreamEvent::Closed { reason }).await;
                return Ok(());
            }
            Some(Ok(_)) => {
                // Ping/pong handled by the protocol layer.
            }
            Some(Err(err)) => {
                warn!(error = %err, "Websocket error");
                let _ = event_tx
                    .send(StreamEvent::Closed {
                        reason: err.to_string(),
                    })
                    .await;
                return Err(err.into());
            }
            None => {
                let _ = event_tx
                    .send(StreamEvent::Closed {
                        reason: "connection ended".to_string(),
                    })
                    .await;
                return Ok(());
            }
        }
    }
}

async fn forward_frame(
    event_tx: &mpsc::Sender<StreamEvent>,
    raw: &str,
) -> Result<(), mpsc::error::SendError<StreamEvent>> {
    let event = match Frame::parse(raw) {
        Frame::NewData => {
            debug!("Got new message event");
            StreamEvent::NewData
        }
        Frame::Heartbeat => {
            debug!("Got heartbeat");
            StreamEvent::Heartbeat
        }
        Frame::Unknown(frame) => StreamEvent::Unknown(frame),
    };
    event_tx.send(event).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_handle() -> StreamHandle {
        let (_tx, rx) = mpsc::channel(1);
        let join_handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(())
        });
        StreamHandle::new(rx, join_handle)
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let handle = idle_handle();
        handle.close();
        handle.close();
    }

    #[tokio::test]
    async fn forward_frame_maps_control_frames() {
        let (tx, mut rx) = mpsc::channel(8);

        forward_frame(&tx, "!").await.unwrap();
        forward_frame(&tx, "#").await.unwrap();
        forward_frame(&tx, "??").await.unwrap();

        assert_eq!(rx.recv().await, Some(StreamEvent::NewData));
        assert_eq!(rx.recv().await, Some(StreamEvent::Heartbeat));
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Unknown("??".to_string()))
        );
    }

    #[tokio::test]
    async fn forward_frame_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert!(forward_frame(&tx, "!").await.is_err());
    }
}
