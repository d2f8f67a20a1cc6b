//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`], a task that owns one WebSocket connection.
//! This is a thin layer that only moves text frames; connection lifecycle
//! decisions (timeouts, backoff) remain in the Sans-IO [`crate::Client`].

use futures_util::{SinkExt, StreamExt};
use parley_proto::OutboundFrame;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Capacity of the outbound and inbound queues.
const QUEUE_DEPTH: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Reading or writing the socket failed.
    #[error("stream error: {0}")]
    Stream(String),
}

/// What happened on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// Text frame from the server.
    Frame(String),
    /// Server closed the connection or the stream ended.
    Closed(String),
    /// Connection failed.
    Failed(String),
}

/// Handle to a WebSocket connection task.
///
/// The task connects in the background and reports through `from_server`;
/// the first event is either [`TransportEvent::Opened`] or
/// [`TransportEvent::Failed`]. Dropping or stopping the handle aborts the
/// task, which also aborts an in-flight handshake.
pub struct ConnectedClient {
    /// Send text frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive connection events from the server.
    pub from_server: mpsc::Receiver<TransportEvent>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Queue a frame for sending. Returns `false` if it could not be queued.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        match frame.encode() {
            Ok(text) => self.to_server.try_send(text).is_ok(),
            Err(err) => {
                tracing::warn!(error = %err, "outbound frame encode failed");
                false
            },
        }
    }

    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Start connecting to `url` on the current tokio runtime.
pub fn spawn(url: String) -> ConnectedClient {
    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(QUEUE_DEPTH);
    let (from_server_tx, from_server_rx) = mpsc::channel::<TransportEvent>(QUEUE_DEPTH);

    let handle = tokio::spawn(async move {
        let event = match run_connection(&url, to_server_rx, &from_server_tx).await {
            Ok(reason) => TransportEvent::Closed(reason),
            Err(TransportError::Connection(reason)) => TransportEvent::Failed(reason),
            Err(TransportError::Stream(reason)) => TransportEvent::Closed(reason),
        };
        let _ = from_server_tx.send(event).await;
    });

    ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    }
}

/// Run the connection, bridging between channels and the socket. Returns
/// the close reason.
async fn run_connection(
    url: &str,
    mut to_server: mpsc::Receiver<String>,
    from_server: &mpsc::Sender<TransportEvent>,
) -> Result<String, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;
    tracing::debug!(%url, "websocket connected");

    if from_server.send(TransportEvent::Opened).await.is_err() {
        return Ok("handle dropped".to_string());
    }

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            outbound = to_server.recv() => {
                let Some(text) = outbound else {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok("handle dropped".to_string());
                };
                write
                    .send(WsMessage::Text(text.into()))
                    .await
                    .map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
            },
            inbound = read.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    if from_server.send(TransportEvent::Frame(text.as_str().to_string())).await.is_err() {
                        return Ok("handle dropped".to_string());
                    }
                },
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = write.send(WsMessage::Pong(data)).await;
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "closed by server".to_string(),
                        |f| f.reason.as_str().to_string(),
                    );
                    return Ok(reason);
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => return Err(TransportError::Stream(format!("read failed: {e}"))),
                None => return Ok("stream ended".to_string()),
            },
        }
    }
}
