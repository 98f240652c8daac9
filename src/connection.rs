use crate::error::{LightError, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Low-level WebSocket connection to one light
///
/// Replies are buffered by a background reader and picked up with the
/// non-blocking [`try_recv`](Self::try_recv). Dropping the connection closes
/// the socket.
pub struct Connection {
    ws_tx: mpsc::UnboundedSender<Message>,
    reply_rx: mpsc::UnboundedReceiver<String>,
    write_handle: JoinHandle<()>,
    read_handle: JoinHandle<()>,
}

impl Connection {
    /// Connect to a WebSocket URL, giving up after `connect_timeout`
    pub async fn connect(url: &str, connect_timeout: Duration) -> Result<Self> {
        tracing::debug!("Connecting to {}", url);

        let (ws_stream, _) = timeout(connect_timeout, connect_async(url))
            .await
            .map_err(|_| LightError::Timeout(format!("connecting to {url}")))??;
        let (mut write, mut read) = ws_stream.split();

        let (ws_tx, mut ws_rx) = mpsc::unbounded_channel::<Message>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<String>();

        // Forward outgoing messages to the socket
        let write_handle = tokio::spawn(async move {
            while let Some(msg) = ws_rx.recv().await {
                if let Err(e) = write.send(msg).await {
                    tracing::warn!("Failed to send message: {}", e);
                    break;
                }
            }
        });

        // Buffer incoming replies until the client polls for them
        let read_handle = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        tracing::debug!("Received: {}", text);
                        if reply_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("Light closed the connection");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        Ok(Self {
            ws_tx,
            reply_rx,
            write_handle,
            read_handle,
        })
    }

    /// Queue one text message
    pub fn send(&self, text: &str) -> Result<()> {
        tracing::debug!("Sending: {}", text);
        self.ws_tx
            .send(Message::Text(text.to_string()))
            .map_err(|_| LightError::ConnectionClosed)
    }

    /// Take the next reply if one has arrived
    ///
    /// Fails once the socket is closed and every buffered reply was read.
    pub fn try_recv(&mut self) -> Result<Option<String>> {
        match self.reply_rx.try_recv() {
            Ok(text) => Ok(Some(text)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LightError::ConnectionClosed),
        }
    }

    /// Throw away replies that arrived after their request was given up on
    pub fn discard_stale(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(text) = self.reply_rx.try_recv() {
            tracing::debug!("Discarding stale reply: {}", text);
            discarded += 1;
        }
        discarded
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.write_handle.abort();
        self.read_handle.abort();
    }
}
