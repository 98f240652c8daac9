use crate::device::LightDevice;
use crate::error::{LightError, Result};
use crate::protocol::{Reply, Request};
use chrono::{Local, NaiveDateTime};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::sleep;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

/// Default listening port of a light
pub const DEFAULT_PORT: u16 = 5556;

/// Default delay between two iterations of the device loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of the wall-clock time fed to the idle policy
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// A request waiting for the device loop
struct PendingRequest {
    request: Request,
    reply_tx: oneshot::Sender<Reply>,
}

/// Network front end of a light
///
/// Sessions only queue requests; a single loop owns the [`LightDevice`].
/// Each loop iteration runs the idle policy, answers every queued request,
/// then sleeps `poll_interval`. The sleep is what lets the idle check and
/// command handling share one task, so an idle revert can lag its threshold
/// by up to one interval.
pub struct DeviceServer {
    listener: TcpListener,
    device: LightDevice,
    poll_interval: Duration,
    clock: Clock,
    cancel: CancellationToken,
}

impl DeviceServer {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr, device: LightDevice, poll_interval: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            device,
            poll_interval,
            clock: local_now,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the local wall clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve until the shutdown token is cancelled
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            mut device,
            poll_interval,
            clock,
            cancel,
        } = self;

        let local_addr = listener.local_addr()?;
        tracing::info!("light listening on {}", local_addr);

        let (request_tx, mut request_rx) = mpsc::channel::<PendingRequest>(64);
        let accept_handle = tokio::spawn(accept_loop(listener, request_tx, cancel.clone()));

        loop {
            device.tick(clock());

            loop {
                match request_rx.try_recv() {
                    Ok(pending) => {
                        let reply = device.handle(&pending.request, clock());
                        // Session may have gone away while waiting
                        let _ = pending.reply_tx.send(reply);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        cancel.cancel();
                        break;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(poll_interval) => {}
            }
        }

        tracing::info!("light shutting down");
        let _ = accept_handle.await;
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    request_tx: mpsc::Sender<PendingRequest>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        let request_tx = request_tx.clone();
                        let cancel = cancel.child_token();
                        tokio::spawn(async move {
                            if let Err(e) = handle_session(stream, peer_addr, request_tx, cancel).await {
                                tracing::error!(%peer_addr, "session error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("accept error: {}", e);
                    }
                }
            }
        }
    }
}

/// Serve one controller connection: one reply per text request, in order
async fn handle_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    request_tx: mpsc::Sender<PendingRequest>,
    cancel: CancellationToken,
) -> Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();
    tracing::debug!(%peer_addr, "controller connected");

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                tracing::debug!(%peer_addr, "Received: {}", text);
                let (reply_tx, reply_rx) = oneshot::channel();
                request_tx
                    .send(PendingRequest {
                        request: Request::parse(&text),
                        reply_tx,
                    })
                    .await
                    .map_err(|_| LightError::ChannelError("device loop stopped".to_string()))?;

                let reply = reply_rx.await.map_err(|_| LightError::ConnectionClosed)?;
                tracing::debug!(%peer_addr, "Sending: {}", reply.as_wire());
                write.send(Message::Text(reply.as_wire().to_string())).await?;
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(%peer_addr, "ignoring binary frame");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e.into()),
        }
    }

    tracing::debug!(%peer_addr, "controller disconnected");
    Ok(())
}
