use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{Reply, Request};
use crate::types::{Color, DeviceAddress};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// How patiently a client waits for a light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between two polls for a reply
    pub poll_interval: Duration,
    /// Polls before giving up on a request
    pub max_attempts: u32,
    /// Force a reconnect after every this many failed polls (0 disables)
    pub reconnect_every: u32,
    /// Limit for opening the socket
    pub connect_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_attempts: 100,
            reconnect_every: 5,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Why a request got no reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoReplyCause {
    /// Attempt budget exhausted
    Timeout,
    /// Socket could not be opened or written
    Transport(String),
    /// Client shut down while waiting
    Cancelled,
}

impl fmt::Display for NoReplyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoReplyCause::Timeout => f.write_str("no reply"),
            NoReplyCause::Transport(e) => write!(f, "transport error: {e}"),
            NoReplyCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of one request/reply exchange
///
/// Transport problems are values here, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Reply(Reply),
    NoReply(NoReplyCause),
}

impl Exchange {
    /// True only for a `Success` reply
    pub fn is_success(&self) -> bool {
        matches!(self, Exchange::Reply(Reply::Success))
    }

    /// Color carried by the reply, if any
    pub fn color(&self) -> Option<&Color> {
        match self {
            Exchange::Reply(Reply::Color(color)) => Some(color),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exchange::Reply(reply) => write!(f, "replied \"{}\"", reply.as_wire()),
            Exchange::NoReply(cause) => cause.fmt(f),
        }
    }
}

/// Controller-side client for one light
///
/// The connection is strictly lockstep: one request in flight, then poll for
/// its reply. A connection that stops answering is torn down and reopened
/// every [`RetryPolicy::reconnect_every`] failed polls, which also clears a
/// socket left half-way through an exchange.
pub struct DeviceClient {
    address: DeviceAddress,
    policy: RetryPolicy,
    connection: Option<Connection>,
    failure_count: u32,
    reconnects: u32,
    cancel: CancellationToken,
}

impl DeviceClient {
    /// Create a client; the socket is opened on first use
    pub fn new(address: DeviceAddress, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            address,
            policy,
            connection: None,
            failure_count: 0,
            reconnects: 0,
            cancel,
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Consecutive exchanges that ended without a reply
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Forced reconnects since creation
    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Ask the light for its current color
    pub async fn read(&mut self) -> Exchange {
        self.send(&Request::Read).await
    }

    /// Ask the light to show a color
    pub async fn set(&mut self, color: &Color) -> Exchange {
        self.send(&Request::from(color)).await
    }

    /// Send one request and wait for its reply within the retry policy
    pub async fn send(&mut self, request: &Request) -> Exchange {
        let exchange = self.exchange(request.as_wire()).await;
        match &exchange {
            Exchange::Reply(_) => self.failure_count = 0,
            Exchange::NoReply(cause) => {
                self.failure_count += 1;
                tracing::warn!(
                    address = %self.address,
                    request = request.as_wire(),
                    failures = self.failure_count,
                    "light did not reply: {}",
                    cause
                );
            }
        }
        exchange
    }

    async fn exchange(&mut self, wire: &str) -> Exchange {
        if self.cancel.is_cancelled() {
            return Exchange::NoReply(NoReplyCause::Cancelled);
        }

        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => match self.open(self.policy.connect_timeout).await {
                Some(Ok(connection)) => connection,
                Some(Err(e)) => return Exchange::NoReply(NoReplyCause::Transport(e.to_string())),
                None => return Exchange::NoReply(NoReplyCause::Cancelled),
            },
        };
        let connection = self.connection.insert(connection);

        connection.discard_stale();
        if let Err(e) = connection.send(wire) {
            self.connection = None;
            return Exchange::NoReply(NoReplyCause::Transport(e.to_string()));
        }

        let mut attempts: u32 = 0;
        loop {
            if let Some(connection) = self.connection.as_mut() {
                match connection.try_recv() {
                    Ok(Some(text)) => return Exchange::Reply(Reply::parse(&text)),
                    Ok(None) => {}
                    Err(e) => {
                        // Keep polling; the next reconnect point may find the light back
                        tracing::debug!(address = %self.address, "connection lost: {}", e);
                        self.connection = None;
                    }
                }
            }

            attempts += 1;
            let reconnect_due =
                self.policy.reconnect_every > 0 && attempts % self.policy.reconnect_every == 0;

            if attempts >= self.policy.max_attempts {
                if reconnect_due {
                    // The next request opens the fresh socket
                    self.connection = None;
                    self.reconnects += 1;
                    tracing::info!(address = %self.address, attempt = attempts, "dropping connection to light");
                }
                return Exchange::NoReply(NoReplyCause::Timeout);
            }

            if reconnect_due {
                let remaining = self.policy.poll_interval * (self.policy.max_attempts - attempts);
                self.reconnect(wire, attempts, remaining).await;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Exchange::NoReply(NoReplyCause::Cancelled);
                }
                _ = sleep(self.policy.poll_interval) => {}
            }
        }
    }

    /// Open a socket within `limit`; `None` if the client was cancelled first
    async fn open(&self, limit: Duration) -> Option<Result<Connection>> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = Connection::connect(self.address.url(), limit) => Some(result),
        }
    }

    /// Drop the socket and open a fresh one, re-sending the pending request
    ///
    /// The connect is bounded by what is left of the attempt budget.
    async fn reconnect(&mut self, wire: &str, attempt: u32, remaining: Duration) {
        self.connection = None;
        self.reconnects += 1;
        tracing::info!(address = %self.address, attempt, "reconnecting to light");

        match self.open(remaining.min(self.policy.connect_timeout)).await {
            Some(Ok(connection)) => {
                if connection.send(wire).is_err() {
                    tracing::warn!(address = %self.address, "failed to resend after reconnect");
                    return;
                }
                self.connection = Some(connection);
            }
            Some(Err(e)) => {
                tracing::warn!(address = %self.address, attempt, "reconnect failed: {}", e);
            }
            None => {}
        }
    }
}
