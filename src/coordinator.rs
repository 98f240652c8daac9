use crate::client::{DeviceClient, Exchange, RetryPolicy};
use crate::types::{Availability, Color, DeviceAddress};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What `set_all` does when a light fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanOut {
    /// Stop at the first failing light; later lights are not contacted
    #[default]
    FailFast,
    /// Contact every light, then report all failures
    BestEffort,
}

/// Coordinator behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub available_color: Color,
    pub busy_color: Color,
    pub fan_out: FanOut,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            available_color: Color::GREEN,
            busy_color: Color::RED,
            fan_out: FanOut::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// A light that did not accept a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFailure {
    pub address: DeviceAddress,
    pub exchange: Exchange,
}

/// Result of sending one color to every light
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// Every light replied `Success`
    Applied,
    /// No lights are configured; nothing was sent
    NotConfigured,
    /// At least one light failed; lights listed in configured order
    Failed(Vec<DeviceFailure>),
}

impl SetOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, SetOutcome::Applied)
    }

    /// Addresses of the lights that failed
    pub fn failed_addresses(&self) -> Vec<&DeviceAddress> {
        match self {
            SetOutcome::Failed(failures) => failures.iter().map(|f| &f.address).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for SetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOutcome::Applied => f.write_str("Color set"),
            SetOutcome::NotConfigured => f.write_str(NOT_CONFIGURED),
            SetOutcome::Failed(failures) => {
                let addresses: Vec<String> = failures
                    .iter()
                    .map(|failure| format!("{} ({})", failure.address, failure.exchange))
                    .collect();
                write!(f, "Failed to set color ({})", addresses.join(", "))
            }
        }
    }
}

/// Current state as reported by the first light
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Color(Color),
    NoReply(DeviceFailure),
    NotConfigured,
}

impl ReadOutcome {
    pub fn color(&self) -> Option<&Color> {
        match self {
            ReadOutcome::Color(color) => Some(color),
            _ => None,
        }
    }
}

/// Result of a toggle: the color chosen and how setting it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toggle {
    pub target: Color,
    pub outcome: SetOutcome,
}

const NOT_CONFIGURED: &str = "No light addresses configured";

/// Fans one logical command out to every configured light
///
/// Operations are serialized: a toggle racing a set from another task waits
/// for it to finish. Lights are always contacted in configured order.
pub struct Coordinator {
    clients: Mutex<Vec<DeviceClient>>,
    config: CoordinatorConfig,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(addresses: Vec<DeviceAddress>, config: CoordinatorConfig) -> Self {
        let cancel = CancellationToken::new();
        if addresses.is_empty() {
            tracing::warn!("{}", NOT_CONFIGURED);
        }
        let clients = addresses
            .into_iter()
            .map(|address| DeviceClient::new(address, config.retry, cancel.clone()))
            .collect();

        Self {
            clients: Mutex::new(clients),
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Number of configured lights
    pub async fn device_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Send `color` to every light
    pub async fn set_all(&self, color: &Color) -> SetOutcome {
        let mut clients = self.clients.lock().await;
        set_clients(&mut clients, color, self.config.fan_out).await
    }

    pub async fn set_available(&self) -> SetOutcome {
        self.set_all(&self.config.available_color).await
    }

    pub async fn set_busy(&self) -> SetOutcome {
        self.set_all(&self.config.busy_color).await
    }

    /// Read the state from the first light, assuming the others agree
    pub async fn read_state(&self) -> ReadOutcome {
        let mut clients = self.clients.lock().await;
        read_first(&mut clients).await
    }

    /// Classify a read against the configured available/busy colors
    pub fn availability(&self, read: &ReadOutcome) -> Availability {
        Availability::from_color(read.color(), &self.config.available_color, &self.config.busy_color)
    }

    /// Switch between available and busy
    ///
    /// Anything other than the available color (including no reply) counts
    /// as not available, so toggling then sets available.
    pub async fn toggle(&self) -> Toggle {
        let mut clients = self.clients.lock().await;
        let read = read_first(&mut clients).await;

        let target = if read.color() == Some(&self.config.available_color) {
            self.config.busy_color.clone()
        } else {
            self.config.available_color.clone()
        };
        let outcome = set_clients(&mut clients, &target, self.config.fan_out).await;

        Toggle { target, outcome }
    }

    /// Abort any in-flight exchange and make future ones fail immediately
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn set_clients(clients: &mut [DeviceClient], color: &Color, fan_out: FanOut) -> SetOutcome {
    if clients.is_empty() {
        return SetOutcome::NotConfigured;
    }

    let mut failures = Vec::new();
    for client in clients.iter_mut() {
        let exchange = client.set(color).await;
        if exchange.is_success() {
            continue;
        }

        tracing::warn!(address = %client.address(), color = %color, "failed to set color: {}", exchange);
        failures.push(DeviceFailure {
            address: client.address().clone(),
            exchange,
        });
        if fan_out == FanOut::FailFast {
            break;
        }
    }

    if failures.is_empty() {
        tracing::info!(color = %color, lights = clients.len(), "color set on all lights");
        SetOutcome::Applied
    } else {
        SetOutcome::Failed(failures)
    }
}

async fn read_first(clients: &mut [DeviceClient]) -> ReadOutcome {
    let Some(client) = clients.first_mut() else {
        return ReadOutcome::NotConfigured;
    };

    let exchange = client.read().await;
    match exchange.color() {
        Some(color) => ReadOutcome::Color(color.clone()),
        None => ReadOutcome::NoReply(DeviceFailure {
            address: client.address().clone(),
            exchange,
        }),
    }
}
