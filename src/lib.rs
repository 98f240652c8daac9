//! Do-not-disturb status lights
//!
//! A controller on the desktop switches a logical availability state
//! (available / busy) and one or more networked lights show it. The lights
//! are the source of truth for the current state. This crate provides both
//! sides:
//!
//! - A light device: current color, idle auto-revert outside working hours,
//!   and a WebSocket server answering the text protocol
//! - A client per light with bounded polling, periodic reconnects and
//!   no-reply reporting instead of errors
//! - A coordinator that fans one command out to every configured light
//! - A controller dispatcher that runs light calls off the UI thread
//!
//! # Quick Start
//!
//! ```no_run
//! use dnd_light::{Coordinator, CoordinatorConfig, DeviceAddress};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lights = vec![DeviceAddress::parse("ws://192.168.1.20:5556")?];
//!     let coordinator = Coordinator::new(lights, CoordinatorConfig::default());
//!
//!     let toggle = coordinator.toggle().await;
//!     if !toggle.outcome.is_ok() {
//!         eprintln!("{}", toggle.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Running a light
//!
//! ```no_run
//! use dnd_light::{DeviceConfig, DeviceServer, LightDevice, TracingOutput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeviceConfig::default();
//!     let device = LightDevice::new(
//!         config.palette.clone(),
//!         config.idle_policy()?,
//!         config.brightness,
//!         Box::new(TracingOutput),
//!         chrono::Local::now().naive_local(),
//!     );
//!     let server = DeviceServer::bind(config.bind, device, config.poll_interval).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Protocol**: request/reply text vocabulary
//! - **Device**: light state and idle policy, driven by explicit timestamps
//! - **Server**: WebSocket front end and the single device loop
//! - **Connection**: low-level WebSocket socket with a reply inbox
//! - **Client**: retry, reconnect and no-reply discipline per light
//! - **Coordinator**: multi-light fan-out and state read
//! - **Controller**: menu actions and the UI capability

mod client;
mod config;
mod connection;
mod controller;
mod coordinator;
mod device;
mod error;
mod output;
mod protocol;
mod schedule;
mod server;
mod types;

// Public exports
pub use client::{DeviceClient, Exchange, NoReplyCause, RetryPolicy};
pub use config::{ControllerSettings, DeviceConfig, RetrySettings, DEFAULT_SETTINGS_FILE};
pub use controller::{Controller, ControllerHandle, MenuAction, UiHandle};
pub use coordinator::{
    Coordinator, CoordinatorConfig, DeviceFailure, FanOut, ReadOutcome, SetOutcome, Toggle,
};
pub use device::{DeviceState, IdlePolicy, LightDevice, AVAILABLE_COLOR, DEFAULT_IDLE_TIMEOUT};
pub use error::{LightError, Result};
pub use output::{LightOutput, RecordingOutput, TracingOutput};
pub use protocol::{Reply, Request};
pub use schedule::WorkSchedule;
pub use server::{Clock, DeviceServer, DEFAULT_POLL_INTERVAL, DEFAULT_PORT};
pub use types::{Availability, Color, DeviceAddress, Palette, Rgb};
