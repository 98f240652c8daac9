//! Light device process: serves the color protocol until interrupted.

use clap::Parser;
use dnd_light::{
    DeviceConfig, DeviceServer, LightDevice, TracingOutput, WorkSchedule, DEFAULT_PORT,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dnd-light", version, about = "Do-not-disturb light device")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "DND_BIND", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    bind: SocketAddr,

    /// Inactivity before the light turns itself off outside working hours
    #[arg(long, env = "DND_IDLE_TIMEOUT_SECS", default_value_t = 3600)]
    idle_timeout_secs: u64,

    /// Delay between two iterations of the device loop
    #[arg(long, env = "DND_POLL_INTERVAL_MS", default_value_t = 100)]
    poll_interval_ms: u64,

    /// First working hour (inclusive)
    #[arg(long, default_value_t = 8)]
    work_start_hour: u32,

    /// End of the working day (exclusive)
    #[arg(long, default_value_t = 18)]
    work_end_hour: u32,

    /// LED brightness, 0.0 to 1.0
    #[arg(long, default_value_t = 0.1)]
    brightness: f32,

    /// JSON file mapping extra color names to [r, g, b]
    #[arg(long, env = "DND_PALETTE")]
    palette: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = DeviceConfig {
        bind: args.bind,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        schedule: WorkSchedule::new(args.work_start_hour, args.work_end_hour)?,
        brightness: args.brightness,
        ..DeviceConfig::default()
    }
    .with_palette_file(args.palette)?;

    let device = LightDevice::new(
        config.palette.clone(),
        config.idle_policy()?,
        config.brightness,
        Box::new(TracingOutput),
        chrono::Local::now().naive_local(),
    );
    let server = DeviceServer::bind(config.bind, device, config.poll_interval).await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
        }
        shutdown.cancel();
    });

    server.run().await?;
    Ok(())
}
