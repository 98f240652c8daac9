//! Physical output of a light device.

use crate::types::{Color, Rgb};
use std::sync::{Arc, Mutex};

/// Sink that puts a color on the LEDs
pub trait LightOutput: Send + 'static {
    /// Show `rgb` on every pixel at `brightness` (0.0 to 1.0)
    fn show(&mut self, color: &Color, rgb: Rgb, brightness: f32) -> std::io::Result<()>;
}

/// Output that only logs, for machines without LEDs attached
#[derive(Debug, Default)]
pub struct TracingOutput;

impl LightOutput for TracingOutput {
    fn show(&mut self, color: &Color, rgb: Rgb, brightness: f32) -> std::io::Result<()> {
        tracing::info!(
            color = %color,
            r = rgb.r,
            g = rgb.g,
            b = rgb.b,
            brightness,
            "light output updated"
        );
        Ok(())
    }
}

/// Output that remembers every color shown
///
/// Clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    shown: Arc<Mutex<Vec<Color>>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colors shown so far, oldest first
    pub fn history(&self) -> Vec<Color> {
        self.shown.lock().map(|shown| shown.clone()).unwrap_or_default()
    }

    /// Most recently shown color
    pub fn last(&self) -> Option<Color> {
        self.shown.lock().ok().and_then(|shown| shown.last().cloned())
    }
}

impl LightOutput for RecordingOutput {
    fn show(&mut self, color: &Color, _rgb: Rgb, _brightness: f32) -> std::io::Result<()> {
        let mut shown = self
            .shown
            .lock()
            .map_err(|_| std::io::Error::other("recording output poisoned"))?;
        shown.push(color.clone());
        Ok(())
    }
}
