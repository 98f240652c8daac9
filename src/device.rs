use crate::error::{LightError, Result};
use crate::output::LightOutput;
use crate::protocol::{Reply, Request};
use crate::schedule::WorkSchedule;
use crate::types::{Color, Palette};
use chrono::NaiveDateTime;
use std::time::Duration;

/// Default inactivity before the light reverts outside working hours
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3600);

/// Color shown when the working day starts or the device boots in working hours
pub const AVAILABLE_COLOR: Color = Color::GREEN;

/// When an untouched light resets itself
#[derive(Debug, Clone, Copy)]
pub struct IdlePolicy {
    timeout: chrono::Duration,
    schedule: WorkSchedule,
}

impl IdlePolicy {
    pub fn new(timeout: Duration, schedule: WorkSchedule) -> Result<Self> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|_| LightError::InvalidConfig(format!("idle timeout {timeout:?} is too large")))?;
        Ok(Self { timeout, schedule })
    }

    pub fn schedule(&self) -> &WorkSchedule {
        &self.schedule
    }
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            timeout: chrono::Duration::seconds(3600),
            schedule: WorkSchedule::default(),
        }
    }
}

/// Mutable state of one light
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceState {
    pub current_color: Color,
    pub last_set_time: NaiveDateTime,
    /// Schedule result at the previous tick, used to spot the start of the working day
    pub was_worktime: bool,
}

/// A single light: current color, idle policy and LED output
///
/// All methods take the current time explicitly so the policy can be driven
/// by a real clock or by tests.
pub struct LightDevice {
    state: DeviceState,
    palette: Palette,
    policy: IdlePolicy,
    brightness: f32,
    output: Box<dyn LightOutput>,
}

impl LightDevice {
    /// Start a light: green during working hours, otherwise off
    pub fn new(
        palette: Palette,
        policy: IdlePolicy,
        brightness: f32,
        output: Box<dyn LightOutput>,
        now: NaiveDateTime,
    ) -> Self {
        let worktime = policy.schedule.is_worktime(now);
        let initial = if worktime && palette.contains(&AVAILABLE_COLOR) {
            AVAILABLE_COLOR
        } else {
            Color::OFF
        };

        let mut device = Self {
            state: DeviceState {
                current_color: Color::OFF,
                last_set_time: now,
                was_worktime: worktime,
            },
            palette,
            policy,
            brightness,
            output,
        };
        device.apply(initial.name(), now);
        tracing::info!(color = %device.state.current_color, worktime, "light started");
        device
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn current_color(&self) -> &Color {
        &self.state.current_color
    }

    /// Answer one protocol request
    ///
    /// Manual colors apply regardless of the schedule. Unknown names leave
    /// the state untouched.
    pub fn handle(&mut self, request: &Request, now: NaiveDateTime) -> Reply {
        match request {
            Request::Read => {
                tracing::debug!(color = %self.state.current_color, "light read");
                Reply::Color(self.state.current_color.clone())
            }
            Request::Set(name) => {
                if self.apply(name, now) {
                    tracing::info!(color = %name, "light set");
                    Reply::Success
                } else {
                    tracing::warn!(color = %name, "rejected unknown color");
                    Reply::Failed
                }
            }
        }
    }

    /// Run the idle policy once
    ///
    /// Returns the color the light switched to, if any.
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<Color> {
        let worktime = self.policy.schedule.is_worktime(now);
        let workday_started = worktime && !self.state.was_worktime;
        self.state.was_worktime = worktime;

        let idle = now.signed_duration_since(self.state.last_set_time) > self.policy.timeout;
        if !idle {
            return None;
        }

        if workday_started && self.palette.contains(&AVAILABLE_COLOR) {
            tracing::info!("workday started, turning on");
            self.apply(AVAILABLE_COLOR.name(), now);
            return Some(AVAILABLE_COLOR);
        }

        if !worktime {
            tracing::info!(previous = %self.state.current_color, "off hours and idle, turning off");
            self.apply(Color::OFF.name(), now);
            return Some(Color::OFF);
        }

        None
    }

    fn apply(&mut self, name: &str, now: NaiveDateTime) -> bool {
        let Some((color, rgb)) = self.palette.lookup(name) else {
            return false;
        };
        let color = color.clone();

        if let Err(e) = self.output.show(&color, rgb, self.brightness) {
            tracing::error!(color = %color, "failed to drive light output: {}", e);
        }

        self.state.current_color = color;
        self.state.last_set_time = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::RecordingOutput;
    use chrono::NaiveDate;

    // 2024-05-15 is a Wednesday, 2024-05-18 a Saturday.
    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    fn device(now: NaiveDateTime) -> (LightDevice, RecordingOutput) {
        let output = RecordingOutput::new();
        let device = LightDevice::new(
            Palette::default(),
            IdlePolicy::default(),
            0.1,
            Box::new(output.clone()),
            now,
        );
        (device, output)
    }

    #[test]
    fn starts_green_in_working_hours() {
        let (device, output) = device(at(15, 9, 0));
        assert_eq!(device.current_color(), &Color::GREEN);
        assert_eq!(output.last(), Some(Color::GREEN));
        assert_eq!(device.state().last_set_time, at(15, 9, 0));
    }

    #[test]
    fn starts_off_outside_working_hours() {
        let (device, _) = device(at(18, 9, 0));
        assert_eq!(device.current_color(), &Color::OFF);
    }

    #[test]
    fn set_then_read_every_color() {
        let (mut device, _) = device(at(15, 9, 0));
        let palette = Palette::default();
        for color in palette.colors() {
            let reply = device.handle(&Request::Set(color.name().into()), at(15, 9, 1));
            assert_eq!(reply, Reply::Success);
            assert_eq!(device.handle(&Request::Read, at(15, 9, 1)), Reply::Color(color.clone()));
        }
    }

    #[test]
    fn unknown_color_is_rejected_without_change() {
        let (mut device, _) = device(at(15, 9, 0));
        device.handle(&Request::Set("red".into()), at(15, 9, 5));
        let before = device.state().clone();

        for bad in ["purple", "RED", "", "Success"] {
            assert_eq!(device.handle(&Request::Set(bad.into()), at(15, 9, 10)), Reply::Failed);
        }
        assert_eq!(device.state(), &before);
    }

    #[test]
    fn repeated_set_is_idempotent() {
        let (mut device, _) = device(at(15, 9, 0));
        device.handle(&Request::Set("blue".into()), at(15, 9, 1));
        let once = device.handle(&Request::Read, at(15, 9, 1));
        device.handle(&Request::Set("blue".into()), at(15, 9, 1));
        assert_eq!(device.handle(&Request::Read, at(15, 9, 1)), once);
    }

    #[test]
    fn manual_set_applies_outside_working_hours() {
        let (mut device, _) = device(at(18, 22, 0));
        assert_eq!(device.handle(&Request::Set("red".into()), at(18, 22, 1)), Reply::Success);
        assert_eq!(device.current_color(), &Color::RED);
    }

    #[test]
    fn idle_reverts_outside_working_hours() {
        let (mut device, _) = device(at(15, 17, 0));
        device.handle(&Request::Set("red".into()), at(15, 17, 30));

        // 61 minutes later, after work
        assert_eq!(device.tick(at(15, 18, 31)), Some(Color::OFF));
        assert_eq!(device.current_color(), &Color::OFF);
        assert_eq!(device.state().last_set_time, at(15, 18, 31));

        // Suppressed until another timeout has elapsed
        assert_eq!(device.tick(at(15, 18, 32)), None);
    }

    #[test]
    fn idle_does_not_revert_in_working_hours() {
        let (mut device, _) = device(at(15, 8, 0));
        device.handle(&Request::Set("red".into()), at(15, 8, 30));
        assert_eq!(device.tick(at(15, 17, 59)), None);
        assert_eq!(device.current_color(), &Color::RED);
    }

    #[test]
    fn no_revert_before_timeout() {
        let (mut device, _) = device(at(15, 18, 0));
        device.handle(&Request::Set("red".into()), at(15, 18, 30));
        assert_eq!(device.tick(at(15, 19, 30)), None);
        assert_eq!(device.current_color(), &Color::RED);
    }

    #[test]
    fn workday_start_turns_light_on_when_idle() {
        let (mut device, _) = device(at(15, 20, 0));
        assert_eq!(device.tick(at(16, 7, 59)), Some(Color::OFF));
        assert_eq!(device.tick(at(16, 9, 0)), Some(Color::GREEN));
        assert_eq!(device.current_color(), &Color::GREEN);
    }

    #[test]
    fn workday_start_leaves_recent_manual_color() {
        let (mut device, _) = device(at(15, 20, 0));
        device.handle(&Request::Set("red".into()), at(16, 7, 45));
        assert_eq!(device.tick(at(16, 8, 0)), None);
        assert_eq!(device.current_color(), &Color::RED);
    }
}
