use crate::error::{LightError, Result};
use crate::protocol::{FAILED, READ, SUCCESS};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A named light color
///
/// Names are matched exactly (case-sensitive) against a [`Palette`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(Cow<'static, str>);

impl Color {
    /// Idle color; every palette contains it
    pub const OFF: Color = Color(Cow::Borrowed("off"));
    pub const RED: Color = Color(Cow::Borrowed("red"));
    pub const GREEN: Color = Color(Cow::Borrowed("green"));
    pub const BLUE: Color = Color(Cow::Borrowed("blue"));

    /// Create a color from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Get the canonical wire name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// RGB triple shown on the light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(rgb: Rgb) -> Self {
        [rgb.r, rgb.g, rgb.b]
    }
}

/// The closed set of colors a light accepts
///
/// Always contains [`Color::OFF`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: BTreeMap<Color, Rgb>,
}

impl Palette {
    /// Build a palette from an explicit map
    ///
    /// Fails if the map does not define the idle color or uses a protocol
    /// keyword as a color name.
    pub fn new(colors: BTreeMap<Color, Rgb>) -> Result<Self> {
        if !colors.contains_key(&Color::OFF) {
            return Err(LightError::InvalidConfig(format!(
                "palette must define the idle color \"{}\"",
                Color::OFF
            )));
        }
        check_names(colors.keys())?;
        Ok(Self { colors })
    }

    /// Merge named colors over the current ones
    pub fn with_overrides(mut self, overrides: BTreeMap<Color, Rgb>) -> Result<Self> {
        check_names(overrides.keys())?;
        self.colors.extend(overrides);
        Ok(self)
    }

    /// Merge overrides read from a JSON file mapping names to `[r, g, b]`
    pub fn load_overrides(self, path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let overrides: BTreeMap<Color, Rgb> = serde_json::from_str(&text)?;
        self.with_overrides(overrides)
    }

    /// Look up a color by its wire name
    pub fn lookup(&self, name: &str) -> Option<(&Color, Rgb)> {
        self.colors
            .get_key_value(name)
            .map(|(color, rgb)| (color, *rgb))
    }

    /// Check whether a color is part of the palette
    pub fn contains(&self, color: &Color) -> bool {
        self.colors.contains_key(color)
    }

    /// Iterate over all colors in name order
    pub fn colors(&self) -> impl Iterator<Item = &Color> {
        self.colors.keys()
    }
}

// A color named like a request or result code could never be set or read back
fn check_names<'a>(names: impl IntoIterator<Item = &'a Color>) -> Result<()> {
    for color in names {
        if color.name().is_empty() || [READ, SUCCESS, FAILED].contains(&color.name()) {
            return Err(LightError::InvalidConfig(format!(
                "\"{color}\" cannot be used as a color name"
            )));
        }
    }
    Ok(())
}

impl Default for Palette {
    fn default() -> Self {
        let colors = BTreeMap::from([
            (Color::OFF, Rgb::new(0, 0, 0)),
            (Color::RED, Rgb::new(255, 0, 0)),
            (Color::GREEN, Rgb::new(0, 255, 0)),
            (Color::BLUE, Rgb::new(0, 0, 255)),
        ]);
        Self { colors }
    }
}

impl std::borrow::Borrow<str> for Color {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Network endpoint of a light device
///
/// Identity is the address string exactly as configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress {
    raw: String,
    url: String,
}

impl DeviceAddress {
    /// Parse `ws://host:port`, legacy `tcp://host:port`, or bare `host:port`
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let endpoint = raw
            .strip_prefix("ws://")
            .or_else(|| raw.strip_prefix("tcp://"))
            .unwrap_or(&raw)
            .trim_end_matches('/');

        let invalid = |why: &str| LightError::InvalidAddress(format!("{raw}: {why}"));

        if endpoint.contains("://") {
            return Err(invalid("unsupported scheme"));
        }
        let (host, port) = endpoint
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if host == "*" {
            return Err(invalid("wildcard host can only be bound, not connected to"));
        }
        port.parse::<u16>().map_err(|_| invalid("bad port"))?;

        let url = format!("ws://{endpoint}");
        Ok(Self { raw, url })
    }

    /// The address as configured
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// WebSocket URL used to connect
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Controller-side view of the busy/available state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Busy,
    Unknown,
}

impl Availability {
    /// Classify a color read from a device
    pub fn from_color(color: Option<&Color>, available: &Color, busy: &Color) -> Self {
        match color {
            Some(c) if c == available => Availability::Available,
            Some(c) if c == busy => Availability::Busy,
            _ => Availability::Unknown,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Availability::Available => "available",
            Availability::Busy => "busy",
            Availability::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_palette_has_idle_color() {
        let palette = Palette::default();
        assert!(palette.contains(&Color::OFF));
        assert_eq!(palette.lookup("red").map(|(_, rgb)| rgb), Some(Rgb::new(255, 0, 0)));
    }

    #[test]
    fn palette_lookup_is_case_sensitive() {
        let palette = Palette::default();
        assert!(palette.lookup("Red").is_none());
        assert!(palette.lookup("").is_none());
    }

    #[test]
    fn palette_without_off_is_rejected() {
        let colors = BTreeMap::from([(Color::RED, Rgb::new(255, 0, 0))]);
        assert!(matches!(Palette::new(colors), Err(LightError::InvalidConfig(_))));
    }

    #[test]
    fn palette_overrides_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette.json");
        std::fs::write(&path, r#"{"purple": [128, 0, 128], "red": [200, 0, 0]}"#).unwrap();

        let palette = Palette::default().load_overrides(&path).unwrap();
        assert_eq!(palette.lookup("purple").map(|(_, rgb)| rgb), Some(Rgb::new(128, 0, 128)));
        assert_eq!(palette.lookup("red").map(|(_, rgb)| rgb), Some(Rgb::new(200, 0, 0)));
        assert!(palette.contains(&Color::OFF));
    }

    #[test]
    fn protocol_keywords_are_not_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("palette.json");
        std::fs::write(&path, r#"{"Success": [0, 255, 0]}"#).unwrap();
        assert!(matches!(
            Palette::default().load_overrides(&path),
            Err(LightError::InvalidConfig(_))
        ));

        for name in ["READ", "Failed", ""] {
            let overrides = BTreeMap::from([(Color::new(name), Rgb::new(1, 2, 3))]);
            assert!(Palette::default().with_overrides(overrides).is_err(), "{name:?} accepted");
        }

        let colors = BTreeMap::from([
            (Color::OFF, Rgb::new(0, 0, 0)),
            (Color::new("READ"), Rgb::new(9, 9, 9)),
        ]);
        assert!(matches!(Palette::new(colors), Err(LightError::InvalidConfig(_))));
    }

    #[test]
    fn address_forms() {
        let ws = DeviceAddress::parse("ws://10.0.0.5:5556").unwrap();
        assert_eq!(ws.url(), "ws://10.0.0.5:5556");

        let legacy = DeviceAddress::parse("tcp://dndlight.local:5556").unwrap();
        assert_eq!(legacy.url(), "ws://dndlight.local:5556");
        assert_eq!(legacy.as_str(), "tcp://dndlight.local:5556");

        let bare = DeviceAddress::parse("127.0.0.1:9000").unwrap();
        assert_eq!(bare.url(), "ws://127.0.0.1:9000");
    }

    #[test]
    fn address_rejects_bad_input() {
        for raw in ["tcp://*:5556", "10.0.0.5", "http://10.0.0.5:80", ":5556", "host:notaport"] {
            assert!(DeviceAddress::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn availability_classification() {
        let green = Color::GREEN;
        let red = Color::RED;
        assert_eq!(Availability::from_color(Some(&green), &green, &red), Availability::Available);
        assert_eq!(Availability::from_color(Some(&red), &green, &red), Availability::Busy);
        assert_eq!(Availability::from_color(Some(&Color::OFF), &green, &red), Availability::Unknown);
        assert_eq!(Availability::from_color(None, &green, &red), Availability::Unknown);
    }
}
