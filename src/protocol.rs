//! Text request/reply vocabulary spoken between controller and light.
//!
//! Each request and each reply is a single text message. The codec is
//! stateless; retrying and reconnecting belong to the client.

use crate::types::Color;

/// Request that reads the current color
pub const READ: &str = "READ";
/// Reply to an applied color
pub const SUCCESS: &str = "Success";
/// Reply to an unrecognized color
pub const FAILED: &str = "Failed";

/// A request sent to a light
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Ask for the current color name
    Read,
    /// Ask the light to show a color; the server decides whether the name is valid
    Set(String),
}

impl Request {
    /// Decode a request message
    pub fn parse(text: &str) -> Self {
        if text == READ {
            Request::Read
        } else {
            Request::Set(text.to_string())
        }
    }

    /// Encode for the wire
    pub fn as_wire(&self) -> &str {
        match self {
            Request::Read => READ,
            Request::Set(name) => name,
        }
    }
}

impl From<&Color> for Request {
    fn from(color: &Color) -> Self {
        Request::Set(color.name().to_string())
    }
}

/// A reply sent back by a light
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Color accepted and shown
    Success,
    /// Color name not recognized
    Failed,
    /// Current color, in answer to [`Request::Read`]
    Color(Color),
}

impl Reply {
    /// Decode a reply message
    ///
    /// Anything other than the two result words is a color name.
    pub fn parse(text: &str) -> Self {
        match text {
            SUCCESS => Reply::Success,
            FAILED => Reply::Failed,
            name => Reply::Color(Color::new(name)),
        }
    }

    /// Encode for the wire
    pub fn as_wire(&self) -> &str {
        match self {
            Reply::Success => SUCCESS,
            Reply::Failed => FAILED,
            Reply::Color(color) => color.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_exact() {
        assert_eq!(Request::parse("READ"), Request::Read);
        assert_eq!(Request::parse("read"), Request::Set("read".into()));
        assert_eq!(Request::parse(" READ"), Request::Set(" READ".into()));
    }

    #[test]
    fn anything_else_is_a_set() {
        assert_eq!(Request::parse("green"), Request::Set("green".into()));
        assert_eq!(Request::parse(""), Request::Set(String::new()));
        assert_eq!(Request::from(&Color::RED).as_wire(), "red");
    }

    #[test]
    fn replies() {
        assert_eq!(Reply::parse("Success"), Reply::Success);
        assert_eq!(Reply::parse("Failed"), Reply::Failed);
        assert_eq!(Reply::parse("green"), Reply::Color(Color::GREEN));
        assert_eq!(Reply::Color(Color::OFF).as_wire(), "off");
    }
}
