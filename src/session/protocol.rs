//! Command frame encoding and inbound classification

use std::str::FromStr;

use serde::Deserialize;
use serde_json::json;

/// Command carried by a text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Ping,
    /// Sent after the queue changed so clients refetch it
    QueueUpdated,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Ping => "ping",
            Command::QueueUpdated => "queue_updated",
        }
    }

    /// Only member playback commands are fanned out when received
    pub fn is_member_command(&self) -> bool {
        matches!(self, Command::Pause | Command::Resume)
    }
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "ping" => Ok(Command::Ping),
            "queue_updated" => Ok(Command::QueueUpdated),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport-independent frame read from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// What the session should do with an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Fan the command out to the channel
    Broadcast(Command),
    /// Transport keepalive traffic
    Control,
    /// Ignored and logged; the connection stays open
    Deviation(String),
    /// Peer closed the connection
    Close,
}

#[derive(Deserialize)]
struct RawCommandFrame {
    command: String,
}

/// Encode a command as `{"command":"<name>"}`
pub fn encode(command: Command) -> String {
    json!({ "command": command.as_str() }).to_string()
}

/// Decode a text payload, accepting the bare word or the JSON object form
pub fn decode(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        let raw: RawCommandFrame = serde_json::from_str(trimmed).ok()?;
        return raw.command.parse().ok();
    }
    trimmed.parse().ok()
}

pub fn classify(frame: Frame) -> Inbound {
    match frame {
        Frame::Text(text) => match decode(&text) {
            Some(command) if command.is_member_command() => Inbound::Broadcast(command),
            Some(command) => Inbound::Deviation(format!("command '{}' is server-only", command)),
            None => Inbound::Deviation(format!("unrecognized command frame ({} bytes)", text.len())),
        },
        Frame::Binary(data) => {
            Inbound::Deviation(format!("non-text frame ({} bytes)", data.len()))
        }
        Frame::Ping | Frame::Pong => Inbound::Control,
        Frame::Close => Inbound::Close,
    }
}
