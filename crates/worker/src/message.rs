//! Control messages posted from the page to a worker instance.

/// Payload that asks a waiting instance to activate now.
pub const SKIP_WAITING: &str = "skipWaiting";

/// Recognised control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Stop waiting for open pages to close and activate immediately.
    SkipWaiting,
}

impl ControlMessage {
    /// Parse a message payload. Anything but the exact skip-waiting string
    /// is not a command.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        match payload.as_str() {
            Some(SKIP_WAITING) => Some(ControlMessage::SkipWaiting),
            _ => None,
        }
    }
}
