use tokio::sync::mpsc;

use crate::types::GuardEvent;

/// Poll loop, ticker and user input all push here.
pub type EventSender = mpsc::Sender<GuardEvent>;

/// A line typed on the console, once understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Snooze,
    Cancel,
    Status,
    Help,
}

impl UserCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "snooze" => Some(Self::Snooze),
            "c" | "cancel" => Some(Self::Cancel),
            "status" | "st" => Some(Self::Status),
            "h" | "help" | "?" => Some(Self::Help),
            _ => None,
        }
    }

    /// The runtime event this command maps to, if any.
    pub fn event(self) -> Option<GuardEvent> {
        match self {
            Self::Snooze => Some(GuardEvent::Snooze),
            Self::Cancel => Some(GuardEvent::Cancel),
            Self::Status | Self::Help => None,
        }
    }
}

pub const HELP: &str = "commands: s|snooze  c|cancel  status  help";
