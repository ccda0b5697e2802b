//! Terminal rendering and input parsing.

use chrono::Local;
use tracing::debug;

use jukebox_types::events::{DisplayMessage, InboundFrame};
use jukebox_types::time::{format_display_time, full_format_display_time};

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Say(&'a str),
    /// Look up a persisted message by id.
    Show(i64),
    Logout,
    Quit,
    Empty,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Say(line);
        };

        let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
        match (name, arg.trim()) {
            ("quit" | "exit", _) => Self::Quit,
            ("logout", _) => Self::Logout,
            ("show", id) => id.parse().map(Self::Show).unwrap_or(Self::Unknown(line)),
            _ => Self::Unknown(line),
        }
    }
}

/// Chat line for an inbound frame; non-display envelopes are not printed.
pub fn render_frame(frame: &InboundFrame) -> Option<String> {
    match frame {
        InboundFrame::Display(message) => Some(render_message(message)),
        InboundFrame::Other(value) => {
            debug!("Ignoring frame: {}", value);
            None
        }
    }
}

pub fn render_message(message: &DisplayMessage) -> String {
    let sent = message.created_at.with_timezone(&Local);
    let badge = if message.sender.admin { " [admin]" } else { "" };
    format!(
        "[{}] {}{}: {}",
        format_display_time(&sent),
        message.sender.username,
        badge,
        message.content
    )
}

/// Multi-line detail view used by `/show`.
pub fn render_details(message: &DisplayMessage) -> String {
    let mut out = format!(
        "#{} by {} (tier {})\n  sent     {}",
        message.message_id,
        message.sender.username,
        message.sender.subscriber_tier,
        full_format_display_time(&message.created_at.with_timezone(&Local)),
    );
    if message.modified_at != message.created_at {
        out.push_str(&format!(
            "\n  edited   {}",
            full_format_display_time(&message.modified_at.with_timezone(&Local))
        ));
    }
    out.push_str(&format!("\n  {}", message.content));
    out
}
