//! Queue command abstractions.

use std::fmt;

use uuid::Uuid;

/// Who asked for a queue command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandOrigin {
    /// Raised by a gameplay system (rewards, battles, progression).
    Gameplay,
    /// Raised by the player through the notification UI.
    Player,
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gameplay => "gameplay",
            Self::Player => "player",
        })
    }
}

/// Something sent to the notification queue.
pub trait Command: Send + Sync + fmt::Debug {
    /// Dotted command name used in logs, e.g. `notifications.dismiss_current`.
    fn command_type(&self) -> &'static str;

    /// Ties log lines for one command together.
    fn correlation_id(&self) -> Uuid;

    /// Player-facing commands unless overridden.
    fn origin(&self) -> CommandOrigin {
        CommandOrigin::Player
    }
}
