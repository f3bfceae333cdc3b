//! Commands accepted by the notification queue runtime.

use m1ssion_core::command::{Command, CommandOrigin};
use uuid::Uuid;

use super::events::{GameEventType, Payload};

/// Command to create an event and publish it to the queue.
#[derive(Debug, Clone)]
pub struct PublishEvent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// What happened.
    pub event_type: GameEventType,
    /// Type-specific data.
    pub payload: Payload,
}

impl PublishEvent {
    /// Creates a publish command with a fresh correlation ID.
    #[must_use]
    pub fn new(event_type: GameEventType, payload: Payload) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            event_type,
            payload,
        }
    }
}

impl Command for PublishEvent {
    fn command_type(&self) -> &'static str {
        "notifications.publish_event"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn origin(&self) -> CommandOrigin {
        CommandOrigin::Gameplay
    }
}

/// Command to dismiss the currently displayed event.
#[derive(Debug, Clone)]
pub struct DismissCurrent {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for DismissCurrent {
    fn command_type(&self) -> &'static str {
        "notifications.dismiss_current"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to stop the auto-dismiss timer without dismissing.
#[derive(Debug, Clone)]
pub struct CancelAutoDismiss {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for CancelAutoDismiss {
    fn command_type(&self) -> &'static str {
        "notifications.cancel_auto_dismiss"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to reset the queue to empty.
#[derive(Debug, Clone)]
pub struct ClearQueue {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for ClearQueue {
    fn command_type(&self) -> &'static str {
        "notifications.clear_queue"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn origin(&self) -> CommandOrigin {
        CommandOrigin::Gameplay
    }
}
