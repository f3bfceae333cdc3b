//! Subscriber that reports displayed-event changes through tracing.

use m1ssion_notifications::application::dispatcher::{Subscriber, SubscriberError};
use m1ssion_notifications::domain::events::GameEvent;
use tracing::info;

/// Logs every change of the displayed event, standing in for the toast and
/// modal layers.
#[derive(Debug, Default)]
pub struct LoggingSubscriber {
    shown: u64,
}

impl LoggingSubscriber {
    /// Creates a subscriber that has shown nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many events this subscriber has seen become current.
    #[must_use]
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl Subscriber for LoggingSubscriber {
    fn notify(&mut self, current: Option<&GameEvent>) -> Result<(), SubscriberError> {
        match current {
            Some(event) => {
                self.shown += 1;
                let payload = serde_json::Value::Object(event.payload.clone());
                info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    presentation = ?event.priority.presentation(),
                    %payload,
                    "showing notification"
                );
            }
            None => info!("notification area cleared"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use m1ssion_notifications::domain::events::{GameEventType, Payload};
    use m1ssion_test_support::test_epoch;

    #[test]
    fn test_counts_only_displayed_events() {
        let mut subscriber = LoggingSubscriber::new();
        let event = GameEvent::at(GameEventType::LevelUp, Payload::new(), test_epoch());

        subscriber.notify(None).unwrap();
        subscriber.notify(Some(&event)).unwrap();
        subscriber.notify(None).unwrap();

        assert_eq!(subscriber.shown(), 1);
    }
}
