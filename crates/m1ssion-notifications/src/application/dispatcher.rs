//! Observer registry: tells subscribers whenever the displayed event changes.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::events::GameEvent;

/// Failure reported by a subscriber. Logged, never propagated.
#[derive(Debug, Error)]
#[error("subscriber failed: {0}")]
pub struct SubscriberError(pub String);

/// Something that wants to know which event is on screen.
pub trait Subscriber: Send {
    /// Called with the new current event, or `None` when nothing is shown.
    ///
    /// # Errors
    ///
    /// Any error is logged by the registry and otherwise ignored.
    fn notify(&mut self, current: Option<&GameEvent>) -> Result<(), SubscriberError>;
}

impl<F> Subscriber for F
where
    F: FnMut(Option<&GameEvent>) -> Result<(), SubscriberError> + Send,
{
    fn notify(&mut self, current: Option<&GameEvent>) -> Result<(), SubscriberError> {
        self(current)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of subscribers.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Box<dyn Subscriber>)>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("next_id", &self.next_id)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ObserverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subscriber` and immediately hands it `current`, so it starts in
    /// sync with whatever is already displayed.
    pub fn subscribe(
        &mut self,
        mut subscriber: Box<dyn Subscriber>,
        current: Option<&GameEvent>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        deliver(id, subscriber.as_mut(), current);
        self.subscribers.push((id, subscriber));
        tracing::debug!(subscription_id = %id, "subscriber added");
        id
    }

    /// Removes a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        let removed = self.subscribers.len() != before;
        if removed {
            tracing::debug!(subscription_id = %id, "subscriber removed");
        }
        removed
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Delivers `current` to every subscriber in subscription order. A
    /// failing or panicking subscriber does not stop delivery to the rest.
    pub fn notify_all(&mut self, current: Option<&GameEvent>) {
        for (id, subscriber) in &mut self.subscribers {
            deliver(*id, subscriber.as_mut(), current);
        }
    }
}

fn deliver(id: SubscriptionId, subscriber: &mut dyn Subscriber, current: Option<&GameEvent>) {
    match catch_unwind(AssertUnwindSafe(|| subscriber.notify(current))) {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            tracing::warn!(subscription_id = %id, %error, "subscriber returned an error");
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            tracing::error!(subscription_id = %id, panic = %message, "subscriber panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{GameEventType, Payload};
    use m1ssion_test_support::test_epoch;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<Option<GameEventType>>>>;

    fn recorder(seen: &Seen) -> Box<dyn Subscriber> {
        let seen = Arc::clone(seen);
        Box::new(move |current: Option<&GameEvent>| -> Result<(), SubscriberError> {
            seen.lock().unwrap().push(current.map(|e| e.event_type));
            Ok(())
        })
    }

    fn level_up() -> GameEvent {
        GameEvent::at(GameEventType::LevelUp, Payload::new(), test_epoch())
    }

    #[test]
    fn test_subscribe_delivers_current_state_immediately() {
        // Arrange
        let mut registry = ObserverRegistry::new();
        let seen: Seen = Arc::default();
        let event = level_up();

        // Act
        registry.subscribe(recorder(&seen), Some(&event));

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![Some(GameEventType::LevelUp)]);
    }

    #[test]
    fn test_unsubscribed_callback_receives_nothing_more() {
        let mut registry = ObserverRegistry::new();
        let seen: Seen = Arc::default();
        let id = registry.subscribe(recorder(&seen), None);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.notify_all(Some(&level_up()));

        assert_eq!(*seen.lock().unwrap(), vec![None]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failing_and_panicking_subscribers_do_not_block_others() {
        // Arrange
        let mut registry = ObserverRegistry::new();
        let seen: Seen = Arc::default();
        registry.subscribe(
            Box::new(|current: Option<&GameEvent>| -> Result<(), SubscriberError> {
                match current {
                    Some(_) => Err(SubscriberError("render failed".to_owned())),
                    None => Ok(()),
                }
            }),
            None,
        );
        registry.subscribe(
            Box::new(|current: Option<&GameEvent>| -> Result<(), SubscriberError> {
                assert!(current.is_none(), "cannot render");
                Ok(())
            }),
            None,
        );
        registry.subscribe(recorder(&seen), None);

        // Act
        registry.notify_all(Some(&level_up()));

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some(GameEventType::LevelUp)]
        );
        assert_eq!(registry.len(), 3);
    }
}
