//! The notification queue: pending events, the one displayed event, and the
//! timers that move events through.
//!
//! `QueueService` is an owned, single-threaded state machine. All mutation
//! happens synchronously inside the call that triggered it; the only
//! deferred work is the pair of timers in [`Timers`], which a driver fires
//! through [`QueueService::fire_due_timers`].

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use m1ssion_core::clock::Clock;
use m1ssion_core::error::DomainError;
use serde::Serialize;

use super::dispatcher::{ObserverRegistry, Subscriber, SubscriptionId};
use super::timers::{TimerKind, Timers};
use crate::config::QueueConfig;
use crate::domain::events::{EventId, GameEvent, GameEventType, Payload, Priority};
use crate::domain::merge::MergePolicy;

/// What `enqueue` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Appended to the pending queue under its own id.
    Queued(EventId),
    /// Folded into the last pending event, which has this id.
    MergedIntoPending(EventId),
    /// Folded into the displayed event, which has this id.
    MergedIntoCurrent(EventId),
}

/// Point-in-time copy of the queue state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    /// The displayed event.
    pub current: Option<GameEvent>,
    /// Events waiting, in arrival order.
    pub pending: Vec<GameEvent>,
    /// Whether the queue is between selecting and running dry.
    pub processing: bool,
}

impl QueueSnapshot {
    /// Nothing displayed, nothing waiting, nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty() && !self.processing
    }
}

/// Owns the pending events, the current event and its observers.
pub struct QueueService {
    config: QueueConfig,
    merge_policy: MergePolicy,
    clock: Arc<dyn Clock>,
    pending: VecDeque<GameEvent>,
    current: Option<GameEvent>,
    processing: bool,
    timers: Timers,
    observers: ObserverRegistry,
}

impl std::fmt::Debug for QueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueService")
            .field("config", &self.config)
            .field("pending", &self.pending.len())
            .field("current", &self.current.as_ref().map(|e| e.id))
            .field("processing", &self.processing)
            .field("timers", &self.timers)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl QueueService {
    /// Creates an empty queue.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if `config` fails validation.
    pub fn new(config: QueueConfig, clock: Arc<dyn Clock>) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            config,
            merge_policy: MergePolicy::new(config.merge_window()),
            clock,
            pending: VecDeque::new(),
            current: None,
            processing: false,
            timers: Timers::default(),
            observers: ObserverRegistry::new(),
        })
    }

    /// Current time on the queue's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Builds an event for `event_type` stamped with the current time and
    /// enqueues it.
    pub fn publish(&mut self, event_type: GameEventType, payload: Payload) -> EnqueueOutcome {
        let event = GameEvent::new(event_type, payload, self.clock.as_ref());
        self.enqueue(event)
    }

    /// Adds an event. It is folded into the last pending event when the
    /// merge policy allows, otherwise into the current event, and only then
    /// appended.
    pub fn enqueue(&mut self, event: GameEvent) -> EnqueueOutcome {
        if let Some(last) = self.pending.back_mut() {
            if self.merge_policy.merge_into(last, &event) {
                tracing::debug!(
                    event_id = %last.id,
                    event_type = %last.event_type,
                    "merged into pending event"
                );
                return EnqueueOutcome::MergedIntoPending(last.id);
            }
        }

        if let Some(current) = self.current.as_mut() {
            if self.merge_policy.merge_into(current, &event) {
                let id = current.id;
                tracing::debug!(
                    event_id = %id,
                    event_type = %current.event_type,
                    "merged into current event"
                );
                self.observers.notify_all(self.current.as_ref());
                return EnqueueOutcome::MergedIntoCurrent(id);
            }
        }

        let id = event.id;
        tracing::debug!(
            event_id = %id,
            event_type = %event.event_type,
            priority = ?event.priority,
            "event queued"
        );
        self.pending.push_back(event);
        if !self.processing {
            let now = self.clock.now();
            self.select_next(now);
        }
        EnqueueOutcome::Queued(id)
    }

    /// Takes the current event off screen. The next pending event is shown
    /// after the transition delay. Does nothing if no event is displayed.
    pub fn dismiss_current(&mut self) {
        if let Some(current) = &self.current {
            tracing::debug!(
                event_id = %current.id,
                age_ms = self.clock.elapsed_ms_since(current.timestamp),
                "dismiss requested"
            );
        }
        let now = self.clock.now();
        self.dismiss_at(now);
    }

    /// Stops the auto-dismiss countdown of the current event without
    /// dismissing it.
    pub fn cancel_auto_dismiss(&mut self) {
        if self.timers.cancel(TimerKind::AutoDismiss) {
            tracing::debug!("auto-dismiss cancelled");
        }
    }

    /// Drops everything: pending events, the current event and both timers.
    pub fn clear(&mut self) {
        let dropped = self.pending.len() + usize::from(self.current.is_some());
        self.pending.clear();
        self.current = None;
        self.processing = false;
        self.timers.cancel_all();
        tracing::info!(dropped, "notification queue cleared");
        self.observers.notify_all(None);
    }

    /// Registers `subscriber`; it is called right away with the current
    /// event.
    pub fn subscribe(&mut self, subscriber: Box<dyn Subscriber>) -> SubscriptionId {
        self.observers.subscribe(subscriber, self.current.as_ref())
    }

    /// Removes a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// The event on screen.
    #[must_use]
    pub fn current_event(&self) -> Option<&GameEvent> {
        self.current.as_ref()
    }

    /// Events waiting to be shown, in arrival order.
    pub fn pending(&self) -> impl Iterator<Item = &GameEvent> {
        self.pending.iter()
    }

    /// Number of waiting events.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether an event is displayed or about to be.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Nothing displayed, nothing waiting, nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty() && !self.processing
    }

    /// Copies the current state.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            pending: self.pending.iter().cloned().collect(),
            processing: self.processing,
        }
    }

    /// When the next timer comes due, if any is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// Fires every timer due at or before the clock's current time, in
    /// deadline order, including timers armed by the ones that fire.
    /// Returns how many fired.
    pub fn fire_due_timers(&mut self) -> usize {
        let now = self.clock.now();
        let mut fired = 0;
        while let Some(due) = self.timers.take_due(now) {
            fired += 1;
            match due.kind {
                TimerKind::AutoDismiss => {
                    tracing::debug!("auto-dismiss timer fired");
                    self.dismiss_at(due.due_at);
                }
                TimerKind::Transition => self.select_next(due.due_at),
            }
        }
        fired
    }

    fn dismiss_at(&mut self, at: DateTime<Utc>) {
        let Some(dismissed) = self.current.take() else {
            tracing::trace!("dismiss with nothing displayed ignored");
            return;
        };
        self.timers.cancel(TimerKind::AutoDismiss);
        tracing::debug!(
            event_id = %dismissed.id,
            event_type = %dismissed.event_type,
            "event dismissed"
        );
        self.observers.notify_all(None);
        self.timers
            .arm(TimerKind::Transition, at + self.config.transition_delay());
    }

    fn select_next(&mut self, at: DateTime<Utc>) {
        if self.current.is_some() {
            return;
        }
        let index = self
            .pending
            .iter()
            .position(|e| e.priority == Priority::Major)
            .unwrap_or(0);
        let Some(next) = self.pending.remove(index) else {
            self.processing = false;
            return;
        };

        self.processing = true;
        match self.config.display_duration(next.priority) {
            Some(duration) => self.timers.arm(TimerKind::AutoDismiss, at + duration),
            None => {
                self.timers.cancel(TimerKind::AutoDismiss);
            }
        }
        tracing::info!(
            event_id = %next.id,
            event_type = %next.event_type,
            priority = ?next.priority,
            remaining = self.pending.len(),
            "displaying event"
        );
        self.current = Some(next);
        self.observers.notify_all(self.current.as_ref());
    }
}
