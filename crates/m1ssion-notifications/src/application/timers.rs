//! Single-shot timers expressed as deadlines on the injected clock.
//!
//! Nothing here sleeps. Whoever drives the queue asks for the next deadline,
//! waits however it likes (a tokio sleep, a simulated clock), and then lets
//! the queue fire whatever is due.

use chrono::{DateTime, Utc};

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Retire the current minor event.
    AutoDismiss,
    /// Select the next event after a dismissal.
    Transition,
}

/// A timer that has come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    /// Which slot fired.
    pub kind: TimerKind,
    /// The deadline it was armed for. Follow-up timers are scheduled from
    /// here rather than from the moment the driver noticed.
    pub due_at: DateTime<Utc>,
}

/// The auto-dismiss and transition slots. Each holds at most one deadline;
/// arming a slot replaces whatever it held.
#[derive(Debug, Default, Clone)]
pub struct Timers {
    auto_dismiss: Option<DateTime<Utc>>,
    transition: Option<DateTime<Utc>>,
}

impl Timers {
    /// Arms `kind` to fire at `due_at`, replacing any earlier deadline.
    pub fn arm(&mut self, kind: TimerKind, due_at: DateTime<Utc>) {
        *self.slot_mut(kind) = Some(due_at);
    }

    /// Disarms `kind`. Returns whether it was armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        self.slot_mut(kind).take().is_some()
    }

    /// Disarms both slots.
    pub fn cancel_all(&mut self) {
        self.auto_dismiss = None;
        self.transition = None;
    }

    /// Deadline of `kind`, if armed.
    #[must_use]
    pub fn deadline(&self, kind: TimerKind) -> Option<DateTime<Utc>> {
        match kind {
            TimerKind::AutoDismiss => self.auto_dismiss,
            TimerKind::Transition => self.transition,
        }
    }

    /// Earliest armed deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.auto_dismiss, self.transition) {
            (Some(a), Some(t)) => Some(a.min(t)),
            (a, t) => a.or(t),
        }
    }

    /// Disarms and returns the earliest timer due at or before `now`.
    /// On a tie the auto-dismiss slot goes first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Option<DueTimer> {
        let candidates = [
            (TimerKind::AutoDismiss, self.auto_dismiss),
            (TimerKind::Transition, self.transition),
        ];
        let (kind, due_at) = candidates
            .into_iter()
            .filter_map(|(kind, due)| due.filter(|d| *d <= now).map(|d| (kind, d)))
            .min_by_key(|(_, due)| *due)?;
        *self.slot_mut(kind) = None;
        Some(DueTimer { kind, due_at })
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<DateTime<Utc>> {
        match kind {
            TimerKind::AutoDismiss => &mut self.auto_dismiss,
            TimerKind::Transition => &mut self.transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use m1ssion_test_support::test_epoch;

    fn at(ms: i64) -> DateTime<Utc> {
        test_epoch() + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn test_arming_replaces_previous_deadline() {
        let mut timers = Timers::default();

        timers.arm(TimerKind::AutoDismiss, at(3_000));
        timers.arm(TimerKind::AutoDismiss, at(5_000));

        assert_eq!(timers.deadline(TimerKind::AutoDismiss), Some(at(5_000)));
        assert_eq!(timers.take_due(at(4_000)), None);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut timers = Timers::default();
        timers.arm(TimerKind::AutoDismiss, at(3_000));

        assert!(timers.cancel(TimerKind::AutoDismiss));
        assert!(!timers.cancel(TimerKind::AutoDismiss));
        assert_eq!(timers.take_due(at(10_000)), None);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_take_due_returns_earliest_first() {
        // Arrange
        let mut timers = Timers::default();
        timers.arm(TimerKind::AutoDismiss, at(3_000));
        timers.arm(TimerKind::Transition, at(300));

        // Act
        let first = timers.take_due(at(5_000));
        let second = timers.take_due(at(5_000));
        let third = timers.take_due(at(5_000));

        // Assert
        assert_eq!(
            first,
            Some(DueTimer {
                kind: TimerKind::Transition,
                due_at: at(300)
            })
        );
        assert_eq!(
            second,
            Some(DueTimer {
                kind: TimerKind::AutoDismiss,
                due_at: at(3_000)
            })
        );
        assert_eq!(third, None);
    }

    #[test]
    fn test_deadline_is_inclusive() {
        let mut timers = Timers::default();
        timers.arm(TimerKind::Transition, at(300));

        assert_eq!(timers.take_due(at(299)), None);
        assert!(timers.take_due(at(300)).is_some());
    }
}
