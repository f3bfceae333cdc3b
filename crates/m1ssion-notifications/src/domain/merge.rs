//! Merge policy: folding additive reward events that arrive close together.

use chrono::TimeDelta;
use serde_json::{Number, Value};

use super::events::{GameEvent, Payload};

/// Folds the payload of an incoming event into an existing one.
pub type MergeReducer = fn(existing: &mut Payload, incoming: &Payload);

/// Decides whether an incoming event collapses into an earlier one.
///
/// Matching looks only at the type (which must be on the allow-list) and at
/// how far apart the two timestamps are.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    window: TimeDelta,
}

impl MergePolicy {
    /// Creates a policy with the given merge window.
    #[must_use]
    pub fn new(window: TimeDelta) -> Self {
        Self { window }
    }

    /// Whether `incoming` should be folded into `existing`. The window
    /// applies in both directions, so an incoming event stamped slightly
    /// before `existing` still merges.
    #[must_use]
    pub fn can_merge(&self, existing: &GameEvent, incoming: &GameEvent) -> bool {
        existing.event_type == incoming.event_type
            && existing.event_type.is_mergeable()
            && (incoming.timestamp - existing.timestamp).abs() <= self.window
    }

    /// Folds `incoming` into `existing`, keeping the existing id and the
    /// later of the two timestamps. Returns `false` without touching
    /// `existing` when the policy does not allow the merge.
    pub fn merge_into(&self, existing: &mut GameEvent, incoming: &GameEvent) -> bool {
        if !self.can_merge(existing, incoming) {
            return false;
        }
        let Some(reducer) = existing.event_type.merge_reducer() else {
            return false;
        };
        reducer(&mut existing.payload, &incoming.payload);
        existing.timestamp = existing.timestamp.max(incoming.timestamp);
        true
    }
}

/// Reducer for events whose only additive field is `amount`.
pub fn sum_amount(existing: &mut Payload, incoming: &Payload) {
    sum_fields(existing, incoming, &["amount"]);
}

/// Reducer for accrual events, which carry both `amount` and `reward`.
pub fn sum_amount_and_reward(existing: &mut Payload, incoming: &Payload) {
    sum_fields(existing, incoming, &["amount", "reward"]);
}

/// Sums `fields` from `incoming` into `existing`. Other keys keep their
/// existing value; keys only the incoming payload has are copied over.
fn sum_fields(existing: &mut Payload, incoming: &Payload, fields: &[&str]) {
    for (key, value) in incoming {
        if fields.contains(&key.as_str()) {
            match existing.get_mut(key) {
                Some(current) => {
                    if let Some(sum) = add_numbers(current, value) {
                        *current = sum;
                    } else {
                        tracing::debug!(field = %key, "non-numeric merge field left unchanged");
                    }
                }
                None => {
                    existing.insert(key.clone(), value.clone());
                }
            }
        } else if !existing.contains_key(key) {
            existing.insert(key.clone(), value.clone());
        }
    }
}

/// Adds two JSON numbers, staying integral when both sides are integers.
fn add_numbers(left: &Value, right: &Value) -> Option<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Some(Value::Number(sum.into()));
        }
    }
    let sum = left.as_f64()? + right.as_f64()?;
    Number::from_f64(sum).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::GameEventType;
    use m1ssion_test_support::test_epoch;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn event_at(event_type: GameEventType, offset_ms: i64, body: Value) -> GameEvent {
        GameEvent::at(
            event_type,
            payload(body),
            test_epoch() + TimeDelta::milliseconds(offset_ms),
        )
    }

    fn policy() -> MergePolicy {
        MergePolicy::new(TimeDelta::milliseconds(1_000))
    }

    #[test]
    fn test_merge_sums_amount_and_takes_latest_timestamp() {
        // Arrange
        let mut existing = event_at(GameEventType::PeGained, 0, json!({ "amount": 5 }));
        let incoming = event_at(GameEventType::PeGained, 400, json!({ "amount": 7 }));
        let original_id = existing.id;

        // Act
        let merged = policy().merge_into(&mut existing, &incoming);

        // Assert
        assert!(merged);
        assert_eq!(existing.id, original_id);
        assert_eq!(existing.payload_i64("amount"), Some(12));
        assert_eq!(existing.timestamp, incoming.timestamp);
    }

    #[test]
    fn test_merge_window_is_inclusive() {
        let existing = event_at(GameEventType::M1uCredited, 0, json!({ "amount": 1 }));
        let at_edge = event_at(GameEventType::M1uCredited, 1_000, json!({ "amount": 1 }));
        let past_edge = event_at(GameEventType::M1uCredited, 1_001, json!({ "amount": 1 }));

        assert!(policy().can_merge(&existing, &at_edge));
        assert!(!policy().can_merge(&existing, &past_edge));
    }

    #[test]
    fn test_merging_an_older_event_keeps_the_later_timestamp() {
        // Arrange
        let mut existing = event_at(GameEventType::PeGained, 5_000, json!({ "amount": 5 }));
        let older = event_at(GameEventType::PeGained, 4_400, json!({ "amount": 7 }));
        let follow_up = event_at(GameEventType::PeGained, 5_900, json!({ "amount": 1 }));

        // Act
        let merged = policy().merge_into(&mut existing, &older);

        // Assert
        assert!(merged);
        assert_eq!(existing.payload_i64("amount"), Some(12));
        assert_eq!(existing.timestamp, test_epoch() + TimeDelta::milliseconds(5_000));
        assert!(policy().can_merge(&existing, &follow_up));
    }

    #[test]
    fn test_event_older_than_window_does_not_merge() {
        let mut existing = event_at(GameEventType::PeGained, 5_000, json!({ "amount": 5 }));
        let stale = event_at(GameEventType::PeGained, 0, json!({ "amount": 7 }));

        let merged = policy().merge_into(&mut existing, &stale);

        assert!(!merged);
        assert_eq!(existing.payload_i64("amount"), Some(5));
        assert_eq!(existing.timestamp, test_epoch() + TimeDelta::milliseconds(5_000));
    }

    #[test]
    fn test_different_types_never_merge() {
        let existing = event_at(GameEventType::PeGained, 0, json!({ "amount": 1 }));
        let incoming = event_at(GameEventType::M1uCredited, 10, json!({ "amount": 1 }));

        assert!(!policy().can_merge(&existing, &incoming));
    }

    #[test]
    fn test_non_additive_types_never_merge() {
        let mut existing = event_at(GameEventType::BattleWon, 0, json!({ "reward": 10 }));
        let incoming = event_at(GameEventType::BattleWon, 10, json!({ "reward": 10 }));

        let merged = policy().merge_into(&mut existing, &incoming);

        assert!(!merged);
        assert_eq!(existing.payload_i64("reward"), Some(10));
        assert_eq!(existing.timestamp, test_epoch());
    }

    #[test]
    fn test_accrual_reducer_sums_amount_and_reward() {
        let mut existing = event_at(
            GameEventType::RewardAccrued,
            0,
            json!({ "amount": 2, "reward": 10, "source": "daily" }),
        );
        let incoming = event_at(
            GameEventType::RewardAccrued,
            200,
            json!({ "amount": 3, "reward": 5, "source": "bonus", "multiplier": 2 }),
        );

        policy().merge_into(&mut existing, &incoming);

        assert_eq!(existing.payload_i64("amount"), Some(5));
        assert_eq!(existing.payload_i64("reward"), Some(15));
        assert_eq!(existing.payload["source"], json!("daily"));
        assert_eq!(existing.payload_i64("multiplier"), Some(2));
    }

    #[test]
    fn test_reducer_handles_floats_and_missing_fields() {
        let mut left = payload(json!({ "amount": 1.5 }));
        sum_amount(&mut left, &payload(json!({ "amount": 2 })));
        assert_eq!(left["amount"], json!(3.5));

        let mut empty = Payload::new();
        sum_amount(&mut empty, &payload(json!({ "amount": 4 })));
        assert_eq!(empty["amount"], json!(4));

        let mut text = payload(json!({ "amount": "lots" }));
        sum_amount(&mut text, &payload(json!({ "amount": 4 })));
        assert_eq!(text["amount"], json!("lots"));
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let mut left = payload(json!({ "amount": i64::MAX }));

        sum_amount(&mut left, &payload(json!({ "amount": 1 })));

        assert!(left["amount"].is_f64());
    }
}
