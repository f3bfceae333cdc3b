//! Game event taxonomy and the event factory.

use std::fmt;

use chrono::{DateTime, Utc};
use m1ssion_core::clock::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::merge::{self, MergeReducer};

/// Type-specific data carried by an event (`amount`, `multiplier`, ...).
///
/// The queue does not validate payload contents; only the merge reducer of
/// a mergeable type reads the fields it sums.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Unique, time-ordered identifier of a game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Allocates a fresh identifier. UUID v7 values sort by creation order
    /// within the process.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed set of gameplay occurrences that can be surfaced to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEventType {
    /// Progress experience points were gained.
    PeGained,
    /// In-game currency was credited to the wallet.
    M1uCredited,
    /// A passive reward accrued.
    RewardAccrued,
    /// A clue was unlocked.
    ClueUnlocked,
    /// A daily streak was extended.
    StreakExtended,
    /// A new map area was unlocked.
    AreaUnlocked,
    /// The player reached a new level.
    LevelUp,
    /// The player won a battle.
    BattleWon,
    /// The player lost a battle.
    BattleLost,
    /// A mission milestone was reached.
    MilestoneReached,
}

impl GameEventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::PeGained,
        Self::M1uCredited,
        Self::RewardAccrued,
        Self::ClueUnlocked,
        Self::StreakExtended,
        Self::AreaUnlocked,
        Self::LevelUp,
        Self::BattleWon,
        Self::BattleLost,
        Self::MilestoneReached,
    ];

    /// Wire name of the type, as it appears in payload logs and scenarios.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeGained => "PE_GAINED",
            Self::M1uCredited => "M1U_CREDITED",
            Self::RewardAccrued => "REWARD_ACCRUED",
            Self::ClueUnlocked => "CLUE_UNLOCKED",
            Self::StreakExtended => "STREAK_EXTENDED",
            Self::AreaUnlocked => "AREA_UNLOCKED",
            Self::LevelUp => "LEVEL_UP",
            Self::BattleWon => "BATTLE_WON",
            Self::BattleLost => "BATTLE_LOST",
            Self::MilestoneReached => "MILESTONE_REACHED",
        }
    }

    /// Static type → priority table.
    #[must_use]
    pub fn priority(self) -> Priority {
        match self {
            Self::PeGained
            | Self::M1uCredited
            | Self::RewardAccrued
            | Self::ClueUnlocked
            | Self::StreakExtended => Priority::Minor,
            Self::AreaUnlocked
            | Self::LevelUp
            | Self::BattleWon
            | Self::BattleLost
            | Self::MilestoneReached => Priority::Major,
        }
    }

    /// Reducer used to fold a same-type event into this one, or `None` when
    /// the type must always be shown individually.
    #[must_use]
    pub fn merge_reducer(self) -> Option<MergeReducer> {
        match self {
            Self::PeGained | Self::M1uCredited => Some(merge::sum_amount as MergeReducer),
            Self::RewardAccrued => Some(merge::sum_amount_and_reward as MergeReducer),
            Self::ClueUnlocked
            | Self::StreakExtended
            | Self::AreaUnlocked
            | Self::LevelUp
            | Self::BattleWon
            | Self::BattleLost
            | Self::MilestoneReached => None,
        }
    }

    /// Whether events of this type are on the merge allow-list.
    #[must_use]
    pub fn is_mergeable(self) -> bool {
        self.merge_reducer().is_some()
    }
}

impl fmt::Display for GameEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display priority of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Expires on its own after the minor display duration.
    Minor,
    /// Stays until the player dismisses it.
    Major,
}

impl Priority {
    /// How the rendering layer is expected to present an event of this
    /// priority.
    #[must_use]
    pub fn presentation(self) -> Presentation {
        match self {
            Self::Minor => Presentation::Toast,
            Self::Major => Presentation::Modal,
        }
    }
}

/// Rendering hint derived from [`Priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    /// Transient, non-blocking toast.
    Toast,
    /// Blocking modal.
    Modal,
}

/// A notification waiting in, or displayed by, the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique event identifier.
    pub id: EventId,
    /// What happened.
    pub event_type: GameEventType,
    /// Type-specific data.
    pub payload: Payload,
    /// Resolved from `event_type` at creation.
    pub priority: Priority,
    /// Creation time, or the time of the latest event merged into this one.
    pub timestamp: DateTime<Utc>,
}

impl GameEvent {
    /// Builds an event stamped with the clock's current time.
    #[must_use]
    pub fn new(event_type: GameEventType, payload: Payload, clock: &dyn Clock) -> Self {
        Self::at(event_type, payload, clock.now())
    }

    /// Builds an event with an explicit timestamp.
    #[must_use]
    pub fn at(event_type: GameEventType, payload: Payload, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            payload,
            priority: event_type.priority(),
            timestamp,
        }
    }

    /// Reads an integer payload field.
    #[must_use]
    pub fn payload_i64(&self, field: &str) -> Option<i64> {
        self.payload.get(field).and_then(serde_json::Value::as_i64)
    }
}
