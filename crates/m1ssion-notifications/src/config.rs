//! Queue timing configuration.

use chrono::TimeDelta;
use m1ssion_core::error::DomainError;
use serde::{Deserialize, Serialize};

use crate::domain::events::Priority;

/// Upper bound for every configured duration (24 hours).
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1_000;

/// Environment variable for [`QueueConfig::merge_window_ms`].
pub const MERGE_WINDOW_ENV: &str = "M1SSION_MERGE_WINDOW_MS";
/// Environment variable for [`QueueConfig::minor_display_ms`].
pub const MINOR_DISPLAY_ENV: &str = "M1SSION_MINOR_DISPLAY_MS";
/// Environment variable for [`QueueConfig::major_display_ms`].
pub const MAJOR_DISPLAY_ENV: &str = "M1SSION_MAJOR_DISPLAY_MS";
/// Environment variable for [`QueueConfig::transition_delay_ms`].
pub const TRANSITION_DELAY_ENV: &str = "M1SSION_TRANSITION_DELAY_MS";

/// Timing knobs for the notification queue, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Same-type additive events closer than this collapse into one.
    pub merge_window_ms: u64,
    /// How long a minor event stays on screen.
    pub minor_display_ms: u64,
    /// How long a major event stays on screen; `0` means until dismissed.
    pub major_display_ms: u64,
    /// Pause between a dismissal and the next event being shown.
    pub transition_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            merge_window_ms: 1_000,
            minor_display_ms: 3_000,
            major_display_ms: 0,
            transition_delay_ms: 300,
        }
    }
}

impl QueueConfig {
    /// Reads overrides from the process environment. Unset variables keep
    /// their default.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if a variable is not a valid
    /// millisecond count or exceeds [`MAX_DURATION_MS`].
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` if a value is not a valid
    /// millisecond count or exceeds [`MAX_DURATION_MS`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, default: u64| -> Result<u64, DomainError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                    DomainError::Configuration(format!("{key} must be a millisecond count: {e}"))
                }),
            }
        };

        let config = Self {
            merge_window_ms: read(MERGE_WINDOW_ENV, defaults.merge_window_ms)?,
            minor_display_ms: read(MINOR_DISPLAY_ENV, defaults.minor_display_ms)?,
            major_display_ms: read(MAJOR_DISPLAY_ENV, defaults.major_display_ms)?,
            transition_delay_ms: read(TRANSITION_DELAY_ENV, defaults.transition_delay_ms)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every duration is within [`MAX_DURATION_MS`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("merge_window_ms", self.merge_window_ms),
            ("minor_display_ms", self.minor_display_ms),
            ("major_display_ms", self.major_display_ms),
            ("transition_delay_ms", self.transition_delay_ms),
        ];
        for (name, value) in fields {
            if value > MAX_DURATION_MS {
                return Err(DomainError::Configuration(format!(
                    "{name} must be at most {MAX_DURATION_MS}, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// The merge window.
    #[must_use]
    pub fn merge_window(&self) -> TimeDelta {
        millis(self.merge_window_ms)
    }

    /// The post-dismiss transition delay.
    #[must_use]
    pub fn transition_delay(&self) -> TimeDelta {
        millis(self.transition_delay_ms)
    }

    /// How long an event of `priority` is displayed before it is dismissed
    /// automatically, or `None` if it waits for the player.
    #[must_use]
    pub fn display_duration(&self, priority: Priority) -> Option<TimeDelta> {
        let ms = match priority {
            Priority::Minor => self.minor_display_ms,
            Priority::Major => self.major_display_ms,
        };
        (ms > 0).then(|| millis(ms))
    }
}

// Values are bounded by `validate`, so clamping never changes a valid config.
fn millis(ms: u64) -> TimeDelta {
    let clamped = i64::try_from(ms.min(MAX_DURATION_MS)).unwrap_or_default();
    TimeDelta::milliseconds(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_queue_timings() {
        let config = QueueConfig::default();

        assert_eq!(config.merge_window(), TimeDelta::milliseconds(1_000));
        assert_eq!(config.transition_delay(), TimeDelta::milliseconds(300));
        assert_eq!(
            config.display_duration(Priority::Minor),
            Some(TimeDelta::milliseconds(3_000))
        );
        assert_eq!(config.display_duration(Priority::Major), None);
    }

    #[test]
    fn test_from_lookup_without_variables_returns_defaults() {
        let config = QueueConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config, QueueConfig::default());
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        // Arrange
        let lookup = lookup_from(&[
            (MERGE_WINDOW_ENV, "250"),
            (MAJOR_DISPLAY_ENV, " 8000 "),
        ]);

        // Act
        let config = QueueConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.merge_window_ms, 250);
        assert_eq!(config.major_display_ms, 8_000);
        assert_eq!(config.minor_display_ms, 3_000);
        assert_eq!(
            config.display_duration(Priority::Major),
            Some(TimeDelta::milliseconds(8_000))
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = QueueConfig::from_lookup(lookup_from(&[(MINOR_DISPLAY_ENV, "soon")]));

        match result {
            Err(DomainError::Configuration(msg)) => assert!(msg.contains(MINOR_DISPLAY_ENV)),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_oversize_durations() {
        let config = QueueConfig {
            transition_delay_ms: MAX_DURATION_MS + 1,
            ..QueueConfig::default()
        };

        match config.validate() {
            Err(DomainError::Configuration(msg)) => assert!(msg.contains("transition_delay_ms")),
            other => panic!("expected Configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing_fields() {
        let config: QueueConfig =
            serde_json::from_value(serde_json::json!({ "minor_display_ms": 1500 })).unwrap();

        assert_eq!(config.minor_display_ms, 1_500);
        assert_eq!(config.merge_window_ms, 1_000);
    }
}
