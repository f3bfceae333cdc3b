//! Scripted sequences of game occurrences, loaded from YAML.
//!
//! ```yaml
//! name: first session
//! config:
//!   minor_display_ms: 2000
//! steps:
//!   - at_ms: 0
//!     action: publish
//!     event_type: PE_GAINED
//!     payload: { amount: 5 }
//!   - at_ms: 4000
//!     action: dismiss
//! ```

use std::path::Path;
use std::time::Duration;

use m1ssion_core::error::DomainError;
use m1ssion_notifications::application::queue::QueueSnapshot;
use m1ssion_notifications::application::runtime::QueueHandle;
use m1ssion_notifications::config::QueueConfig;
use m1ssion_notifications::domain::events::{GameEventType, Payload};
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::AppError;

/// How often `play` polls the queue while waiting for it to drain.
pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A named list of timed steps, plus optional queue timings.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Label used in logs.
    #[serde(default)]
    pub name: Option<String>,
    /// Queue timings for this run. Replaces the environment configuration.
    #[serde(default)]
    pub config: Option<QueueConfig>,
    /// Steps, ordered by `at_ms`.
    pub steps: Vec<Step>,
}

/// One action at an offset from the start of playback.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Milliseconds after playback starts.
    pub at_ms: u64,
    /// What to do.
    #[serde(flatten)]
    pub action: Action,
}

/// What a step does to the queue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// A game occurrence happened.
    Publish {
        /// What happened.
        event_type: GameEventType,
        /// Type-specific data.
        #[serde(default)]
        payload: Payload,
    },
    /// The player closed the displayed event.
    Dismiss,
    /// The player is hovering over the displayed toast.
    CancelAutoDismiss,
    /// The session ended.
    Clear,
}

impl Action {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Publish { .. } => "publish",
            Self::Dismiss => "dismiss",
            Self::CancelAutoDismiss => "cancel_auto_dismiss",
            Self::Clear => "clear",
        }
    }
}

impl Scenario {
    /// Parses and validates a scenario.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Parse` for malformed YAML and `AppError::Domain`
    /// if validation fails.
    pub fn from_yaml_str(source: &str) -> Result<Self, AppError> {
        let scenario: Self = serde_yaml::from_str(source)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads, parses and validates a scenario file.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be read, otherwise as
    /// [`Scenario::from_yaml_str`].
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let source = std::fs::read_to_string(path).map_err(|source| AppError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Checks the scenario has steps in time order and sane timings.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an empty or out-of-order step
    /// list and `DomainError::Configuration` for bad timings.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.steps.is_empty() {
            return Err(DomainError::Validation(
                "scenario must have at least one step".to_owned(),
            ));
        }
        for (index, pair) in self.steps.windows(2).enumerate() {
            if pair[1].at_ms < pair[0].at_ms {
                return Err(DomainError::Validation(format!(
                    "step {} at {} ms comes before step {} at {} ms",
                    index + 1,
                    pair[1].at_ms,
                    index,
                    pair[0].at_ms
                )));
            }
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        Ok(())
    }

    /// Label for logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed scenario")
    }

    /// Queue timings to use: the scenario's own, or `fallback`.
    #[must_use]
    pub fn queue_config(&self, fallback: QueueConfig) -> QueueConfig {
        self.config.unwrap_or(fallback)
    }
}

/// Runs every step at its offset, then waits for the queue to drain or for
/// `settle_timeout` to pass. Returns the final queue state.
///
/// # Errors
///
/// Returns `DomainError::Unavailable` if the queue runtime stops while the
/// scenario is playing.
pub async fn play(
    scenario: &Scenario,
    handle: &QueueHandle,
    settle_timeout: Duration,
) -> Result<QueueSnapshot, DomainError> {
    info!(
        scenario = scenario.display_name(),
        steps = scenario.steps.len(),
        "playing scenario"
    );
    let start = Instant::now();
    for (index, step) in scenario.steps.iter().enumerate() {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!(index, at_ms = step.at_ms, action = step.action.name(), "scenario step");
        match &step.action {
            Action::Publish {
                event_type,
                payload,
            } => handle.publish(*event_type, payload.clone()),
            Action::Dismiss => handle.dismiss(),
            Action::CancelAutoDismiss => handle.cancel_auto_dismiss(),
            Action::Clear => handle.clear(),
        }
    }

    let deadline = Instant::now() + settle_timeout;
    loop {
        let snapshot = handle.snapshot().await?;
        if snapshot.is_idle() {
            info!(scenario = scenario.display_name(), "queue drained");
            return Ok(snapshot);
        }
        if Instant::now() >= deadline {
            warn!(
                scenario = scenario.display_name(),
                pending = snapshot.pending.len(),
                displayed = snapshot.current.is_some(),
                "queue still busy after settle timeout"
            );
            return Ok(snapshot);
        }
        tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
name: sample
config:
  minor_display_ms: 2000
steps:
  - at_ms: 0
    action: publish
    event_type: PE_GAINED
    payload: { amount: 5 }
  - at_ms: 250
    action: publish
    event_type: LEVEL_UP
  - at_ms: 4000
    action: dismiss
";

    #[test]
    fn test_from_yaml_str_parses_steps_and_config() {
        // Act
        let scenario = Scenario::from_yaml_str(SAMPLE).unwrap();

        // Assert
        assert_eq!(scenario.display_name(), "sample");
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(
            scenario.queue_config(QueueConfig::default()).minor_display_ms,
            2_000
        );
        match &scenario.steps[0].action {
            Action::Publish {
                event_type,
                payload,
            } => {
                assert_eq!(*event_type, GameEventType::PeGained);
                assert_eq!(payload["amount"], serde_json::json!(5));
            }
            other => panic!("expected Publish, got {other:?}"),
        }
        assert_eq!(
            scenario.steps[1].action,
            Action::Publish {
                event_type: GameEventType::LevelUp,
                payload: Payload::new(),
            }
        );
        assert_eq!(scenario.steps[2].action, Action::Dismiss);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let source = "steps:\n  - at_ms: 0\n    action: publish\n    event_type: TREASURE_FOUND\n";

        let result = Scenario::from_yaml_str(source);

        assert!(matches!(result, Err(AppError::Parse(_))));
    }

    #[test]
    fn test_out_of_order_steps_are_rejected() {
        let source = "steps:\n  - at_ms: 500\n    action: dismiss\n  - at_ms: 100\n    action: clear\n";

        let result = Scenario::from_yaml_str(source);

        match result {
            Err(AppError::Domain(DomainError::Validation(msg))) => {
                assert!(msg.contains("100"));
            }
            other => panic!("expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_scenario_is_rejected() {
        let result = Scenario::from_yaml_str("steps: []\n");

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::Validation(_)))
        ));
    }

    #[test]
    fn test_missing_config_falls_back() {
        let scenario =
            Scenario::from_yaml_str("steps:\n  - at_ms: 0\n    action: clear\n").unwrap();

        assert_eq!(
            scenario.queue_config(QueueConfig::default()),
            QueueConfig::default()
        );
        assert_eq!(scenario.display_name(), "unnamed scenario");
    }
}
