//! Session configuration.
//!
//! All tunables for a game session live in [`GameConfig`]: the player mix,
//! the card geometry, and the timers that drive the dealer and the freeze
//! penalties. The config can be deserialized from a JSON file and overridden
//! field-by-field from the CLI.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tunables for one game session.
///
/// Timer semantics follow `turn_timeout_millis`:
/// - `> 0`: countdown mode; the round is reshuffled when the timer expires.
/// - `= 0`: elapsed mode; no reshuffle deadline, and the dealer keeps at
///   least one legal set on the grid at all times.
/// - `< 0`: no timer display and no reshuffle deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of human players (fed through `key_pressed`).
    pub human_players: usize,
    /// Number of computer players (each gets a bot driver thread).
    pub computer_players: usize,
    /// Options per card feature; also the cardinality of a legal set.
    pub feature_size: usize,
    /// Number of features encoded on each card.
    pub feature_count: usize,
    /// Cards actually dealt from. At most `feature_size ^ feature_count`;
    /// smaller decks are legal and useful for quick games.
    pub deck_size: usize,
    /// Number of grid slots.
    pub table_size: usize,
    /// Round timer in milliseconds; sign selects the timer regime.
    pub turn_timeout_millis: i64,
    /// Countdown threshold below which the UI shows a warning state.
    pub turn_timeout_warning_millis: u64,
    /// Freeze served after a legal set.
    pub point_freeze_millis: u64,
    /// Freeze served after an illegal set.
    pub penalty_freeze_millis: u64,
    /// Reveal pause before each card placement or removal.
    pub table_delay_millis: u64,
    /// Periodically log one legal set present on the grid.
    pub hints: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            human_players: 0,
            computer_players: 2,
            feature_size: 3,
            feature_count: 4,
            deck_size: 81,
            table_size: 12,
            turn_timeout_millis: 60_000,
            turn_timeout_warning_millis: 10_000,
            point_freeze_millis: 1_000,
            penalty_freeze_millis: 3_000,
            table_delay_millis: 100,
            hints: false,
        }
    }
}

impl GameConfig {
    /// Total number of player agents.
    #[must_use]
    pub fn players(&self) -> usize {
        self.human_players + self.computer_players
    }

    /// Size of the full card space, `feature_size ^ feature_count`.
    #[must_use]
    pub fn card_space(&self) -> usize {
        self.feature_size.saturating_pow(self.feature_count as u32)
    }

    /// Load a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// [`validate`](Self::validate).
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the knobs describe a playable session.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players() == 0 {
            return Err(ConfigError::Invalid("at least one player is required".into()));
        }
        if self.feature_size < 2 {
            return Err(ConfigError::Invalid("feature_size must be at least 2".into()));
        }
        if self.feature_count == 0 {
            return Err(ConfigError::Invalid("feature_count must be at least 1".into()));
        }
        if self.deck_size == 0 {
            return Err(ConfigError::Invalid("deck_size must be at least 1".into()));
        }
        if self.deck_size > self.card_space() {
            return Err(ConfigError::Invalid(format!(
                "deck_size {} exceeds the card space {}",
                self.deck_size,
                self.card_space()
            )));
        }
        if self.table_size < self.feature_size {
            return Err(ConfigError::Invalid(format!(
                "table_size {} cannot hold a set of {} cards",
                self.table_size, self.feature_size
            )));
        }
        Ok(())
    }
}

/// Error type for configuration loading and validation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Reading the config file failed.
    Io(String),
    /// The file contents were not valid JSON for [`GameConfig`].
    Parse(String),
    /// The knobs do not describe a playable session.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "failed to read config: {msg}"),
            Self::Parse(msg) => write!(f, "failed to parse config: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
