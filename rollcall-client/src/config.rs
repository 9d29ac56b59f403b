//! Configuration for GameClient.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! game_id = "maze-7"
//! player_id = "team-red"
//! join_timeout_ms = 2000
//! capacity = 4
//! ```

use rollcall_core::DEFAULT_CAPACITY;
use rollcall_types::{GameId, PlayerId};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default negotiation window (and join request TTL).
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Configuration for one participant in one game.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// The game to take part in.
    pub game_id: GameId,
    /// The local participant.
    pub player_id: PlayerId,
    /// How long to gather join replies (default: 2000ms).
    #[serde(
        rename = "join_timeout_ms",
        default = "default_join_timeout",
        deserialize_with = "deserialize_millis"
    )]
    pub join_timeout: Duration,
    /// Maximum number of participants (default: 4).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Events buffered per observer before the slowest one lags (default: 64).
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_join_timeout() -> Duration {
    DEFAULT_JOIN_TIMEOUT
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl GameConfig {
    /// Create a configuration with default timing and capacity.
    pub fn new(game_id: impl Into<GameId>, player_id: impl Into<PlayerId>) -> Self {
        Self {
            game_id: game_id.into(),
            player_id: player_id.into(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            capacity: DEFAULT_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the join negotiation window.
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Set the roster capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the event channel capacity.
    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or holds
    /// unusable values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path.to_path_buf())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, PathBuf::from("<inline>"))
    }

    fn parse(content: &str, path: PathBuf) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseError { path, source: e })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values can drive a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if self.join_timeout.is_zero() {
            return Err(ConfigError::Invalid("join_timeout_ms must be positive".into()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be at least 1".into()));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn new_config_uses_defaults() {
        let config = GameConfig::new("maze", "alice");
        assert_eq!(config.join_timeout, Duration::from_millis(2000));
        assert_eq!(config.capacity, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder_pattern() {
        let config = GameConfig::new("maze", "alice")
            .with_join_timeout(Duration::from_millis(500))
            .with_capacity(2);

        assert_eq!(config.join_timeout, Duration::from_millis(500));
        assert_eq!(config.capacity, 2);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
game_id = "maze-7"
player_id = "team-red"
join_timeout_ms = 750
capacity = 3
"#;

        let config: GameConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.game_id, GameId::new("maze-7"));
        assert_eq!(config.player_id, PlayerId::new("team-red"));
        assert_eq!(config.join_timeout, Duration::from_millis(750));
        assert_eq!(config.capacity, 3);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let toml = r#"
game_id = "maze-7"
player_id = "team-red"
"#;

        let config: GameConfig = toml::from_str(toml).unwrap();
        assert_eq!(config, GameConfig::new("maze-7", "team-red"));
    }

    #[test]
    fn from_toml_str_validates() {
        let result = GameConfig::from_toml_str("game_id = \"g\"\nplayer_id = \"p\"\ncapacity = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let config = GameConfig::new("maze", "alice").with_capacity(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "game_id = \"g\"\nplayer_id = \"p\"\njoin_timeout_ms = 0").unwrap();

        let result = GameConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = GameConfig::from_file(Path::new("/nonexistent/rollcall.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "game_id = ").unwrap();

        let result = GameConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
