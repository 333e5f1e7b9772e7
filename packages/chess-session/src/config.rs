use chrono::Duration;

pub const GAMES_TABLE_VAR: &str = "GAMES_TABLE";
pub const PLAYERS_TABLE_VAR: &str = "PLAYERS_TABLE";
pub const MOVES_TABLE_VAR: &str = "MOVES_TABLE";
pub const WAITING_GAME_TTL_VAR: &str = "WAITING_GAME_TTL_DAYS";
pub const ARCHIVE_AFTER_VAR: &str = "FINISHED_GAME_ARCHIVE_DAYS";
pub const PURGE_AFTER_VAR: &str = "FINISHED_GAME_PURGE_DAYS";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue { variable: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(name) => {
                write!(f, "{} environment variable must be set", name)
            }
            ConfigError::InvalidValue { variable, value } => {
                write!(f, "Invalid value for {}: {}", variable, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// DynamoDB table names for the three persisted entities.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub games_table: String,
    pub players_table: String,
    pub moves_table: String,
}

impl TableConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
        };
        Ok(TableConfig {
            games_table: require(GAMES_TABLE_VAR)?,
            players_table: require(PLAYERS_TABLE_VAR)?,
            moves_table: require(MOVES_TABLE_VAR)?,
        })
    }
}

/// Ages after which the sweeper reaps games.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupPolicy {
    /// Waiting games older than this are deleted.
    pub waiting_ttl: Duration,
    /// Finished games untouched for this long are archived.
    pub archive_after: Duration,
    /// Finished games untouched for this long are deleted.
    pub purge_after: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        CleanupPolicy {
            waiting_ttl: Duration::days(7),
            archive_after: Duration::days(30),
            purge_after: Duration::days(60),
        }
    }
}

impl CleanupPolicy {
    /// Reads overrides in whole days; unset variables keep the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = CleanupPolicy::default();
        let days = |name: &str, default: Duration| match lookup(name) {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .map(|days| Duration::days(i64::from(days)))
                .map_err(|_| ConfigError::InvalidValue {
                    variable: name.to_string(),
                    value,
                }),
            None => Ok(default),
        };
        Ok(CleanupPolicy {
            waiting_ttl: days(WAITING_GAME_TTL_VAR, defaults.waiting_ttl)?,
            archive_after: days(ARCHIVE_AFTER_VAR, defaults.archive_after)?,
            purge_after: days(PURGE_AFTER_VAR, defaults.purge_after)?,
        })
    }
}
