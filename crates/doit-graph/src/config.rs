//! Store configuration: TOML file plus `DOIT_*` environment overrides.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{Result, StoreError};

pub const DEFAULT_ID_PREFIX: &str = "doit";
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_LIMIT: usize = 200;
pub const DEFAULT_CLOSED_AGE_HOURS: u64 = 168;
pub const DEFAULT_COMPACTION_BATCH: usize = 500;
/// About a century; keeps `2 * threshold` arithmetic in range.
pub const MAX_CLOSED_AGE_HOURS: u64 = 24 * 365 * 100;

pub const ENV_DB: &str = "DOIT_DB";
pub const ENV_POOL_SIZE: &str = "DOIT_POOL_SIZE";
pub const ENV_QUERY_TIMEOUT_MS: &str = "DOIT_QUERY_TIMEOUT_MS";
pub const ENV_ID_PREFIX: &str = "DOIT_ID_PREFIX";
pub const ENV_MAX_LIMIT: &str = "DOIT_MAX_LIMIT";
pub const ENV_LOG: &str = "DOIT_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub pool_size: usize,
    pub query_timeout_ms: u64,
    pub id_prefix: String,
    pub max_limit: usize,
    pub log_level: String,
    pub compaction: CompactionConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".doit/doit.db"),
            pool_size: DEFAULT_POOL_SIZE,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            max_limit: DEFAULT_MAX_LIMIT,
            log_level: "info".to_string(),
            compaction: CompactionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Closed-age threshold for level 1; level 2 fires at twice this.
    pub closed_age_hours: u64,
    pub batch_size: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            closed_age_hours: DEFAULT_CLOSED_AGE_HOURS,
            batch_size: DEFAULT_COMPACTION_BATCH,
        }
    }
}

impl CompactionConfig {
    pub fn threshold(&self) -> chrono::Duration {
        // Bounded by MAX_CLOSED_AGE_HOURS, so the cast is lossless.
        chrono::Duration::hours(self.closed_age_hours.min(MAX_CLOSED_AGE_HOURS) as i64)
    }
}

impl StoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(raw).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path` when given (a missing file is an error), then applies
    /// process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    StoreError::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                toml::from_str(&raw).map_err(|e| {
                    StoreError::Config(format!("failed to parse {}: {e}", path.display()))
                })?
            }
            None => StoreConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `DOIT_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = non_empty(lookup(ENV_DB)) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(raw) = non_empty(lookup(ENV_POOL_SIZE)) {
            self.pool_size = parse_env(ENV_POOL_SIZE, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(ENV_QUERY_TIMEOUT_MS)) {
            self.query_timeout_ms = parse_env(ENV_QUERY_TIMEOUT_MS, &raw)?;
        }
        if let Some(prefix) = non_empty(lookup(ENV_ID_PREFIX)) {
            self.id_prefix = prefix;
        }
        if let Some(raw) = non_empty(lookup(ENV_MAX_LIMIT)) {
            self.max_limit = parse_env(ENV_MAX_LIMIT, &raw)?;
        }
        if let Some(level) = non_empty(lookup(ENV_LOG)) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(StoreError::Config("pool_size must be at least 1".into()));
        }
        if self.query_timeout_ms == 0 {
            return Err(StoreError::Config(
                "query_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.max_limit == 0 {
            return Err(StoreError::Config("max_limit must be at least 1".into()));
        }
        if self.compaction.batch_size == 0 {
            return Err(StoreError::Config(
                "compaction.batch_size must be at least 1".into(),
            ));
        }
        validate_id_prefix(&self.id_prefix).map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Clamps a caller-requested page size to `max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => self.max_limit,
            Some(n) => n.min(self.max_limit),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| StoreError::Config(format!("{key} is not a valid number: `{raw}`")))
}

fn id_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("id prefix regex must compile"))
}

pub fn validate_id_prefix(prefix: &str) -> Result<()> {
    if id_prefix_re().is_match(prefix) {
        Ok(())
    } else {
        Err(StoreError::validation(format!(
            "id prefix must be 1-16 lowercase alphanumerics (got `{prefix}`)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.compaction.batch_size, 500);
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn nested_compaction_table_parses() {
        let config = StoreConfig::from_toml_str(
            r#"
            database_path = "/tmp/x.db"
            id_prefix = "ops"

            [compaction]
            closed_age_hours = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.id_prefix, "ops");
        assert_eq!(config.compaction.closed_age_hours, 24);
        assert_eq!(config.compaction.batch_size, 500);
        assert_eq!(config.compaction.threshold(), chrono::Duration::hours(24));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DB, "/data/doit.db"),
            (ENV_POOL_SIZE, "8"),
            (ENV_ID_PREFIX, "wk"),
            (ENV_LOG, " "),
        ]);
        let mut config = StoreConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/doit.db"));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.id_prefix, "wk");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn bad_numbers_and_prefixes_are_config_errors() {
        let mut config = StoreConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_MAX_LIMIT).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let err = StoreConfig::from_toml_str("id_prefix = \"Bad-Prefix\"").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));

        let err = StoreConfig::from_toml_str("pool_size = 0").unwrap_err();
        assert!(err.to_string().contains("pool_size"));
    }

    #[test]
    fn clamp_limit_caps_at_max() {
        let config = StoreConfig::default();
        assert_eq!(config.clamp_limit(None), 200);
        assert_eq!(config.clamp_limit(Some(0)), 200);
        assert_eq!(config.clamp_limit(Some(10)), 10);
        assert_eq!(config.clamp_limit(Some(5000)), 200);
    }
}
