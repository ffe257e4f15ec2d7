use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid daily_mission_count: {0}. Must be at least 1")]
    InvalidDailyMissionCount(usize),

    #[error("Invalid streak_milestones: {0}")]
    InvalidMilestones(String),

    #[error("Invalid referral_threshold: {0}. Must be at least 1")]
    InvalidReferralThreshold(u64),

    #[error("Invalid max_condition_depth: {0}. Must be at least 1")]
    InvalidConditionDepth(usize),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .questline/config.yaml (project config, created by init)
    /// 3. .questline/local.yaml (local overrides, optional)
    /// 4. Environment variables (QUESTLINE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".questline/config.yaml"))
            .merge(Yaml::file(".questline/local.yaml"))
            .merge(Env::prefixed("QUESTLINE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("QUESTLINE_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let rules = &config.rules;
        if rules.daily_mission_count == 0 {
            return Err(ConfigError::InvalidDailyMissionCount(rules.daily_mission_count));
        }
        if rules.streak_milestones.is_empty() {
            return Err(ConfigError::InvalidMilestones("list cannot be empty".to_string()));
        }
        if rules.streak_milestones.contains(&0) {
            return Err(ConfigError::InvalidMilestones("milestones must be positive".to_string()));
        }
        if rules.streak_milestones.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::InvalidMilestones(
                "milestones must be strictly increasing".to_string(),
            ));
        }
        if rules.referral_threshold == 0 {
            return Err(ConfigError::InvalidReferralThreshold(rules.referral_threshold));
        }
        if rules.max_condition_depth == 0 {
            return Err(ConfigError::InvalidConditionDepth(rules.max_condition_depth));
        }

        Ok(())
    }
}
