use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local config, created by hand or by tooling
pub const CONFIG_FILE: &str = ".mill/config.yaml";
/// Optional untracked overrides
pub const LOCAL_CONFIG_FILE: &str = ".mill/local.yaml";
pub const ENV_PREFIX: &str = "MILL_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_parallel: {0}. Must be at least 1")]
    InvalidMaxParallel(usize),

    #[error("Invalid {tier} risk limit: 0. Omit the limit or use at least 1")]
    ZeroRiskLimit { tier: &'static str },

    #[error("Invalid monitor.{field}: must be greater than 0")]
    ZeroInterval { field: &'static str },

    #[error("Invalid workspace.max_branch_len: {0}. Must be at least 16")]
    BranchLengthTooShort(usize),

    #[error("workspace.base_branch cannot be empty")]
    EmptyBaseBranch,

    #[error("Invalid ranking.{field}: {value}. Must be finite and non-negative")]
    InvalidWeight { field: &'static str, value: f64 },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mill/config.yaml
    /// 3. .mill/local.yaml
    /// 4. Environment variables (MILL_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`ConfigLoader::load`] with config files resolved under `root`.
    pub fn load_from(root: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(root.join(CONFIG_FILE)))
            .merge(Yaml::file(root.join(LOCAL_CONFIG_FILE)))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_parallel == 0 {
            return Err(ConfigError::InvalidMaxParallel(config.max_parallel));
        }

        let limits = &config.risk_limits;
        for (tier, limit) in [("low", limits.low), ("medium", limits.medium), ("high", limits.high)] {
            if limit == Some(0) {
                return Err(ConfigError::ZeroRiskLimit { tier });
            }
        }

        if config.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "poll_interval_secs",
            });
        }
        if config.monitor.query_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "query_timeout_secs",
            });
        }

        if config.workspace.max_branch_len < 16 {
            return Err(ConfigError::BranchLengthTooShort(config.workspace.max_branch_len));
        }
        if config.workspace.base_branch.trim().is_empty() {
            return Err(ConfigError::EmptyBaseBranch);
        }

        let ranking = &config.ranking;
        for (field, value) in [
            ("priority_weight", ranking.priority_weight),
            ("estimate_weight", ranking.estimate_weight),
            ("dependency_weight", ranking.dependency_weight),
            ("age_weight", ranking.age_weight),
            ("dependency_penalty", ranking.dependency_penalty),
            ("default_estimate", ranking.default_estimate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { field, value });
            }
        }
        if !ranking.age_horizon_days.is_finite() || ranking.age_horizon_days <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                field: "age_horizon_days",
                value: ranking.age_horizon_days,
            });
        }
        if ranking.actionable_states.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "ranking.actionable_states cannot be empty".to_string(),
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

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        for hook in &config.hooks {
            if hook.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Hook name cannot be empty".to_string(),
                ));
            }
            if hook.script.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "Hook '{}' script cannot be empty",
                    hook.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::HookConfig;
    use std::fs;

    fn write_config(root: &Path, file: &str, contents: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.max_parallel, 3);
        assert_eq!(config.monitor.poll_interval_secs, 30);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_hierarchical_merging() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            CONFIG_FILE,
            "max_parallel: 5\nlogging:\n  level: info\n  format: json\n",
        );
        write_config(dir.path(), LOCAL_CONFIG_FILE, "max_parallel: 7\nlogging:\n  level: debug\n");

        let config = temp_env::with_vars_unset(["MILL_MAX_PARALLEL", "MILL_LOGGING__LEVEL"], || {
            ConfigLoader::load_from(dir.path()).unwrap()
        });

        assert_eq!(config.max_parallel, 7, "Local override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json", "Base value should persist");
        assert_eq!(config.risk_limits.high, Some(1), "Defaults fill the rest");
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), CONFIG_FILE, "max_parallel: 5\nmonitor:\n  poll_interval_secs: 60\n");

        let config = temp_env::with_vars(
            [
                ("MILL_MAX_PARALLEL", Some("9")),
                ("MILL_MONITOR__POLL_INTERVAL_SECS", Some("10")),
            ],
            || ConfigLoader::load_from(dir.path()).unwrap(),
        );

        assert_eq!(config.max_parallel, 9);
        assert_eq!(config.monitor.poll_interval_secs, 10);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), CONFIG_FILE, "max_parallel: 0\n");

        let result = temp_env::with_vars_unset(["MILL_MAX_PARALLEL"], || {
            ConfigLoader::load_from(dir.path())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_zero_risk_limit() {
        let mut config = Config::default();
        config.risk_limits.medium = Some(0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroRiskLimit { tier: "medium" })
        ));
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.monitor.poll_interval_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroInterval { field: "poll_interval_secs" })
        ));
    }

    #[test]
    fn test_validate_short_branch_limit() {
        let mut config = Config::default();
        config.workspace.max_branch_len = 8;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::BranchLengthTooShort(8))
        ));
    }

    #[test]
    fn test_validate_negative_weight() {
        let mut config = Config::default();
        config.ranking.age_weight = -0.1;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeight { field: "age_weight", .. })
        ));

        let mut config = Config::default();
        config.ranking.priority_weight = f64::NAN;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_empty_hook_script() {
        let mut config = Config::default();
        config.hooks.push(HookConfig {
            name: "notify".into(),
            script: " ".into(),
            args: vec![],
            timeout_secs: 10,
        });
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }
}
