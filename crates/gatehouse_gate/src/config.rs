//! Pipeline configuration.
//!
//! Sources in order of precedence (later overrides earlier): bundled
//! defaults, an optional `gatehouse.toml` in the working directory, then
//! `GATEHOUSE__`-prefixed environment variables.

use crate::validation::validator_from_patterns;
use crate::{ActionValidator, RateLimitConfig};
use config::{Config, Environment, File, FileFormat};
use gatehouse_core::EnvironmentMode;
use gatehouse_error::{GateError, GateErrorKind, GateResult};
use gatehouse_scan::{ScriptPatterns, SqlPatterns};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Scanner pattern overrides.
///
/// An absent set falls back to the shipped defaults; a present set replaces
/// the shipped one wholesale, so a deployment that wants "defaults plus one"
/// copies the defaults into its file and appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// SQL pattern set override
    #[serde(default)]
    pub sql: Option<SqlPatterns>,
    /// Script pattern set override
    #[serde(default)]
    pub script: Option<ScriptPatterns>,
}

/// Top-level configuration for the admission pipeline.
///
/// # Examples
///
/// ```
/// use gatehouse_gate::GateConfig;
/// use gatehouse_core::EnvironmentMode;
///
/// let config = GateConfig::default();
/// assert_eq!(config.environment, EnvironmentMode::Production);
/// assert_eq!(config.rate_limit.requests_per_minute, 60);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Confirmation posture of the deployment
    #[serde(default)]
    pub environment: EnvironmentMode,
    /// Per-caller rate ceilings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Scanner pattern overrides
    #[serde(default)]
    pub scan: ScanConfig,
}

impl GateConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> GateResult<Self> {
        debug!("Loading configuration from file");

        Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                GateError::new(GateErrorKind::Configuration(format!(
                    "failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                GateError::new(GateErrorKind::Configuration(format!(
                    "failed to parse configuration: {e}"
                )))
            })
    }

    /// Load configuration with precedence: environment > user file > bundled
    /// defaults.
    ///
    /// The user file (`./gatehouse.toml`) and environment variables are
    /// optional and silently skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a present source cannot be read or parsed.
    #[instrument]
    pub fn load() -> GateResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../gatehouse.toml");

        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::with_name("gatehouse").required(false))
            .add_source(Environment::with_prefix("GATEHOUSE").separator("__"))
            .build()
            .map_err(|e| {
                GateError::new(GateErrorKind::Configuration(format!(
                    "failed to build configuration: {e}"
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                GateError::new(GateErrorKind::Configuration(format!(
                    "failed to parse configuration: {e}"
                )))
            })
    }

    /// Compile a validator from the configured (or default) pattern sets.
    ///
    /// # Errors
    ///
    /// Returns [`GateErrorKind::InvalidPattern`] if an override pattern does
    /// not compile; the pipeline refuses to start rather than scan with a
    /// partial set.
    pub fn build_validator(&self) -> GateResult<ActionValidator> {
        validator_from_patterns(
            self.scan.sql.clone().unwrap_or_default(),
            self.scan.script.clone().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_defaults_parse() {
        let config: GateConfig =
            toml::from_str(include_str!("../gatehouse.toml")).unwrap();
        assert_eq!(config.environment, EnvironmentMode::Production);
        assert_eq!(config.rate_limit.burst, 10);
        assert!(config.scan.sql.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            environment = "development"

            [rate_limit]
            burst = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.environment, EnvironmentMode::Development);
        assert_eq!(config.rate_limit.burst, 25);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
    }

    #[test]
    fn test_sql_override_replaces_shipped_set() {
        let config: GateConfig = toml::from_str(
            r#"
            [scan.sql]
            blocked = [{ pattern = '\bdrop\s+table\b', description = "DROP TABLE" }]
            "#,
        )
        .unwrap();
        let validator = config.build_validator().unwrap();
        // The shipped TRUNCATE pattern is gone once the set is replaced.
        let sql = validator.sql_scanner();
        assert!(sql.scan("drop table users").has_blocked_patterns());
        assert!(!sql.scan("truncate users").has_blocked_patterns());
    }

    #[test]
    fn test_bad_override_pattern_is_rejected() {
        let config: GateConfig = toml::from_str(
            r#"
            [scan.script]
            blocked = [{ pattern = '(unclosed', description = "broken" }]
            "#,
        )
        .unwrap();
        assert!(config.build_validator().is_err());
    }
}
