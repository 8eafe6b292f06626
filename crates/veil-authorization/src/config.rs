//! Engine configuration.

use std::time::Duration;

use thiserror::Error;

/// Default TTL for cached policy documents.
const DEFAULT_DOCUMENT_TTL_SECS: u64 = 300;

/// Default TTL for cached evaluation results. Kept much shorter than the
/// document TTL so a denial is never stuck cached long after a policy fix.
const DEFAULT_EVALUATION_TTL_SECS: u64 = 60;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Tunable knobs for the policy engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// TTL for policy document cache entries.
    pub document_cache_ttl: Duration,

    /// TTL for evaluation result cache entries.
    pub evaluation_cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_cache_ttl: Duration::from_secs(DEFAULT_DOCUMENT_TTL_SECS),
            evaluation_cache_ttl: Duration::from_secs(DEFAULT_EVALUATION_TTL_SECS),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// Lets tests supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let document_cache_ttl = read_secs(
            &reader,
            "POLICY_DOC_CACHE_TTL_SECS",
            DEFAULT_DOCUMENT_TTL_SECS,
        )?;
        let evaluation_cache_ttl = read_secs(
            &reader,
            "POLICY_EVAL_CACHE_TTL_SECS",
            DEFAULT_EVALUATION_TTL_SECS,
        )?;

        Ok(Self {
            document_cache_ttl,
            evaluation_cache_ttl,
        })
    }
}

fn read_secs<F>(reader: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    match reader(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
