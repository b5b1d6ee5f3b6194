//! Engine configuration
//!
//! `EngineConfig` collects the knobs the caller sets per query run: how many
//! answers to pull, the seed of the rank-join side choice, and how many
//! relaxations per atom the plan compiler may use. It deserializes from JSON
//! with every field optional.

use crate::error::{QueryError, Result};
use serde::Deserialize;

/// Seed used when none is configured; fixed so runs are reproducible.
pub const DEFAULT_JOIN_SEED: u64 = 2;

/// Default number of answers to return
pub const DEFAULT_K: usize = 10;

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of top answers sought
    pub k: usize,
    /// Seed for the pseudo-random side choice in rank joins
    pub join_seed: u64,
    /// Maximum relaxations considered per relaxed atom (None = all)
    pub max_relaxations: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            join_seed: DEFAULT_JOIN_SEED,
            max_relaxations: None,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set k
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the rank-join seed
    pub fn with_join_seed(mut self, seed: u64) -> Self {
        self.join_seed = seed;
        self
    }

    /// Cap the relaxations per atom
    pub fn with_max_relaxations(mut self, max: usize) -> Self {
        self.max_relaxations = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(QueryError::InvalidConfig("k must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.k, DEFAULT_K);
        assert_eq!(config.join_seed, DEFAULT_JOIN_SEED);
        assert_eq!(config.max_relaxations, None);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_json_str(r#"{"k": 25, "max_relaxations": 3}"#).unwrap();
        assert_eq!(config.k, 25);
        assert_eq!(config.join_seed, DEFAULT_JOIN_SEED);
        assert_eq!(config.max_relaxations, Some(3));
    }

    #[test]
    fn test_rejects_zero_k() {
        let err = EngineConfig::from_json_str(r#"{"k": 0}"#).unwrap_err();
        assert!(matches!(err, QueryError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = EngineConfig::from_json_str(r#"{"kk": 3}"#).unwrap_err();
        assert!(matches!(err, QueryError::InvalidConfig(_)));
    }
}
