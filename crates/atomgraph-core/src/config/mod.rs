//! Configuration management for atomgraph.

mod sub_configs;


use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::MAX_EMBEDDING_DIMENSION;

pub use sub_configs::{
    AtomsConfig, EmbeddingConfig, IndexConfig, LandmarkBootstrap, LoggingConfig,
    ProjectionConfig, SearchConfig, StorageConfig,
};

/// Environment variable selecting the environment-specific config file.
pub const ENV_SELECTOR: &str = "ATOMGRAPH_ENV";

/// Prefix of environment variable overrides (`ATOMGRAPH__SEARCH__MIN_CANDIDATES=32`).
pub const ENV_PREFIX: &str = "ATOMGRAPH";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub atoms: AtomsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order:
    /// 1. config/default.toml (base settings)
    /// 2. config/{ATOMGRAPH_ENV}.toml (environment-specific)
    /// 3. Environment variables with ATOMGRAPH__ prefix
    pub fn load() -> CoreResult<Self> {
        let env = std::env::var(ENV_SELECTOR).unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| CoreError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values. Fails on the first bad field.
    pub fn validate(&self) -> CoreResult<()> {
        if self.atoms.inline_budget < crate::codec::MIN_INLINE_BUDGET {
            return Err(CoreError::ConfigError(format!(
                "atoms.inline_budget must be at least {} (the digest must fit), got {}",
                crate::codec::MIN_INLINE_BUDGET,
                self.atoms.inline_budget
            )));
        }

        if self.atoms.reclaim_batch_size == 0 {
            return Err(CoreError::ConfigError(
                "atoms.reclaim_batch_size must be greater than 0".into(),
            ));
        }

        if self.embedding.dimension == 0 || self.embedding.dimension > MAX_EMBEDDING_DIMENSION {
            return Err(CoreError::ConfigError(format!(
                "embedding.dimension must be in 1..={}, got {}",
                MAX_EMBEDDING_DIMENSION, self.embedding.dimension
            )));
        }

        if self.embedding.padded_dimension < self.embedding.dimension {
            return Err(CoreError::ConfigError(format!(
                "embedding.padded_dimension ({}) must be >= embedding.dimension ({})",
                self.embedding.padded_dimension, self.embedding.dimension
            )));
        }

        if self.embedding.padded_dimension > MAX_EMBEDDING_DIMENSION {
            return Err(CoreError::ConfigError(format!(
                "embedding.padded_dimension must be <= {}, got {}",
                MAX_EMBEDDING_DIMENSION, self.embedding.padded_dimension
            )));
        }

        if !(self.projection.scale.is_finite() && self.projection.scale > 0.0) {
            return Err(CoreError::ConfigError(
                "projection.scale must be a positive finite number".into(),
            ));
        }

        if !(self.projection.coarse_quantum.is_finite() && self.projection.coarse_quantum > 0.0) {
            return Err(CoreError::ConfigError(
                "projection.coarse_quantum must be a positive finite number".into(),
            ));
        }

        if self.projection.fine_radii.is_empty() {
            return Err(CoreError::ConfigError(
                "projection.fine_radii must contain at least one radius".into(),
            ));
        }

        if self
            .projection
            .fine_radii
            .iter()
            .any(|r| !(r.is_finite() && *r > 0.0))
        {
            return Err(CoreError::ConfigError(
                "projection.fine_radii must all be positive finite numbers".into(),
            ));
        }

        if self.projection.fine_directions == 0 {
            return Err(CoreError::ConfigError(
                "projection.fine_directions must be at least 1".into(),
            ));
        }

        if !(self.index.cell_size.is_finite() && self.index.cell_size > 0.0) {
            return Err(CoreError::ConfigError(
                "index.cell_size must be a positive finite number".into(),
            ));
        }

        if self.search.oversample_factor == 0 {
            return Err(CoreError::ConfigError(
                "search.oversample_factor must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.min_candidate_fraction) {
            return Err(CoreError::ConfigError(format!(
                "search.min_candidate_fraction must be in [0, 1], got {}",
                self.search.min_candidate_fraction
            )));
        }

        if !(self.search.radius_growth.is_finite() && self.search.radius_growth > 1.0) {
            return Err(CoreError::ConfigError(
                "search.radius_growth must be greater than 1".into(),
            ));
        }

        if !(self.search.initial_radius.is_finite() && self.search.initial_radius > 0.0) {
            return Err(CoreError::ConfigError(
                "search.initial_radius must be a positive finite number".into(),
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(CoreError::ConfigError(format!(
                    "logging.format must be one of pretty, compact, json; got {:?}",
                    other
                )))
            }
        }

        Ok(())
    }
}
