//! Serializable replay configuration.
//!
//! A replay file wraps the engine configuration with the reference feature
//! settings and the replay inputs:
//!
//! ```toml
//! [engine.gates]
//! min_prob = 0.6
//!
//! [features]
//! min_calibration_bars = 100
//!
//! [replay]
//! instrument = "ES"
//! bars_path = "data/es_5m.csv"
//! preview = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use signalgate_core::config::{ConfigError, EngineConfig};
use signalgate_core::features::FeatureConfig;

/// Inputs and options for one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    pub instrument: String,
    /// Bar CSV; `None` means bars are supplied by the caller.
    pub bars_path: Option<PathBuf>,
    /// Precomputed feature CSV; `None` means use the reference builder.
    pub features_path: Option<PathBuf>,
    /// Run every bar through an intrabar preview before confirming it.
    pub preview: bool,
    /// Order quantity for the strategy surface.
    pub quantity: f64,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            instrument: "SYNTH".into(),
            bars_path: None,
            features_path: None,
            preview: false,
            quantity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub engine: EngineConfig,
    pub features: FeatureConfig,
    pub replay: ReplaySettings,
}

impl ReplayConfig {
    /// Default configuration for `instrument`.
    pub fn for_instrument(instrument: impl Into<String>) -> Self {
        Self {
            replay: ReplaySettings {
                instrument: instrument.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: ReplayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.features.validate()?;
        if self.replay.instrument.trim().is_empty() {
            return Err(ConfigError::Invalid("replay.instrument must not be empty".into()));
        }
        if !(self.replay.quantity.is_finite() && self.replay.quantity > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "replay.quantity",
                value: self.replay.quantity,
                expected: "> 0",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ReplayConfig::from_toml("").unwrap();
        assert_eq!(config, ReplayConfig::default());
        assert_eq!(config.replay.instrument, "SYNTH");
    }

    #[test]
    fn partial_tables_merge_with_defaults() {
        let config = ReplayConfig::from_toml(
            r#"
            [engine.gates]
            min_prob = 0.6

            [features]
            min_calibration_bars = 120

            [replay]
            instrument = "ES"
            bars_path = "data/es.csv"
            preview = true
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.gates.min_prob, 0.6);
        assert_eq!(config.engine.gates.rev_min_prob, 0.5);
        assert_eq!(config.features.min_calibration_bars, 120);
        assert_eq!(config.replay.bars_path, Some(PathBuf::from("data/es.csv")));
        assert!(config.replay.preview);
        assert_eq!(config.replay.quantity, 1.0);
    }

    #[test]
    fn engine_errors_surface() {
        let err = ReplayConfig::from_toml("[engine.gates]\nmin_prob = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "gates.min_prob", .. }));
    }

    #[test]
    fn rejects_zero_quantity() {
        let err = ReplayConfig::from_toml("[replay]\nquantity = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("replay.quantity"));
    }

    #[test]
    fn for_instrument_sets_name() {
        assert_eq!(ReplayConfig::for_instrument("NQ").replay.instrument, "NQ");
    }
}
