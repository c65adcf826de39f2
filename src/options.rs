use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::errors::MorphError;

/// How the representative shape for a population is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusStrategy {
    /// Average the positions of all members at each perimeter fraction.
    Averaging,
    /// Duplicate the real member closest to the population median profile.
    Similarity,
}

/// Tunable parameters for a consensus analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub canonical_profile_length: usize,
    pub max_refiner_iterations: usize,
    pub min_neighbor_distance_factor: f64,
    pub max_neighbor_distance_factor: f64,
    pub consensus_strategy: ConsensusStrategy,
    /// Angle-profile measuring window as a fraction of the border length.
    pub profile_window_proportion: f64,
    /// Run the stochastic refiner after consensus construction.
    pub refine: bool,
    /// Seed for the refiner's random generator; random when unset.
    pub seed: Option<u64>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            canonical_profile_length: 1000,
            max_refiner_iterations: 50,
            min_neighbor_distance_factor: 0.5,
            max_neighbor_distance_factor: 1.2,
            consensus_strategy: ConsensusStrategy::Averaging,
            profile_window_proportion: 0.05,
            refine: false,
            seed: None,
        }
    }
}

impl AnalysisOptions {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let options: AnalysisOptions =
            toml::from_str(raw).context("parsing analysis options from TOML")?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading options file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), MorphError> {
        if self.canonical_profile_length == 0 {
            return Err(MorphError::EmptyProfile);
        }
        if !(self.min_neighbor_distance_factor > 0.0
            && self.min_neighbor_distance_factor < self.max_neighbor_distance_factor)
        {
            return Err(MorphError::MissingData(format!(
                "neighbor distance window [{}, {}] is not a valid range",
                self.min_neighbor_distance_factor, self.max_neighbor_distance_factor
            )));
        }
        if !(self.profile_window_proportion > 0.0 && self.profile_window_proportion <= 0.5) {
            return Err(MorphError::MissingData(format!(
                "profile window proportion {} must be in (0, 0.5]",
                self.profile_window_proportion
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AnalysisOptions::default();
        assert_eq!(options.canonical_profile_length, 1000);
        assert_eq!(options.max_refiner_iterations, 50);
        assert_eq!(options.consensus_strategy, ConsensusStrategy::Averaging);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str_overrides_defaults() {
        let options = AnalysisOptions::from_toml_str(
            r#"
            canonical_profile_length = 500
            consensus_strategy = "similarity"
            refine = true
            seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(options.canonical_profile_length, 500);
        assert_eq!(options.consensus_strategy, ConsensusStrategy::Similarity);
        assert!(options.refine);
        assert_eq!(options.seed, Some(42));
        // untouched fields keep their defaults
        assert_eq!(options.max_refiner_iterations, 50);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let result = AnalysisOptions::from_toml_str(
            r#"
            min_neighbor_distance_factor = 2.0
            max_neighbor_distance_factor = 1.0
            "#,
        );
        assert!(result.is_err());
    }
}
