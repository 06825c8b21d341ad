//! Simulator Configuration
//!
//! A flat set of named options, loaded from JSON. Unknown keys are rejected.
//!

use super::error::*;
use super::error_model::*;
use super::lattice::*;
use super::mwpm_solver::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// linear lattice size `L`
    pub size: usize,
    #[serde(default = "simulator_default_configs::topology")]
    pub topology: Topology,
    /// `2d` for perfect measurements and `3d` for `L` rounds of faulty measurements
    #[serde(default = "simulator_default_configs::dimension")]
    pub dimension: MeasurementModel,
    #[serde(default)]
    pub p_x: f64,
    #[serde(default)]
    pub p_z: f64,
    #[serde(default)]
    pub p_erasure: f64,
    /// measurement error rate of the stars, valid only in `3d`
    #[serde(default)]
    pub pm_x: f64,
    /// measurement error rate of the plaquettes, valid only in `3d`
    #[serde(default)]
    pub pm_z: f64,
    /// simulate the phase-flip channel on plaquettes as well
    #[serde(default = "simulator_default_configs::track_dual")]
    pub track_dual: bool,
    #[serde(default)]
    pub solver: SolverType,
}

pub mod simulator_default_configs {
    use super::*;
    pub fn topology() -> Topology {
        Topology::Toric
    }
    pub fn dimension() -> MeasurementModel {
        MeasurementModel::Perfect
    }
    pub fn track_dual() -> bool {
        true
    }
}

impl SimulatorConfig {
    /// default options for a lattice of the given size, without any error
    pub fn new(size: usize) -> Self {
        Self {
            size,
            topology: simulator_default_configs::topology(),
            dimension: simulator_default_configs::dimension(),
            p_x: 0.,
            p_z: 0.,
            p_erasure: 0.,
            pm_x: 0.,
            pm_z: 0.,
            track_dual: simulator_default_configs::track_dual(),
            solver: SolverType::default(),
        }
    }

    pub fn from_json_str(value: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(filename: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(filename)?;
        Self::from_json_str(&content)
    }

    pub fn lattice_config(&self) -> LatticeConfig {
        LatticeConfig::new(self.size, self.topology, self.dimension, self.track_dual)
    }

    pub fn probabilities(&self) -> ErrorProbabilities {
        ErrorProbabilities {
            p_x: self.p_x,
            p_z: self.p_z,
            p_erasure: self.p_erasure,
            pm_x: self.pm_x,
            pm_z: self.pm_z,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.lattice_config().validate()?;
        let probabilities = self.probabilities();
        probabilities.validate()?;
        if self.dimension == MeasurementModel::Perfect && (self.pm_x > 0. || self.pm_z > 0.) {
            return Err(SimulatorError::Config("measurement errors require the 3d model".to_string()));
        }
        if !self.track_dual && (self.p_z > 0. || self.pm_z > 0.) {
            return Err(SimulatorError::Config("phase-flip errors require `track_dual`".to_string()));
        }
        if self.solver == SolverType::BlossomV && !cfg!(feature = "blossom_v") {
            return Err(SimulatorError::Config(
                "the blossom-v solver needs the `blossom_v` feature and the Blossom V library".to_string(),
            ));
        }
        Ok(())
    }
}
