//! Error Model
//!
//! Errors are first sampled into an [`ErrorPattern`] and then applied to the lattice, so that every trial can be
//! logged and replayed exactly.
//! Under faulty measurements each layer starts from the qubit state of the previous layer, then suffers erasures,
//! then independent Pauli X (primal edge) and Pauli Z (dual edge) errors. Measurement errors are sampled for every
//! layer but the last one, which is always measured perfectly.
//!

use super::error::*;
use super::lattice::*;
use super::util::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

pub const ERROR_PATTERN_HEADER: &str = "Error Pattern v1.0";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ErrorProbabilities {
    /// Pauli X error rate, flipping the primal edge
    #[serde(default)]
    pub p_x: f64,
    /// Pauli Z error rate, flipping the dual edge
    #[serde(default)]
    pub p_z: f64,
    /// erasure rate; an erased qubit suffers one of I, X, Z, Y uniformly at random
    #[serde(default)]
    pub p_erasure: f64,
    /// measurement error rate of the stars
    #[serde(default)]
    pub pm_x: f64,
    /// measurement error rate of the plaquettes
    #[serde(default)]
    pub pm_z: f64,
}

impl ErrorProbabilities {
    /// the same Pauli and measurement error rate in both channels, no erasure
    pub fn symmetric(p: f64, pm: f64) -> Self {
        Self {
            p_x: p,
            p_z: p,
            p_erasure: 0.,
            pm_x: pm,
            pm_z: pm,
        }
    }

    pub fn measurement(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Primal => self.pm_x,
            Channel::Dual => self.pm_z,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("p_x", self.p_x),
            ("p_z", self.p_z),
            ("p_erasure", self.p_erasure),
            ("pm_x", self.pm_x),
            ("pm_z", self.pm_z),
        ] {
            if !(0. ..=1.).contains(&value) {
                return Err(SimulatorError::Config(format!("{} = {} is not a probability", name, value)));
            }
        }
        Ok(())
    }
}

/// errors of a single time layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerPattern {
    /// erased qubits, whose edges are marked as erasure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub erasures: Vec<QubitIndex>,
    /// qubit edges toggled in order; an edge may appear twice when an erasure and a Pauli error coincide
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flips: Vec<EdgeIndex>,
    /// stabilizers whose measurement outcome is flipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measurement_errors: Vec<NodeIndex>,
}

impl LayerPattern {
    pub fn is_empty(&self) -> bool {
        self.erasures.is_empty() && self.flips.is_empty() && self.measurement_errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub layers: Vec<LayerPattern>,
}

impl ErrorPattern {
    pub fn new_empty(layer_num: usize) -> Self {
        Self {
            layers: vec![LayerPattern::default(); layer_num],
        }
    }

    /// total number of edge toggles, counted per occurrence
    pub fn flip_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.flips.len()).sum()
    }
}

/// sample the errors of every layer and apply them to a freshly reset lattice
pub fn apply_errors(lattice: &mut Lattice, probabilities: &ErrorProbabilities, rng: &mut DeterministicRng) -> ErrorPattern {
    let mut pattern = ErrorPattern::default();
    for layer in 0..lattice.config.layer_num() {
        let layer_pattern = sample_layer(lattice, layer, probabilities, rng);
        apply_layer_pattern(lattice, layer, &layer_pattern);
        pattern.layers.push(layer_pattern);
    }
    log::trace!("sampled {} edge flips", pattern.flip_count());
    pattern
}

/// apply a previously sampled or loaded pattern, validating every index against the lattice
pub fn apply_error_pattern(lattice: &mut Lattice, pattern: &ErrorPattern) -> Result<()> {
    let layer_num = lattice.config.layer_num();
    if pattern.layers.len() != layer_num {
        return Err(SimulatorError::Format(format!(
            "error pattern has {} layers but the lattice has {}",
            pattern.layers.len(),
            layer_num
        )));
    }
    for (layer, layer_pattern) in pattern.layers.iter().enumerate() {
        for &qubit in layer_pattern.erasures.iter() {
            if lattice.qubits.get(qubit).map(|q| q.layer) != Some(layer) {
                return Err(SimulatorError::Format(format!("erased qubit {} is not in layer {}", qubit, layer)));
            }
        }
        for &edge_index in layer_pattern.flips.iter() {
            let valid = lattice
                .edges
                .get(edge_index)
                .map(|edge| edge.layer == layer && matches!(edge.kind, EdgeKind::Qubit(_)))
                .unwrap_or(false);
            if !valid {
                return Err(SimulatorError::Format(format!("flipped edge {} is not a qubit edge of layer {}", edge_index, layer)));
            }
        }
        for &node_index in layer_pattern.measurement_errors.iter() {
            let valid = lattice
                .nodes
                .get(node_index)
                .map(|node| node.layer == layer && !node.is_boundary())
                .unwrap_or(false);
            if !valid || layer == lattice.decode_layer() {
                return Err(SimulatorError::Format(format!(
                    "measurement error on node {} is not allowed in layer {}",
                    node_index, layer
                )));
            }
        }
    }
    for (layer, layer_pattern) in pattern.layers.iter().enumerate() {
        apply_layer_pattern(lattice, layer, layer_pattern);
    }
    Ok(())
}

fn sample_layer(lattice: &Lattice, layer: LayerIndex, probabilities: &ErrorProbabilities, rng: &mut DeterministicRng) -> LayerPattern {
    let mut layer_pattern = LayerPattern::default();
    if probabilities.p_erasure > 0. {
        for &qubit in lattice.layer_qubits[layer].iter() {
            if rng.next_f64() < probabilities.p_erasure {
                layer_pattern.erasures.push(qubit);
                let pauli = rng.next_f64();
                let (flip_x, flip_z) = if pauli < 0.25 {
                    (true, false)
                } else if pauli < 0.5 {
                    (false, true)
                } else if pauli < 0.75 {
                    (true, true)
                } else {
                    (false, false)
                };
                if flip_x {
                    layer_pattern.flips.extend(lattice.qubit_edge(qubit, Channel::Primal));
                }
                if flip_z {
                    layer_pattern.flips.extend(lattice.qubit_edge(qubit, Channel::Dual));
                }
            }
        }
    }
    if probabilities.p_x > 0. || probabilities.p_z > 0. {
        for &qubit in lattice.layer_qubits[layer].iter() {
            if probabilities.p_x > 0. && rng.next_f64() < probabilities.p_x {
                layer_pattern.flips.extend(lattice.qubit_edge(qubit, Channel::Primal));
            }
            if let Some(edge_index) = lattice.qubit_edge(qubit, Channel::Dual) {
                if probabilities.p_z > 0. && rng.next_f64() < probabilities.p_z {
                    layer_pattern.flips.push(edge_index);
                }
            }
        }
    }
    if layer != lattice.decode_layer() {
        for &node_index in lattice.layer_stabilizers[layer].iter() {
            let pm = probabilities.measurement(lattice.nodes[node_index].channel);
            if pm > 0. && rng.next_f64() < pm {
                layer_pattern.measurement_errors.push(node_index);
            }
        }
    }
    layer_pattern
}

fn apply_layer_pattern(lattice: &mut Lattice, layer: LayerIndex, layer_pattern: &LayerPattern) {
    if layer > 0 {
        copy_previous_layer(lattice, layer);
    }
    for &qubit in layer_pattern.erasures.iter() {
        let edges = lattice.qubits[qubit].edges;
        for edge_index in edges.into_iter().flatten() {
            lattice.edges[edge_index].is_erasure = true;
        }
    }
    for &edge_index in layer_pattern.flips.iter() {
        let edge = &mut lattice.edges[edge_index];
        edge.state = !edge.state;
    }
    for &node_index in layer_pattern.measurement_errors.iter() {
        lattice.nodes[node_index].mstate = true;
    }
}

/// errors on data qubits persist in time: a layer starts with the state of the one below
fn copy_previous_layer(lattice: &mut Lattice, layer: LayerIndex) {
    debug_assert_eq!(lattice.layer_qubits[layer].len(), lattice.layer_qubits[layer - 1].len());
    for index in 0..lattice.layer_qubits[layer].len() {
        let lower = lattice.layer_qubits[layer - 1][index];
        let upper = lattice.layer_qubits[layer][index];
        for channel in Channel::ALL {
            if let (Some(lower_edge), Some(upper_edge)) = (lattice.qubit_edge(lower, channel), lattice.qubit_edge(upper, channel)) {
                lattice.edges[upper_edge].state = lattice.edges[lower_edge].state;
            }
        }
    }
}

/// log error patterns to a file that [`ErrorPatternReader`] loads back
pub struct ErrorPatternWriter {
    file: File,
}

impl ErrorPatternWriter {
    pub fn create(filename: impl AsRef<Path>, config: &LatticeConfig) -> Result<Self> {
        let mut file = File::create(filename)?;
        writeln!(file, "{}", ERROR_PATTERN_HEADER)?;
        file.write_all(serde_json::to_string(config)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(Self { file })
    }

    pub fn write(&mut self, pattern: &ErrorPattern) -> Result<()> {
        self.file.write_all(serde_json::to_string(pattern)?.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}

/// pre-generated error patterns loaded from a file
#[derive(Debug, Clone)]
pub struct ErrorPatternReader {
    /// the lattice these patterns were generated on
    pub config: LatticeConfig,
    pub patterns: Vec<ErrorPattern>,
    /// cursor of the next pattern
    pub pattern_index: usize,
}

impl ErrorPatternReader {
    pub fn open(filename: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(filename)?;
        let mut config: Option<LatticeConfig> = None;
        let mut patterns = vec![];
        for (line_index, line) in io::BufReader::new(file).lines().enumerate() {
            let value = line?;
            match line_index {
                0 => {
                    if value.trim_end() != ERROR_PATTERN_HEADER {
                        return Err(SimulatorError::Format(format!("incompatible file version: {}", value)));
                    }
                }
                1 => {
                    config = Some(serde_json::from_str(&value)?);
                }
                _ => {
                    if value.trim().is_empty() {
                        continue;
                    }
                    patterns.push(serde_json::from_str(&value)?);
                }
            }
        }
        let config = config.ok_or_else(|| SimulatorError::Format("lattice configuration not present in file".to_string()))?;
        Ok(Self {
            config,
            patterns,
            pattern_index: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.patterns.len() - self.pattern_index
    }

    pub fn next_pattern(&mut self) -> Result<ErrorPattern> {
        let pattern = self.patterns.get(self.pattern_index).cloned().ok_or_else(|| {
            SimulatorError::Format(format!(
                "reading error pattern {} but the file only has {}",
                self.pattern_index,
                self.patterns.len()
            ))
        })?;
        self.pattern_index += 1;
        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    fn edge_states(lattice: &Lattice) -> Vec<bool> {
        lattice.edges.iter().map(|edge| edge.state).collect()
    }

    #[test]
    fn error_model_zero_probability_is_noop() {
        // cargo test error_model_zero_probability_is_noop -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(4, Topology::Toric, MeasurementModel::Faulty, true)).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(7);
        let mut reference_rng = rng.clone();
        let pattern = apply_errors(&mut lattice, &ErrorProbabilities::default(), &mut rng);
        assert!(pattern.layers.iter().all(LayerPattern::is_empty));
        assert!(edge_states(&lattice).iter().all(|&state| !state));
        // no randomness consumed
        assert_eq!(rng.next_f64(), reference_rng.next_f64());
    }

    #[test]
    fn error_model_full_probability() {
        // cargo test error_model_full_probability -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(3, Topology::Planar, MeasurementModel::Perfect, true)).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(0);
        let probabilities = ErrorProbabilities {
            p_x: 1.,
            ..Default::default()
        };
        apply_errors(&mut lattice, &probabilities, &mut rng);
        for edge in lattice.edges.iter() {
            assert_eq!(edge.state, edge.channel == Channel::Primal);
        }
    }

    #[test]
    fn error_model_errors_persist_in_time() {
        // cargo test error_model_errors_persist_in_time -- --nocapture
        let config = LatticeConfig::new(4, Topology::Toric, MeasurementModel::Faulty, true);
        let mut lattice = Lattice::new(config).unwrap();
        let mut pattern = ErrorPattern::new_empty(config.layer_num());
        let qubit = lattice.qubit(0, 1, 2, 1).unwrap();
        pattern.layers[1].flips.push(lattice.qubit_edge(qubit, Channel::Primal).unwrap());
        apply_error_pattern(&mut lattice, &pattern).unwrap();
        for layer in 0..config.layer_num() {
            let qubit = lattice.qubit(0, 1, 2, layer).unwrap();
            assert_eq!(lattice.qubit_state(qubit), vec![layer >= 1, false]);
        }
    }

    #[test]
    fn error_model_erasure_marks_qubit() {
        // cargo test error_model_erasure_marks_qubit -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(4, Topology::Toric, MeasurementModel::Perfect, true)).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(3);
        let probabilities = ErrorProbabilities {
            p_erasure: 1.,
            ..Default::default()
        };
        let pattern = apply_errors(&mut lattice, &probabilities, &mut rng);
        assert_eq!(pattern.layers[0].erasures.len(), lattice.qubits.len());
        assert!(lattice.edges.iter().all(|edge| edge.is_erasure));
        // roughly three quarters of the erased qubits suffer a non-trivial Pauli
        let errors = lattice.qubits.len() - (0..lattice.qubits.len()).filter(|&q| lattice.qubit_state(q) == vec![false, false]).count();
        assert!(errors > 0 && errors < lattice.qubits.len());
    }

    #[test]
    fn error_model_no_measurement_error_on_decode_layer() {
        // cargo test error_model_no_measurement_error_on_decode_layer -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(3, Topology::Toric, MeasurementModel::Faulty, false)).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(11);
        let probabilities = ErrorProbabilities::symmetric(0., 1.);
        let pattern = apply_errors(&mut lattice, &probabilities, &mut rng);
        assert_eq!(pattern.layers[0].measurement_errors.len(), 9);
        assert_eq!(pattern.layers[1].measurement_errors.len(), 9);
        assert!(pattern.layers[2].measurement_errors.is_empty());
        let decode_layer = lattice.decode_layer();
        assert!(lattice.nodes.iter().all(|node| node.mstate == (node.layer != decode_layer)));
    }

    #[test]
    fn error_model_replay_matches_sampling() {
        // cargo test error_model_replay_matches_sampling -- --nocapture
        let config = LatticeConfig::new(5, Topology::Planar, MeasurementModel::Faulty, true);
        let probabilities = ErrorProbabilities {
            p_x: 0.1,
            p_z: 0.1,
            p_erasure: 0.05,
            pm_x: 0.05,
            pm_z: 0.05,
        };
        let mut lattice = Lattice::new(config).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(123);
        let pattern = apply_errors(&mut lattice, &probabilities, &mut rng);
        let sampled = edge_states(&lattice);
        let mut replayed = Lattice::new(config).unwrap();
        apply_error_pattern(&mut replayed, &pattern).unwrap();
        assert_eq!(edge_states(&replayed), sampled);
        let mut wrong = ErrorPattern::new_empty(config.layer_num());
        wrong.layers[0].flips.push(usize::MAX);
        assert!(matches!(apply_error_pattern(&mut replayed, &wrong), Err(SimulatorError::Format(_))));
    }

    #[test]
    fn error_model_pattern_file() {
        // cargo test error_model_pattern_file -- --nocapture
        let config = LatticeConfig::new(4, Topology::Toric, MeasurementModel::Perfect, true);
        let mut lattice = Lattice::new(config).unwrap();
        let mut rng = DeterministicRng::seed_from_u64(5);
        let filename = std::env::temp_dir().join(format!("surface_blossom_pattern_{}.txt", std::process::id()));
        let mut writer = ErrorPatternWriter::create(&filename, &config).unwrap();
        let mut patterns = vec![];
        for _ in 0..3 {
            lattice.reset();
            let pattern = apply_errors(&mut lattice, &ErrorProbabilities::symmetric(0.1, 0.), &mut rng);
            writer.write(&pattern).unwrap();
            patterns.push(pattern);
        }
        drop(writer);
        let mut reader = ErrorPatternReader::open(&filename).unwrap();
        assert_eq!(reader.config, config);
        assert_eq!(reader.remaining(), 3);
        for pattern in patterns.iter() {
            assert_eq!(&reader.next_pattern().unwrap(), pattern);
        }
        assert!(matches!(reader.next_pattern(), Err(SimulatorError::Format(_))));
        std::fs::remove_file(&filename).unwrap();
        assert!(matches!(ErrorPatternReader::open(&filename), Err(SimulatorError::Io(_))));
    }
}
