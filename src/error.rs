//! Errors
//!
//! Construction errors and invalid state mutations are programming or configuration mistakes;
//! matching errors are fatal to a single trial, which the batch then records as invalid.
//!

use crate::lattice::{Channel, Direction};
use crate::util::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("missing {direction:?} neighbor of {channel:?} stabilizer at (y={y}, x={x}, layer={layer})")]
    Construction {
        channel: Channel,
        y: isize,
        x: isize,
        layer: LayerIndex,
        direction: Direction,
    },
    #[error("edge {edge} can only have two connected nodes")]
    InvalidEdgeNodes { edge: EdgeIndex },
    #[error("qubit {qubit} has {expected} edges but the given state has {found} entries")]
    InvalidQubitState {
        qubit: QubitIndex,
        expected: usize,
        found: usize,
    },
    #[error("odd number of {count} nodes in the {channel:?} matching graph, no perfect matching exists")]
    OddAnyonCount { channel: Channel, count: usize },
    #[error("no perfect matching exists among {node_num} nodes")]
    NoPerfectMatching { node_num: usize },
    #[error("matching solver reported status {status}")]
    SolverStatus { status: i32 },
    #[error("matching solver supports at most {max} nodes, got {node_num}")]
    SolverCapacity { node_num: usize, max: usize },
    #[error("matching solver returned an invalid matching: {reason}")]
    InvalidMatching { reason: String },
    #[error("node {node} has no {direction:?} neighbor to walk through")]
    WalkFailed { node: NodeIndex, direction: Direction },
    #[error("trial stage {found:?} cannot be followed by this step, expected {expected:?}")]
    InvalidStage {
        expected: crate::simulation::TrialStage,
        found: crate::simulation::TrialStage,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid file format: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SimulatorError {
    /// matching failures invalidate a single trial but not the whole batch
    pub fn is_matching_failure(&self) -> bool {
        matches!(
            self,
            Self::OddAnyonCount { .. }
                | Self::NoPerfectMatching { .. }
                | Self::SolverStatus { .. }
                | Self::SolverCapacity { .. }
                | Self::InvalidMatching { .. }
                | Self::WalkFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
