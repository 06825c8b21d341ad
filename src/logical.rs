//! Logical Errors
//!
//! A logical error is a chain of corrected errors that wraps around the torus, or that connects the two opposite
//! open boundaries of a planar lattice. It is detected by the parity of the error state on a cut through the
//! decode layer that every such chain must cross an odd number of times.
//!

use super::lattice::*;
use super::util::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalCycle {
    pub name: String,
    pub channel: Channel,
    /// decode layer edges forming the cut
    pub edges: Vec<EdgeIndex>,
}

impl LogicalCycle {
    /// the cuts of every simulated channel: two per channel on a torus, one per channel on a planar lattice
    pub fn build(lattice: &Lattice) -> Vec<Self> {
        let size = lattice.size() as isize;
        let layer = lattice.decode_layer();
        let cut = |name: &str, channel: Channel, orientation: usize, position: &dyn Fn(isize) -> (isize, isize)| Self {
            name: name.to_string(),
            channel,
            edges: (0..size)
                .filter_map(|i| {
                    let (y, x) = position(i);
                    lattice.qubit(orientation, y, x, layer)
                })
                .filter_map(|qubit| lattice.qubit_edge(qubit, channel))
                .collect(),
        };
        let mut cycles = vec![];
        match lattice.config.topology {
            Topology::Toric => {
                cycles.push(cut("primal_x", Channel::Primal, 0, &|i| (i, 0)));
                cycles.push(cut("primal_y", Channel::Primal, 1, &|i| (0, i)));
                if lattice.config.track_dual {
                    cycles.push(cut("dual_x", Channel::Dual, 1, &|i| (i, 0)));
                    cycles.push(cut("dual_y", Channel::Dual, 0, &|i| (0, i)));
                }
            }
            Topology::Planar => {
                cycles.push(cut("primal", Channel::Primal, 0, &|i| (i, 0)));
                if lattice.config.track_dual {
                    cycles.push(cut("dual", Channel::Dual, 0, &|i| (0, i)));
                }
            }
        }
        debug_assert!(cycles.iter().all(|cycle| cycle.edges.len() == size as usize));
        cycles
    }

    /// odd parity of the error state along the cut
    pub fn is_flipped(&self, lattice: &Lattice) -> bool {
        self.edges.iter().filter(|&&edge_index| lattice.edges[edge_index].state).count() % 2 == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalOutcome {
    /// whether each logical cycle of the lattice is flipped, in the same order
    pub cycles: Vec<bool>,
    pub success: bool,
}

/// evaluate every logical cycle on the decode layer
pub fn evaluate(lattice: &Lattice) -> LogicalOutcome {
    let cycles: Vec<bool> = lattice.logical_cycles.iter().map(|cycle| cycle.is_flipped(lattice)).collect();
    let success = cycles.iter().all(|&flipped| !flipped);
    LogicalOutcome { cycles, success }
}
