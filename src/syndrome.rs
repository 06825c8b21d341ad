//! Syndrome Extraction
//!
//! Stabilizers are measured layer by layer. Under faulty measurements a stabilizer is an anyon when its outcome
//! differs from the outcome of the same stabilizer one layer below, so that a measurement error shows up as a pair
//! of anyons separated in time.
//!

use super::lattice::*;
use super::util::*;

/// a triggered stabilizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Anyon {
    /// the stabilizer in the layer where it was detected
    pub node: NodeIndex,
    /// the copy of the stabilizer on the decode layer, where the correction is applied
    pub decode_node: NodeIndex,
}

/// compute the parity and the anyon state of every stabilizer; returns the number of anyons
pub fn measure_syndrome(lattice: &mut Lattice) -> usize {
    let mut anyon_num = 0;
    for layer in 0..lattice.config.layer_num() {
        for index in 0..lattice.layer_stabilizers[layer].len() {
            let node_index = lattice.layer_stabilizers[layer][index];
            let mut parity = lattice.nodes[node_index]
                .parity_edges
                .iter()
                .fold(false, |parity, &edge_index| parity ^ lattice.edges[edge_index].state);
            let node = &lattice.nodes[node_index];
            if node.mstate {
                parity = !parity;
            }
            let previous_parity = match node.neighbor(Direction::Down) {
                Some((below, _)) => lattice.nodes[below].parity,
                None => false,
            };
            let node = &mut lattice.nodes[node_index];
            node.parity = parity;
            node.state = parity != previous_parity;
            if node.state {
                anyon_num += 1;
            }
        }
    }
    log::trace!("measured {} anyons", anyon_num);
    anyon_num
}

/// the anyons of one channel over all layers, in construction order
pub fn anyons(lattice: &Lattice, channel: Channel) -> Vec<Anyon> {
    let decode_layer = lattice.decode_layer();
    lattice
        .anyons(channel)
        .into_iter()
        .map(|node| Anyon {
            node,
            decode_node: lattice.project(node, decode_layer).unwrap_or(node),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_model::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn syndrome_single_error_toric() {
        // cargo test syndrome_single_error_toric -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(8, Topology::Toric, MeasurementModel::Perfect, true)).unwrap();
        let qubit = lattice.qubit(0, 3, 7, 0).unwrap();
        lattice.flip_qubit(qubit, Channel::Primal);
        assert_eq!(measure_syndrome(&mut lattice), 2);
        let mut expected = vec![
            lattice.stabilizer(Channel::Primal, 3, 0, 0).unwrap(),
            lattice.stabilizer(Channel::Primal, 3, 7, 0).unwrap(),
        ];
        expected.sort();
        let found: Vec<NodeIndex> = anyons(&lattice, Channel::Primal).iter().map(|anyon| anyon.node).collect();
        assert_eq!(found, expected);
        assert!(anyons(&lattice, Channel::Dual).is_empty());
    }

    #[test]
    fn syndrome_parity_consistency() {
        // cargo test syndrome_parity_consistency -- --nocapture
        // in every channel the number of anyons is even, because every error toggles two stabilizers or a boundary
        let mut rng = DeterministicRng::seed_from_u64(99);
        for topology in [Topology::Toric, Topology::Planar] {
            let mut lattice = Lattice::new(LatticeConfig::new(6, topology, MeasurementModel::Perfect, true)).unwrap();
            for _ in 0..20 {
                lattice.reset();
                apply_errors(&mut lattice, &ErrorProbabilities::symmetric(0.1, 0.), &mut rng);
                measure_syndrome(&mut lattice);
                for node in lattice.nodes.iter().filter(|node| !node.is_boundary()) {
                    let parity = node.parity_edges.iter().filter(|&&edge| lattice.edges[edge].state).count() % 2 == 1;
                    assert_eq!(node.state, parity);
                }
                if topology == Topology::Toric {
                    for channel in Channel::ALL {
                        assert_eq!(anyons(&lattice, channel).len() % 2, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn syndrome_measurement_error_in_time() {
        // cargo test syndrome_measurement_error_in_time -- --nocapture
        let config = LatticeConfig::new(4, Topology::Toric, MeasurementModel::Faulty, false);
        let mut lattice = Lattice::new(config).unwrap();
        let node = lattice.stabilizer(Channel::Primal, 2, 2, 1).unwrap();
        let mut pattern = ErrorPattern::new_empty(config.layer_num());
        pattern.layers[1].measurement_errors.push(node);
        apply_error_pattern(&mut lattice, &pattern).unwrap();
        assert_eq!(measure_syndrome(&mut lattice), 2);
        let found = anyons(&lattice, Channel::Primal);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].node, node);
        assert_eq!(found[1].node, lattice.stabilizer(Channel::Primal, 2, 2, 2).unwrap());
        let decode_node = lattice.stabilizer(Channel::Primal, 2, 2, 3).unwrap();
        assert!(found.iter().all(|anyon| anyon.decode_node == decode_node));
    }
}
