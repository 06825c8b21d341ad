//! MWPM Decoder
//!
//! Matched anyons are connected by a correction chain on the decode layer: the first node walks along the y axis
//! and the second node along the x axis until both reach the same corner. The same walk is recorded on the layers
//! where the anyons were detected, followed by a walk along the time axis, so that the recorded matching weight
//! equals the weight of the matching graph.
//!

use super::error::*;
use super::lattice::*;
use super::matching_graph::*;
use super::mwpm_solver::*;
use super::util::*;
use crate::derivative::Derivative;

/// number of steps and direction of the y walk and of the x walk between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displacement {
    pub dy: usize,
    pub yd: Direction,
    pub dx: usize,
    pub xd: Direction,
}

/// the walk that brings `a` (along y) and `b` (along x) to the same node
pub fn displacement(lattice: &Lattice, a: NodeIndex, b: NodeIndex) -> Displacement {
    let (a, b) = (&lattice.nodes[a], &lattice.nodes[b]);
    match lattice.config.topology {
        Topology::Toric => {
            let size = lattice.size() as isize;
            let dy0 = (a.y - b.y).rem_euclid(size);
            let dy1 = (b.y - a.y).rem_euclid(size);
            let dx0 = (a.x - b.x).rem_euclid(size);
            let dx1 = (b.x - a.x).rem_euclid(size);
            let (dy, yd) = if dy0 < dy1 { (dy0, Direction::North) } else { (dy1, Direction::South) };
            let (dx, xd) = if dx0 < dx1 { (dx0, Direction::East) } else { (dx1, Direction::West) };
            Displacement {
                dy: dy as usize,
                yd,
                dx: dx as usize,
                xd,
            }
        }
        Topology::Planar => {
            let dy = a.y - b.y;
            let dx = a.x - b.x;
            Displacement {
                dy: dy.unsigned_abs(),
                yd: if dy > 0 { Direction::North } else { Direction::South },
                dx: dx.unsigned_abs(),
                xd: if dx < 0 { Direction::West } else { Direction::East },
            }
        }
    }
}

/// remove the pairs of two virtual boundary nodes, which need no correction
pub fn remove_virtual_pairs(pairs: Vec<MatchedPair>) -> Vec<MatchedPair> {
    pairs.into_iter().filter(|pair| !pair.both_virtual).collect()
}

/// edges to toggle, collected before touching the lattice
#[derive(Debug, Clone, Default)]
struct CorrectionPlan {
    /// decode layer edges whose error state is flipped
    flips: Vec<EdgeIndex>,
    /// edges whose matching flag is toggled
    matchings: Vec<EdgeIndex>,
}

impl CorrectionPlan {
    fn step(lattice: &Lattice, node: NodeIndex, direction: Direction) -> Result<(NodeIndex, EdgeIndex)> {
        lattice.nodes[node]
            .neighbor(direction)
            .ok_or(SimulatorError::WalkFailed { node, direction })
    }

    /// walk `flip_node` on the decode layer and `match_node` on its own layer in lockstep
    fn walk(
        &mut self,
        lattice: &Lattice,
        mut flip_node: NodeIndex,
        mut match_node: NodeIndex,
        length: usize,
        direction: Direction,
    ) -> Result<NodeIndex> {
        for _ in 0..length {
            let (next_flip_node, flip_edge) = Self::step(lattice, flip_node, direction)?;
            let (next_match_node, match_edge) = Self::step(lattice, match_node, direction)?;
            self.flips.push(flip_edge);
            self.matchings.push(match_edge);
            flip_node = next_flip_node;
            match_node = next_match_node;
        }
        Ok(match_node)
    }

    fn walk_time(&mut self, lattice: &Lattice, mut node: NodeIndex, target_layer: LayerIndex) -> Result<()> {
        let layer = lattice.nodes[node].layer;
        let direction = if layer > target_layer { Direction::Down } else { Direction::Up };
        for _ in 0..layer.abs_diff(target_layer) {
            let (next_node, edge) = Self::step(lattice, node, direction)?;
            self.matchings.push(edge);
            node = next_node;
        }
        Ok(())
    }

    fn add_pair(&mut self, lattice: &Lattice, pair: &MatchedPair) -> Result<()> {
        let (v0, v1) = pair.decode_nodes;
        let (m0, m1) = pair.nodes;
        let Displacement { dy, yd, dx, xd } = displacement(lattice, v0, v1);
        let corner = self.walk(lattice, v0, m0, dy, yd)?;
        self.walk(lattice, v1, m1, dx, xd)?;
        self.walk_time(lattice, corner, lattice.nodes[m1].layer)
    }
}

/// apply the correction of every pair; nothing is changed if any walk fails. Returns the number of matching edges toggled
pub fn apply_matching(lattice: &mut Lattice, pairs: &[MatchedPair]) -> Result<usize> {
    let mut plan = CorrectionPlan::default();
    for pair in pairs.iter() {
        plan.add_pair(lattice, pair)?;
    }
    for &edge_index in plan.flips.iter() {
        let edge = &mut lattice.edges[edge_index];
        edge.state = !edge.state;
    }
    for &edge_index in plan.matchings.iter() {
        let edge = &mut lattice.edges[edge_index];
        edge.matching = !edge.matching;
    }
    Ok(plan.matchings.len())
}

/// matching of one channel, ready to be applied
#[derive(Debug, Clone)]
pub struct ChannelMatching {
    pub channel: Channel,
    /// number of anyons, excluding virtual boundary nodes
    pub anyon_num: usize,
    /// total weight of the matching in the matching graph
    pub weight: Weight,
    /// matched pairs without the pairs of two virtual nodes
    pub pairs: Vec<MatchedPair>,
}

#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub matchings: Vec<ChannelMatching>,
    /// number of matching edges toggled while applying the correction
    pub applied_weight: usize,
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct MwpmDecoder {
    pub solver_type: SolverType,
    #[derivative(Debug = "ignore")]
    solver: Box<dyn MatchingSolver + Send>,
}

impl Clone for MwpmDecoder {
    fn clone(&self) -> Self {
        Self::new(self.solver_type) // create independent instances of the solver
    }
}

impl MwpmDecoder {
    pub fn new(solver_type: SolverType) -> Self {
        Self {
            solver_type,
            solver: solver_type.build(),
        }
    }

    /// build the matching graph of every simulated channel and solve it
    pub fn compute_matching(&mut self, lattice: &Lattice) -> Result<Vec<ChannelMatching>> {
        let mut matchings = Vec::with_capacity(2);
        for channel in lattice.config.channels() {
            let graph = MatchingGraph::build(lattice, channel)?;
            let (pairs, weight) = solve_matching_graph(&graph, self.solver.as_mut())?;
            let pairs = match lattice.config.topology {
                Topology::Toric => pairs,
                Topology::Planar => remove_virtual_pairs(pairs),
            };
            matchings.push(ChannelMatching {
                channel,
                anyon_num: graph.real_num,
                weight,
                pairs,
            });
        }
        Ok(matchings)
    }

    /// apply the corrections of all channels at once
    pub fn apply(&self, lattice: &mut Lattice, matchings: &[ChannelMatching]) -> Result<usize> {
        let pairs: Vec<MatchedPair> = matchings.iter().flat_map(|matching| matching.pairs.iter().copied()).collect();
        apply_matching(lattice, &pairs)
    }

    pub fn decode(&mut self, lattice: &mut Lattice) -> Result<DecodeReport> {
        let matchings = self.compute_matching(lattice)?;
        let applied_weight = self.apply(lattice, &matchings)?;
        Ok(DecodeReport {
            matchings,
            applied_weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_model::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;
    use crate::syndrome::*;

    fn decode_layer_syndrome_is_clear(lattice: &Lattice) -> bool {
        let decode_layer = lattice.decode_layer();
        lattice.layer_stabilizers[decode_layer].iter().all(|&node_index| {
            lattice.nodes[node_index]
                .parity_edges
                .iter()
                .filter(|&&edge| lattice.edges[edge].state)
                .count()
                % 2
                == 0
        })
    }

    #[test]
    fn decoder_toric_displacement() {
        // cargo test decoder_toric_displacement -- --nocapture
        let lattice = Lattice::new(LatticeConfig::new(8, Topology::Toric, MeasurementModel::Perfect, false)).unwrap();
        let a = lattice.stabilizer(Channel::Primal, 1, 1, 0).unwrap();
        let b = lattice.stabilizer(Channel::Primal, 7, 3, 0).unwrap();
        let displacement_ab = displacement(&lattice, a, b);
        assert_eq!(
            displacement_ab,
            Displacement {
                dy: 2,
                yd: Direction::North,
                dx: 2,
                xd: Direction::West
            }
        );
        let displacement_ba = displacement(&lattice, b, a);
        assert_eq!((displacement_ba.dy, displacement_ba.dx), (2, 2));
        assert_eq!((displacement_ba.yd, displacement_ba.xd), (Direction::South, Direction::East));
        assert_eq!(displacement(&lattice, a, a).dy, 0);
    }

    #[test]
    fn decoder_planar_displacement() {
        // cargo test decoder_planar_displacement -- --nocapture
        let lattice = Lattice::new(LatticeConfig::new(6, Topology::Planar, MeasurementModel::Perfect, false)).unwrap();
        let star = lattice.stabilizer(Channel::Primal, 2, 4, 0).unwrap();
        let boundary = lattice.boundary(Channel::Primal, 2, 6, 0).unwrap();
        let result = displacement(&lattice, star, boundary);
        assert_eq!((result.dy, result.dx, result.xd), (0, 2, Direction::West));
        let result = displacement(&lattice, boundary, star);
        assert_eq!((result.dx, result.xd), (2, Direction::East));
    }

    #[test]
    fn decoder_single_error_is_corrected() {
        // cargo test decoder_single_error_is_corrected -- --nocapture
        for topology in [Topology::Toric, Topology::Planar] {
            let mut lattice = Lattice::new(LatticeConfig::new(6, topology, MeasurementModel::Perfect, true)).unwrap();
            let qubit = lattice.qubit(1, 2, 3, 0).unwrap();
            lattice.flip_qubit(qubit, Channel::Primal);
            lattice.flip_qubit(qubit, Channel::Dual);
            measure_syndrome(&mut lattice);
            let mut decoder = MwpmDecoder::new(SolverType::MaxWeight);
            let report = decoder.decode(&mut lattice).unwrap();
            assert_eq!(report.applied_weight, 2);
            assert_eq!(lattice.qubit_state(qubit), vec![false, false]);
            assert!(lattice.edges.iter().all(|edge| !edge.state));
            assert_eq!(lattice.count_matching_weight(), 2);
        }
    }

    #[test]
    fn decoder_random_errors_clear_syndrome() {
        // cargo test decoder_random_errors_clear_syndrome -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(42);
        let mut decoder = MwpmDecoder::new(SolverType::MaxWeight);
        for topology in [Topology::Toric, Topology::Planar] {
            for measurement in [MeasurementModel::Perfect, MeasurementModel::Faulty] {
                let mut lattice = Lattice::new(LatticeConfig::new(5, topology, measurement, true)).unwrap();
                let probabilities = match measurement {
                    MeasurementModel::Perfect => ErrorProbabilities::symmetric(0.08, 0.),
                    MeasurementModel::Faulty => ErrorProbabilities::symmetric(0.03, 0.03),
                };
                for _ in 0..30 {
                    lattice.reset();
                    apply_errors(&mut lattice, &probabilities, &mut rng);
                    measure_syndrome(&mut lattice);
                    let report = decoder.decode(&mut lattice).unwrap();
                    assert!(decode_layer_syndrome_is_clear(&lattice));
                    let total_weight: Weight = report.matchings.iter().map(|matching| matching.weight).sum();
                    assert_eq!(report.applied_weight as Weight, total_weight);
                }
            }
        }
    }

    #[test]
    fn decoder_failed_walk_changes_nothing() {
        // cargo test decoder_failed_walk_changes_nothing -- --nocapture
        let mut lattice = Lattice::new(LatticeConfig::new(4, Topology::Planar, MeasurementModel::Perfect, false)).unwrap();
        let left = lattice.boundary(Channel::Primal, 1, 0, 0).unwrap();
        let star = lattice.stabilizer(Channel::Primal, 1, 1, 0).unwrap();
        let good = MatchedPair {
            vertices: (0, 1),
            decode_nodes: (star, left),
            nodes: (star, left),
            both_virtual: false,
        };
        // a boundary node cannot walk north
        let other_left = lattice.boundary(Channel::Primal, 3, 0, 0).unwrap();
        let bad = MatchedPair {
            vertices: (2, 3),
            decode_nodes: (left, other_left),
            nodes: (left, other_left),
            both_virtual: false,
        };
        assert!(matches!(apply_matching(&mut lattice, &[good, bad]), Err(SimulatorError::WalkFailed { .. })));
        assert!(lattice.edges.iter().all(|edge| !edge.state && !edge.matching));
        assert_eq!(apply_matching(&mut lattice, &[good]).unwrap(), 1);
    }

    #[test]
    fn decoder_measurement_error_matches_in_time() {
        // cargo test decoder_measurement_error_matches_in_time -- --nocapture
        let config = LatticeConfig::new(5, Topology::Toric, MeasurementModel::Faulty, false);
        let mut lattice = Lattice::new(config).unwrap();
        let mut pattern = ErrorPattern::new_empty(config.layer_num());
        pattern.layers[1].measurement_errors.push(lattice.stabilizer(Channel::Primal, 2, 2, 1).unwrap());
        apply_error_pattern(&mut lattice, &pattern).unwrap();
        measure_syndrome(&mut lattice);
        let mut decoder = MwpmDecoder::new(SolverType::Exhaustive);
        let report = decoder.decode(&mut lattice).unwrap();
        assert_eq!(report.matchings[0].pairs.len(), 1);
        assert_eq!(report.applied_weight, 1);
        let bridge = lattice.nodes[lattice.stabilizer(Channel::Primal, 2, 2, 2).unwrap()].neighbor(Direction::Down).unwrap().1;
        assert!(lattice.edges[bridge].matching);
        assert!(lattice.edges.iter().all(|edge| !edge.state));
    }
}
