//! Matching Graph
//!
//! The complete graph over the anyons of one channel, weighted by their lattice distance.
//! On a planar lattice every anyon additionally gets a virtual partner on the nearest open boundary, and the
//! virtual nodes are connected among themselves with zero weight so that any number of chains can terminate
//! on the boundary.
//!

use super::complete_graph::*;
use super::error::*;
use super::lattice::*;
use super::syndrome::*;
use super::util::*;

#[derive(Debug, Clone)]
pub struct MatchingGraph {
    pub channel: Channel,
    /// the node of each matching vertex in the layer where it was detected; virtual vertices are boundary nodes
    pub nodes: Vec<NodeIndex>,
    /// the same vertices projected onto the decode layer
    pub decode_nodes: Vec<NodeIndex>,
    /// vertices `0..real_num` are anyons and vertices `real_num..` are their virtual boundary partners in the same order
    pub real_num: usize,
    pub weighted_edges: Vec<(usize, usize, Weight)>,
}

impl MatchingGraph {
    pub fn build(lattice: &Lattice, channel: Channel) -> Result<Self> {
        let anyons = anyons(lattice, channel);
        let graph = match lattice.config.topology {
            Topology::Toric => Self::build_toric(lattice, channel, &anyons),
            Topology::Planar => Self::build_planar(lattice, channel, &anyons)?,
        };
        debug_assert!(graph.weights_match_lattice(lattice), "closed-form weights differ from lattice distances");
        Ok(graph)
    }

    fn build_toric(lattice: &Lattice, channel: Channel, anyons: &[Anyon]) -> Self {
        let mut weighted_edges = Vec::with_capacity(anyons.len() * anyons.len().saturating_sub(1) / 2);
        for i in 0..anyons.len() {
            for j in i + 1..anyons.len() {
                let weight = toric_weight(lattice.size(), &lattice.nodes[anyons[i].node], &lattice.nodes[anyons[j].node]);
                weighted_edges.push((i, j, weight));
            }
        }
        Self {
            channel,
            nodes: anyons.iter().map(|anyon| anyon.node).collect(),
            decode_nodes: anyons.iter().map(|anyon| anyon.decode_node).collect(),
            real_num: anyons.len(),
            weighted_edges,
        }
    }

    fn build_planar(lattice: &Lattice, channel: Channel, anyons: &[Anyon]) -> Result<Self> {
        let real_num = anyons.len();
        let mut nodes: Vec<NodeIndex> = anyons.iter().map(|anyon| anyon.node).collect();
        let mut decode_nodes: Vec<NodeIndex> = anyons.iter().map(|anyon| anyon.decode_node).collect();
        let mut boundary_weights = Vec::with_capacity(real_num);
        for anyon in anyons.iter() {
            let (boundary, weight) = nearest_boundary(lattice, anyon.node)?;
            let decode_boundary = lattice.project(boundary, lattice.decode_layer()).ok_or_else(|| {
                let node = &lattice.nodes[boundary];
                SimulatorError::Construction {
                    channel,
                    y: node.y,
                    x: node.x,
                    layer: lattice.decode_layer(),
                    direction: Direction::Up,
                }
            })?;
            nodes.push(boundary);
            decode_nodes.push(decode_boundary);
            boundary_weights.push(weight);
        }
        let mut weighted_edges = Vec::with_capacity(real_num * real_num.saturating_sub(1) + real_num);
        for i in 0..real_num {
            for j in i + 1..real_num {
                let weight = planar_weight(&lattice.nodes[nodes[i]], &lattice.nodes[nodes[j]]);
                weighted_edges.push((i, j, weight));
            }
        }
        for i in real_num..2 * real_num {
            for j in i + 1..2 * real_num {
                weighted_edges.push((i, j, 0));
            }
        }
        for (i, weight) in boundary_weights.into_iter().enumerate() {
            weighted_edges.push((i, real_num + i, weight));
        }
        Ok(Self {
            channel,
            nodes,
            decode_nodes,
            real_num,
            weighted_edges,
        })
    }

    pub fn node_num(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_virtual(&self, vertex: usize) -> bool {
        vertex >= self.real_num
    }

    /// every edge leaving an anyon weighs as much as the shortest path between its nodes on the lattice
    pub fn weights_match_lattice(&self, lattice: &Lattice) -> bool {
        let mut complete_graph = CompleteGraph::new(lattice, self.channel);
        (0..self.real_num).all(|vertex| {
            let distances = complete_graph.all_edges(self.nodes[vertex]);
            self.weighted_edges
                .iter()
                .filter(|&&(i, _, _)| i == vertex)
                .all(|&(_, j, weight)| distances.get(&self.nodes[j]).map(|&(_, distance)| distance) == Some(weight))
        })
    }

    /// total weight of a matching given as one partner per vertex
    pub fn matching_weight(&self, mates: &[usize]) -> Weight {
        self.weighted_edges
            .iter()
            .filter(|&&(i, j, _)| mates.get(i) == Some(&j))
            .map(|&(_, _, weight)| weight)
            .sum()
    }
}

/// shortest distance on a periodic lattice
pub fn toric_weight(size: usize, a: &LatticeNode, b: &LatticeNode) -> Weight {
    let size = size as isize;
    let wy = (a.y - b.y).rem_euclid(size);
    let wx = (a.x - b.x).rem_euclid(size);
    let wz = (a.layer as isize - b.layer as isize).abs();
    (wy.min(size - wy) + wx.min(size - wx) + wz) as Weight
}

/// Manhattan distance on an open lattice
pub fn planar_weight(a: &LatticeNode, b: &LatticeNode) -> Weight {
    ((a.y - b.y).abs() + (a.x - b.x).abs() + (a.layer as isize - b.layer as isize).abs()) as Weight
}

/// the boundary node in the same layer on the closer open boundary and the perpendicular distance to it;
/// ties go to the lower boundary, `x = 0` for stars and `y = -1` for plaquettes
pub fn nearest_boundary(lattice: &Lattice, node_index: NodeIndex) -> Result<(NodeIndex, Weight)> {
    let size = lattice.size() as isize;
    let node = &lattice.nodes[node_index];
    let (y, x, distance, direction) = match node.channel {
        Channel::Primal => {
            let (west, east) = (node.x, size - node.x);
            if west <= east {
                (node.y, 0, west, Direction::West)
            } else {
                (node.y, size, east, Direction::East)
            }
        }
        Channel::Dual => {
            let (north, south) = (node.y + 1, size - 1 - node.y);
            if north <= south {
                (-1, node.x, north, Direction::North)
            } else {
                (size - 1, node.x, south, Direction::South)
            }
        }
    };
    let boundary = lattice
        .boundary(node.channel, y, x, node.layer)
        .ok_or(SimulatorError::Construction {
            channel: node.channel,
            y: node.y,
            x: node.x,
            layer: node.layer,
            direction,
        })?;
    Ok((boundary, distance as Weight))
}
