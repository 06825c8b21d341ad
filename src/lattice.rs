//! Surface Code Lattice
//!
//! The unit cell at `(y, x)` contains two data qubits and two stabilizers:
//!
//! ```text
//!     |       |
//! - Star  -  Q_0 -
//!     |       |
//! -  Q_1  - Plaq  -
//!     |       |
//! ```
//!
//! Stars measure the primal channel (X errors, living on the primal edge of every qubit) and plaquettes
//! measure the dual channel (Z errors, on the dual edge). Moving north decreases `y` and moving east increases `x`.
//! A toric lattice is periodic in both axes; a planar lattice has open boundaries represented by boundary nodes
//! that are used as matching endpoints but never measured.
//! Under faulty measurements the lattice is repeated over `size` time layers, with every stabilizer linked to its
//! copy in the previous layer by a bridge edge. The last layer is the decode layer.
//!

use super::error::*;
use super::util::*;
use crate::logical::LogicalCycle;
use crate::simulation::TrialStage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// periodic boundary in both directions
    Toric,
    /// open boundaries: smooth boundaries at the left and right for the primal channel, top and bottom for the dual channel
    Planar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
pub enum MeasurementModel {
    /// a single layer of perfect stabilizer measurements
    #[serde(rename = "2d")]
    #[value(name = "2d")]
    Perfect,
    /// `size` rounds of noisy stabilizer measurements, the last one being perfect
    #[serde(rename = "3d")]
    #[value(name = "3d")]
    Faulty,
}

/// the error channel, which is also the type of the stabilizers measuring it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// bit-flip errors detected by star operators
    Primal,
    /// phase-flip errors detected by plaquette operators
    Dual,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Primal, Channel::Dual];

    pub fn index(self) -> usize {
        match self {
            Self::Primal => 0,
            Self::Dual => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    /// towards the next time layer
    Up,
    /// towards the previous time layer
    Down,
}

impl Direction {
    pub const PLANE: [Direction; 4] = [Direction::North, Direction::South, Direction::East, Direction::West];

    pub fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::South => 1,
            Self::East => 2,
            Self::West => 3,
            Self::Up => 4,
            Self::Down => 5,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatticeConfig {
    /// linear size `L` of the lattice
    pub size: usize,
    pub topology: Topology,
    pub measurement: MeasurementModel,
    /// whether the dual (phase-flip) channel is simulated as well
    pub track_dual: bool,
}

impl LatticeConfig {
    pub fn new(size: usize, topology: Topology, measurement: MeasurementModel, track_dual: bool) -> Self {
        Self {
            size,
            topology,
            measurement,
            track_dual,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size < 2 {
            return Err(SimulatorError::Config(format!("lattice size must be at least 2, got {}", self.size)));
        }
        Ok(())
    }

    /// number of time layers
    pub fn layer_num(&self) -> usize {
        match self.measurement {
            MeasurementModel::Perfect => 1,
            MeasurementModel::Faulty => self.size,
        }
    }

    /// the layer on which the correction is applied and the logical operators are evaluated
    pub fn decode_layer(&self) -> LayerIndex {
        self.layer_num() - 1
    }

    pub fn channels(&self) -> Vec<Channel> {
        if self.track_dual {
            Channel::ALL.to_vec()
        } else {
            vec![Channel::Primal]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// a measured parity check
    Stabilizer,
    /// open lattice edge with fixed parity, only used as a matching endpoint
    Boundary,
}

/// a stabilizer or boundary node
#[derive(Debug, Clone)]
pub struct LatticeNode {
    pub node_type: NodeType,
    pub channel: Channel,
    pub y: isize,
    pub x: isize,
    pub layer: LayerIndex,
    /// neighbor node and the connecting edge, indexed by [`Direction::index`]
    pub neighbors: [Option<(NodeIndex, EdgeIndex)>; 6],
    /// the data qubit edges entangled with this stabilizer
    pub parity_edges: Vec<EdgeIndex>,
    /// the (possibly erroneous) measurement outcome
    pub parity: bool,
    /// whether this node is an anyon
    pub state: bool,
    /// whether the measurement of this node suffered a measurement error
    pub mstate: bool,
}

impl LatticeNode {
    fn new(node_type: NodeType, channel: Channel, y: isize, x: isize, layer: LayerIndex) -> Self {
        Self {
            node_type,
            channel,
            y,
            x,
            layer,
            neighbors: [None; 6],
            parity_edges: vec![],
            parity: false,
            state: false,
            mstate: false,
        }
    }

    pub fn neighbor(&self, direction: Direction) -> Option<(NodeIndex, EdgeIndex)> {
        self.neighbors[direction.index()]
    }

    pub fn is_boundary(&self) -> bool {
        self.node_type == NodeType::Boundary
    }

    fn reset(&mut self) {
        self.parity = false;
        self.state = false;
        self.mstate = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// an error channel of a data qubit
    Qubit(QubitIndex),
    /// time-like edge between the copies of a stabilizer in consecutive layers
    Bridge,
}

#[derive(Debug, Clone)]
pub struct LatticeEdge {
    pub kind: EdgeKind,
    pub channel: Channel,
    pub layer: LayerIndex,
    /// at most two incident nodes; the edge is referenced by them, not owned
    nodes: Vec<NodeIndex>,
    /// whether the qubit currently suffers an error in this channel
    pub state: bool,
    /// whether this edge is part of the applied matching
    pub matching: bool,
    /// whether the qubit is erased
    pub is_erasure: bool,
}

impl LatticeEdge {
    fn new(kind: EdgeKind, channel: Channel, layer: LayerIndex) -> Self {
        Self {
            kind,
            channel,
            layer,
            nodes: Vec::with_capacity(2),
            state: false,
            matching: false,
            is_erasure: false,
        }
    }

    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    fn reset(&mut self) {
        self.state = false;
        self.matching = false;
        self.is_erasure = false;
    }
}

#[derive(Debug, Clone)]
pub struct DataQubit {
    /// 0 for the qubit east of the star, 1 for the qubit south of it
    pub orientation: usize,
    pub y: isize,
    pub x: isize,
    pub layer: LayerIndex,
    /// primal and dual edge, indexed by [`Channel::index`]
    pub edges: [Option<EdgeIndex>; 2],
}

#[derive(Debug, Clone)]
pub struct Lattice {
    pub config: LatticeConfig,
    pub nodes: Vec<LatticeNode>,
    pub edges: Vec<LatticeEdge>,
    pub qubits: Vec<DataQubit>,
    /// stabilizer nodes of each layer, in construction order
    pub layer_stabilizers: Vec<Vec<NodeIndex>>,
    /// data qubits of each layer, in construction order
    pub layer_qubits: Vec<Vec<QubitIndex>>,
    /// non-contractible cycles on the decode layer
    pub logical_cycles: Vec<LogicalCycle>,
    stabilizer_map: HashMap<(Channel, isize, isize, LayerIndex), NodeIndex>,
    boundary_map: HashMap<(Channel, isize, isize, LayerIndex), NodeIndex>,
    qubit_map: HashMap<(usize, isize, isize, LayerIndex), QubitIndex>,
    pub(crate) stage: TrialStage,
}

impl Lattice {
    /// build the full node and edge graph
    pub fn new(config: LatticeConfig) -> Result<Self> {
        config.validate()?;
        let layer_num = config.layer_num();
        let mut lattice = Self {
            config,
            nodes: vec![],
            edges: vec![],
            qubits: vec![],
            layer_stabilizers: (0..layer_num).map(|_| vec![]).collect(),
            layer_qubits: (0..layer_num).map(|_| vec![]).collect(),
            logical_cycles: vec![],
            stabilizer_map: HashMap::new(),
            boundary_map: HashMap::new(),
            qubit_map: HashMap::new(),
            stage: TrialStage::Reset,
        };
        for layer in 0..layer_num {
            match config.topology {
                Topology::Toric => lattice.init_toric_layer(layer)?,
                Topology::Planar => lattice.init_planar_layer(layer)?,
            }
            if layer > 0 {
                lattice.init_bridges(layer)?;
            }
        }
        lattice.logical_cycles = LogicalCycle::build(&lattice);
        log::debug!(
            "constructed {:?} lattice of size {} with {} layer(s): {} nodes, {} edges, {} qubits",
            config.topology,
            config.size,
            layer_num,
            lattice.nodes.len(),
            lattice.edges.len(),
            lattice.qubits.len()
        );
        Ok(lattice)
    }

    pub fn size(&self) -> usize {
        self.config.size
    }

    pub fn decode_layer(&self) -> LayerIndex {
        self.config.decode_layer()
    }

    pub fn stage(&self) -> TrialStage {
        self.stage
    }

    pub(crate) fn transition(&mut self, expected: TrialStage, next: TrialStage) -> Result<()> {
        if self.stage != expected {
            return Err(SimulatorError::InvalidStage {
                expected,
                found: self.stage,
            });
        }
        self.stage = next;
        Ok(())
    }

    fn init_toric_layer(&mut self, layer: LayerIndex) -> Result<()> {
        let size = self.config.size as isize;
        for channel in self.config.channels() {
            for y in 0..size {
                for x in 0..size {
                    self.add_node(NodeType::Stabilizer, channel, y, x, layer);
                }
            }
        }
        let track_dual = self.config.track_dual;
        let wrap = |value: isize| value.rem_euclid(size);
        for y in 0..size {
            for x in 0..size {
                let qubit = self.add_qubit(0, y, x, layer);
                let west = self.require_stabilizer(Channel::Primal, y, x, layer, Direction::East)?;
                let east = self.require_stabilizer(Channel::Primal, y, wrap(x + 1), layer, Direction::East)?;
                self.connect(qubit, Channel::Primal, west, east, Direction::East)?;
                if track_dual {
                    let north = self.require_stabilizer(Channel::Dual, wrap(y - 1), x, layer, Direction::North)?;
                    let south = self.require_stabilizer(Channel::Dual, y, x, layer, Direction::North)?;
                    self.connect(qubit, Channel::Dual, north, south, Direction::South)?;
                }
                let qubit = self.add_qubit(1, y, x, layer);
                let north = self.require_stabilizer(Channel::Primal, y, x, layer, Direction::South)?;
                let south = self.require_stabilizer(Channel::Primal, wrap(y + 1), x, layer, Direction::South)?;
                self.connect(qubit, Channel::Primal, north, south, Direction::South)?;
                if track_dual {
                    let west = self.require_stabilizer(Channel::Dual, y, wrap(x - 1), layer, Direction::West)?;
                    let east = self.require_stabilizer(Channel::Dual, y, x, layer, Direction::West)?;
                    self.connect(qubit, Channel::Dual, west, east, Direction::East)?;
                }
            }
        }
        Ok(())
    }

    fn init_planar_layer(&mut self, layer: LayerIndex) -> Result<()> {
        let size = self.config.size as isize;
        let track_dual = self.config.track_dual;
        for y in 0..size {
            for x in 1..size {
                self.add_node(NodeType::Stabilizer, Channel::Primal, y, x, layer);
            }
            self.add_node(NodeType::Boundary, Channel::Primal, y, 0, layer);
            self.add_node(NodeType::Boundary, Channel::Primal, y, size, layer);
        }
        if track_dual {
            for y in 0..size - 1 {
                for x in 0..size {
                    self.add_node(NodeType::Stabilizer, Channel::Dual, y, x, layer);
                }
            }
            for x in 0..size {
                self.add_node(NodeType::Boundary, Channel::Dual, -1, x, layer);
                self.add_node(NodeType::Boundary, Channel::Dual, size - 1, x, layer);
            }
        }
        for y in 0..size {
            for x in 0..size {
                let qubit = self.add_qubit(0, y, x, layer);
                let west = self.require_node(Channel::Primal, y, x, layer, Direction::East)?;
                let east = self.require_node(Channel::Primal, y, x + 1, layer, Direction::East)?;
                self.connect(qubit, Channel::Primal, west, east, Direction::East)?;
                if track_dual {
                    let north = self.require_node(Channel::Dual, y - 1, x, layer, Direction::North)?;
                    let south = self.require_node(Channel::Dual, y, x, layer, Direction::North)?;
                    self.connect(qubit, Channel::Dual, north, south, Direction::South)?;
                }
                if y + 1 < size && x + 1 < size {
                    let qubit = self.add_qubit(1, y, x + 1, layer);
                    let north = self.require_stabilizer(Channel::Primal, y, x + 1, layer, Direction::South)?;
                    let south = self.require_stabilizer(Channel::Primal, y + 1, x + 1, layer, Direction::South)?;
                    self.connect(qubit, Channel::Primal, north, south, Direction::South)?;
                    if track_dual {
                        let west = self.require_stabilizer(Channel::Dual, y, x, layer, Direction::West)?;
                        let east = self.require_stabilizer(Channel::Dual, y, x + 1, layer, Direction::West)?;
                        self.connect(qubit, Channel::Dual, west, east, Direction::East)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// link every stabilizer of `layer` with its copy in the previous layer
    fn init_bridges(&mut self, layer: LayerIndex) -> Result<()> {
        debug_assert!(layer > 0);
        let upper_nodes = self.layer_stabilizers[layer].clone();
        for upper in upper_nodes {
            let (channel, y, x) = {
                let node = &self.nodes[upper];
                (node.channel, node.y, node.x)
            };
            let lower = self.require_stabilizer(channel, y, x, layer - 1, Direction::Down)?;
            let edge_index = self.edges.len();
            self.edges.push(LatticeEdge::new(EdgeKind::Bridge, channel, layer));
            self.add_edge_node(edge_index, lower)?;
            self.add_edge_node(edge_index, upper)?;
            self.nodes[upper].neighbors[Direction::Down.index()] = Some((lower, edge_index));
            self.nodes[lower].neighbors[Direction::Up.index()] = Some((upper, edge_index));
        }
        Ok(())
    }

    fn add_node(&mut self, node_type: NodeType, channel: Channel, y: isize, x: isize, layer: LayerIndex) -> NodeIndex {
        let node_index = self.nodes.len();
        self.nodes.push(LatticeNode::new(node_type, channel, y, x, layer));
        let key = (channel, y, x, layer);
        match node_type {
            NodeType::Stabilizer => {
                let previous = self.stabilizer_map.insert(key, node_index);
                debug_assert!(previous.is_none(), "duplicate stabilizer {:?}", key);
                self.layer_stabilizers[layer].push(node_index);
            }
            NodeType::Boundary => {
                let previous = self.boundary_map.insert(key, node_index);
                debug_assert!(previous.is_none(), "duplicate boundary {:?}", key);
            }
        }
        node_index
    }

    fn add_qubit(&mut self, orientation: usize, y: isize, x: isize, layer: LayerIndex) -> QubitIndex {
        let qubit_index = self.qubits.len();
        self.qubits.push(DataQubit {
            orientation,
            y,
            x,
            layer,
            edges: [None, None],
        });
        self.qubit_map.insert((orientation, y, x, layer), qubit_index);
        self.layer_qubits[layer].push(qubit_index);
        qubit_index
    }

    fn require_stabilizer(
        &self,
        channel: Channel,
        y: isize,
        x: isize,
        layer: LayerIndex,
        direction: Direction,
    ) -> Result<NodeIndex> {
        self.stabilizer(channel, y, x, layer).ok_or(SimulatorError::Construction {
            channel,
            y,
            x,
            layer,
            direction,
        })
    }

    /// a stabilizer or, on the open edge of a planar lattice, a boundary node
    fn require_node(&self, channel: Channel, y: isize, x: isize, layer: LayerIndex, direction: Direction) -> Result<NodeIndex> {
        self.stabilizer(channel, y, x, layer)
            .or_else(|| self.boundary(channel, y, x, layer))
            .ok_or(SimulatorError::Construction {
                channel,
                y,
                x,
                layer,
                direction,
            })
    }

    /// create the `channel` edge of `qubit` between `from` and `to`, where `to` lies in `direction` of `from`
    fn connect(&mut self, qubit: QubitIndex, channel: Channel, from: NodeIndex, to: NodeIndex, direction: Direction) -> Result<()> {
        let layer = self.qubits[qubit].layer;
        let edge_index = self.edges.len();
        self.edges.push(LatticeEdge::new(EdgeKind::Qubit(qubit), channel, layer));
        self.qubits[qubit].edges[channel.index()] = Some(edge_index);
        self.add_edge_node(edge_index, from)?;
        self.add_edge_node(edge_index, to)?;
        self.nodes[from].neighbors[direction.index()] = Some((to, edge_index));
        self.nodes[to].neighbors[direction.opposite().index()] = Some((from, edge_index));
        for node_index in [from, to] {
            let node = &mut self.nodes[node_index];
            if !node.is_boundary() {
                node.parity_edges.push(edge_index);
            }
        }
        Ok(())
    }

    /// register an incident node of an edge, which must not exceed two
    pub fn add_edge_node(&mut self, edge_index: EdgeIndex, node_index: NodeIndex) -> Result<()> {
        let edge = &mut self.edges[edge_index];
        if edge.nodes.len() >= 2 {
            return Err(SimulatorError::InvalidEdgeNodes { edge: edge_index });
        }
        edge.nodes.push(node_index);
        Ok(())
    }

    /// replace the incident nodes of an edge, rejecting more than two entries
    pub fn set_edge_nodes(&mut self, edge_index: EdgeIndex, nodes: &[NodeIndex]) -> Result<()> {
        if nodes.len() > 2 {
            return Err(SimulatorError::InvalidEdgeNodes { edge: edge_index });
        }
        self.edges[edge_index].nodes = nodes.to_vec();
        Ok(())
    }

    pub fn stabilizer(&self, channel: Channel, y: isize, x: isize, layer: LayerIndex) -> Option<NodeIndex> {
        self.stabilizer_map.get(&(channel, y, x, layer)).copied()
    }

    pub fn boundary(&self, channel: Channel, y: isize, x: isize, layer: LayerIndex) -> Option<NodeIndex> {
        self.boundary_map.get(&(channel, y, x, layer)).copied()
    }

    pub fn qubit(&self, orientation: usize, y: isize, x: isize, layer: LayerIndex) -> Option<QubitIndex> {
        self.qubit_map.get(&(orientation, y, x, layer)).copied()
    }

    pub fn qubit_edge(&self, qubit: QubitIndex, channel: Channel) -> Option<EdgeIndex> {
        self.qubits[qubit].edges[channel.index()]
    }

    /// the copy of `node` in the given layer
    pub fn project(&self, node_index: NodeIndex, layer: LayerIndex) -> Option<NodeIndex> {
        let node = &self.nodes[node_index];
        match node.node_type {
            NodeType::Stabilizer => self.stabilizer(node.channel, node.y, node.x, layer),
            NodeType::Boundary => self.boundary(node.channel, node.y, node.x, layer),
        }
    }

    /// composite state of a qubit: one entry per existing edge, primal first
    pub fn qubit_state(&self, qubit: QubitIndex) -> Vec<bool> {
        self.qubits[qubit].edges.iter().flatten().map(|&edge_index| self.edges[edge_index].state).collect()
    }

    /// set the composite state of a qubit; the number of entries must match the number of its edges
    pub fn set_qubit_state(&mut self, qubit: QubitIndex, state: &[bool]) -> Result<()> {
        let edges: Vec<EdgeIndex> = self.qubits[qubit].edges.iter().flatten().copied().collect();
        if edges.len() != state.len() {
            return Err(SimulatorError::InvalidQubitState {
                qubit,
                expected: edges.len(),
                found: state.len(),
            });
        }
        for (edge_index, &value) in edges.into_iter().zip(state.iter()) {
            self.edges[edge_index].state = value;
        }
        Ok(())
    }

    /// toggle the error state of a qubit in the given channel, if that channel is simulated
    pub fn flip_qubit(&mut self, qubit: QubitIndex, channel: Channel) {
        if let Some(edge_index) = self.qubit_edge(qubit, channel) {
            let edge = &mut self.edges[edge_index];
            edge.state = !edge.state;
        }
    }

    /// restore every mutable field to its initial value without touching the graph structure
    pub fn reset(&mut self) {
        for edge in self.edges.iter_mut() {
            edge.reset();
        }
        for node in self.nodes.iter_mut() {
            node.reset();
        }
        self.stage = TrialStage::Reset;
    }

    /// number of edges (in-plane and time-like) that are part of the applied matching
    pub fn count_matching_weight(&self) -> usize {
        self.edges.iter().filter(|edge| edge.matching).count()
    }

    /// triggered stabilizers of a channel, over all layers
    pub fn anyons(&self, channel: Channel) -> Vec<NodeIndex> {
        self.layer_stabilizers
            .iter()
            .flatten()
            .copied()
            .filter(|&node_index| {
                let node = &self.nodes[node_index];
                node.state && node.channel == channel
            })
            .collect()
    }

    /// sanity check of the constructed graph, to avoid errors that are hard to debug
    pub fn sanity_check(&self) -> std::result::Result<(), String> {
        for (edge_index, edge) in self.edges.iter().enumerate() {
            if edge.nodes.len() != 2 {
                return Err(format!("edge {} has {} incident nodes", edge_index, edge.nodes.len()));
            }
            if edge.nodes[0] == edge.nodes[1] {
                return Err(format!("edge {} is a self loop", edge_index));
            }
        }
        let layer_num = self.config.layer_num();
        for (node_index, node) in self.nodes.iter().enumerate() {
            let in_plane = Direction::PLANE.iter().filter(|&&direction| node.neighbor(direction).is_some()).count();
            let valid = match (self.config.topology, node.node_type) {
                (Topology::Toric, NodeType::Stabilizer) => in_plane == 4,
                (Topology::Toric, NodeType::Boundary) => false,
                (Topology::Planar, NodeType::Stabilizer) => (3..=4).contains(&in_plane),
                (Topology::Planar, NodeType::Boundary) => in_plane == 1,
            };
            if !valid {
                return Err(format!("node {} {:?} has {} in-plane neighbors", node_index, node, in_plane));
            }
            if !node.is_boundary() && node.parity_edges.len() != in_plane {
                return Err(format!("node {} has {} parity edges", node_index, node.parity_edges.len()));
            }
            let has_down = node.neighbor(Direction::Down).is_some();
            let has_up = node.neighbor(Direction::Up).is_some();
            let expect_down = !node.is_boundary() && node.layer > 0;
            let expect_up = !node.is_boundary() && node.layer + 1 < layer_num;
            if has_down != expect_down || has_up != expect_up {
                return Err(format!("node {} has inconsistent time-like neighbors", node_index));
            }
        }
        Ok(())
    }
}
