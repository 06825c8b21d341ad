//! Lattice Distance
//!
//! Shortest paths on the skeleton graph of a single channel (in-plane qubit edges and time-like bridges, all of
//! unit weight) by Dijkstra's algorithm. The matching graph uses closed-form weights instead; this serves as an
//! independent reference for them and for the length of the applied correction chains.
//!

use super::lattice::*;
use super::util::*;
use crate::priority_queue::PriorityQueue;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CompleteGraph {
    pub channel: Channel,
    /// one entry per lattice node; nodes of the other channel stay isolated
    pub nodes: Vec<CompleteGraphNode>,
    /// nodes stamped with an older value count as unvisited; wraps around by clearing every stamp
    active_timestamp: usize,
}

#[derive(Debug, Clone)]
pub struct CompleteGraphNode {
    /// peer node -> (lattice edge, weight)
    pub edges: BTreeMap<NodeIndex, (EdgeIndex, Weight)>,
    /// timestamp for Dijkstra's algorithm
    timestamp: usize,
}

impl CompleteGraph {
    pub fn new(lattice: &Lattice, channel: Channel) -> Self {
        let mut nodes: Vec<CompleteGraphNode> = (0..lattice.nodes.len())
            .map(|_| CompleteGraphNode {
                edges: BTreeMap::new(),
                timestamp: 0,
            })
            .collect();
        for (edge_index, edge) in lattice.edges.iter().enumerate() {
            if edge.channel != channel {
                continue;
            }
            if let &[a, b] = edge.nodes() {
                nodes[a].edges.insert(b, (edge_index, 1));
                nodes[b].edges.insert(a, (edge_index, 1));
            }
        }
        Self {
            channel,
            nodes,
            active_timestamp: 0,
        }
    }

    /// start a new search, returning its stamp
    fn next_search_stamp(&mut self) -> usize {
        if self.active_timestamp == usize::MAX {
            self.active_timestamp = 0;
            for node in self.nodes.iter_mut() {
                node.timestamp = 0;
            }
        }
        self.active_timestamp += 1;
        self.active_timestamp
    }

    /// shortest distance to every reachable node as `{ peer: (previous, weight) }`, stopping once `terminate` is reached
    pub fn all_edges_with_terminate(&mut self, source: NodeIndex, terminate: NodeIndex) -> BTreeMap<NodeIndex, (NodeIndex, Weight)> {
        let active_timestamp = self.next_search_stamp();
        let mut pq = PriorityQueue::<NodeIndex, PriorityElement>::new();
        pq.push(source, PriorityElement::new(0, source));
        let mut computed_edges = BTreeMap::<NodeIndex, (NodeIndex, Weight)>::new();
        while let Some((target, PriorityElement { weight, previous })) = pq.pop() {
            debug_assert!(!computed_edges.contains_key(&target));
            self.nodes[target].timestamp = active_timestamp;
            if target != source {
                computed_edges.insert(target, (previous, weight));
                if target == terminate {
                    break;
                }
            }
            for (&neighbor, &(_, edge_weight)) in self.nodes[target].edges.iter() {
                if self.nodes[neighbor].timestamp == active_timestamp {
                    continue;
                }
                let neighbor_weight = weight + edge_weight;
                match pq.get_priority(&neighbor) {
                    Some(existing) if existing.weight <= neighbor_weight => {}
                    Some(_) => {
                        pq.change_priority(&neighbor, PriorityElement::new(neighbor_weight, target));
                    }
                    None => {
                        pq.push(neighbor, PriorityElement::new(neighbor_weight, target));
                    }
                }
            }
        }
        computed_edges
    }

    pub fn all_edges(&mut self, source: NodeIndex) -> BTreeMap<NodeIndex, (NodeIndex, Weight)> {
        self.all_edges_with_terminate(source, usize::MAX)
    }

    pub fn distance(&mut self, a: NodeIndex, b: NodeIndex) -> Option<Weight> {
        if a == b {
            return Some(0);
        }
        self.all_edges_with_terminate(a, b).get(&b).map(|&(_, weight)| weight)
    }

    /// lattice edges of a minimum-weight path from `a` to `b`, in walking order
    pub fn get_path(&mut self, a: NodeIndex, b: NodeIndex) -> Option<Vec<EdgeIndex>> {
        if a == b {
            return Some(vec![]);
        }
        let computed_edges = self.all_edges_with_terminate(a, b);
        if !computed_edges.contains_key(&b) {
            return None;
        }
        let mut path = vec![];
        let mut node = b;
        while node != a {
            let (previous, _) = computed_edges[&node];
            path.push(self.nodes[previous].edges[&node].0);
            node = previous;
        }
        path.reverse();
        Some(path)
    }
}

#[derive(Eq, Debug)]
pub struct PriorityElement {
    pub weight: Weight,
    pub previous: NodeIndex,
}

impl std::cmp::PartialEq for PriorityElement {
    #[inline]
    fn eq(&self, other: &PriorityElement) -> bool {
        self.weight == other.weight
    }
}

impl std::cmp::PartialOrd for PriorityElement {
    #[inline]
    fn partial_cmp(&self, other: &PriorityElement) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::cmp::Ord for PriorityElement {
    #[inline]
    fn cmp(&self, other: &PriorityElement) -> std::cmp::Ordering {
        other.weight.cmp(&self.weight) // reverse `self` and `other` to prioritize smaller weight
    }
}

impl PriorityElement {
    pub fn new(weight: Weight, previous: NodeIndex) -> Self {
        Self { weight, previous }
    }
}
