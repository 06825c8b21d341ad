//! Minimum-Weight Perfect Matching Solver
//!
//! Every backend receives a node count and a list of weighted edges, and returns the partner of every node.
//! The result is validated here regardless of the backend: it must be an involution without fixed points that
//! only uses given edges.
//!

use super::blossom_v;
use super::error::*;
use super::matching_graph::*;
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// vertex left unmatched by a solver
pub const UNMATCHED: usize = usize::MAX;

pub trait MatchingSolver {
    /// minimum-weight perfect matching, as the partner of every node
    fn solve(&mut self, node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SolverType {
    /// maximum-weight maximum-cardinality matching on complemented weights
    #[default]
    MaxWeight,
    /// Kolmogorov's Blossom V library, only available when compiled in
    BlossomV,
    /// exact dynamic programming over vertex subsets, for small instances
    Exhaustive,
}

impl SolverType {
    pub fn build(&self) -> Box<dyn MatchingSolver + Send> {
        match self {
            Self::MaxWeight => Box::new(SolverMaxWeight::new()),
            Self::BlossomV => Box::new(SolverBlossomV::new()),
            Self::Exhaustive => Box::new(SolverExhaustive::new()),
        }
    }
}

/// general weighted matching by the `mwmatching` crate
#[derive(Debug, Clone, Default)]
pub struct SolverMaxWeight {}

impl SolverMaxWeight {
    pub fn new() -> Self {
        Self {}
    }
}

impl MatchingSolver for SolverMaxWeight {
    fn solve(&mut self, node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>> {
        if node_num == 0 {
            return Ok(vec![]);
        }
        // among the matchings of maximum cardinality, maximizing the sum of `offset - w` minimizes the sum of `w`
        let offset = weighted_edges.iter().map(|&(_, _, weight)| weight).max().unwrap_or(0) + 1;
        let mut edges = Vec::with_capacity(weighted_edges.len());
        for &(i, j, weight) in weighted_edges.iter() {
            let complemented = i32::try_from(offset - weight).map_err(|_| SimulatorError::InvalidMatching {
                reason: format!("weight {} is out of range", weight),
            })?;
            edges.push((i, j, complemented));
        }
        let mut mates = mwmatching::Matching::new(edges).max_cardinality().solve();
        // isolated trailing vertices are not reported
        mates.resize(node_num.max(mates.len()), UNMATCHED);
        Ok(mates)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolverBlossomV {}

impl SolverBlossomV {
    pub fn new() -> Self {
        Self {}
    }
}

impl MatchingSolver for SolverBlossomV {
    fn solve(&mut self, node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>> {
        if node_num == 0 {
            return Ok(vec![]);
        }
        blossom_v::safe_minimum_weight_perfect_matching(node_num, weighted_edges)
    }
}

/// exact minimum-weight perfect matching in `O(2^n n)`; always matches the lowest unmatched vertex first
#[derive(Derivative, Clone, Default)]
#[derivative(Debug)]
pub struct SolverExhaustive {
    /// `table[mask]`: the minimum weight to match the vertices outside `mask` and the partner chosen for the lowest one
    #[derivative(Debug = "ignore")]
    table: Vec<Option<(Weight, usize)>>,
}

impl SolverExhaustive {
    pub const MAX_NODE_NUM: usize = 20;

    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchingSolver for SolverExhaustive {
    fn solve(&mut self, node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>> {
        if node_num > Self::MAX_NODE_NUM {
            return Err(SimulatorError::SolverCapacity {
                node_num,
                max: Self::MAX_NODE_NUM,
            });
        }
        if node_num % 2 == 1 {
            return Err(SimulatorError::NoPerfectMatching { node_num });
        }
        let mut adjacency: Vec<Vec<Option<Weight>>> = vec![vec![None; node_num]; node_num];
        for &(i, j, weight) in weighted_edges.iter() {
            let entry = &mut adjacency[i][j];
            if entry.map_or(true, |existing| weight < existing) {
                *entry = Some(weight);
                adjacency[j][i] = Some(weight);
            }
        }
        let full = (1usize << node_num) - 1;
        self.table.clear();
        self.table.resize(full + 1, None);
        self.table[full] = Some((0, UNMATCHED));
        // a mask only depends on strictly larger masks
        for mask in (0..full).rev() {
            if mask.count_ones() % 2 == 1 {
                continue;
            }
            let lowest = (!mask).trailing_zeros() as usize;
            let mut best: Option<(Weight, usize)> = None;
            for peer in lowest + 1..node_num {
                if mask & (1 << peer) != 0 {
                    continue;
                }
                let (Some(weight), Some((rest, _))) = (adjacency[lowest][peer], self.table[mask | (1 << lowest) | (1 << peer)]) else {
                    continue;
                };
                if best.map_or(true, |(best_weight, _)| weight + rest < best_weight) {
                    best = Some((weight + rest, peer));
                }
            }
            self.table[mask] = best;
        }
        if self.table[0].is_none() {
            return Err(SimulatorError::NoPerfectMatching { node_num });
        }
        let mut mates = vec![UNMATCHED; node_num];
        let mut mask = 0;
        while mask != full {
            let lowest = (!mask).trailing_zeros() as usize;
            let (_, peer) = self.table[mask].ok_or(SimulatorError::NoPerfectMatching { node_num })?;
            mates[lowest] = peer;
            mates[peer] = lowest;
            mask |= (1 << lowest) | (1 << peer);
        }
        Ok(mates)
    }
}

/// check that `mates` is a perfect matching over the given edges
pub fn validate_matching(node_num: usize, weighted_edges: &[(usize, usize, Weight)], mates: &[usize]) -> Result<()> {
    if mates.len() != node_num {
        return Err(SimulatorError::InvalidMatching {
            reason: format!("{} partners reported for {} vertices", mates.len(), node_num),
        });
    }
    let existing_edges: BTreeSet<(usize, usize)> = weighted_edges.iter().map(|&(i, j, _)| (i.min(j), i.max(j))).collect();
    for (vertex, &peer) in mates.iter().enumerate() {
        if peer == UNMATCHED {
            return Err(SimulatorError::NoPerfectMatching { node_num });
        }
        if peer >= node_num || peer == vertex {
            return Err(SimulatorError::InvalidMatching {
                reason: format!("vertex {} is matched to {}", vertex, peer),
            });
        }
        if mates[peer] != vertex {
            return Err(SimulatorError::InvalidMatching {
                reason: format!("vertex {} is matched to {} but {} is matched to {}", vertex, peer, peer, mates[peer]),
            });
        }
        if !existing_edges.contains(&(vertex.min(peer), vertex.max(peer))) {
            return Err(SimulatorError::InvalidMatching {
                reason: format!("no edge between the matched vertices {} and {}", vertex, peer),
            });
        }
    }
    Ok(())
}

/// a matched pair of vertices together with their nodes on the decode layer and in the detected layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    /// vertices of the matching graph
    pub vertices: (usize, usize),
    /// nodes on the decode layer, where the correction is applied
    pub decode_nodes: (NodeIndex, NodeIndex),
    /// nodes in the layer they were detected in, where the matching is recorded
    pub nodes: (NodeIndex, NodeIndex),
    /// both vertices are virtual boundary nodes
    pub both_virtual: bool,
}

/// solve the matching graph of one channel and return every matched pair once, together with the total weight
pub fn solve_matching_graph(graph: &MatchingGraph, solver: &mut dyn MatchingSolver) -> Result<(Vec<MatchedPair>, Weight)> {
    let node_num = graph.node_num();
    if node_num == 0 {
        return Ok((vec![], 0));
    }
    if node_num % 2 == 1 {
        return Err(SimulatorError::OddAnyonCount {
            channel: graph.channel,
            count: node_num,
        });
    }
    let mates = solver.solve(node_num, &graph.weighted_edges)?;
    validate_matching(node_num, &graph.weighted_edges, &mates)?;
    let weight = graph.matching_weight(&mates);
    log::trace!("{:?} matching of {} vertices with weight {}", graph.channel, node_num, weight);
    let pairs = mates
        .iter()
        .enumerate()
        .filter(|&(vertex, &peer)| vertex < peer)
        .map(|(vertex, &peer)| MatchedPair {
            vertices: (vertex, peer),
            decode_nodes: (graph.decode_nodes[vertex], graph.decode_nodes[peer]),
            nodes: (graph.nodes[vertex], graph.nodes[peer]),
            both_virtual: graph.is_virtual(vertex) && graph.is_virtual(peer),
        })
        .collect();
    Ok((pairs, weight))
}
