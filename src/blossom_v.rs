use super::cfg_if;
use super::error::*;
use super::util::*;
use std::collections::BTreeSet;

/// no self-loop and no two edges between the same pair of vertices
pub fn is_simple_graph(weighted_edges: &[(usize, usize, Weight)]) -> bool {
    let mut vertex_pairs = BTreeSet::new();
    weighted_edges.iter().all(|&(i, j, _)| i != j && vertex_pairs.insert((i.min(j), i.max(j))))
}

cfg_if::cfg_if! {
    if #[cfg(feature="blossom_v")] {

        use super::libc;
        use libc::c_int;

        #[link(name = "blossomV")]
        extern {
            fn minimum_weight_perfect_matching(node_num: c_int, edge_num: c_int, edges: *const c_int, weights: *const c_int, matched: *mut c_int);
        }

        /// struct-of-arrays boundary to Kolmogorov's Blossom V; returns the partner of every node
        pub fn safe_minimum_weight_perfect_matching(node_num: usize, weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>> {
            let edge_num = weighted_edges.len();
            let mut edges = Vec::with_capacity(2 * edge_num);
            let mut weights = Vec::with_capacity(edge_num);
            debug_assert!(is_simple_graph(weighted_edges), "blossom V requires a simple graph");
            let to_c_int = |value: usize| c_int::try_from(value).map_err(|_| SimulatorError::InvalidMatching {
                reason: format!("{} does not fit into the blossom V interface", value),
            });
            for &(i, j, weight) in weighted_edges.iter() {
                assert!(i < node_num && j < node_num);
                edges.push(to_c_int(i)?);
                edges.push(to_c_int(j)?);
                weights.push(c_int::try_from(weight).map_err(|_| SimulatorError::InvalidMatching {
                    reason: format!("weight {} does not fit into the blossom V interface", weight),
                })?);
            }
            let mut output: Vec<c_int> = vec![-1; node_num];
            unsafe {
                minimum_weight_perfect_matching(to_c_int(node_num)?, to_c_int(edge_num)?, edges.as_ptr(), weights.as_ptr(), output.as_mut_ptr());
            }
            output.into_iter().map(|peer| {
                usize::try_from(peer).map_err(|_| SimulatorError::SolverStatus { status: peer })
            }).collect()
        }

    } else {

        pub fn safe_minimum_weight_perfect_matching(_node_num: usize, _weighted_edges: &[(usize, usize, Weight)]) -> Result<Vec<usize>> {
            Err(SimulatorError::Config("need blossom V library: place its sources under `blossomV/` and rebuild".to_string()))
        }

    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "blossom_v")]
    fn blossom_v_square() {
        // cargo test blossom_v_square -- --nocapture
        let edges: Vec<(usize, usize, Weight)> = vec![(0, 1, 100), (2, 3, 110), (0, 2, 500), (1, 3, 300)];
        let output = safe_minimum_weight_perfect_matching(4, &edges).unwrap();
        assert_eq!(output, vec![1, 0, 3, 2]);
    }

    #[test]
    #[cfg(not(feature = "blossom_v"))]
    fn blossom_v_missing_library() {
        // cargo test blossom_v_missing_library -- --nocapture
        let edges: Vec<(usize, usize, Weight)> = vec![(0, 1, 1)];
        assert!(matches!(safe_minimum_weight_perfect_matching(2, &edges), Err(SimulatorError::Config(_))));
    }

    #[test]
    fn blossom_v_simple_graph() {
        // cargo test blossom_v_simple_graph -- --nocapture
        assert!(is_simple_graph(&[(0, 1, 3), (1, 2, 4)]));
        assert!(!is_simple_graph(&[(0, 1, 3), (1, 0, 4)]));
        assert!(!is_simple_graph(&[(2, 2, 0)]));
    }
}
