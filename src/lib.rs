extern crate libc;
extern crate cfg_if;
extern crate rand_xoshiro;
extern crate priority_queue;
extern crate serde;
extern crate serde_json;
extern crate derivative;
extern crate rayon;
extern crate clap;
extern crate pbr;
extern crate log;

pub mod blossom_v;
pub mod util;
pub mod error;
pub mod lattice;
pub mod error_model;
pub mod syndrome;
pub mod complete_graph;
pub mod matching_graph;
pub mod mwpm_solver;
pub mod decoder;
pub mod logical;
pub mod config;
pub mod simulation;
pub mod results;
pub mod cli;

use config::*;
use error::*;
use util::*;


/// run `trials` trials of a configuration over `workers` threads; the result is fully determined by `base_seed`
pub fn simulate(config: &SimulatorConfig, trials: usize, workers: usize, base_seed: u64) -> Result<BatchResult> {
    simulation::run_parallel(config, trials, workers, base_seed)
}
