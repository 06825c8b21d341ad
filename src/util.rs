use super::rand_xoshiro;
use crate::rand_xoshiro::rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature="i32_weight")] {
        /// use i32 to store weight to be compatible with blossom V library (c_int)
        pub type Weight = i32;
    } else {
        pub type Weight = i64;
    }
}

/// index into [`crate::lattice::Lattice::edges`]
pub type EdgeIndex = usize;
/// index into [`crate::lattice::Lattice::nodes`], both stabilizers and boundary nodes
pub type NodeIndex = usize;
/// index into [`crate::lattice::Lattice::qubits`]
pub type QubitIndex = usize;
/// the time layer of a node or a qubit; always 0 under perfect measurements
pub type LayerIndex = usize;

/// use Xoshiro256StarStar for deterministic random number generator
pub type DeterministicRng = rand_xoshiro::Xoshiro256StarStar;

pub trait F64Rng {
    fn next_f64(&mut self) -> f64;
}

impl F64Rng for DeterministicRng {
    fn next_f64(&mut self) -> f64 {
        f64::from_bits(0x3FF << 52 | self.next_u64() >> 12) - 1.
    }
}

/// seed of an individual trial, reproducible given the base seed, the worker and the trial index
pub fn derive_seed(base_seed: u64, worker: usize, trial: usize) -> u64 {
    base_seed
        .wrapping_add((worker as u64).wrapping_mul(1_000_000_000))
        .wrapping_add(trial as u64)
}

/// create the random number generator of an individual trial
pub fn trial_rng(base_seed: u64, worker: usize, trial: usize) -> DeterministicRng {
    DeterministicRng::seed_from_u64(derive_seed(base_seed, worker, trial))
}

/// fraction of successful trials; an empty set of trials has rate 0
pub fn success_rate(successes: usize, trials: usize) -> f64 {
    if trials == 0 {
        return 0.;
    }
    debug_assert!(successes <= trials, "more successes than trials");
    successes as f64 / trials as f64
}

/// the outcome counters of a batch of trials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// valid trials, i.e. those that reached the logical error evaluation
    pub trials: usize,
    /// valid trials without logical error
    pub successes: usize,
    /// trials abandoned because the matching failed; they're excluded from the statistics
    pub invalid: usize,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, success: bool) {
        self.trials += 1;
        if success {
            self.successes += 1;
        }
    }

    pub fn record_invalid(&mut self) {
        self.invalid += 1;
    }

    /// combine the counters of another batch into this one
    pub fn merge(&mut self, other: &Self) {
        self.trials += other.trials;
        self.successes += other.successes;
        self.invalid += other.invalid;
    }

    pub fn success_rate(&self) -> f64 {
        success_rate(self.successes, self.trials)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn util_derive_seed_is_distinct_per_worker() {
        // cargo test util_derive_seed_is_distinct_per_worker -- --nocapture
        let base = 12345;
        assert_eq!(derive_seed(base, 0, 0), base);
        assert_ne!(derive_seed(base, 0, 1), derive_seed(base, 1, 0));
        assert_eq!(derive_seed(base, 3, 7), derive_seed(base, 3, 7));
        let mut rng_1 = trial_rng(base, 2, 5);
        let mut rng_2 = trial_rng(base, 2, 5);
        for _ in 0..10 {
            assert_eq!(rng_1.next_f64(), rng_2.next_f64());
        }
    }

    #[test]
    fn util_next_f64_in_unit_interval() {
        // cargo test util_next_f64_in_unit_interval -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(0);
        for _ in 0..10000 {
            let value = rng.next_f64();
            assert!((0. ..1.).contains(&value));
        }
    }

    #[test]
    fn util_success_rate() {
        // cargo test util_success_rate -- --nocapture
        assert_eq!(success_rate(0, 0), 0.);
        assert_eq!(success_rate(3, 4), 0.75);
        let mut batch = BatchResult::new();
        batch.record(true);
        batch.record(false);
        batch.record_invalid();
        assert_eq!(batch.trials, 2);
        assert_eq!(batch.invalid, 1);
        assert_eq!(batch.success_rate(), 0.5);
        let mut total = BatchResult::new();
        total.merge(&batch);
        total.merge(&batch);
        assert_eq!(total, BatchResult { trials: 4, successes: 2, invalid: 2 });
    }
}
