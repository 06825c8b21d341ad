//! Simulation
//!
//! A trial drives the lattice through a fixed sequence of stages; every step checks that the previous one has
//! completed. Trials whose matching fails are counted as invalid and excluded from the success rate.
//! Batches are split over workers, each owning its own lattice, and only aggregated after all of them finish.
//!

use super::config::*;
use super::decoder::*;
use super::error::*;
use super::error_model::*;
use super::lattice::*;
use super::logical::*;
use super::syndrome::*;
use super::util::*;
use crate::rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrialStage {
    Reset,
    ErrorsInjected,
    SyndromeExtracted,
    MatchingComputed,
    MatchingApplied,
    LogicalErrorEvaluated,
}

#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// the errors of this trial, enough to replay it
    pub pattern: ErrorPattern,
    /// number of anyons over all channels and layers
    pub anyon_num: usize,
    /// number of edges in the applied matching
    pub matching_weight: usize,
    pub logical: LogicalOutcome,
}

impl TrialOutcome {
    pub fn success(&self) -> bool {
        self.logical.success
    }
}

#[derive(Debug, Clone)]
pub struct Simulator {
    pub lattice: Lattice,
    pub probabilities: ErrorProbabilities,
    pub decoder: MwpmDecoder,
}

impl Simulator {
    pub fn new(config: &SimulatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            lattice: Lattice::new(config.lattice_config())?,
            probabilities: config.probabilities(),
            decoder: MwpmDecoder::new(config.solver),
        })
    }

    pub fn stage(&self) -> TrialStage {
        self.lattice.stage()
    }

    /// sample new errors onto a reset lattice
    pub fn inject_errors(&mut self, rng: &mut DeterministicRng) -> Result<ErrorPattern> {
        self.lattice.transition(TrialStage::Reset, TrialStage::ErrorsInjected)?;
        Ok(apply_errors(&mut self.lattice, &self.probabilities, rng))
    }

    /// replay recorded errors onto a reset lattice
    pub fn inject_pattern(&mut self, pattern: &ErrorPattern) -> Result<()> {
        self.lattice.transition(TrialStage::Reset, TrialStage::ErrorsInjected)?;
        apply_error_pattern(&mut self.lattice, pattern)
    }

    pub fn extract_syndrome(&mut self) -> Result<usize> {
        self.lattice.transition(TrialStage::ErrorsInjected, TrialStage::SyndromeExtracted)?;
        Ok(measure_syndrome(&mut self.lattice))
    }

    pub fn compute_matching(&mut self) -> Result<Vec<ChannelMatching>> {
        if self.lattice.stage() != TrialStage::SyndromeExtracted {
            return Err(SimulatorError::InvalidStage {
                expected: TrialStage::SyndromeExtracted,
                found: self.lattice.stage(),
            });
        }
        let matchings = self.decoder.compute_matching(&self.lattice)?;
        self.lattice.transition(TrialStage::SyndromeExtracted, TrialStage::MatchingComputed)?;
        Ok(matchings)
    }

    pub fn apply_matching(&mut self, matchings: &[ChannelMatching]) -> Result<usize> {
        if self.lattice.stage() != TrialStage::MatchingComputed {
            return Err(SimulatorError::InvalidStage {
                expected: TrialStage::MatchingComputed,
                found: self.lattice.stage(),
            });
        }
        let weight = self.decoder.apply(&mut self.lattice, matchings)?;
        self.lattice.transition(TrialStage::MatchingComputed, TrialStage::MatchingApplied)?;
        Ok(weight)
    }

    pub fn evaluate(&mut self) -> Result<LogicalOutcome> {
        self.lattice.transition(TrialStage::MatchingApplied, TrialStage::LogicalErrorEvaluated)?;
        Ok(evaluate(&self.lattice))
    }

    /// reset the lattice and run a full trial with freshly sampled errors
    pub fn run_trial(&mut self, rng: &mut DeterministicRng) -> Result<TrialOutcome> {
        self.lattice.reset();
        let pattern = self.inject_errors(rng)?;
        self.decode_trial(pattern)
    }

    /// reset the lattice and run a full trial on recorded errors
    pub fn run_trial_with_pattern(&mut self, pattern: &ErrorPattern) -> Result<TrialOutcome> {
        self.lattice.reset();
        self.inject_pattern(pattern)?;
        self.decode_trial(pattern.clone())
    }

    fn decode_trial(&mut self, pattern: ErrorPattern) -> Result<TrialOutcome> {
        let anyon_num = self.extract_syndrome()?;
        let matchings = self.compute_matching()?;
        let matching_weight = self.apply_matching(&matchings)?;
        let logical = self.evaluate()?;
        Ok(TrialOutcome {
            pattern,
            anyon_num,
            matching_weight,
            logical,
        })
    }

    /// record the outcome of a trial; matching failures count as invalid and any other error is returned
    pub fn record(result: &mut BatchResult, outcome: Result<TrialOutcome>) -> Result<Option<TrialOutcome>> {
        match outcome {
            Ok(outcome) => {
                result.record(outcome.success());
                Ok(Some(outcome))
            }
            Err(error) if error.is_matching_failure() => {
                log::warn!("trial abandoned: {}", error);
                result.record_invalid();
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// run trials `0..trials` of one worker, every trial seeded from `(base_seed, worker, trial)`
    pub fn run_batch(&mut self, trials: usize, worker: usize, base_seed: u64) -> Result<BatchResult> {
        self.run_batch_with(trials, worker, base_seed, |_, _| {})
    }

    /// like [`Self::run_batch`], calling `callback` after every trial with the trial index and its outcome
    pub fn run_batch_with<F>(&mut self, trials: usize, worker: usize, base_seed: u64, mut callback: F) -> Result<BatchResult>
    where
        F: FnMut(usize, Option<&TrialOutcome>),
    {
        let mut result = BatchResult::new();
        for trial in 0..trials {
            let mut rng = trial_rng(base_seed, worker, trial);
            let outcome = Self::record(&mut result, self.run_trial(&mut rng))?;
            callback(trial, outcome.as_ref());
        }
        log::debug!(
            "worker {} finished {} valid and {} invalid trials with success rate {}",
            worker,
            result.trials,
            result.invalid,
            result.success_rate()
        );
        Ok(result)
    }
}

/// split `trials` as evenly as possible over `workers`
pub fn split_trials(trials: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    (0..workers)
        .map(|worker| trials / workers + usize::from(worker < trials % workers))
        .collect()
}

/// run `trials` trials in parallel, one simulator per worker; the result doesn't depend on thread scheduling
pub fn run_parallel(config: &SimulatorConfig, trials: usize, workers: usize, base_seed: u64) -> Result<BatchResult> {
    config.validate()?;
    let worker_trials = split_trials(trials, workers);
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_trials.len())
        .build()
        .map_err(|error| SimulatorError::Config(format!("cannot build thread pool: {}", error)))?;
    log::info!(
        "running {} trials of size {} {:?} {:?} over {} workers",
        trials,
        config.size,
        config.topology,
        config.dimension,
        worker_trials.len()
    );
    let results: Vec<BatchResult> = thread_pool.install(|| {
        worker_trials
            .par_iter()
            .enumerate()
            .map(|(worker, &count)| Simulator::new(config)?.run_batch(count, worker, base_seed))
            .collect::<Result<Vec<BatchResult>>>()
    })?;
    let mut total = BatchResult::new();
    for result in results.iter() {
        total.merge(result);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mwpm_solver::SolverType;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn simulation_stage_order() {
        // cargo test simulation_stage_order -- --nocapture
        let mut simulator = Simulator::new(&SimulatorConfig::new(4)).unwrap();
        assert_eq!(simulator.stage(), TrialStage::Reset);
        assert!(matches!(
            simulator.extract_syndrome(),
            Err(SimulatorError::InvalidStage {
                expected: TrialStage::ErrorsInjected,
                found: TrialStage::Reset
            })
        ));
        let mut rng = DeterministicRng::seed_from_u64(0);
        simulator.inject_errors(&mut rng).unwrap();
        assert!(matches!(simulator.inject_errors(&mut rng), Err(SimulatorError::InvalidStage { .. })));
        assert!(matches!(simulator.evaluate(), Err(SimulatorError::InvalidStage { .. })));
        simulator.extract_syndrome().unwrap();
        let matchings = simulator.compute_matching().unwrap();
        assert!(matches!(simulator.compute_matching(), Err(SimulatorError::InvalidStage { .. })));
        simulator.apply_matching(&matchings).unwrap();
        assert!(simulator.evaluate().unwrap().success);
        assert_eq!(simulator.stage(), TrialStage::LogicalErrorEvaluated);
        simulator.lattice.reset();
        assert_eq!(simulator.stage(), TrialStage::Reset);
    }

    #[test]
    fn simulation_trial_is_reproducible() {
        // cargo test simulation_trial_is_reproducible -- --nocapture
        let mut config = SimulatorConfig::new(5);
        config.dimension = MeasurementModel::Faulty;
        config.p_x = 0.03;
        config.p_z = 0.03;
        config.pm_x = 0.03;
        config.pm_z = 0.03;
        let mut simulator = Simulator::new(&config).unwrap();
        let outcome = simulator.run_trial(&mut trial_rng(7, 1, 2)).unwrap();
        let mut other = Simulator::new(&config).unwrap();
        let same = other.run_trial(&mut trial_rng(7, 1, 2)).unwrap();
        assert_eq!(outcome.pattern, same.pattern);
        assert_eq!(outcome.logical, same.logical);
        let replayed = other.run_trial_with_pattern(&outcome.pattern).unwrap();
        assert_eq!(replayed.logical, outcome.logical);
        assert_eq!(replayed.matching_weight, outcome.matching_weight);
    }

    #[test]
    fn simulation_split_trials() {
        // cargo test simulation_split_trials -- --nocapture
        assert_eq!(split_trials(10, 3), vec![4, 3, 3]);
        assert_eq!(split_trials(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_trials(5, 0), vec![5]);
    }

    #[test]
    fn simulation_parallel_is_deterministic() {
        // cargo test simulation_parallel_is_deterministic -- --nocapture
        let mut config = SimulatorConfig::new(5);
        config.p_x = 0.05;
        config.p_z = 0.05;
        let result_1 = run_parallel(&config, 200, 4, 1234).unwrap();
        let result_2 = run_parallel(&config, 200, 4, 1234).unwrap();
        assert_eq!(result_1, result_2);
        assert_eq!(result_1.trials + result_1.invalid, 200);
        let mut serial = BatchResult::new();
        for (worker, count) in split_trials(200, 4).into_iter().enumerate() {
            let mut simulator = Simulator::new(&config).unwrap();
            serial.merge(&simulator.run_batch(count, worker, 1234).unwrap());
        }
        assert_eq!(serial, result_1);
    }

    fn single_flip_pattern(simulator: &Simulator, qubit: QubitIndex, channel: Channel) -> ErrorPattern {
        let lattice = &simulator.lattice;
        let mut pattern = ErrorPattern::new_empty(lattice.config.layer_num());
        pattern.layers[0].flips.push(lattice.qubit_edge(qubit, channel).unwrap());
        pattern
    }

    #[test]
    fn simulation_toric_single_error() {
        // cargo test simulation_toric_single_error -- --nocapture
        let mut simulator = Simulator::new(&SimulatorConfig::new(8)).unwrap();
        let qubit = simulator.lattice.qubit(1, 3, 5, 0).unwrap();
        let pattern = single_flip_pattern(&simulator, qubit, Channel::Primal);
        let outcome = simulator.run_trial_with_pattern(&pattern).unwrap();
        assert_eq!(outcome.anyon_num, 2);
        assert_eq!(outcome.matching_weight, 1);
        assert!(outcome.success());
        assert_eq!(simulator.lattice.qubit_state(qubit), vec![false, false]);
    }

    #[test]
    fn simulation_planar_boundary_error() {
        // cargo test simulation_planar_boundary_error -- --nocapture
        let mut config = SimulatorConfig::new(6);
        config.topology = Topology::Planar;
        let mut simulator = Simulator::new(&config).unwrap();
        let y = 2;
        let qubit = simulator.lattice.qubit(0, y, 0, 0).unwrap();
        let pattern = single_flip_pattern(&simulator, qubit, Channel::Primal);
        simulator.inject_pattern(&pattern).unwrap();
        assert_eq!(simulator.extract_syndrome().unwrap(), 1);
        let star = simulator.lattice.stabilizer(Channel::Primal, y, 1, 0).unwrap();
        assert_eq!(simulator.lattice.anyons(Channel::Primal), vec![star]);
        let matchings = simulator.compute_matching().unwrap();
        let primal = &matchings[0];
        assert_eq!((primal.anyon_num, primal.weight), (1, 1));
        assert_eq!(primal.pairs.len(), 1);
        assert_eq!(primal.pairs[0].decode_nodes.0, star);
        assert_eq!(simulator.apply_matching(&matchings).unwrap(), 1);
        assert!(simulator.evaluate().unwrap().success);
    }

    #[test]
    fn simulation_planar_virtual_pairs_are_dropped() {
        // cargo test simulation_planar_virtual_pairs_are_dropped -- --nocapture
        let mut config = SimulatorConfig::new(6);
        config.topology = Topology::Planar;
        config.track_dual = false;
        let mut simulator = Simulator::new(&config).unwrap();
        // two anyons next to opposite boundaries: each matches its own boundary and the two virtual nodes pair up
        let mut pattern = ErrorPattern::new_empty(1);
        for x in [0, 5] {
            let qubit = simulator.lattice.qubit(0, 3, x, 0).unwrap();
            pattern.layers[0].flips.push(simulator.lattice.qubit_edge(qubit, Channel::Primal).unwrap());
        }
        simulator.inject_pattern(&pattern).unwrap();
        assert_eq!(simulator.extract_syndrome().unwrap(), 2);
        let matchings = simulator.compute_matching().unwrap();
        assert_eq!(matchings[0].weight, 2);
        assert_eq!(matchings[0].pairs.len(), 2);
        assert!(matchings[0].pairs.iter().all(|pair| !pair.both_virtual));
        assert_eq!(simulator.apply_matching(&matchings).unwrap(), 2);
        assert!(simulator.evaluate().unwrap().success);
    }

    #[test]
    fn simulation_low_error_rate_succeeds() {
        // cargo test simulation_low_error_rate_succeeds -- --nocapture
        let mut config = SimulatorConfig::new(8);
        config.p_x = 0.03;
        config.p_z = 0.03;
        let result = run_parallel(&config, 1000, 4, 2023).unwrap();
        println!("{:?}", result);
        assert_eq!(result.invalid, 0);
        assert!(result.success_rate() > 0.9);
    }

    #[test]
    fn simulation_exhaustive_capacity_is_invalid_trial() {
        // cargo test simulation_exhaustive_capacity_is_invalid_trial -- --nocapture
        // some syndromes at this rate exceed the node limit of the exhaustive solver
        let mut config = SimulatorConfig::new(8);
        config.p_x = 0.1;
        config.p_z = 0.1;
        config.solver = SolverType::Exhaustive;
        let result = run_parallel(&config, 50, 1, 1).unwrap();
        println!("{:?}", result);
        assert!(result.invalid > 0);
        assert_eq!(result.trials + result.invalid, 50);
    }
}
