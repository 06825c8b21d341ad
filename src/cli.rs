use crate::config::*;
use crate::error::*;
use crate::error_model::*;
use crate::lattice::*;
use crate::mwpm_solver::*;
use crate::results::*;
use crate::simulation::*;
use crate::util::*;
use clap::{Parser, Subcommand};
use pbr::ProgressBar;
use rand::Rng;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Surface code simulator with minimum-weight perfect matching decoder")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// simulate a single configuration
    Simulate(SimulateParameters),
    /// sweep over lattice sizes and error rates, accumulating the results in a CSV file
    Threshold(ThresholdParameters),
}

#[derive(Parser, Clone, Debug)]
pub struct SimulationOptions {
    /// lattice topology
    #[clap(short = 't', long, value_enum, default_value_t = Topology::Toric)]
    topology: Topology,
    /// perfect (2d) or faulty (3d) stabilizer measurements
    #[clap(short = 'd', long, value_enum, default_value_t = MeasurementModel::Perfect)]
    dimension: MeasurementModel,
    /// measurement error rate of both channels, valid only in 3d
    #[clap(short = 'm', long, default_value_t = 0.)]
    pm: f64,
    /// erasure rate
    #[clap(short = 'e', long, default_value_t = 0.)]
    p_erasure: f64,
    /// simulate bit-flip errors on stars only
    #[clap(long, action)]
    primal_only: bool,
    /// the matching backend
    #[clap(long, value_enum, default_value_t = SolverType::MaxWeight)]
    solver: SolverType,
    /// the number of trials of every configuration
    #[clap(short = 'n', long, default_value_t = 1000)]
    trials: usize,
    /// the number of parallel workers
    #[clap(short = 'w', long, default_value_t = 1)]
    workers: usize,
    /// base seed of the trials; drawn at random if not given
    #[clap(long)]
    seed: Option<u64>,
}

impl SimulationOptions {
    pub fn simulator_config(&self, size: usize, p: f64) -> SimulatorConfig {
        let track_dual = !self.primal_only;
        SimulatorConfig {
            size,
            topology: self.topology,
            dimension: self.dimension,
            p_x: p,
            p_z: if track_dual { p } else { 0. },
            p_erasure: self.p_erasure,
            pm_x: self.pm,
            pm_z: if track_dual { self.pm } else { 0. },
            track_dual,
            solver: self.solver,
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::thread_rng().gen())
    }
}

#[derive(Parser, Clone, Debug)]
pub struct SimulateParameters {
    /// lattice size
    #[clap(value_parser, required_unless_present = "config")]
    size: Option<usize>,
    /// physical error rate of every channel
    #[clap(value_parser, required_unless_present = "config")]
    p: Option<f64>,
    /// load the simulator configuration from a JSON file; the lattice and error options are then ignored
    #[clap(long)]
    config: Option<String>,
    #[clap(flatten)]
    options: SimulationOptions,
    /// write every error pattern to this file
    #[clap(long)]
    log_patterns: Option<String>,
    /// replay the error patterns of this file instead of sampling new ones
    #[clap(long, conflicts_with = "log_patterns")]
    replay: Option<String>,
    /// accumulate the result in this CSV file
    #[clap(short = 'o', long)]
    output: Option<String>,
}

#[derive(Parser, Clone, Debug)]
pub struct ThresholdParameters {
    /// lattice sizes, repeat to give several
    #[clap(short = 's', long = "size", required = true)]
    sizes: Vec<usize>,
    /// physical error rates, repeat to give several
    #[clap(short = 'p', long = "error-rate", required = true)]
    ps: Vec<f64>,
    #[clap(flatten)]
    options: SimulationOptions,
    /// the CSV file to accumulate the results in
    #[clap(short = 'o', long, default_value_t = ("threshold.csv").to_string())]
    output: String,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Simulate(parameters) => parameters.run(),
            Commands::Threshold(parameters) => parameters.run(),
        }
    }
}

fn print_result(config: &SimulatorConfig, p: f64, result: &BatchResult) {
    println!(
        "L = {}, p = {}: {} / {} successes, {} invalid, success rate {:.6}",
        config.size,
        p,
        result.successes,
        result.trials,
        result.invalid,
        result.success_rate()
    );
}

impl SimulateParameters {
    fn simulator_config(&self) -> Result<SimulatorConfig> {
        let config = match (&self.config, self.size, self.p) {
            (Some(filename), _, _) => SimulatorConfig::from_file(filename)?,
            (None, Some(size), Some(p)) => self.options.simulator_config(size, p),
            _ => return Err(SimulatorError::Config("either a configuration file or both size and p are required".to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn run(self) -> Result<()> {
        let config = self.simulator_config()?;
        let base_seed = self.options.base_seed();
        log::info!("simulating {:?} with base seed {}", config, base_seed);
        let result = if let Some(filename) = self.replay.as_ref() {
            self.run_replay(&config, filename)?
        } else if self.log_patterns.is_some() || self.options.workers <= 1 {
            self.run_serial(&config, base_seed)?
        } else {
            run_parallel(&config, self.options.trials, self.options.workers, base_seed)?
        };
        print_result(&config, config.p_x, &result);
        if let Some(output) = self.output.as_ref() {
            let mut table = ResultTable::load(output)?;
            table.merge(config.size, config.p_x, &result);
            table.save(output)?;
        }
        Ok(())
    }

    fn run_serial(&self, config: &SimulatorConfig, base_seed: u64) -> Result<BatchResult> {
        let mut simulator = Simulator::new(config)?;
        let mut writer = match self.log_patterns.as_ref() {
            Some(filename) => Some(ErrorPatternWriter::create(filename, &config.lattice_config())?),
            None => None,
        };
        let mut write_error: Option<SimulatorError> = None;
        let mut pb = ProgressBar::on(std::io::stderr(), self.options.trials as u64);
        pb.message(format!("L = {} ", config.size).as_str());
        let result = simulator.run_batch_with(self.options.trials, 0, base_seed, |_, outcome| {
            pb.inc();
            if let (Some(writer), Some(outcome)) = (writer.as_mut(), outcome) {
                if let Err(error) = writer.write(&outcome.pattern) {
                    write_error.get_or_insert(error);
                }
            }
        })?;
        pb.finish();
        eprintln!();
        match write_error {
            Some(error) => Err(error),
            None => Ok(result),
        }
    }

    fn run_replay(&self, config: &SimulatorConfig, filename: &str) -> Result<BatchResult> {
        let mut reader = ErrorPatternReader::open(filename)?;
        if reader.config != config.lattice_config() {
            return Err(SimulatorError::Config(format!(
                "error patterns were generated on {:?} but the simulator uses {:?}",
                reader.config,
                config.lattice_config()
            )));
        }
        let mut simulator = Simulator::new(config)?;
        let mut result = BatchResult::new();
        let mut pb = ProgressBar::on(std::io::stderr(), reader.remaining() as u64);
        while reader.remaining() > 0 {
            let pattern = reader.next_pattern()?;
            Simulator::record(&mut result, simulator.run_trial_with_pattern(&pattern))?;
            pb.inc();
        }
        pb.finish();
        eprintln!();
        Ok(result)
    }
}

impl ThresholdParameters {
    pub fn run(self) -> Result<()> {
        let base_seed = self.options.base_seed();
        let mut table = ResultTable::load(&self.output)?;
        let total = (self.sizes.len() * self.ps.len()) as u64;
        let mut pb = ProgressBar::on(std::io::stderr(), total);
        for &size in self.sizes.iter() {
            for &p in self.ps.iter() {
                let config = self.options.simulator_config(size, p);
                pb.message(format!("L = {} p = {} ", size, p).as_str());
                let result = run_parallel(&config, self.options.trials, self.options.workers, base_seed)?;
                table.merge(size, p, &result);
                // persist after every configuration
                table.save(&self.output)?;
                pb.inc();
            }
        }
        pb.finish();
        eprintln!();
        for row in table.rows() {
            println!(
                "L = {}, p = {}: {} / {} successes, {} invalid, success rate {:.6}",
                row.size,
                row.p,
                row.result.successes,
                row.result.trials,
                row.result.invalid,
                row.success_rate()
            );
        }
        Ok(())
    }
}
