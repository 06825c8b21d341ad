extern crate clap;
extern crate env_logger;

use clap::Parser;
use surface_blossom::cli::*;

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(error) = Cli::parse().run() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
