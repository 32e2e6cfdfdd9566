mod cli;
pub mod db;
pub mod error;
pub mod ground_truth;
pub mod models;
pub mod scoring;
pub mod session;
pub mod settings;
pub mod storage;
pub mod tracking;
mod utils;

use clap::Parser;

pub use error::{ExperimentError, Result};

pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("pipecheck starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::execute(cli))
}
