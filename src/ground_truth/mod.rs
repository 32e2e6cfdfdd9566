pub mod config;
pub mod generator;

pub use config::GeneratorConfig;
pub use generator::generate_assignment;
