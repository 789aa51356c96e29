pub mod config;
pub mod constants;

pub use config::{SolverConfig, load_solver_config};
