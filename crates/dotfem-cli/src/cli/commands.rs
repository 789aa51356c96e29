use super::CliError;
use super::helpers::{forward_options_from_args, write_forward_outputs};
use dotfem_core::domain::SolverKind;
use dotfem_core::modules::ForwardEngine;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(clap::Args)]
pub(super) struct ForwardArgs {
    /// Spectral mesh JSON path
    #[arg(long)]
    pub(super) mesh: PathBuf,

    /// Source modulation frequency in Hz (0 for continuous wave)
    #[arg(long, allow_negative_numbers = true)]
    pub(super) frequency: f64,

    /// Solver identifier (backslash, BiCGStab_CPU, BiCGStab_GPU); default depends on devices
    #[arg(long)]
    pub(super) solver: Option<String>,

    /// Iterative solver configuration JSON path
    #[arg(long)]
    pub(super) config: Option<PathBuf>,

    /// Forward options JSON path; explicit flags override its entries
    #[arg(long)]
    pub(super) options: Option<PathBuf>,

    /// Do not keep per-wavelength fluence in the report
    #[arg(long)]
    pub(super) no_fluence: bool,

    /// NaN-fill failed wavelengths instead of aborting the run
    #[arg(long)]
    pub(super) continue_on_failure: bool,

    /// Upper bound on concurrently solved wavelengths
    #[arg(long)]
    pub(super) workers: Option<usize>,

    /// JSON report output path
    #[arg(long)]
    pub(super) output: PathBuf,
}

pub(super) fn run_forward_command(args: ForwardArgs) -> Result<i32, CliError> {
    let options = forward_options_from_args(&args)?;
    let engine = ForwardEngine::new();
    let run = engine.run_path(&args.mesh, args.frequency, &options)?;

    let summary = write_forward_outputs(&run, options.retain_fluence, &args.output)?;
    print!("{}", summary);
    println!("JSON report: {}", args.output.display());

    info!(report = %args.output.display(), "wrote forward report");

    let failures = run.failures();
    for (index, reason) in &failures {
        warn!(wavelength = run.record.wv[*index], %reason, "wavelength failed");
    }
    if failures.is_empty() { Ok(0) } else { Ok(1) }
}

pub(super) fn run_solvers_command() -> Result<i32, CliError> {
    for kind in SolverKind::ALL {
        println!("{:<14}{}", kind.as_str(), kind.aliases().join(", "));
    }
    Ok(0)
}
