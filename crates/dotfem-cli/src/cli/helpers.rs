use super::CliError;
use super::commands::ForwardArgs;
use anyhow::Context;
use dotfem_core::common::load_solver_config;
use dotfem_core::domain::{DotError, FailurePolicy};
use dotfem_core::modules::{ForwardOptions, ForwardReport, ForwardRun, render_summary, write_report};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Options file first, then explicit flags on top.
pub(super) fn forward_options_from_args(args: &ForwardArgs) -> Result<ForwardOptions, CliError> {
    let mut options = match &args.options {
        Some(path) => ForwardOptions::from_json(&read_json_file(path)?)?,
        None => ForwardOptions::new(),
    };

    if let Some(solver) = &args.solver {
        options = options.with_solver(solver.clone());
    }
    if let Some(path) = &args.config {
        options = options.with_config(load_solver_config(path)?);
    }
    if args.no_fluence {
        options = options.with_retain_fluence(false);
    }
    if args.continue_on_failure {
        options = options.with_failure_policy(FailurePolicy::Continue);
    }
    if let Some(workers) = args.workers {
        options = options.with_max_workers(workers);
    }
    Ok(options)
}

pub(super) fn read_json_file(path: &Path) -> Result<Value, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read options file '{}'", path.display()))?;
    serde_json::from_str(&source).map_err(|error| {
        CliError::Compute(DotError::invalid_argument(
            "INPUT.OPTIONS_PARSE",
            format!("failed to parse options file '{}': {}", path.display(), error),
        ))
    })
}

/// Writes the JSON report, creating parent directories, and returns the text summary.
pub(super) fn write_forward_outputs(
    run: &ForwardRun,
    include_fluence: bool,
    output: &Path,
) -> Result<String, CliError> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }
    write_report(output, &ForwardReport::from_run(run, include_fluence))?;
    Ok(render_summary(run))
}
