use super::constants::{
    DEFAULT_ABS_TOLERANCE, DEFAULT_DIVERGENCE_TOLERANCE, DEFAULT_MAX_ITERATIONS,
    DEFAULT_REL_TOLERANCE,
};
use crate::domain::{DotError, DotResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SolverConfig {
    pub max_iterations: usize,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub divergence_tolerance: f64,
    /// `None` selects the registered device with the best compute capability.
    pub gpu_index: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            abs_tolerance: DEFAULT_ABS_TOLERANCE,
            rel_tolerance: DEFAULT_REL_TOLERANCE,
            divergence_tolerance: DEFAULT_DIVERGENCE_TOLERANCE,
            gpu_index: None,
        }
    }
}

impl SolverConfig {
    pub fn with_gpu_index(mut self, gpu_index: usize) -> Self {
        self.gpu_index = Some(gpu_index);
        self
    }

    pub fn validate(&self) -> DotResult<()> {
        if self.max_iterations == 0 {
            return Err(DotError::invalid_argument(
                "INPUT.SOLVER_CONFIG",
                "maxIterations must be at least 1",
            ));
        }

        let tolerances = [
            ("absTolerance", self.abs_tolerance),
            ("relTolerance", self.rel_tolerance),
            ("divergenceTolerance", self.divergence_tolerance),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value <= 0.0 {
                return Err(DotError::invalid_argument(
                    "INPUT.SOLVER_CONFIG",
                    format!("{} must be finite and positive, got {}", name, value),
                ));
            }
        }

        Ok(())
    }

    pub fn from_json_value(value: serde_json::Value) -> DotResult<Self> {
        if !value.is_object() {
            return Err(DotError::invalid_argument(
                "INPUT.SOLVER_CONFIG",
                format!("solver configuration must be a JSON object, got {}", value),
            ));
        }
        let config: Self = serde_json::from_value(value).map_err(|error| {
            DotError::invalid_argument(
                "INPUT.SOLVER_CONFIG",
                format!("invalid solver configuration: {}", error),
            )
        })?;
        config.validate()?;
        Ok(config)
    }
}

pub fn load_solver_config(path: &Path) -> DotResult<SolverConfig> {
    let source = fs::read_to_string(path).map_err(|error| {
        DotError::io_system(
            "IO.SOLVER_CONFIG",
            format!(
                "failed to read solver configuration '{}': {}",
                path.display(),
                error
            ),
        )
    })?;
    let value: serde_json::Value = serde_json::from_str(&source).map_err(|error| {
        DotError::invalid_argument(
            "INPUT.SOLVER_CONFIG",
            format!(
                "failed to parse solver configuration '{}': {}",
                path.display(),
                error
            ),
        )
    })?;
    SolverConfig::from_json_value(value)
}
