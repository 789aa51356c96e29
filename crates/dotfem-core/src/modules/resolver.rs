use super::backends::backend_for;
use super::devices::DeviceRegistry;
use super::traits::SolveBackend;
use crate::common::SolverConfig;
use crate::domain::{DotError, DotResult, FailurePolicy, SolverKind};
use serde_json::{Map, Value};
use tracing::debug;

const OPTION_KEYS: [&str; 5] = [
    "solver",
    "config",
    "retainFluence",
    "failurePolicy",
    "maxWorkers",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOptions {
    pub solver: Option<String>,
    pub config: Option<SolverConfig>,
    pub retain_fluence: bool,
    pub failure_policy: FailurePolicy,
    pub max_workers: Option<usize>,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            solver: None,
            config: None,
            retain_fluence: true,
            failure_policy: FailurePolicy::Abort,
            max_workers: None,
        }
    }
}

impl ForwardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver(mut self, solver: impl Into<String>) -> Self {
        self.solver = Some(solver.into());
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_retain_fluence(mut self, retain_fluence: bool) -> Self {
        self.retain_fluence = retain_fluence;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = Some(max_workers);
        self
    }

    /// Reads `{solver, config, retainFluence, failurePolicy, maxWorkers}`; every
    /// key is optional, unknown keys are rejected.
    pub fn from_json(value: &Value) -> DotResult<Self> {
        let object = value.as_object().ok_or_else(|| {
            DotError::invalid_argument(
                "INPUT.OPTIONS",
                format!("forward options must be a JSON object, got {}", value),
            )
        })?;
        if let Some(key) = object.keys().find(|key| !OPTION_KEYS.contains(&key.as_str())) {
            return Err(DotError::invalid_argument(
                "INPUT.OPTIONS",
                format!(
                    "unknown forward option '{}'; expected one of {}",
                    key,
                    OPTION_KEYS.join(", ")
                ),
            ));
        }

        let mut options = Self::default();
        if let Some(solver) = present(object, "solver") {
            let solver = solver.as_str().ok_or_else(|| {
                DotError::invalid_argument(
                    "INPUT.OPTIONS_SOLVER",
                    format!("solver must be text, got {}", solver),
                )
            })?;
            options.solver = Some(solver.to_string());
        }
        if let Some(config) = present(object, "config") {
            options.config = Some(SolverConfig::from_json_value(config.clone())?);
        }
        if let Some(flag) = present(object, "retainFluence") {
            options.retain_fluence = scalar_flag(flag)?;
        }
        if let Some(policy) = present(object, "failurePolicy") {
            options.failure_policy = serde_json::from_value(policy.clone()).map_err(|_| {
                DotError::invalid_argument(
                    "INPUT.OPTIONS_POLICY",
                    format!("failurePolicy must be \"abort\" or \"continue\", got {}", policy),
                )
            })?;
        }
        if let Some(workers) = present(object, "maxWorkers") {
            let workers = workers.as_u64().ok_or_else(|| {
                DotError::invalid_argument(
                    "INPUT.MAX_WORKERS",
                    format!("maxWorkers must be a positive integer, got {}", workers),
                )
            })?;
            options.max_workers = Some(workers as usize);
        }
        Ok(options)
    }
}

/// Null entries count as absent, like an omitted argument.
fn present<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|value| !value.is_null())
}

fn scalar_flag(value: &Value) -> DotResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) if number.as_f64() == Some(0.0) => Ok(false),
        Value::Number(number) if number.as_f64() == Some(1.0) => Ok(true),
        other => Err(DotError::invalid_argument(
            "INPUT.OPTIONS_RETAIN",
            format!("retainFluence must be a boolean or 0/1, got {}", other),
        )),
    }
}

/// GPU iterative when a compute device is registered, CPU iterative otherwise.
pub fn default_solver(devices: &DeviceRegistry) -> SolverKind {
    if devices.is_empty() {
        SolverKind::CpuIterative
    } else {
        SolverKind::GpuIterative
    }
}

pub fn resolve_solver(identifier: Option<&str>, devices: &DeviceRegistry) -> DotResult<SolverKind> {
    match identifier {
        None => Ok(default_solver(devices)),
        Some(identifier) => SolverKind::from_identifier(identifier).ok_or_else(|| {
            let recognized: Vec<&str> = SolverKind::ALL.iter().map(|kind| kind.as_str()).collect();
            DotError::unknown_solver(
                "SOLVER.UNKNOWN",
                format!(
                    "unknown solver '{}'; recognized solvers are {}",
                    identifier,
                    recognized.join(", ")
                ),
            )
        }),
    }
}

pub struct ResolvedRun {
    pub backend: Box<dyn SolveBackend>,
    pub config: SolverConfig,
    pub retain_fluence: bool,
    pub failure_policy: FailurePolicy,
    pub max_workers: Option<usize>,
}

impl ResolvedRun {
    pub fn solver(&self) -> SolverKind {
        self.backend.kind()
    }
}

impl std::fmt::Debug for ResolvedRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRun")
            .field("solver", &self.solver())
            .field("config", &self.config)
            .field("retain_fluence", &self.retain_fluence)
            .field("failure_policy", &self.failure_policy)
            .field("max_workers", &self.max_workers)
            .finish()
    }
}

pub fn resolve(options: &ForwardOptions, devices: &DeviceRegistry) -> DotResult<ResolvedRun> {
    let kind = resolve_solver(options.solver.as_deref(), devices)?;
    let config = options.config.unwrap_or_default();
    config.validate()?;
    if options.max_workers == Some(0) {
        return Err(DotError::invalid_argument(
            "INPUT.MAX_WORKERS",
            "maxWorkers must be at least 1",
        ));
    }

    let backend = backend_for(kind, &config, devices)?;
    debug!(
        solver = %kind,
        retain_fluence = options.retain_fluence,
        policy = ?options.failure_policy,
        "resolved forward options"
    );
    Ok(ResolvedRun {
        backend,
        config,
        retain_fluence: options.retain_fluence,
        failure_policy: options.failure_policy,
        max_workers: options.max_workers,
    })
}

#[cfg(test)]
mod tests {
    use super::{ForwardOptions, default_solver, resolve, resolve_solver};
    use crate::common::SolverConfig;
    use crate::domain::{DotErrorCategory, FailurePolicy, SolverKind};
    use crate::modules::devices::{DeviceRegistry, HostDevice};
    use serde_json::json;
    use std::sync::Arc;

    fn gpu_registry() -> DeviceRegistry {
        let mut devices = DeviceRegistry::new();
        devices.register(Arc::new(HostDevice::new("host", (8, 6))));
        devices
    }

    #[test]
    fn default_solver_depends_on_registered_devices() {
        assert_eq!(default_solver(&DeviceRegistry::new()), SolverKind::CpuIterative);
        assert_eq!(default_solver(&gpu_registry()), SolverKind::GpuIterative);
        assert_eq!(
            resolve_solver(None, &DeviceRegistry::new()).expect("default"),
            SolverKind::CpuIterative
        );
    }

    #[test]
    fn unknown_solver_identifier_is_rejected() {
        let error = resolve_solver(Some("cholesky"), &DeviceRegistry::new())
            .expect_err("unknown solver");
        assert_eq!(error.category(), DotErrorCategory::UnknownSolver);
        assert_eq!(error.exit_code(), 3);
        assert!(error.message().contains("backslash"));
    }

    #[test]
    fn options_default_to_retained_fluence_and_abort() {
        let resolved = resolve(&ForwardOptions::new(), &DeviceRegistry::new()).expect("resolve");
        assert_eq!(resolved.solver(), SolverKind::CpuIterative);
        assert!(resolved.retain_fluence);
        assert_eq!(resolved.failure_policy, FailurePolicy::Abort);
        assert_eq!(resolved.config, SolverConfig::default());
    }

    #[test]
    fn json_options_are_validated() {
        let options = ForwardOptions::from_json(&json!({
            "solver": "BACKSLASH",
            "config": {"maxIterations": 50},
            "retainFluence": 0,
            "failurePolicy": "continue",
            "maxWorkers": 2
        }))
        .expect("options");
        assert_eq!(options.solver.as_deref(), Some("BACKSLASH"));
        assert_eq!(options.config.map(|config| config.max_iterations), Some(50));
        assert!(!options.retain_fluence);
        assert_eq!(options.failure_policy, FailurePolicy::Continue);
        assert_eq!(options.max_workers, Some(2));

        for bad in [
            json!({"solver": 3}),
            json!({"config": [1, 2]}),
            json!({"retainFluence": "yes"}),
            json!({"retainFluence": 2}),
            json!({"failurePolicy": "retry"}),
            json!({"threads": 4}),
            json!("backslash"),
        ] {
            let error = ForwardOptions::from_json(&bad).expect_err("invalid options");
            assert_eq!(error.category(), DotErrorCategory::InvalidArgument, "{bad}");
        }
    }

    #[test]
    fn null_entries_fall_back_to_defaults() {
        let options = ForwardOptions::from_json(&json!({"solver": null, "config": null}))
            .expect("options");
        assert_eq!(options, ForwardOptions::default());
    }

    #[test]
    fn gpu_resolution_needs_an_existing_device() {
        let options = ForwardOptions::new()
            .with_solver("gpu")
            .with_config(SolverConfig::default().with_gpu_index(1));
        let error = resolve(&options, &gpu_registry()).expect_err("missing device");
        assert_eq!(error.category(), DotErrorCategory::DeviceUnavailable);

        let resolved = resolve(&ForwardOptions::new(), &gpu_registry()).expect("gpu default");
        assert_eq!(resolved.solver(), SolverKind::GpuIterative);
    }

    #[test]
    fn zero_workers_is_invalid() {
        let error = resolve(
            &ForwardOptions::new().with_max_workers(0),
            &DeviceRegistry::new(),
        )
        .expect_err("zero workers");
        assert_eq!(error.placeholder(), "INPUT.MAX_WORKERS");
    }
}
