use super::devices::{DeviceRegistry, DeviceSlot};
use super::optics::WavelengthSnapshot;
use super::traits::{SolveBackend, SystemAssembler};
use crate::common::SolverConfig;
use crate::domain::{DotError, DotResult, SolverKind};
use crate::numerics::{
    BiCgstabError, BiCgstabSettings, BiCgstabStatus, CooMatrix, CsrMatrix, DenseComplexMatrix,
    LinearOperator, bicgstab, sparse_lu_solve,
};
use num_complex::Complex64;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDiagnostics {
    pub column: usize,
    pub iterations: usize,
    pub achieved_tolerance: f64,
    pub status: BiCgstabStatus,
}

impl ColumnDiagnostics {
    pub fn is_converged(&self) -> bool {
        self.status == BiCgstabStatus::Converged
    }

    pub fn is_diverged(&self) -> bool {
        self.status == BiCgstabStatus::Diverged
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSolution {
    pub fluence: DenseComplexMatrix,
    /// Empty for the direct backend.
    pub diagnostics: Vec<ColumnDiagnostics>,
}

impl FieldSolution {
    pub fn direct(fluence: DenseComplexMatrix) -> Self {
        Self {
            fluence,
            diagnostics: Vec::new(),
        }
    }
}

/// Builds the backend strategy for a resolved solver kind. Only the GPU
/// backend consults the device registry.
pub fn backend_for(
    kind: SolverKind,
    config: &SolverConfig,
    devices: &DeviceRegistry,
) -> DotResult<Box<dyn SolveBackend>> {
    Ok(match kind {
        SolverKind::Direct => Box::new(DirectBackend),
        SolverKind::CpuIterative => Box::new(CpuIterativeBackend::new(*config)),
        SolverKind::GpuIterative => {
            let slot = devices.select(config.gpu_index)?;
            debug!(
                index = slot.index(),
                name = %slot.descriptor().name,
                "selected compute device"
            );
            Box::new(GpuIterativeBackend::new(*config, slot))
        }
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectBackend;

impl SolveBackend for DirectBackend {
    fn kind(&self) -> SolverKind {
        SolverKind::Direct
    }

    fn solve(&self, system: &CooMatrix, sources: &DenseComplexMatrix) -> DotResult<FieldSolution> {
        check_shapes(system, sources)?;
        let fluence = sparse_lu_solve(&system.to_csr(), sources)
            .map_err(|error| DotError::solve("SOLVE.DIRECT", error.to_string()))?;
        Ok(FieldSolution::direct(fluence))
    }
}

#[derive(Debug, Clone)]
pub struct CpuIterativeBackend {
    config: SolverConfig,
}

impl CpuIterativeBackend {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl SolveBackend for CpuIterativeBackend {
    fn kind(&self) -> SolverKind {
        SolverKind::CpuIterative
    }

    fn solve(&self, system: &CooMatrix, sources: &DenseComplexMatrix) -> DotResult<FieldSolution> {
        check_shapes(system, sources)?;
        let csr = system.to_csr();
        solve_columns(&csr, &csr.diagonal(), sources, &self.config)
    }
}

#[derive(Debug, Clone)]
pub struct GpuIterativeBackend {
    config: SolverConfig,
    slot: DeviceSlot,
}

impl GpuIterativeBackend {
    pub fn new(config: SolverConfig, slot: DeviceSlot) -> Self {
        Self { config, slot }
    }
}

impl SolveBackend for GpuIterativeBackend {
    fn kind(&self) -> SolverKind {
        SolverKind::GpuIterative
    }

    fn assemble(
        &self,
        assembler: &dyn SystemAssembler,
        snapshot: &WavelengthSnapshot<'_>,
        frequency: f64,
    ) -> DotResult<CooMatrix> {
        let _guard = self.slot.lock()?;
        self.slot.device().assemble(assembler, snapshot, frequency)
    }

    fn solve(&self, system: &CooMatrix, sources: &DenseComplexMatrix) -> DotResult<FieldSolution> {
        check_shapes(system, sources)?;
        let csr = system.to_csr();
        let operator = DeviceOperator {
            slot: &self.slot,
            matrix: &csr,
        };
        let _guard = self.slot.lock()?;
        solve_columns(&operator, &csr.diagonal(), sources, &self.config)
    }
}

struct DeviceOperator<'a> {
    slot: &'a DeviceSlot,
    matrix: &'a CsrMatrix,
}

impl LinearOperator for DeviceOperator<'_> {
    fn dimension(&self) -> usize {
        self.matrix.dimension()
    }

    fn apply(&self, x: &[Complex64], y: &mut [Complex64]) -> Result<(), BiCgstabError> {
        self.slot
            .device()
            .spmv(self.matrix, x, y)
            .map_err(|error| BiCgstabError::Operator(error.to_string()))
    }
}

fn solve_columns<A>(
    operator: &A,
    preconditioner: &[Complex64],
    sources: &DenseComplexMatrix,
    config: &SolverConfig,
) -> DotResult<FieldSolution>
where
    A: LinearOperator + ?Sized,
{
    let settings = BiCgstabSettings {
        max_iterations: config.max_iterations,
        abs_tolerance: config.abs_tolerance,
        rel_tolerance: config.rel_tolerance,
        divergence_tolerance: config.divergence_tolerance,
    };
    let dimension = operator.dimension();
    let mut fluence = DenseComplexMatrix::zeros(dimension, sources.ncols());
    let mut diagnostics = Vec::with_capacity(sources.ncols());
    let mut rhs = vec![Complex64::new(0.0, 0.0); dimension];

    for column in 0..sources.ncols() {
        for (row, value) in rhs.iter_mut().enumerate() {
            *value = sources[(row, column)];
        }
        let solution = bicgstab(operator, preconditioner, &rhs, &settings).map_err(|error| {
            DotError::solve(
                "SOLVE.BICGSTAB",
                format!("source column {}: {}", column, error),
            )
        })?;
        if !solution.converged() {
            warn!(
                column,
                iterations = solution.iterations,
                residual = solution.relative_residual,
                status = solution.status.code(),
                "BiCGStab did not converge"
            );
        }
        for (row, value) in solution.x.iter().enumerate() {
            fluence[(row, column)] = *value;
        }
        diagnostics.push(ColumnDiagnostics {
            column,
            iterations: solution.iterations,
            achieved_tolerance: solution.relative_residual,
            status: solution.status,
        });
    }

    Ok(FieldSolution {
        fluence,
        diagnostics,
    })
}

fn check_shapes(system: &CooMatrix, sources: &DenseComplexMatrix) -> DotResult<()> {
    if system.dimension() != sources.nrows() {
        return Err(DotError::solve(
            "SOLVE.SHAPE",
            format!(
                "system is {}x{} but the source matrix has {} rows",
                system.dimension(),
                system.dimension(),
                sources.nrows()
            ),
        ));
    }
    Ok(())
}
