use super::assembly::DiffusionAssembler;
use super::devices::{ComputeDevice, DeviceRegistry};
use super::optics::{PowerLawMelanin, WavelengthSnapshot, compose_optical_properties};
use super::optodes::NearestNodeOptodes;
use super::resolver::{ForwardOptions, ResolvedRun, resolve};
use super::results::{ForwardRun, WavelengthOutcome, WavelengthStatus, aggregate};
use super::traits::{BoundaryExtractor, MelaninModel, SourceBuilder, SystemAssembler};
use crate::domain::{DotError, DotResult, FailurePolicy, MeshKind, SpectralMesh};
use crate::numerics::{DenseComplexMatrix, nan_complex_matrix};
use num_complex::Complex64;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

pub struct ForwardEngine {
    melanin: Box<dyn MelaninModel>,
    sources: Box<dyn SourceBuilder>,
    extractor: Box<dyn BoundaryExtractor>,
    assembler: Box<dyn SystemAssembler>,
    devices: DeviceRegistry,
}

impl Default for ForwardEngine {
    fn default() -> Self {
        Self {
            melanin: Box::new(PowerLawMelanin),
            sources: Box::new(NearestNodeOptodes),
            extractor: Box::new(NearestNodeOptodes),
            assembler: Box::new(DiffusionAssembler),
            devices: DeviceRegistry::new(),
        }
    }
}

impl ForwardEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_melanin_model(mut self, melanin: impl MelaninModel + 'static) -> Self {
        self.melanin = Box::new(melanin);
        self
    }

    pub fn with_source_builder(mut self, sources: impl SourceBuilder + 'static) -> Self {
        self.sources = Box::new(sources);
        self
    }

    pub fn with_boundary_extractor(mut self, extractor: impl BoundaryExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_assembler(mut self, assembler: impl SystemAssembler + 'static) -> Self {
        self.assembler = Box::new(assembler);
        self
    }

    pub fn with_device(mut self, device: Arc<dyn ComputeDevice>) -> Self {
        self.devices.register(device);
        self
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn run_path(
        &self,
        mesh_path: &Path,
        frequency: f64,
        options: &ForwardOptions,
    ) -> DotResult<ForwardRun> {
        let mesh = SpectralMesh::load_json(mesh_path)?;
        self.run(&mesh, frequency, options)
    }

    pub fn run(
        &self,
        mesh: &SpectralMesh,
        frequency: f64,
        options: &ForwardOptions,
    ) -> DotResult<ForwardRun> {
        if !frequency.is_finite() || frequency < 0.0 {
            return Err(DotError::invalid_argument(
                "INPUT.FREQUENCY",
                format!("modulation frequency must be finite and >= 0, got {}", frequency),
            ));
        }
        if mesh.kind != MeshKind::Spectral {
            warn!(
                mesh = %mesh.name,
                kind = mesh.kind.as_str(),
                "mesh is not spectral; solving with its chromophore model anyway"
            );
        }
        mesh.validate()?;

        let resolved = resolve(options, &self.devices)?;
        let enabled = mesh.link.enabled_wavelengths(mesh.wavelength_count());
        let enabled_count = enabled.iter().filter(|flag| **flag).count();
        let mut sources = self.sources.build(mesh, frequency)?;
        if frequency == 0.0 {
            discard_imaginary(&mut sources);
        }

        info!(
            mesh = %mesh.name,
            nodes = mesh.node_count(),
            wavelengths = mesh.wavelength_count(),
            enabled = enabled_count,
            solver = %resolved.solver(),
            frequency,
            "starting forward solve"
        );

        let workers = worker_count(enabled_count, resolved.max_workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|error| {
                DotError::io_system(
                    "SYSTEM.THREAD_POOL",
                    format!("failed to start {} wavelength workers: {}", workers, error),
                )
            })?;
        let slots: Vec<DotResult<WavelengthOutcome>> = pool.install(|| {
            enabled
                .par_iter()
                .enumerate()
                .map(|(index, is_enabled)| {
                    if *is_enabled {
                        self.solve_wavelength(mesh, index, frequency, &sources, &resolved)
                    } else {
                        Ok(unsolved_outcome(
                            index,
                            WavelengthStatus::Disabled,
                            &sources,
                            mesh.link.len(),
                        ))
                    }
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(slots.len());
        for (index, slot) in slots.into_iter().enumerate() {
            match (slot, resolved.failure_policy) {
                (Ok(outcome), _) => outcomes.push(outcome),
                (Err(error), FailurePolicy::Abort) => return Err(error),
                (Err(error), FailurePolicy::Continue) => {
                    warn!(
                        index,
                        wavelength = mesh.wv[index],
                        %error,
                        "wavelength failed; continuing"
                    );
                    outcomes.push(unsolved_outcome(
                        index,
                        WavelengthStatus::Failed(error.to_string()),
                        &sources,
                        mesh.link.len(),
                    ));
                }
            }
        }

        let run = aggregate(
            mesh,
            resolved.solver(),
            &resolved.config,
            resolved.retain_fluence,
            outcomes,
        );
        info!(
            solved = run.record.solved_wavelengths(),
            failed = run.failures().len(),
            "forward solve finished"
        );
        Ok(run)
    }

    fn solve_wavelength(
        &self,
        mesh: &SpectralMesh,
        index: usize,
        frequency: f64,
        sources: &DenseComplexMatrix,
        resolved: &ResolvedRun,
    ) -> DotResult<WavelengthOutcome> {
        let span = info_span!("wavelength", index, nm = mesh.wv[index]);
        let _entered = span.enter();

        let properties = compose_optical_properties(mesh, index, self.melanin.as_ref())?;
        let snapshot = WavelengthSnapshot::new(mesh, index, properties);
        let system = resolved
            .backend
            .assemble(self.assembler.as_ref(), &snapshot, frequency)?;
        debug!(nnz = system.nnz(), "assembled system");

        let solution = resolved.backend.solve(&system, sources)?;
        let boundary = self.extractor.extract(&snapshot, &solution.fluence)?;
        if boundary.len() != mesh.link.len() {
            return Err(DotError::solve(
                "SOLVE.BOUNDARY_SHAPE",
                format!(
                    "boundary extraction returned {} values for {} link rows",
                    boundary.len(),
                    mesh.link.len()
                ),
            ));
        }

        Ok(WavelengthOutcome {
            wavelength_index: index,
            status: WavelengthStatus::Solved,
            fluence: solution.fluence,
            boundary,
            diagnostics: solution.diagnostics,
        })
    }
}

fn unsolved_outcome(
    index: usize,
    status: WavelengthStatus,
    sources: &DenseComplexMatrix,
    links: usize,
) -> WavelengthOutcome {
    WavelengthOutcome {
        wavelength_index: index,
        status,
        fluence: nan_complex_matrix(sources.nrows(), sources.ncols()),
        boundary: vec![Complex64::new(f64::NAN, f64::NAN); links],
        diagnostics: Vec::new(),
    }
}

fn worker_count(enabled: usize, max_workers: Option<usize>) -> usize {
    let available = max_workers.unwrap_or_else(rayon::current_num_threads);
    enabled.min(available).max(1)
}

fn discard_imaginary(matrix: &mut DenseComplexMatrix) {
    for col in 0..matrix.ncols() {
        for row in 0..matrix.nrows() {
            matrix[(row, col)].im = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ForwardEngine, worker_count};
    use crate::domain::{DotErrorCategory, MeshKind};
    use crate::modules::fixtures::strip_mesh;
    use crate::modules::resolver::ForwardOptions;

    #[test]
    fn worker_pool_is_bounded_by_enabled_wavelengths() {
        assert_eq!(worker_count(3, Some(8)), 3);
        assert_eq!(worker_count(3, Some(2)), 2);
        assert_eq!(worker_count(0, None), 1);
    }

    #[test]
    fn negative_or_non_finite_frequency_is_rejected() {
        let mesh = strip_mesh();
        for frequency in [-1.0, f64::NAN, f64::INFINITY] {
            let error = ForwardEngine::new()
                .run(&mesh, frequency, &ForwardOptions::new())
                .expect_err("bad frequency");
            assert_eq!(error.category(), DotErrorCategory::InvalidArgument);
            assert_eq!(error.placeholder(), "INPUT.FREQUENCY");
        }
    }

    #[test]
    fn empty_wavelength_list_is_rejected() {
        let mut mesh = strip_mesh();
        mesh.wv.clear();
        let error = ForwardEngine::new()
            .run(&mesh, 0.0, &ForwardOptions::new())
            .expect_err("no wavelengths");
        assert_eq!(error.placeholder(), "INPUT.MESH_WAVELENGTHS");
    }

    #[test]
    fn non_spectral_mesh_still_solves() {
        let mut mesh = strip_mesh();
        mesh.kind = MeshKind::Standard;
        let run = ForwardEngine::new()
            .run(&mesh, 0.0, &ForwardOptions::new().with_solver("direct"))
            .expect("run");
        assert_eq!(run.record.solved_wavelengths(), 1);
    }
}
