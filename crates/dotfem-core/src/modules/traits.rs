use super::backends::FieldSolution;
use super::optics::WavelengthSnapshot;
use crate::domain::{DotResult, SolverKind, SpectralMesh};
use crate::numerics::{CooMatrix, DenseComplexMatrix};
use num_complex::Complex64;

/// Absorption of melanin-bearing tissue at a wavelength (nm) and volume fraction.
pub trait MelaninModel: Send + Sync {
    fn absorption(&self, wavelength: f64, fraction: f64) -> DotResult<f64>;
}

/// Builds the nodes x active-sources right-hand side from the full link table.
pub trait SourceBuilder: Send + Sync {
    fn build(&self, mesh: &SpectralMesh, frequency: f64) -> DotResult<DenseComplexMatrix>;
}

/// Reduces a fluence field to one complex value per link row.
pub trait BoundaryExtractor: Send + Sync {
    fn extract(
        &self,
        snapshot: &WavelengthSnapshot<'_>,
        fluence: &DenseComplexMatrix,
    ) -> DotResult<Vec<Complex64>>;
}

pub trait SystemAssembler: Send + Sync {
    fn assemble(&self, snapshot: &WavelengthSnapshot<'_>, frequency: f64) -> DotResult<CooMatrix>;
}

pub trait SolveBackend: Send + Sync {
    fn kind(&self) -> SolverKind;

    fn assemble(
        &self,
        assembler: &dyn SystemAssembler,
        snapshot: &WavelengthSnapshot<'_>,
        frequency: f64,
    ) -> DotResult<CooMatrix> {
        assembler.assemble(snapshot, frequency)
    }

    fn solve(&self, system: &CooMatrix, sources: &DenseComplexMatrix) -> DotResult<FieldSolution>;
}

#[cfg(test)]
mod tests {
    use super::{SolveBackend, SystemAssembler};
    use crate::domain::{DotError, DotErrorCategory, DotResult, SolverKind};
    use crate::modules::backends::FieldSolution;
    use crate::modules::fixtures::strip_mesh;
    use crate::modules::optics::{PowerLawMelanin, WavelengthSnapshot, compose_optical_properties};
    use crate::numerics::{CooMatrix, DenseComplexMatrix};

    struct FailingAssembler;

    impl SystemAssembler for FailingAssembler {
        fn assemble(
            &self,
            _snapshot: &WavelengthSnapshot<'_>,
            _frequency: f64,
        ) -> DotResult<CooMatrix> {
            Err(DotError::assembly("ASSEMBLY.TEST", "assembly kernel failed"))
        }
    }

    struct EchoBackend;

    impl SolveBackend for EchoBackend {
        fn kind(&self) -> SolverKind {
            SolverKind::Direct
        }

        fn solve(
            &self,
            _system: &CooMatrix,
            sources: &DenseComplexMatrix,
        ) -> DotResult<FieldSolution> {
            Ok(FieldSolution::direct(sources.clone()))
        }
    }

    #[test]
    fn default_backend_assembly_delegates_to_the_assembler() {
        let mesh = strip_mesh();
        let properties =
            compose_optical_properties(&mesh, 0, &PowerLawMelanin).expect("properties");
        let snapshot = WavelengthSnapshot::new(&mesh, 0, properties);
        let error = EchoBackend
            .assemble(&FailingAssembler, &snapshot, 0.0)
            .expect_err("assembler failure should propagate");
        assert_eq!(error.category(), DotErrorCategory::AssemblyFailure);
        assert_eq!(error.placeholder(), "ASSEMBLY.TEST");
    }
}
