use super::backends::ColumnDiagnostics;
use crate::common::SolverConfig;
use crate::common::constants::{PI2, RADDEG};
use crate::domain::{LinkTable, SolverKind, SpectralMesh};
use crate::numerics::{DenseComplexMatrix, DenseRealMatrix};
use num_complex::Complex64;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WavelengthStatus {
    Solved,
    /// No link row enables this wavelength; nothing was solved.
    Disabled,
    Failed(String),
}

impl WavelengthStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Solved => "solved",
            Self::Disabled => "disabled",
            Self::Failed(_) => "failed",
        }
    }
}

impl Display for WavelengthStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WavelengthOutcome {
    pub wavelength_index: usize,
    pub status: WavelengthStatus,
    /// Nodes x active sources; NaN unless solved.
    pub fluence: DenseComplexMatrix,
    /// One entry per link row; NaN for rows disabled at this wavelength.
    pub boundary: Vec<Complex64>,
    pub diagnostics: Vec<ColumnDiagnostics>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConvergence {
    pub source: usize,
    pub iterations: usize,
    pub achieved_tolerance: f64,
    pub is_converged: bool,
    pub is_diverged: bool,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthConvergence {
    pub wavelength_index: usize,
    pub wavelength: f64,
    pub sources: Vec<SourceConvergence>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvergenceInfo {
    /// Requested limits; `None` when the direct backend ran.
    pub limits: Option<SolverConfig>,
    /// Every attempted wavelength; failed ones carry no sources.
    pub wavelengths: Vec<WavelengthConvergence>,
}

impl ConvergenceInfo {
    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ResultRecord {
    pub fluence: Option<Vec<DenseComplexMatrix>>,
    /// Link rows x wavelengths.
    pub boundary: DenseComplexMatrix,
    pub amplitude: DenseRealMatrix,
    /// Degrees in [0, 360).
    pub phase: DenseRealMatrix,
    pub link: LinkTable,
    pub wv: Vec<f64>,
    pub status: Vec<WavelengthStatus>,
}

impl ResultRecord {
    pub fn solved_wavelengths(&self) -> usize {
        self.status
            .iter()
            .filter(|status| **status == WavelengthStatus::Solved)
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ForwardRun {
    pub solver: SolverKind,
    pub record: ResultRecord,
    pub convergence: ConvergenceInfo,
}

impl ForwardRun {
    pub fn failures(&self) -> Vec<(usize, &str)> {
        self.record
            .status
            .iter()
            .enumerate()
            .filter_map(|(index, status)| match status {
                WavelengthStatus::Failed(reason) => Some((index, reason.as_str())),
                _ => None,
            })
            .collect()
    }
}

pub fn amplitude(value: Complex64) -> f64 {
    value.norm()
}

/// Argument in degrees, mapped into [0, 360). NaN stays NaN.
pub fn phase_degrees(value: Complex64) -> f64 {
    if value.re.is_nan() || value.im.is_nan() {
        return f64::NAN;
    }
    let mut radians = value.arg();
    if radians < 0.0 {
        radians += PI2;
    }
    if radians >= PI2 {
        radians = 0.0;
    }
    let degrees = radians * RADDEG;
    if degrees >= 360.0 { 0.0 } else { degrees }
}

pub fn derive_amplitude_phase(boundary: &DenseComplexMatrix) -> (DenseRealMatrix, DenseRealMatrix) {
    let mut amplitudes = DenseRealMatrix::zeros(boundary.nrows(), boundary.ncols());
    let mut phases = DenseRealMatrix::zeros(boundary.nrows(), boundary.ncols());
    for col in 0..boundary.ncols() {
        for row in 0..boundary.nrows() {
            let value = boundary[(row, col)];
            amplitudes[(row, col)] = amplitude(value);
            phases[(row, col)] = phase_degrees(value);
        }
    }
    (amplitudes, phases)
}

pub fn aggregate(
    mesh: &SpectralMesh,
    solver: SolverKind,
    config: &SolverConfig,
    retain_fluence: bool,
    outcomes: Vec<WavelengthOutcome>,
) -> ForwardRun {
    let links = mesh.link.len();
    let active_sources = mesh.link.active_sources();
    let mut boundary = DenseComplexMatrix::zeros(links, outcomes.len());
    let mut status = Vec::with_capacity(outcomes.len());
    let mut fluence = retain_fluence.then(|| Vec::with_capacity(outcomes.len()));
    let mut convergence = ConvergenceInfo {
        limits: solver.is_iterative().then_some(*config),
        wavelengths: Vec::new(),
    };

    for (col, outcome) in outcomes.into_iter().enumerate() {
        for (row, value) in outcome.boundary.iter().enumerate().take(links) {
            boundary[(row, col)] = *value;
        }
        if solver.is_iterative() && outcome.status != WavelengthStatus::Disabled {
            convergence.wavelengths.push(WavelengthConvergence {
                wavelength_index: outcome.wavelength_index,
                wavelength: mesh.wv[outcome.wavelength_index],
                sources: outcome
                    .diagnostics
                    .iter()
                    .map(|column| SourceConvergence {
                        source: active_sources
                            .get(column.column)
                            .copied()
                            .unwrap_or(column.column),
                        iterations: column.iterations,
                        achieved_tolerance: column.achieved_tolerance,
                        is_converged: column.is_converged(),
                        is_diverged: column.is_diverged(),
                        status: column.status.code(),
                    })
                    .collect(),
            });
        }
        status.push(outcome.status);
        if let Some(fluence) = fluence.as_mut() {
            fluence.push(outcome.fluence);
        }
    }

    let (amplitude, phase) = derive_amplitude_phase(&boundary);
    ForwardRun {
        solver,
        record: ResultRecord {
            fluence,
            boundary,
            amplitude,
            phase,
            link: mesh.link.clone(),
            wv: mesh.wv.clone(),
            status,
        },
        convergence,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        WavelengthOutcome, WavelengthStatus, aggregate, amplitude, derive_amplitude_phase,
        phase_degrees,
    };
    use crate::common::SolverConfig;
    use crate::domain::SolverKind;
    use crate::modules::backends::ColumnDiagnostics;
    use crate::modules::fixtures::strip_mesh;
    use crate::numerics::{BiCgstabStatus, DenseComplexMatrix, nan_complex_matrix};
    use num_complex::Complex64;

    fn outcomes(second: WavelengthStatus) -> Vec<WavelengthOutcome> {
        let solved = WavelengthOutcome {
            wavelength_index: 0,
            status: WavelengthStatus::Solved,
            fluence: DenseComplexMatrix::zeros(10, 1),
            boundary: vec![Complex64::new(1.0e-3, -2.0e-4)],
            diagnostics: vec![ColumnDiagnostics {
                column: 0,
                iterations: 7,
                achieved_tolerance: 1.0e-9,
                status: BiCgstabStatus::Converged,
            }],
        };
        let unsolved = WavelengthOutcome {
            wavelength_index: 1,
            status: second,
            fluence: nan_complex_matrix(10, 1),
            boundary: vec![Complex64::new(f64::NAN, f64::NAN)],
            diagnostics: Vec::new(),
        };
        vec![solved, unsolved]
    }

    #[test]
    fn failed_iterative_wavelength_is_recorded_without_sources() {
        let failed = WavelengthStatus::Failed("AssemblyFailure [ASSEMBLY.X] bad".to_string());
        let run = aggregate(
            &strip_mesh(),
            SolverKind::CpuIterative,
            &SolverConfig::default(),
            false,
            outcomes(failed),
        );

        let wavelengths = &run.convergence.wavelengths;
        assert_eq!(wavelengths.len(), 2);
        assert_eq!(wavelengths[0].sources[0].source, 1);
        assert_eq!(wavelengths[0].sources[0].iterations, 7);
        assert_eq!(wavelengths[1].wavelength_index, 1);
        assert_eq!(wavelengths[1].wavelength, 850.0);
        assert!(wavelengths[1].sources.is_empty());
        assert!(run.record.fluence.is_none());
    }

    #[test]
    fn disabled_and_direct_wavelengths_have_no_convergence_entry() {
        let run = aggregate(
            &strip_mesh(),
            SolverKind::CpuIterative,
            &SolverConfig::default(),
            true,
            outcomes(WavelengthStatus::Disabled),
        );
        assert_eq!(run.convergence.wavelengths.len(), 1);
        assert_eq!(run.record.fluence.as_ref().map(Vec::len), Some(2));

        let failed = WavelengthStatus::Failed("SolveFailure [SOLVE.DIRECT] singular".to_string());
        let mut direct = outcomes(failed);
        direct[0].diagnostics.clear();
        let run = aggregate(
            &strip_mesh(),
            SolverKind::Direct,
            &SolverConfig::default(),
            true,
            direct,
        );
        assert!(run.convergence.is_empty());
        assert!(run.convergence.limits.is_none());
    }

    #[test]
    fn phase_is_mapped_into_zero_to_three_sixty() {
        assert_eq!(phase_degrees(Complex64::new(1.0, 0.0)), 0.0);
        assert!((phase_degrees(Complex64::new(0.0, 1.0)) - 90.0).abs() < 1.0e-12);
        assert!((phase_degrees(Complex64::new(-1.0, 0.0)) - 180.0).abs() < 1.0e-12);
        assert!((phase_degrees(Complex64::new(0.0, -1.0)) - 270.0).abs() < 1.0e-12);
        assert!((phase_degrees(Complex64::new(1.0, -1.0)) - 315.0).abs() < 1.0e-12);
    }

    #[test]
    fn phase_just_below_zero_wraps_to_zero_not_three_sixty() {
        let phase = phase_degrees(Complex64::new(1.0, -1.0e-30));
        assert!((0.0..360.0).contains(&phase), "phase was {phase}");
    }

    #[test]
    fn nan_boundary_values_stay_nan() {
        let value = Complex64::new(f64::NAN, f64::NAN);
        assert!(phase_degrees(value).is_nan());
        assert!(amplitude(value).is_nan());

        let (amplitudes, phases) = derive_amplitude_phase(&nan_complex_matrix(2, 1));
        assert!(amplitudes[(1, 0)].is_nan());
        assert!(phases[(0, 0)].is_nan());
    }

    #[test]
    fn amplitude_is_modulus() {
        let mut boundary = DenseComplexMatrix::zeros(1, 1);
        boundary[(0, 0)] = Complex64::new(3.0, -4.0);
        let (amplitudes, phases) = derive_amplitude_phase(&boundary);
        assert_eq!(amplitudes[(0, 0)], 5.0);
        assert!(phases[(0, 0)] > 270.0 && phases[(0, 0)] < 360.0);
    }

    #[test]
    fn failed_status_displays_reason() {
        let status = WavelengthStatus::Failed("SolveFailure [SOLVE.DIRECT] singular".to_string());
        assert_eq!(status.label(), "failed");
        assert!(status.to_string().contains("singular"));
        assert_eq!(WavelengthStatus::Disabled.to_string(), "disabled");
    }
}
