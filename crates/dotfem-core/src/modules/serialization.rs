use super::results::{ConvergenceInfo, ForwardRun, WavelengthStatus};
use crate::common::SolverConfig;
use crate::domain::{DotError, DotResult, LinkTable};
use crate::numerics::{DenseComplexMatrix, DenseRealMatrix};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexMatrixReport {
    pub rows: usize,
    pub cols: usize,
    pub real: Vec<Vec<Option<f64>>>,
    pub imag: Vec<Vec<Option<f64>>>,
}

impl ComplexMatrixReport {
    pub fn from_matrix(matrix: &DenseComplexMatrix) -> Self {
        let rows = matrix.nrows();
        let cols = matrix.ncols();
        let part = |imaginary: bool| -> Vec<Vec<Option<f64>>> {
            (0..rows)
                .map(|row| {
                    (0..cols)
                        .map(|col| {
                            let value = matrix[(row, col)];
                            finite(if imaginary { value.im } else { value.re })
                        })
                        .collect()
                })
                .collect()
        };
        Self {
            rows,
            cols,
            real: part(false),
            imag: part(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WavelengthStatusReport {
    pub wavelength: f64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConvergenceReport {
    pub source: usize,
    pub iterations: usize,
    pub achieved_tolerance: Option<f64>,
    pub is_converged: bool,
    pub is_diverged: bool,
    pub status: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WavelengthConvergenceReport {
    pub wavelength: f64,
    pub sources: Vec<SourceConvergenceReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceReport {
    pub limits: Option<SolverConfig>,
    pub wavelengths: Vec<WavelengthConvergenceReport>,
}

impl From<&ConvergenceInfo> for ConvergenceReport {
    fn from(info: &ConvergenceInfo) -> Self {
        Self {
            limits: info.limits,
            wavelengths: info
                .wavelengths
                .iter()
                .map(|wavelength| WavelengthConvergenceReport {
                    wavelength: wavelength.wavelength,
                    sources: wavelength
                        .sources
                        .iter()
                        .map(|source| SourceConvergenceReport {
                            source: source.source,
                            iterations: source.iterations,
                            achieved_tolerance: finite(source.achieved_tolerance),
                            is_converged: source.is_converged,
                            is_diverged: source.is_diverged,
                            status: source.status,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardReport {
    pub solver: String,
    pub wv: Vec<f64>,
    pub link: LinkTable,
    pub status: Vec<WavelengthStatusReport>,
    /// Link rows x wavelengths.
    pub boundary: ComplexMatrixReport,
    pub amplitude: Vec<Vec<Option<f64>>>,
    /// Degrees.
    pub phase: Vec<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluence: Option<Vec<ComplexMatrixReport>>,
    pub convergence: ConvergenceReport,
}

impl ForwardReport {
    pub fn from_run(run: &ForwardRun, include_fluence: bool) -> Self {
        let record = &run.record;
        let status = record
            .wv
            .iter()
            .zip(&record.status)
            .map(|(wavelength, status)| WavelengthStatusReport {
                wavelength: *wavelength,
                status: status.label().to_string(),
                reason: match status {
                    WavelengthStatus::Failed(reason) => Some(reason.clone()),
                    _ => None,
                },
            })
            .collect();
        let fluence = record
            .fluence
            .as_ref()
            .filter(|_| include_fluence)
            .map(|slices| slices.iter().map(ComplexMatrixReport::from_matrix).collect());

        Self {
            solver: run.solver.as_str().to_string(),
            wv: record.wv.clone(),
            link: record.link.clone(),
            status,
            boundary: ComplexMatrixReport::from_matrix(&record.boundary),
            amplitude: real_rows(&record.amplitude),
            phase: real_rows(&record.phase),
            fluence,
            convergence: ConvergenceReport::from(&run.convergence),
        }
    }
}

pub fn write_report(path: &Path, report: &ForwardReport) -> DotResult<()> {
    let content = serde_json::to_string_pretty(report).map_err(|error| {
        DotError::io_system(
            "IO.REPORT_ENCODE",
            format!("failed to encode forward report: {}", error),
        )
    })?;
    write_text_artifact(path, &content).map_err(|error| {
        DotError::io_system(
            "IO.REPORT_WRITE",
            format!("failed to write report '{}': {}", path.display(), error),
        )
    })
}

/// One line per link row and wavelength: ids, wavelength, amplitude, phase.
pub fn render_summary(run: &ForwardRun) -> String {
    let record = &run.record;
    let mut lines = vec![format!(
        "# solver {}  solved {}/{}",
        run.solver,
        record.solved_wavelengths(),
        record.wv.len()
    )];
    lines.push("#  src  det    wv(nm)      amplitude      phase(deg)  status".to_string());
    for (row, link) in record.link.rows.iter().enumerate() {
        for (col, wavelength) in record.wv.iter().enumerate() {
            lines.push(format!(
                "{:>6}{:>5}{}{}{}  {}",
                link.source,
                link.detector,
                format_fixed_f64(*wavelength, 10, 1),
                format_fixed_f64(record.amplitude[(row, col)], 15, 6),
                format_fixed_f64(record.phase[(row, col)], 16, 6),
                record.status[col].label()
            ));
        }
    }
    normalize_text_artifact(&lines.join("\n"))
}

fn real_rows(matrix: &DenseRealMatrix) -> Vec<Vec<Option<f64>>> {
    (0..matrix.nrows())
        .map(|row| {
            (0..matrix.ncols())
                .map(|col| finite(matrix[(row, col)]))
                .collect()
        })
        .collect()
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
