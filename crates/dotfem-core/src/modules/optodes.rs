use super::optics::WavelengthSnapshot;
use super::traits::{BoundaryExtractor, SourceBuilder};
use crate::domain::{DotError, DotResult, Optode, SpectralMesh};
use crate::numerics::DenseComplexMatrix;
use num_complex::Complex64;

#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNodeOptodes;

impl NearestNodeOptodes {
    pub fn nearest_node(mesh: &SpectralMesh, position: &[f64; 3]) -> Option<usize> {
        mesh.nodes
            .iter()
            .map(|node| {
                (0..mesh.dimension)
                    .map(|axis| (node[axis] - position[axis]).powi(2))
                    .sum::<f64>()
            })
            .enumerate()
            .min_by(|(_, lhs), (_, rhs)| lhs.total_cmp(rhs))
            .map(|(index, _)| index)
    }

    fn optode_node(
        mesh: &SpectralMesh,
        optode: Option<&Optode>,
        role: &str,
        id: usize,
    ) -> DotResult<usize> {
        let optode = optode.ok_or_else(|| {
            DotError::invalid_argument(
                "INPUT.OPTODE",
                format!("link table references unknown {} {}", role, id),
            )
        })?;
        Self::nearest_node(mesh, &optode.position).ok_or_else(|| {
            DotError::invalid_argument("INPUT.MESH_NODES", "mesh has no nodes")
        })
    }
}

impl SourceBuilder for NearestNodeOptodes {
    fn build(&self, mesh: &SpectralMesh, _frequency: f64) -> DotResult<DenseComplexMatrix> {
        let active = mesh.link.active_sources();
        let mut sources = DenseComplexMatrix::zeros(mesh.node_count(), active.len());
        for (column, id) in active.iter().enumerate() {
            let node = Self::optode_node(mesh, mesh.source(*id), "source", *id)?;
            sources[(node, column)] = Complex64::new(1.0, 0.0);
        }
        Ok(sources)
    }
}

impl BoundaryExtractor for NearestNodeOptodes {
    fn extract(
        &self,
        snapshot: &WavelengthSnapshot<'_>,
        fluence: &DenseComplexMatrix,
    ) -> DotResult<Vec<Complex64>> {
        let mesh = snapshot.mesh;
        let active = mesh.link.active_sources();
        if fluence.nrows() != mesh.node_count() || fluence.ncols() != active.len() {
            return Err(DotError::solve(
                "SOLVE.SHAPE",
                format!(
                    "fluence is {}x{}, expected {}x{}",
                    fluence.nrows(),
                    fluence.ncols(),
                    mesh.node_count(),
                    active.len()
                ),
            ));
        }

        mesh.link
            .rows
            .iter()
            .zip(&snapshot.link_enabled)
            .map(|(row, enabled)| {
                if !*enabled {
                    return Ok(Complex64::new(f64::NAN, f64::NAN));
                }
                let column = active
                    .binary_search(&row.source)
                    .map_err(|_| {
                        DotError::invalid_argument(
                            "INPUT.OPTODE",
                            format!("source {} is not active", row.source),
                        )
                    })?;
                let node =
                    Self::optode_node(mesh, mesh.detector(row.detector), "detector", row.detector)?;
                Ok(fluence[(node, column)])
            })
            .collect()
    }
}
