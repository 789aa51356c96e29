//! Linear finite-element assembly of the frequency-domain diffusion equation
//!
//! `-div(kappa grad phi) + (mua + i omega / c) phi = q`
//!
//! with the Robin condition `phi + 2 A kappa d(phi)/dn = 0` on the outer
//! boundary. Triangles (2-D) and tetrahedra (3-D) are supported; element
//! coefficients are the mean of the nodal values.

use super::optics::WavelengthSnapshot;
use super::traits::SystemAssembler;
use crate::common::constants::{PI2, SPEED_OF_LIGHT_MM_S};
use crate::domain::{DotError, DotResult, SpectralMesh};
use crate::numerics::{CooMatrix, SparseError};
use num_complex::Complex64;
use std::collections::HashMap;

const DEGENERATE_MEASURE: f64 = 1.0e-14;

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffusionAssembler;

impl SystemAssembler for DiffusionAssembler {
    fn assemble(&self, snapshot: &WavelengthSnapshot<'_>, frequency: f64) -> DotResult<CooMatrix> {
        let mesh = snapshot.mesh;
        let properties = &snapshot.properties;
        let nodes = mesh.node_count();
        if properties.node_count() != nodes {
            return Err(DotError::assembly(
                "ASSEMBLY.PROPERTY_SHAPE",
                format!(
                    "optical properties cover {} nodes, mesh has {}",
                    properties.node_count(),
                    nodes
                ),
            ));
        }
        if let Some(node) = properties
            .kappa
            .iter()
            .zip(&properties.mua)
            .position(|(kappa, mua)| !kappa.is_finite() || *kappa <= 0.0 || !mua.is_finite())
        {
            return Err(DotError::assembly(
                "ASSEMBLY.COEFFICIENTS",
                format!(
                    "node {} has non-physical coefficients mua={} kappa={} at {} nm",
                    node, properties.mua[node], properties.kappa[node], snapshot.wavelength
                ),
            ));
        }

        let omega = PI2 * frequency;
        let mut wave_term = Vec::with_capacity(nodes);
        let mut robin = Vec::with_capacity(nodes);
        for (node, ri) in mesh.ri.iter().enumerate() {
            wave_term.push(Complex64::new(
                properties.mua[node],
                omega * ri / SPEED_OF_LIGHT_MM_S,
            ));
            robin.push(1.0 / (2.0 * boundary_coefficient(*ri, node)?));
        }

        let arity = mesh.element_arity();
        let mut system = CooMatrix::with_capacity(nodes, mesh.elements.len() * arity * arity);
        for (index, element) in mesh.elements.iter().enumerate() {
            let geometry = element_geometry(mesh, element).ok_or_else(|| {
                DotError::assembly(
                    "ASSEMBLY.DEGENERATE_ELEMENT",
                    format!("element {} has zero measure", index),
                )
            })?;
            let kappa = mean(element.iter().map(|node| properties.kappa[*node]));
            let reaction = element
                .iter()
                .map(|node| wave_term[*node])
                .sum::<Complex64>()
                / arity as f64;
            let mass_scale = geometry.measure * mass_factor(mesh.dimension);

            for (a, row) in element.iter().enumerate() {
                for (b, col) in element.iter().enumerate() {
                    let stiffness = kappa
                        * geometry.measure
                        * dot(&geometry.gradients[a], &geometry.gradients[b]);
                    let mass = mass_scale * if a == b { 2.0 } else { 1.0 };
                    push(&mut system, *row, *col, stiffness + reaction * mass)?;
                }
            }
        }

        for face in boundary_faces(mesh) {
            let measure = face_measure(mesh, &face);
            let coefficient = mean(face.iter().map(|node| robin[*node]));
            let face_scale = measure * face_mass_factor(mesh.dimension);
            for (a, row) in face.iter().enumerate() {
                for (b, col) in face.iter().enumerate() {
                    let mass = face_scale * if a == b { 2.0 } else { 1.0 };
                    push(&mut system, *row, *col, Complex64::new(coefficient * mass, 0.0))?;
                }
            }
        }

        Ok(system)
    }
}

/// Fresnel boundary mismatch term `A` for a tissue/air interface.
pub fn boundary_coefficient(ri: f64, node: usize) -> DotResult<f64> {
    if !ri.is_finite() || ri < 1.0 {
        return Err(DotError::assembly(
            "ASSEMBLY.REFRACTIVE_INDEX",
            format!("node {} has refractive index {}; expected >= 1", node, ri),
        ));
    }
    let r0 = ((ri - 1.0) / (ri + 1.0)).powi(2);
    let cos_critical = (1.0 / ri).asin().cos().abs();
    Ok((2.0 / (1.0 - r0) - 1.0 + cos_critical.powi(3)) / (1.0 - cos_critical.powi(2)))
}

struct ElementGeometry {
    measure: f64,
    gradients: Vec<[f64; 3]>,
}

fn element_geometry(mesh: &SpectralMesh, element: &[usize]) -> Option<ElementGeometry> {
    let points: Vec<[f64; 3]> = element.iter().map(|node| mesh.nodes[*node]).collect();
    match mesh.dimension {
        2 => triangle_geometry(&points),
        _ => tetrahedron_geometry(&points),
    }
}

fn triangle_geometry(points: &[[f64; 3]]) -> Option<ElementGeometry> {
    let [x1, y1, _] = points[0];
    let [x2, y2, _] = points[1];
    let [x3, y3, _] = points[2];
    let twice_area = (x2 - x1) * (y3 - y1) - (x3 - x1) * (y2 - y1);
    if twice_area.abs() < DEGENERATE_MEASURE {
        return None;
    }

    let gradients = vec![
        [(y2 - y3) / twice_area, (x3 - x2) / twice_area, 0.0],
        [(y3 - y1) / twice_area, (x1 - x3) / twice_area, 0.0],
        [(y1 - y2) / twice_area, (x2 - x1) / twice_area, 0.0],
    ];
    Some(ElementGeometry {
        measure: twice_area.abs() / 2.0,
        gradients,
    })
}

fn tetrahedron_geometry(points: &[[f64; 3]]) -> Option<ElementGeometry> {
    let edges = [
        sub(&points[1], &points[0]),
        sub(&points[2], &points[0]),
        sub(&points[3], &points[0]),
    ];
    let det = dot(&edges[0], &cross(&edges[1], &edges[2]));
    if det.abs() < DEGENERATE_MEASURE {
        return None;
    }

    // Columns of the inverse edge matrix are the barycentric gradients.
    let g1 = scale(&cross(&edges[1], &edges[2]), 1.0 / det);
    let g2 = scale(&cross(&edges[2], &edges[0]), 1.0 / det);
    let g3 = scale(&cross(&edges[0], &edges[1]), 1.0 / det);
    let g0 = [
        -(g1[0] + g2[0] + g3[0]),
        -(g1[1] + g2[1] + g3[1]),
        -(g1[2] + g2[2] + g3[2]),
    ];
    Some(ElementGeometry {
        measure: det.abs() / 6.0,
        gradients: vec![g0, g1, g2, g3],
    })
}

/// Element faces (edges in 2-D) owned by exactly one element.
pub fn boundary_faces(mesh: &SpectralMesh) -> Vec<Vec<usize>> {
    let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut order: Vec<Vec<usize>> = Vec::new();
    for element in &mesh.elements {
        for skipped in 0..element.len() {
            let mut face: Vec<usize> = element
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != skipped)
                .map(|(_, node)| *node)
                .collect();
            face.sort_unstable();
            let count = counts.entry(face.clone()).or_insert(0);
            if *count == 0 {
                order.push(face);
            }
            *count += 1;
        }
    }

    order
        .into_iter()
        .filter(|face| counts.get(face) == Some(&1))
        .collect()
}

fn face_measure(mesh: &SpectralMesh, face: &[usize]) -> f64 {
    let points: Vec<[f64; 3]> = face.iter().map(|node| mesh.nodes[*node]).collect();
    if face.len() == 2 {
        norm(&sub(&points[1], &points[0]))
    } else {
        norm(&cross(&sub(&points[1], &points[0]), &sub(&points[2], &points[0]))) / 2.0
    }
}

/// Off-diagonal weight of the consistent element mass matrix; the diagonal is twice this.
fn mass_factor(dimension: usize) -> f64 {
    if dimension == 2 { 1.0 / 12.0 } else { 1.0 / 20.0 }
}

fn face_mass_factor(dimension: usize) -> f64 {
    if dimension == 2 { 1.0 / 6.0 } else { 1.0 / 12.0 }
}

fn push(system: &mut CooMatrix, row: usize, col: usize, value: Complex64) -> DotResult<()> {
    system
        .push(row, col, value)
        .map_err(|error: SparseError| DotError::assembly("ASSEMBLY.TRIPLET", error.to_string()))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    sum / count.max(1) as f64
}

fn sub(lhs: &[f64; 3], rhs: &[f64; 3]) -> [f64; 3] {
    [lhs[0] - rhs[0], lhs[1] - rhs[1], lhs[2] - rhs[2]]
}

fn dot(lhs: &[f64; 3], rhs: &[f64; 3]) -> f64 {
    lhs[0] * rhs[0] + lhs[1] * rhs[1] + lhs[2] * rhs[2]
}

fn cross(lhs: &[f64; 3], rhs: &[f64; 3]) -> [f64; 3] {
    [
        lhs[1] * rhs[2] - lhs[2] * rhs[1],
        lhs[2] * rhs[0] - lhs[0] * rhs[2],
        lhs[0] * rhs[1] - lhs[1] * rhs[0],
    ]
}

fn scale(vector: &[f64; 3], factor: f64) -> [f64; 3] {
    [vector[0] * factor, vector[1] * factor, vector[2] * factor]
}

fn norm(vector: &[f64; 3]) -> f64 {
    dot(vector, vector).sqrt()
}

#[cfg(test)]
mod tests {
    use super::{DiffusionAssembler, boundary_coefficient, boundary_faces};
    use crate::domain::{DotErrorCategory, SpectralMesh};
    use crate::modules::SystemAssembler;
    use crate::modules::fixtures::strip_mesh;
    use crate::modules::optics::{
        OpticalProperties, PowerLawMelanin, WavelengthSnapshot, compose_optical_properties,
    };
    use num_complex::Complex64;
    use std::collections::HashMap;

    fn uniform_snapshot(mesh: &SpectralMesh, mua: f64, mus: f64) -> WavelengthSnapshot<'_> {
        let nodes = mesh.node_count();
        let properties = OpticalProperties {
            mua: vec![mua; nodes],
            mus: vec![mus; nodes],
            kappa: vec![1.0 / (3.0 * (mua + mus)); nodes],
        };
        WavelengthSnapshot::new(mesh, 0, properties)
    }

    fn unit_tetrahedron_mesh() -> SpectralMesh {
        let mut mesh = strip_mesh();
        mesh.dimension = 3;
        mesh.nodes = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        mesh.elements = vec![vec![0, 1, 2, 3]];
        mesh.ri = vec![1.0; 4];
        mesh.region = vec![1; 4];
        mesh
    }

    #[test]
    fn boundary_coefficient_is_one_for_index_matched_boundary() {
        assert!((boundary_coefficient(1.0, 0).expect("matched") - 1.0).abs() < 1.0e-12);
        let tissue = boundary_coefficient(1.33, 0).expect("tissue");
        assert!(tissue > 2.3 && tissue < 2.4, "A(1.33) was {tissue}");
        let error = boundary_coefficient(0.9, 4).expect_err("sub-unity index");
        assert_eq!(error.category(), DotErrorCategory::AssemblyFailure);
    }

    #[test]
    fn strip_boundary_has_ten_edges() {
        let mesh = strip_mesh();
        let faces = boundary_faces(&mesh);
        assert_eq!(faces.len(), 10);
        assert!(faces.iter().all(|face| face.len() == 2));
    }

    #[test]
    fn assembled_matrix_is_complex_symmetric() {
        let mesh = strip_mesh();
        let properties = compose_optical_properties(&mesh, 0, &PowerLawMelanin).expect("props");
        let snapshot = WavelengthSnapshot::new(&mesh, 0, properties);
        let csr = DiffusionAssembler
            .assemble(&snapshot, 100.0e6)
            .expect("assembly")
            .to_csr();
        let entries: HashMap<(usize, usize), Complex64> =
            csr.entries().map(|(row, col, value)| ((row, col), value)).collect();

        assert_eq!(csr.dimension(), 10);
        assert!(csr.diagonal().iter().all(|value| value.im > 0.0));
        for ((row, col), value) in &entries {
            let mirror = entries.get(&(*col, *row)).expect("mirrored entry");
            assert!((value - mirror).norm() < 1.0e-14);
        }
    }

    #[test]
    fn entry_sum_equals_mass_plus_boundary_integrals() {
        let mut mesh = strip_mesh();
        mesh.ri = vec![1.0; 10];
        let snapshot = uniform_snapshot(&mesh, 0.01, 1.0);
        let system = DiffusionAssembler.assemble(&snapshot, 0.0).expect("assembly");

        let total: Complex64 = system.to_csr().entries().map(|(_, _, value)| value).sum();
        let area = 4.0 * 1.0;
        let perimeter = 2.0 * (4.0 + 1.0);
        let expected = 0.01 * area + 0.5 * perimeter;
        assert!((total.re - expected).abs() < 1.0e-9, "sum was {total}");
        assert!(system.to_csr().entries().all(|(_, _, value)| value.im == 0.0));
    }

    #[test]
    fn tetrahedron_entry_sum_matches_volume_and_surface() {
        let mesh = unit_tetrahedron_mesh();
        let snapshot = uniform_snapshot(&mesh, 0.02, 1.0);
        let system = DiffusionAssembler.assemble(&snapshot, 0.0).expect("assembly");

        let total: Complex64 = system.to_csr().entries().map(|(_, _, value)| value).sum();
        let volume = 1.0 / 6.0;
        let surface = 3.0 * 0.5 + 3.0_f64.sqrt() / 2.0;
        let expected = 0.02 * volume + 0.5 * surface;
        assert!((total.re - expected).abs() < 1.0e-12, "sum was {total}");
        assert_eq!(boundary_faces(&mesh).len(), 4);
    }

    #[test]
    fn degenerate_elements_fail_assembly() {
        let mut mesh = strip_mesh();
        mesh.nodes[6] = [1.0, 0.0, 0.0];
        let snapshot = uniform_snapshot(&mesh, 0.01, 1.0);
        let error = DiffusionAssembler
            .assemble(&snapshot, 0.0)
            .expect_err("collapsed element");
        assert_eq!(error.placeholder(), "ASSEMBLY.DEGENERATE_ELEMENT");
    }
}
