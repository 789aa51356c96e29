use crate::domain::{
    ChromophoreModel, LinkRow, LinkTable, MeshKind, Optode, ScatteringModel, SpectralMesh,
};

/// 10-node strip (5 x 2 nodes, 1 mm spacing) with one source, one detector
/// and two wavelengths; the second wavelength is disabled in the link table.
pub(crate) fn strip_mesh() -> SpectralMesh {
    let mut nodes = Vec::new();
    for y in [0.0, 1.0] {
        for x in [0.0, 1.0, 2.0, 3.0, 4.0] {
            nodes.push([x, y, 0.0]);
        }
    }

    let mut elements = Vec::new();
    for cell in 0..4 {
        elements.push(vec![cell, cell + 1, cell + 6]);
        elements.push(vec![cell, cell + 6, cell + 5]);
    }

    SpectralMesh {
        name: "strip".to_string(),
        kind: MeshKind::Spectral,
        dimension: 2,
        nodes,
        elements,
        region: vec![1, 1, 2, 3, 3, 1, 1, 2, 3, 3],
        ri: vec![1.33; 10],
        chromophores: ChromophoreModel {
            names: vec!["HbO".to_string(), "deoxyHb".to_string()],
            concentrations: vec![vec![0.01; 10], vec![0.005; 10]],
            extinction: vec![vec![0.3, 1.5], vec![1.1, 0.8]],
        },
        scattering: ScatteringModel {
            amplitude: vec![1.2; 10],
            power: vec![1.1; 10],
        },
        wv: vec![661.0, 850.0],
        sources: vec![Optode {
            id: 1,
            position: [0.0, 0.1, 0.0],
        }],
        detectors: vec![Optode {
            id: 1,
            position: [4.0, 0.9, 0.0],
        }],
        link: LinkTable::new(vec![LinkRow::new(1, 1, vec![true, false])]),
        constant_absorption: None,
        melanin: None,
    }
}
