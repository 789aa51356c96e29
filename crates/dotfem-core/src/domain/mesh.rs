use super::errors::{DotError, DotResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum MeshKind {
    #[serde(rename = "stnd")]
    Standard,
    #[serde(rename = "fluor")]
    Fluorescence,
    #[default]
    #[serde(rename = "spec")]
    Spectral,
    #[serde(other)]
    Other,
}

impl MeshKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "stnd",
            Self::Fluorescence => "fluor",
            Self::Spectral => "spec",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromophoreModel {
    pub names: Vec<String>,
    /// One row per chromophore, one column per node.
    pub concentrations: Vec<Vec<f64>>,
    /// One row per wavelength, one column per chromophore.
    pub extinction: Vec<Vec<f64>>,
}

/// Reduced scattering follows `mus = amplitude * (wv / 1000) ^ -power`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScatteringModel {
    pub amplitude: Vec<f64>,
    pub power: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Optode {
    pub id: usize,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LinkRow {
    pub source: usize,
    pub detector: usize,
    #[serde(deserialize_with = "deserialize_enable_bits")]
    pub enabled: Vec<bool>,
}

impl LinkRow {
    pub fn new(source: usize, detector: usize, enabled: Vec<bool>) -> Self {
        Self {
            source,
            detector,
            enabled,
        }
    }

    pub fn is_enabled(&self, wavelength_index: usize) -> bool {
        self.enabled
            .get(wavelength_index)
            .copied()
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LinkTable {
    pub rows: Vec<LinkRow>,
}

impl LinkTable {
    pub fn new(rows: Vec<LinkRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// OR-reduces each wavelength column across all rows.
    pub fn enabled_wavelengths(&self, wavelength_count: usize) -> Vec<bool> {
        (0..wavelength_count)
            .map(|index| self.rows.iter().any(|row| row.is_enabled(index)))
            .collect()
    }

    /// Enable bits for a single wavelength, one per row.
    pub fn column(&self, wavelength_index: usize) -> Vec<bool> {
        self.rows
            .iter()
            .map(|row| row.is_enabled(wavelength_index))
            .collect()
    }

    pub fn active_sources(&self) -> Vec<usize> {
        self.rows
            .iter()
            .map(|row| row.source)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RegionAbsorption {
    pub region: usize,
    pub mua: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ConstantAbsorption {
    pub regions: Vec<RegionAbsorption>,
}

impl ConstantAbsorption {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn mua_for_region(&self, region: usize) -> Option<f64> {
        self.regions
            .iter()
            .rev()
            .find(|entry| entry.region == region)
            .map(|entry| entry.mua)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MelaninField {
    pub fraction: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralMesh {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: MeshKind,
    pub dimension: usize,
    pub nodes: Vec<[f64; 3]>,
    pub elements: Vec<Vec<usize>>,
    pub region: Vec<usize>,
    pub ri: Vec<f64>,
    pub chromophores: ChromophoreModel,
    pub scattering: ScatteringModel,
    #[serde(default)]
    pub wv: Vec<f64>,
    pub sources: Vec<Optode>,
    pub detectors: Vec<Optode>,
    pub link: LinkTable,
    #[serde(default)]
    pub constant_absorption: Option<ConstantAbsorption>,
    #[serde(default)]
    pub melanin: Option<MelaninField>,
}

impl SpectralMesh {
    pub fn load_json(path: &Path) -> DotResult<Self> {
        let source = fs::read_to_string(path).map_err(|error| {
            DotError::io_system(
                "IO.MESH_READ",
                format!("failed to read mesh '{}': {}", path.display(), error),
            )
        })?;
        let mesh: Self = serde_json::from_str(&source).map_err(|error| {
            DotError::invalid_argument(
                "INPUT.MESH_PARSE",
                format!("failed to parse mesh '{}': {}", path.display(), error),
            )
        })?;
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn wavelength_count(&self) -> usize {
        self.wv.len()
    }

    pub fn element_arity(&self) -> usize {
        self.dimension + 1
    }

    pub fn source(&self, id: usize) -> Option<&Optode> {
        self.sources.iter().find(|optode| optode.id == id)
    }

    pub fn detector(&self, id: usize) -> Option<&Optode> {
        self.detectors.iter().find(|optode| optode.id == id)
    }

    pub fn validate(&self) -> DotResult<()> {
        if self.wv.is_empty() {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_WAVELENGTHS",
                format!("mesh '{}' has no wavelength list", self.name),
            ));
        }
        if self.wv.iter().any(|wv| !wv.is_finite() || *wv <= 0.0) {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_WAVELENGTHS",
                "wavelengths must be finite and positive",
            ));
        }
        if !matches!(self.dimension, 2 | 3) {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_DIMENSION",
                format!("mesh dimension must be 2 or 3, got {}", self.dimension),
            ));
        }

        let nodes = self.node_count();
        if nodes == 0 {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_NODES",
                "mesh has no nodes",
            ));
        }
        check_node_array("region", self.region.len(), nodes)?;
        check_node_array("ri", self.ri.len(), nodes)?;
        check_node_array("scattering.amplitude", self.scattering.amplitude.len(), nodes)?;
        check_node_array("scattering.power", self.scattering.power.len(), nodes)?;
        if let Some(melanin) = &self.melanin {
            check_node_array("melanin.fraction", melanin.fraction.len(), nodes)?;
        }

        let arity = self.element_arity();
        for (index, element) in self.elements.iter().enumerate() {
            if element.len() != arity {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_ELEMENTS",
                    format!(
                        "element {} has {} nodes, expected {} for a {}-D mesh",
                        index,
                        element.len(),
                        arity,
                        self.dimension
                    ),
                ));
            }
            if let Some(node) = element.iter().find(|node| **node >= nodes) {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_ELEMENTS",
                    format!("element {} references node {} of {}", index, node, nodes),
                ));
            }
        }

        let chromophores = &self.chromophores;
        if chromophores.concentrations.len() != chromophores.names.len() {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_CHROMOPHORES",
                format!(
                    "{} chromophore names but {} concentration rows",
                    chromophores.names.len(),
                    chromophores.concentrations.len()
                ),
            ));
        }
        for (name, row) in chromophores.names.iter().zip(&chromophores.concentrations) {
            if row.len() != nodes {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_CHROMOPHORES",
                    format!(
                        "chromophore '{}' has {} concentrations for {} nodes",
                        name,
                        row.len(),
                        nodes
                    ),
                ));
            }
        }
        if chromophores.extinction.len() != self.wavelength_count()
            || chromophores
                .extinction
                .iter()
                .any(|row| row.len() != chromophores.names.len())
        {
            return Err(DotError::invalid_argument(
                "INPUT.MESH_EXTINCTION",
                format!(
                    "extinction table must be {} wavelengths x {} chromophores",
                    self.wavelength_count(),
                    chromophores.names.len()
                ),
            ));
        }

        for (index, row) in self.link.rows.iter().enumerate() {
            if row.enabled.len() != self.wavelength_count() {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_LINK",
                    format!(
                        "link row {} has {} enable bits for {} wavelengths",
                        index,
                        row.enabled.len(),
                        self.wavelength_count()
                    ),
                ));
            }
            if self.source(row.source).is_none() {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_LINK",
                    format!("link row {} references unknown source {}", index, row.source),
                ));
            }
            if self.detector(row.detector).is_none() {
                return Err(DotError::invalid_argument(
                    "INPUT.MESH_LINK",
                    format!(
                        "link row {} references unknown detector {}",
                        index, row.detector
                    ),
                ));
            }
        }

        Ok(())
    }
}

fn check_node_array(field: &str, actual: usize, nodes: usize) -> DotResult<()> {
    if actual != nodes {
        return Err(DotError::invalid_argument(
            "INPUT.MESH_NODE_ARRAY",
            format!("'{}' has {} entries for {} nodes", field, actual, nodes),
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnableBit {
    Flag(bool),
    Number(f64),
}

fn deserialize_enable_bits<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<RawEnableBit>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|bit| match bit {
            RawEnableBit::Flag(flag) => flag,
            RawEnableBit::Number(value) => value != 0.0,
        })
        .collect())
}
