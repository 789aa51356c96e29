use super::traits::MelaninModel;
use crate::common::constants::{
    MELANIN_EXPONENT, MELANIN_PREFACTOR_MM, SCATTERING_REFERENCE_NM, SKIN_BASELINE_CENTER_NM,
    SKIN_BASELINE_OFFSET_MM, SKIN_BASELINE_SCALE_MM, SKIN_BASELINE_WIDTH_NM,
};
use crate::domain::{DotError, DotResult, SpectralMesh};

#[derive(Debug, Clone, PartialEq)]
pub struct OpticalProperties {
    pub mua: Vec<f64>,
    pub mus: Vec<f64>,
    pub kappa: Vec<f64>,
}

impl OpticalProperties {
    pub fn node_count(&self) -> usize {
        self.mua.len()
    }

    fn refresh_kappa(&mut self, node: usize) {
        self.kappa[node] = diffusion_coefficient(self.mua[node], self.mus[node]);
    }
}

pub fn diffusion_coefficient(mua: f64, mus: f64) -> f64 {
    1.0 / (3.0 * (mua + mus))
}

#[derive(Debug, Clone)]
pub struct WavelengthSnapshot<'a> {
    pub mesh: &'a SpectralMesh,
    pub wavelength_index: usize,
    pub wavelength: f64,
    pub properties: OpticalProperties,
    pub link_enabled: Vec<bool>,
}

impl<'a> WavelengthSnapshot<'a> {
    pub fn new(
        mesh: &'a SpectralMesh,
        wavelength_index: usize,
        properties: OpticalProperties,
    ) -> Self {
        Self {
            mesh,
            wavelength_index,
            wavelength: mesh.wv[wavelength_index],
            properties,
            link_enabled: mesh.link.column(wavelength_index),
        }
    }
}

pub fn compose_optical_properties(
    mesh: &SpectralMesh,
    wavelength_index: usize,
    melanin: &dyn MelaninModel,
) -> DotResult<OpticalProperties> {
    let wavelength = *mesh.wv.get(wavelength_index).ok_or_else(|| {
        DotError::invalid_argument(
            "INPUT.WAVELENGTH_INDEX",
            format!(
                "wavelength index {} is outside the {} mesh wavelengths",
                wavelength_index,
                mesh.wavelength_count()
            ),
        )
    })?;
    let extinction = mesh
        .chromophores
        .extinction
        .get(wavelength_index)
        .ok_or_else(|| {
            DotError::invalid_argument(
                "INPUT.MESH_EXTINCTION",
                format!("no extinction row for wavelength {} nm", wavelength),
            )
        })?;

    let nodes = mesh.node_count();
    let mut mua = vec![0.0; nodes];
    for (epsilon, concentrations) in extinction.iter().zip(&mesh.chromophores.concentrations) {
        for (value, concentration) in mua.iter_mut().zip(concentrations) {
            *value += epsilon * concentration;
        }
    }

    let relative_wavelength = wavelength / SCATTERING_REFERENCE_NM;
    let mus: Vec<f64> = mesh
        .scattering
        .amplitude
        .iter()
        .zip(&mesh.scattering.power)
        .map(|(amplitude, power)| amplitude * relative_wavelength.powf(-power))
        .collect();
    let kappa = mua
        .iter()
        .zip(&mus)
        .map(|(mua, mus)| diffusion_coefficient(*mua, *mus))
        .collect();

    let mut properties = OpticalProperties { mua, mus, kappa };

    if let Some(constant) = mesh
        .constant_absorption
        .as_ref()
        .filter(|constant| !constant.is_empty())
    {
        for (node, region) in mesh.region.iter().enumerate() {
            if let Some(value) = constant.mua_for_region(*region) {
                properties.mua[node] = value;
                properties.refresh_kappa(node);
            }
        }
    }

    if let Some(field) = &mesh.melanin {
        for (node, fraction) in field.fraction.iter().enumerate() {
            if *fraction != 0.0 {
                properties.mua[node] = melanin.absorption(wavelength, *fraction)?;
                properties.refresh_kappa(node);
            }
        }
    }

    Ok(properties)
}

/// Melanosome power law blended with the bloodless-skin baseline:
/// `f * 6.6e10 * wv^-3.33 + (1 - f) * baseline(wv)`, mm^-1.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerLawMelanin;

impl PowerLawMelanin {
    pub fn melanosome_absorption(wavelength: f64) -> f64 {
        MELANIN_PREFACTOR_MM * wavelength.powf(MELANIN_EXPONENT)
    }

    pub fn skin_baseline_absorption(wavelength: f64) -> f64 {
        SKIN_BASELINE_OFFSET_MM
            + SKIN_BASELINE_SCALE_MM
                * (-(wavelength - SKIN_BASELINE_CENTER_NM) / SKIN_BASELINE_WIDTH_NM).exp()
    }
}

impl MelaninModel for PowerLawMelanin {
    fn absorption(&self, wavelength: f64, fraction: f64) -> DotResult<f64> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(DotError::invalid_argument(
                "INPUT.MELANIN_FRACTION",
                format!("melanin volume fraction must be in [0, 1], got {}", fraction),
            ));
        }
        Ok(fraction * Self::melanosome_absorption(wavelength)
            + (1.0 - fraction) * Self::skin_baseline_absorption(wavelength))
    }
}
