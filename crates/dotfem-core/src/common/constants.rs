pub const PI2: f64 = std::f64::consts::TAU;
pub const RADDEG: f64 = 180.0 / std::f64::consts::PI;
/// Speed of light in vacuum, mm/s.
pub const SPEED_OF_LIGHT_MM_S: f64 = 2.997_924_58e11;
/// Reference wavelength of the scattering power law, nm.
pub const SCATTERING_REFERENCE_NM: f64 = 1000.0;
/// Melanin absorption prefactor, mm^-1 at 1 nm (6.6e11 cm^-1 converted to mm^-1).
pub const MELANIN_PREFACTOR_MM: f64 = 6.6e10;
pub const MELANIN_EXPONENT: f64 = -3.33;
/// Bloodless skin baseline absorption `A + B * exp(-(wv - C) / D)`, mm^-1.
pub const SKIN_BASELINE_OFFSET_MM: f64 = 0.0244;
pub const SKIN_BASELINE_SCALE_MM: f64 = 8.53;
pub const SKIN_BASELINE_CENTER_NM: f64 = 154.0;
pub const SKIN_BASELINE_WIDTH_NM: f64 = 66.2;

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const DEFAULT_ABS_TOLERANCE: f64 = 1.0e-8;
pub const DEFAULT_REL_TOLERANCE: f64 = 1.0e-8;
pub const DEFAULT_DIVERGENCE_TOLERANCE: f64 = 1.0e8;

#[cfg(test)]
mod tests {
    use super::{MELANIN_PREFACTOR_MM, PI2, RADDEG, SPEED_OF_LIGHT_MM_S};

    #[test]
    fn unit_constants_match_reference_values() {
        assert!((PI2 - 6.283_185_307_179_586).abs() < 1.0e-15);
        assert!((RADDEG * std::f64::consts::PI - 180.0).abs() < 1.0e-12);
        assert!((SPEED_OF_LIGHT_MM_S / 1.0e3 - 299_792_458.0).abs() < 1.0e-3);
        assert!((MELANIN_PREFACTOR_MM * 10.0 - 6.6e11).abs() < 1.0);
    }
}
