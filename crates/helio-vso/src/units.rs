//! Spectral unit conversion to Angstrom.

use crate::error::{Error, Result};

/// Planck constant times speed of light, in eV·Å.
const HC: f64 = 12398.419843320026;

/// Speed of light in Å/s.
const C: f64 = 2.99792458e18;

/// Energy units with their factor to eV.
pub const ENERGY: [(&str, f64); 3] = [("eV", 1.0), ("keV", 1e3), ("MeV", 1e6)];

/// Frequency units with their factor to Hz.
pub const FREQUENCY: [(&str, f64); 4] = [("Hz", 1.0), ("kHz", 1e3), ("MHz", 1e6), ("GHz", 1e9)];

/// Length units with their factor to Å.
pub const LENGTH: [(&str, f64); 8] = [
    ("Angstrom", 1.0),
    ("A", 1.0),
    ("nm", 10.0),
    ("um", 1e4),
    ("micron", 1e4),
    ("mm", 1e7),
    ("cm", 1e8),
    ("m", 1e10),
];

fn factor(table: &[(&str, f64)], unit: &str) -> Option<f64> {
    table.iter().find(|(name, _)| *name == unit).map(|(_, f)| *f)
}

/// Convert a wavelength, photon energy or frequency to Angstrom.
pub fn to_angstrom(value: f64, unit: &str) -> Result<f64> {
    let unit = unit.trim();
    if unit.eq_ignore_ascii_case("angstrom") {
        return Ok(value);
    }
    if let Some(f) = factor(&LENGTH, unit) {
        return Ok(value * f);
    }
    if let Some(f) = factor(&ENERGY, unit) {
        return Ok(HC / (value * f));
    }
    if let Some(f) = factor(&FREQUENCY, unit) {
        return Ok(C / (value * f));
    }
    Err(Error::UnknownUnit(unit.to_string()))
}
