//! International Standard Atmosphere up to the lower stratosphere.

use apogee_core::constants::G0;

pub const SEA_LEVEL_TEMPERATURE_K: f64 = 288.15;
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;
/// Tropospheric temperature lapse rate (K/m).
pub const LAPSE_RATE_K_M: f64 = 0.0065;
pub const TROPOPAUSE_ALTITUDE_M: f64 = 11_000.0;
/// Specific gas constant of dry air (J/(kg·K)).
pub const GAS_CONSTANT_AIR: f64 = 287.052_87;
pub const HEAT_CAPACITY_RATIO: f64 = 1.4;

const MIN_ALTITUDE_M: f64 = -1_000.0;

/// Atmospheric properties at one altitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphereSample {
    pub temperature_k: f64,
    pub pressure_pa: f64,
    pub density_kg_m3: f64,
    pub speed_of_sound_m_s: f64,
}

/// ISA properties at `altitude_m`; isothermal above the tropopause.
pub fn isa(altitude_m: f64) -> AtmosphereSample {
    let h = altitude_m.max(MIN_ALTITUDE_M);
    let exponent = G0 / (GAS_CONSTANT_AIR * LAPSE_RATE_K_M);

    let (temperature_k, pressure_pa) = if h <= TROPOPAUSE_ALTITUDE_M {
        let t = SEA_LEVEL_TEMPERATURE_K - LAPSE_RATE_K_M * h;
        (t, SEA_LEVEL_PRESSURE_PA * (t / SEA_LEVEL_TEMPERATURE_K).powf(exponent))
    } else {
        let t = SEA_LEVEL_TEMPERATURE_K - LAPSE_RATE_K_M * TROPOPAUSE_ALTITUDE_M;
        let p_tropopause = SEA_LEVEL_PRESSURE_PA * (t / SEA_LEVEL_TEMPERATURE_K).powf(exponent);
        let p = p_tropopause * (-G0 * (h - TROPOPAUSE_ALTITUDE_M) / (GAS_CONSTANT_AIR * t)).exp();
        (t, p)
    };

    AtmosphereSample {
        temperature_k,
        pressure_pa,
        density_kg_m3: pressure_pa / (GAS_CONSTANT_AIR * temperature_k),
        speed_of_sound_m_s: (HEAT_CAPACITY_RATIO * GAS_CONSTANT_AIR * temperature_k).sqrt(),
    }
}

/// Mach number for a speed of either sign at `altitude_m`.
pub fn mach_number(speed_m_s: f64, altitude_m: f64) -> f64 {
    speed_m_s.abs() / isa(altitude_m).speed_of_sound_m_s
}
