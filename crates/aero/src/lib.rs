//! Aerodynamic helpers for the flight model: standard atmosphere, Mach number and
//! airbrake drag-coefficient tables.

pub mod atmosphere;
pub mod grid;

pub use atmosphere::{AtmosphereSample, isa, mach_number};
pub use grid::{BoundaryPolicy, DragCoefficientSource, DragGrid, GridError};

/// Dynamic pressure `½ρv²` (Pa).
#[inline]
pub fn dynamic_pressure(density_kg_m3: f64, speed_m_s: f64) -> f64 {
    0.5 * density_kg_m3 * speed_m_s * speed_m_s
}

/// Drag force magnitude (N) for a coefficient referenced to `reference_area_m2`.
#[inline]
pub fn drag_force(density_kg_m3: f64, speed_m_s: f64, cd: f64, reference_area_m2: f64) -> f64 {
    dynamic_pressure(density_kg_m3, speed_m_s) * cd * reference_area_m2
}
