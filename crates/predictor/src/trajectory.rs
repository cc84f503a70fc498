//! Forward integration of a fitted coast model into a velocity → remaining-height table.

use crate::fit::CurveFit;

/// The model's inner term is clamped to this magnitude far outside the fitted window.
const INNER_TERM_LIMIT: f64 = 5.0;
/// Relative nudge used to break ties between adjacent velocity keys.
const MONOTONIC_EPSILON: f64 = 1.0e-12;

/// Fixed-step integration limits.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationSettings {
    pub step_s: f64,
    pub horizon_s: f64,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            step_s: 0.01,
            horizon_s: 120.0,
        }
    }
}

/// Ascending velocity keys mapped to the height still to be gained before the apex.
///
/// The highest key is the exact velocity the table was built from, paired with the full
/// remaining height, so a query at the build state is never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    velocities: Vec<f64>,
    delta_heights: Vec<f64>,
}

impl LookupTable {
    pub fn velocities(&self) -> &[f64] {
        &self.velocities
    }

    pub fn delta_heights(&self) -> &[f64] {
        &self.delta_heights
    }

    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    /// Remaining height to apex at `velocity_m_s`, clamped to the table's end values.
    pub fn remaining_height(&self, velocity_m_s: f64) -> f64 {
        let keys = &self.velocities;
        let values = &self.delta_heights;
        let last = keys.len() - 1;
        if velocity_m_s.is_nan() || velocity_m_s <= keys[0] {
            return values[0];
        }
        if velocity_m_s >= keys[last] {
            return values[last];
        }
        let upper = keys.partition_point(|&k| k <= velocity_m_s);
        let lower = upper - 1;
        let span = keys[upper] - keys[lower];
        let frac = (velocity_m_s - keys[lower]) / span;
        values[lower] + frac * (values[upper] - values[lower])
    }

    /// Apex altitude from the live state.
    pub fn apex_from(&self, altitude_m: f64, velocity_m_s: f64) -> f64 {
        altitude_m + self.remaining_height(velocity_m_s)
    }
}

/// Integrate `fit` forward from coast time `t0_s` and velocity `v0_m_s` up to the apex.
///
/// Returns `None` when the state is already descending, the integration goes
/// non-finite, the horizon passes without reaching the apex, or fewer than two points
/// precede the apex.
pub fn build_lookup_table(
    fit: &CurveFit,
    t0_s: f64,
    v0_m_s: f64,
    settings: &IntegrationSettings,
) -> Option<LookupTable> {
    let dt = settings.step_s;
    if !(v0_m_s > 0.0 && v0_m_s.is_finite() && t0_s.is_finite() && dt > 0.0) {
        return None;
    }
    if !(fit.amplitude.is_finite() && fit.decay.is_finite()) {
        return None;
    }

    let steps = (settings.horizon_s / dt).ceil() as usize;
    let mut velocities = vec![v0_m_s];
    let mut heights = vec![0.0];
    let mut v = v0_m_s;
    let mut h = 0.0_f64;
    let mut h_max = 0.0_f64;
    let mut apex_index = 0;
    let mut reached_apex = false;

    for k in 0..steps {
        let tau = k as f64 * dt;
        let inner = (1.0 - fit.decay * (t0_s + tau)).clamp(-INNER_TERM_LIMIT, INNER_TERM_LIMIT);
        let accel = fit.amplitude * inner.powi(4);
        v += accel * dt;
        h += v * dt;
        if !(v.is_finite() && h.is_finite()) {
            return None;
        }
        velocities.push(v);
        heights.push(h);
        if h > h_max {
            h_max = h;
            apex_index = velocities.len() - 1;
        }
        if v <= 0.0 {
            reached_apex = true;
            break;
        }
    }

    if !reached_apex || apex_index < 1 {
        return None;
    }

    velocities.truncate(apex_index + 1);
    heights.truncate(apex_index + 1);

    let mut delta_heights: Vec<f64> = heights.iter().map(|h| (h_max - h).max(0.0)).collect();
    velocities.reverse();
    delta_heights.reverse();

    for i in 1..velocities.len() {
        if velocities[i] <= velocities[i - 1] {
            velocities[i] = velocities[i - 1] + velocities[i - 1].abs().max(1.0) * MONOTONIC_EPSILON;
        }
    }

    Some(LookupTable {
        velocities,
        delta_heights,
    })
}
