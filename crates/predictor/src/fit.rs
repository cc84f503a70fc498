//! Damped Gauss–Newton (Levenberg–Marquardt) fit of the coast deceleration model
//! `a(t) = A (1 - B t)^4`.
//!
//! The quartic decay captures the flattening deceleration of a quadratic-drag coast with
//! two parameters: the amplitude `A` (m/s², kept non-positive) and the decay rate `B`
//! (1/s, kept non-negative). The fit is bounded by a fixed iteration count so it can run
//! inside a physics step.

use thiserror::Error;

use crate::buffer::Sample;

/// Floor used for `B` when forming its relative uncertainty.
pub const DECAY_EPSILON: f64 = 1.0e-6;

const INITIAL_LAMBDA: f64 = 1.0e-3;
const MIN_LAMBDA: f64 = 1.0e-12;
const MAX_LAMBDA: f64 = 1.0e12;
const SINGULAR_RELATIVE_DETERMINANT: f64 = 1.0e-14;

/// Fitted model parameters with their one-sigma uncertainties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveFit {
    /// `A`, acceleration at `t = 0` (m/s², ≤ 0).
    pub amplitude: f64,
    /// `B`, decay rate (1/s, ≥ 0).
    pub decay: f64,
    pub sigma_amplitude: f64,
    pub sigma_decay: f64,
    /// Number of samples the fit was computed from.
    pub sample_count: usize,
    pub iterations: usize,
    /// Residual sum of squares at the solution.
    pub rss: f64,
}

impl CurveFit {
    /// Model acceleration at coast time `t_s`.
    pub fn accel_at(&self, t_s: f64) -> f64 {
        model(self.amplitude, self.decay, t_s)
    }

    /// `max(σA/|A|, σB/max(B, ε))`, the convergence signal for the strict estimate.
    pub fn relative_uncertainty(&self) -> f64 {
        let rel_amplitude = if self.amplitude.abs() > f64::MIN_POSITIVE {
            self.sigma_amplitude / self.amplitude.abs()
        } else {
            f64::INFINITY
        };
        let rel_decay = self.sigma_decay / self.decay.max(DECAY_EPSILON);
        let rel = rel_amplitude.max(rel_decay);
        if rel.is_nan() { f64::INFINITY } else { rel }
    }
}

/// Iteration limits for a single fit call.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: usize,
    /// Absolute step size on both parameters below which the fit is considered converged.
    pub param_tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 60,
            param_tolerance: 1.0e-10,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("at least 3 samples are required, got {count}")]
    InsufficientSamples { count: usize },
    #[error("normal equations are singular")]
    Singular,
    #[error("non-finite residual encountered")]
    NonFinite,
}

/// Fit `a(t) = A (1 - B t)^4` to `samples`, starting from `initial = (A0, B0)`.
///
/// The parameters are projected back onto `A ≤ 0, B ≥ 0` after every step. On error
/// the caller is expected to keep whatever fit it had before.
pub fn fit_decay_model(
    samples: &[Sample],
    initial: (f64, f64),
    options: &FitOptions,
) -> Result<CurveFit, FitError> {
    if samples.len() < 3 {
        return Err(FitError::InsufficientSamples {
            count: samples.len(),
        });
    }
    if !(initial.0.is_finite() && initial.1.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let (mut amplitude, mut decay) = project(initial.0, initial.1);
    let mut rss = residual_sum(samples, amplitude, decay)?;
    let mut lambda = INITIAL_LAMBDA;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let normal = NormalEquations::build(samples, amplitude, decay)?;

        let mut accepted_step = None;
        while lambda <= MAX_LAMBDA {
            let Some((step_a, step_b)) = normal.solve_damped(lambda) else {
                lambda *= 10.0;
                continue;
            };
            let (cand_a, cand_b) = project(amplitude + step_a, decay + step_b);
            let cand_rss = residual_sum(samples, cand_a, cand_b)?;
            if cand_rss < rss {
                accepted_step = Some((cand_a - amplitude, cand_b - decay));
                amplitude = cand_a;
                decay = cand_b;
                rss = cand_rss;
                lambda = (lambda / 10.0).max(MIN_LAMBDA);
                break;
            }
            lambda *= 10.0;
        }

        match accepted_step {
            // No damping level produced an improvement: we are at a (projected) minimum.
            None => break,
            Some((da, db)) => {
                if da.abs() < options.param_tolerance && db.abs() < options.param_tolerance {
                    break;
                }
            }
        }
    }

    let normal = NormalEquations::build(samples, amplitude, decay)?;
    let (inv_aa, inv_bb) = normal.inverse_diagonal().ok_or(FitError::Singular)?;
    let variance = rss / (samples.len() - 2) as f64;
    let sigma_amplitude = (variance * inv_aa).max(0.0).sqrt();
    let sigma_decay = (variance * inv_bb).max(0.0).sqrt();
    if !(sigma_amplitude.is_finite() && sigma_decay.is_finite()) {
        return Err(FitError::NonFinite);
    }

    Ok(CurveFit {
        amplitude,
        decay,
        sigma_amplitude,
        sigma_decay,
        sample_count: samples.len(),
        iterations,
        rss,
    })
}

#[inline]
fn model(amplitude: f64, decay: f64, t_s: f64) -> f64 {
    amplitude * (1.0 - decay * t_s).powi(4)
}

#[inline]
fn project(amplitude: f64, decay: f64) -> (f64, f64) {
    (amplitude.min(0.0), decay.max(0.0))
}

fn residual_sum(samples: &[Sample], amplitude: f64, decay: f64) -> Result<f64, FitError> {
    let mut sum = 0.0;
    for sample in samples {
        let r = sample.accel_m_s2 - model(amplitude, decay, sample.t_s);
        sum += r * r;
    }
    if sum.is_finite() {
        Ok(sum)
    } else {
        Err(FitError::NonFinite)
    }
}

/// Accumulated `JᵀJ` (symmetric 2×2) and `Jᵀr`.
struct NormalEquations {
    aa: f64,
    ab: f64,
    bb: f64,
    ra: f64,
    rb: f64,
}

impl NormalEquations {
    fn build(samples: &[Sample], amplitude: f64, decay: f64) -> Result<Self, FitError> {
        let mut n = Self {
            aa: 0.0,
            ab: 0.0,
            bb: 0.0,
            ra: 0.0,
            rb: 0.0,
        };
        for sample in samples {
            let u = 1.0 - decay * sample.t_s;
            let u3 = u * u * u;
            let d_amplitude = u3 * u;
            let d_decay = -4.0 * amplitude * sample.t_s * u3;
            let r = sample.accel_m_s2 - amplitude * d_amplitude;
            n.aa += d_amplitude * d_amplitude;
            n.ab += d_amplitude * d_decay;
            n.bb += d_decay * d_decay;
            n.ra += d_amplitude * r;
            n.rb += d_decay * r;
        }
        let all = [n.aa, n.ab, n.bb, n.ra, n.rb];
        if all.iter().all(|v| v.is_finite()) {
            Ok(n)
        } else {
            Err(FitError::NonFinite)
        }
    }

    fn determinant(aa: f64, ab: f64, bb: f64) -> Option<f64> {
        let det = aa * bb - ab * ab;
        let scale = (aa * bb).abs();
        if !det.is_finite() || scale == 0.0 || det.abs() <= SINGULAR_RELATIVE_DETERMINANT * scale {
            None
        } else {
            Some(det)
        }
    }

    /// Solve `(JᵀJ + λI) δ = Jᵀr`.
    fn solve_damped(&self, lambda: f64) -> Option<(f64, f64)> {
        let aa = self.aa + lambda;
        let bb = self.bb + lambda;
        let det = Self::determinant(aa, self.ab, bb)?;
        let da = (bb * self.ra - self.ab * self.rb) / det;
        let db = (aa * self.rb - self.ab * self.ra) / det;
        Some((da, db))
    }

    /// Diagonal of `(JᵀJ)⁻¹`.
    fn inverse_diagonal(&self) -> Option<(f64, f64)> {
        let det = Self::determinant(self.aa, self.ab, self.bb)?;
        Some((self.bb / det, self.aa / det))
    }
}
