use std::cell::RefCell;
use std::rc::Rc;

use apogee_control::config::PredictorConfig;
use apogee_control::physics::StepInput;
use apogee_control::predictor::{ApogeePredictor, ApogeeSource, FitReport};

const G0: f64 = 9.80665;
const DT: f64 = 0.01;

/// Coast integrated with the same semi-implicit step the predictor assumes.
struct Coast {
    time: f64,
    altitude: f64,
    velocity: f64,
    drag_k: f64,
}

impl Coast {
    fn new(altitude: f64, velocity: f64, drag_k: f64) -> Self {
        Self {
            time: 0.0,
            altitude,
            velocity,
            drag_k,
        }
    }

    fn accel(&self) -> f64 {
        -G0 - self.drag_k * self.velocity * self.velocity.abs()
    }

    /// Current state as a predictor input, then advance one step.
    fn step(&mut self) -> StepInput {
        let accel = self.accel();
        let input = StepInput::new(self.time, DT, accel, self.altitude, self.velocity);
        self.velocity += accel * DT;
        self.altitude += self.velocity * DT;
        self.time += DT;
        input
    }

    fn true_apex(&self) -> f64 {
        let mut probe = Self::new(self.altitude, self.velocity, self.drag_k);
        let mut apex = probe.altitude;
        while probe.velocity > 0.0 {
            probe.step();
            apex = apex.max(probe.altitude);
        }
        apex
    }
}

#[test]
fn nothing_is_predicted_before_the_minimum_sample_count() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(300.0, 100.0, 0.0);
    for _ in 0..19 {
        predictor.update(&coast.step());
    }

    assert_eq!(predictor.sample_count(), 19);
    assert!(predictor.fit().is_none());
    assert!(predictor.apogee_best_effort().is_none());
    assert!(predictor.prediction_if_ready().is_none());
    assert!(
        predictor.ballistic_apogee().is_some(),
        "drag-free bound needs only a state"
    );

    predictor.update(&coast.step());
    assert!(predictor.fit().is_some(), "20th sample triggers the first fit");
}

#[test]
fn ballistic_coast_predicts_closed_form_apex() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(0.0, 100.0, 0.0);
    let mut last = coast.step();
    predictor.update(&last);
    for _ in 1..150 {
        last = coast.step();
        predictor.update(&last);
    }

    let expected = last.altitude_m + last.velocity_m_s * last.velocity_m_s / (2.0 * G0);
    let best = predictor.apogee_best_effort().expect("best-effort estimate");
    assert!(
        (best - expected).abs() < 2.0,
        "best effort {best} vs closed form {expected}"
    );
    assert_eq!(predictor.prediction_if_ready(), Some(best));
    assert!(predictor.is_converged());
    assert!((predictor.coast_time_s() - 149.0 * DT).abs() < 1e-9);
}

#[test]
fn drag_coast_best_effort_tightens_toward_apex() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(500.0, 120.0, 0.0002);
    let truth = coast.true_apex();

    while coast.velocity >= 60.0 {
        predictor.update(&coast.step());
    }
    let mid = predictor.apogee_best_effort().expect("estimate at 60 m/s");
    assert!(
        (mid - truth).abs() < 15.0,
        "estimate {mid} at 60 m/s vs truth {truth}"
    );

    while coast.velocity >= 25.0 {
        predictor.update(&coast.step());
    }
    let late = predictor.apogee_best_effort().expect("estimate at 25 m/s");
    assert!(
        (late - truth).abs() < 5.0,
        "estimate {late} at 25 m/s vs truth {truth}"
    );
    assert!(predictor.relative_uncertainty().expect("fit") < 0.05);
}

#[test]
fn noise_free_samples_pass_the_uncertainty_gate_on_the_first_fit() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(500.0, 120.0, 0.0002);
    for _ in 0..20 {
        predictor.update(&coast.step());
    }
    assert!(predictor.relative_uncertainty().expect("first fit") < 0.01);
    assert!(predictor.prediction_if_ready().is_some());

    let mut spanned = ApogeePredictor::new(PredictorConfig {
        min_fit_span_s: 2.0,
        ..PredictorConfig::default()
    });
    let mut coast = Coast::new(500.0, 120.0, 0.0002);
    for _ in 0..20 {
        spanned.update(&coast.step());
    }
    assert!(spanned.apogee_best_effort().is_some());
    assert!(!spanned.is_converged(), "0.19 s of samples is below the span");
    assert!(spanned.prediction_if_ready().is_none());

    while spanned.sample_span_s() < 2.0 {
        spanned.update(&coast.step());
    }
    assert_eq!(spanned.prediction_if_ready(), spanned.apogee_best_effort());
    assert!(spanned.prediction_if_ready().is_some());
}

#[test]
fn strict_drag_estimate_holds_the_bound_at_every_step() {
    let mut predictor = ApogeePredictor::new(PredictorConfig {
        min_fit_span_s: 5.5,
        ..PredictorConfig::default()
    });
    let mut coast = Coast::new(500.0, 120.0, 0.0002);
    let truth = coast.true_apex();

    let mut strict_steps = 0;
    while coast.velocity > 0.0 {
        let input = coast.step();
        predictor.update(&input);
        match predictor.prediction_if_ready() {
            Some(strict) => {
                strict_steps += 1;
                assert!(
                    (strict - truth).abs() < 10.0,
                    "strict {strict} at t = {:.2} s vs truth {truth}",
                    input.time_s
                );
            }
            None => assert!(
                predictor.sample_span_s() < 5.5 || predictor.apogee_best_effort().is_none(),
                "strict withheld at t = {:.2} s",
                input.time_s
            ),
        }
    }
    assert!(strict_steps > 400, "strict issued on {strict_steps} steps");
}

#[test]
fn powered_samples_are_rejected_but_refresh_the_state() {
    let mut predictor = ApogeePredictor::default();
    predictor.update(&StepInput::new(0.0, DT, 45.0, 10.0, 20.0));
    predictor.update(&StepInput::new(0.01, DT, f64::NAN, 11.0, 20.5));
    assert_eq!(predictor.sample_count(), 0);
    assert_eq!(predictor.coast_time_s(), 0.0, "clock starts with the first coast sample");

    let bound = predictor.ballistic_apogee().expect("state snapshot");
    assert!((bound - (11.0 + 20.5 * 20.5 / (2.0 * G0))).abs() < 0.01);
}

#[test]
fn buffer_is_capped_and_refits_continue_after_saturation() {
    let config = PredictorConfig {
        min_packets_for_fit: 5,
        max_samples: 10,
        ..PredictorConfig::default()
    };
    let reports = Rc::new(RefCell::new(Vec::<FitReport>::new()));
    let sink = Rc::clone(&reports);
    let mut predictor = ApogeePredictor::new(config)
        .with_observer(move |report: &FitReport| sink.borrow_mut().push(report.clone()));

    let mut coast = Coast::new(0.0, 100.0, 0.0);
    for _ in 0..30 {
        predictor.update(&coast.step());
    }

    assert_eq!(predictor.sample_count(), 10);
    let reports = reports.borrow();
    assert_eq!(reports.len(), 26, "one fit per sample from the 5th onwards");
    let last = reports.last().expect("report");
    assert_eq!(last.fit.sample_count, 10);
    assert!(last.lut_points > 1);
    assert!(last.best_effort_m.is_some());
}

#[test]
fn refit_interval_spaces_out_fits() {
    let config = PredictorConfig {
        refit_interval: 10,
        ..PredictorConfig::default()
    };
    let count = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&count);
    let mut predictor = ApogeePredictor::new(config)
        .with_observer(move |_: &FitReport| *counter.borrow_mut() += 1);

    let mut coast = Coast::new(0.0, 100.0, 0.0);
    for _ in 0..50 {
        predictor.update(&coast.step());
    }
    // Fits at 20, 30, 40 and 50 samples.
    assert_eq!(*count.borrow(), 4);
}

#[test]
fn strict_estimate_waits_for_the_uncertainty_gate() {
    let config = PredictorConfig {
        uncertainty_threshold: 1.0e-3,
        ..PredictorConfig::default()
    };
    let mut predictor = ApogeePredictor::new(config);
    for i in 0..300 {
        let t = i as f64 * DT;
        let accel = -12.0 * (1.0 - 0.02 * t).powi(4) + 0.5 * (i as f64 * 12.9898).sin();
        predictor.update(&StepInput::new(t, DT, accel, 200.0 + t, 60.0));
    }

    assert!(predictor.apogee_best_effort().is_some());
    assert!(!predictor.is_converged());
    assert!(predictor.prediction_if_ready().is_none());
}

#[test]
fn reset_clears_samples_fit_and_clock() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(0.0, 100.0, 0.0);
    for _ in 0..40 {
        predictor.update(&coast.step());
    }
    assert!(predictor.fit().is_some());

    predictor.reset();
    assert_eq!(predictor.sample_count(), 0);
    assert!(predictor.fit().is_none());
    assert!(predictor.lookup_table().is_none());
    assert_eq!(predictor.coast_time_s(), 0.0);
    assert!(predictor.apogee_best_effort().is_none());
}

#[test]
fn source_trait_mirrors_inherent_methods() {
    let mut predictor = ApogeePredictor::default();
    let mut coast = Coast::new(0.0, 80.0, 0.0);
    for _ in 0..25 {
        predictor.update(&coast.step());
    }
    let source: &dyn ApogeeSource = &predictor;
    assert_eq!(source.sample_count(), 25);
    assert_eq!(source.apogee_best_effort(), predictor.apogee_best_effort());
    assert_eq!(source.prediction_if_ready(), predictor.prediction_if_ready());
}
