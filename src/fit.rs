// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Two-point power-law fit.
//!
//! The fan response model is
//!
//! ```text
//! f(x) = (x + a)^order * b
//! ```
//!
//! and we solve for `(a, b)` so that the curve passes through
//! `(min_temp, min_fan)` and `(max_temp, max_fan)`. The system is linear in
//! `b` but not in `a`, so it is solved as a small nonlinear least-squares
//! problem with a Levenberg-Marquardt iteration rather than in closed form.
//! Some orders make the problem ill-conditioned (a fractional order with
//! `min_fan = 0` puts the solution on the edge of the power's real domain);
//! the damped iteration still walks towards the best reachable fit there.
//!
//! Candidate steps whose residuals are not finite (a negative base raised to
//! a fractional power) are rejected like any step that increases the cost.

use crate::curve::CurveSpec;
use crate::error::FitError;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Largest accepted boundary miss, in percentage points.
///
/// Half of the output resolution: an accepted fit never moves a boundary
/// command by more than one step after ceiling.
pub const FIT_TOLERANCE: f64 = 0.5;

const MAX_ITERATIONS: usize = 500;
const GRADIENT_TOLERANCE: f64 = 1e-12;
const STEP_TOLERANCE: f64 = 1e-12;
const COST_TOLERANCE: f64 = 1e-20;
const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e16;
const RANK_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Solved coefficients of the power-law model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedParameters {
    /// Temperature shift.
    pub a: f64,
    /// Scale.
    pub b: f64,
}

impl FittedParameters {
    /// Evaluate the model at `x` for the given order.
    pub fn eval(&self, x: f64, order: f64) -> f64 {
        power_law(x, order, self.a, self.b)
    }
}

/// `(x + a)^order * b`.
///
/// Integral orders accept a negative base; fractional orders yield NaN there.
pub fn power_law(x: f64, order: f64, a: f64, b: f64) -> f64 {
    (x + a).powf(order) * b
}

// ---------------------------------------------------------------------------
// Problem
// ---------------------------------------------------------------------------

struct TwoPointProblem {
    xs: [f64; 2],
    ys: [f64; 2],
    order: f64,
}

impl TwoPointProblem {
    fn new(spec: &CurveSpec) -> Self {
        Self {
            xs: [spec.min_temp, spec.max_temp],
            ys: [f64::from(spec.min_fan), f64::from(spec.max_fan)],
            order: spec.order,
        }
    }

    /// Starting point for the iteration. `b` starts at its linear
    /// least-squares optimum for the chosen shift.
    ///
    /// - Equal boundary values: both samples sit far enough from the zero of
    ///   the base that the power varies by well under [`FIT_TOLERANCE`]
    ///   across the range.
    /// - Rising: the shift for which the power alone reproduces the ratio of
    ///   the boundary values, else one and two spans above the zero.
    /// - Falling: the mirror image on the negative side of the zero (only
    ///   integral orders can fall).
    fn initial_guess(&self) -> Vector2<f64> {
        let span = self.xs[1] - self.xs[0];
        let [lo, hi] = self.ys;
        let a = if lo == hi {
            span * (1.0 + 2.0 * self.order * lo / FIT_TOLERANCE) - self.xs[0]
        } else if hi > lo {
            self.ratio_offset(lo, hi).unwrap_or(span) - self.xs[0]
        } else {
            -self.xs[1] - self.ratio_offset(hi, lo).unwrap_or(span)
        };

        match self.optimal_scale(a) {
            Some(b) => Vector2::new(a, b),
            None => Vector2::new(a, 1.0),
        }
    }

    /// Distance from the zero of the base to the sample with the smaller
    /// value such that `(d + span)^order / d^order == large / small`.
    fn ratio_offset(&self, small: f64, large: f64) -> Option<f64> {
        if small <= 0.0 {
            return None;
        }
        let ratio = (large / small).powf(self.order.recip());
        let d = (self.xs[1] - self.xs[0]) / (ratio - 1.0);
        (ratio.is_finite() && ratio > 1.0 && d.is_finite()).then_some(d)
    }

    /// Least-squares `b` for a fixed shift `a`.
    ///
    /// The powers are normalised first so that squaring them cannot
    /// overflow for large bases.
    fn optimal_scale(&self, a: f64) -> Option<f64> {
        let g = Vector2::new(
            (self.xs[0] + a).powf(self.order),
            (self.xs[1] + a).powf(self.order),
        );
        let scale = g.amax();
        if !(scale.is_finite() && scale > 0.0) {
            return None;
        }
        let unit = g / scale;
        let ys = Vector2::new(self.ys[0], self.ys[1]);
        let b = ys.dot(&unit) / (unit.norm_squared() * scale);
        b.is_finite().then_some(b)
    }

    fn residuals(&self, p: &Vector2<f64>) -> Option<Vector2<f64>> {
        let r = Vector2::new(
            power_law(self.xs[0], self.order, p[0], p[1]) - self.ys[0],
            power_law(self.xs[1], self.order, p[0], p[1]) - self.ys[1],
        );
        r.norm_squared().is_finite().then_some(r)
    }

    fn jacobian(&self, p: &Vector2<f64>) -> Option<Matrix2<f64>> {
        let (a, b) = (p[0], p[1]);
        let row = |x: f64| {
            let base = x + a;
            (
                b * self.order * base.powf(self.order - 1.0),
                base.powf(self.order),
            )
        };
        let (j00, j01) = row(self.xs[0]);
        let (j10, j11) = row(self.xs[1]);
        let j = Matrix2::new(j00, j01, j10, j11);
        j.iter().all(|v| v.is_finite()).then_some(j)
    }
}

fn is_rank_deficient(j: &Matrix2<f64>) -> bool {
    let sv = j.singular_values();
    let max = sv.max();
    max == 0.0 || sv.min() <= RANK_TOLERANCE * max
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Fit `(a, b)` so that the model reproduces both boundary points of `spec`.
///
/// The spec is expected to be validated already. Reaching the iteration cap
/// is not an error by itself: the fit is judged by how closely it reproduces
/// the boundary points (see [`FIT_TOLERANCE`]).
pub fn fit_power_curve(spec: &CurveSpec) -> Result<FittedParameters, FitError> {
    let problem = TwoPointProblem::new(spec);

    let mut params = problem.initial_guess();
    let mut residuals = problem.residuals(&params).ok_or(FitError::NonFinite)?;
    let mut cost = 0.5 * residuals.norm_squared();
    let mut damping = INITIAL_DAMPING;
    let mut iterations = 0;
    let mut capped = true;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        let Some(jacobian) = problem.jacobian(&params) else {
            capped = false;
            break;
        };
        let gradient = jacobian.transpose() * residuals;
        if cost < COST_TOLERANCE || gradient.amax() < GRADIENT_TOLERANCE {
            capped = false;
            break;
        }

        // Marquardt scaling: damp each parameter by its own curvature.
        let normal = jacobian.transpose() * jacobian;
        let mut damped = normal;
        for i in 0..2 {
            damped[(i, i)] += damping * normal[(i, i)].max(f64::EPSILON);
        }

        let step = damped
            .lu()
            .solve(&(-gradient))
            .filter(|s| s.iter().all(|v| v.is_finite()));

        let accepted = step.and_then(|step| {
            let candidate = params + step;
            problem
                .residuals(&candidate)
                .map(|r| (step, candidate, r))
                .filter(|(_, _, r)| 0.5 * r.norm_squared() < cost)
        });

        match accepted {
            Some((step, candidate, r)) => {
                params = candidate;
                residuals = r;
                cost = 0.5 * r.norm_squared();
                damping = (damping / 10.0).max(MIN_DAMPING);

                if step.norm() <= STEP_TOLERANCE * (params.norm() + STEP_TOLERANCE) {
                    capped = false;
                    break;
                }
            }
            None => {
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    capped = false;
                    break;
                }
            }
        }
    }

    // The iteration can stop on the edge of the power's domain (zero base,
    // order below one) where the slope in `a` is unbounded and `b` has not
    // caught up. Pin `a` and re-solve `b`.
    if let Some(b) = problem.optimal_scale(params[0]) {
        let candidate = Vector2::new(params[0], b);
        if let Some(r) = problem.residuals(&candidate) {
            if 0.5 * r.norm_squared() < cost {
                params = candidate;
                residuals = r;
            }
        }
    }

    let residual = residuals.amax();
    let fitted = FittedParameters {
        a: params[0],
        b: params[1],
    };

    if !(fitted.a.is_finite() && fitted.b.is_finite()) {
        return Err(FitError::NonFinite);
    }

    if residual <= FIT_TOLERANCE {
        if capped {
            log::debug!(
                "Fit hit the iteration cap ({MAX_ITERATIONS}), accepting residual {residual:.2e}"
            );
        }
        log::debug!(
            "Fitted a={:.6} b={:.6e} (order {}, {iterations} iterations, residual {residual:.2e})",
            fitted.a,
            fitted.b,
            spec.order
        );
        return Ok(fitted);
    }

    match problem.jacobian(&params) {
        Some(j) if !is_rank_deficient(&j) => Err(FitError::NotConverged {
            iterations,
            residual,
        }),
        _ => Err(FitError::SingularJacobian { residual }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(order: f64) -> CurveSpec {
        CurveSpec {
            min_temp: 30.0,
            max_temp: 60.0,
            min_fan: 0,
            max_fan: 100,
            order,
        }
    }

    #[test]
    fn test_power_law_negative_base() {
        assert_eq!(power_law(-32.0, 3.0, 30.0, 1.0), -8.0);
        assert!(power_law(-32.0, 0.5, 30.0, 1.0).is_nan());
    }

    #[test]
    fn test_linear_fit_is_exact() {
        let p = fit_power_curve(&spec(1.0)).unwrap();
        assert!((p.a + 30.0).abs() < 1e-6, "a = {}", p.a);
        assert!((p.b - 100.0 / 30.0).abs() < 1e-6, "b = {}", p.b);
    }

    #[test]
    fn test_fit_reproduces_boundaries() {
        for order in [0.33, 0.5, 1.0, 2.0, 3.0] {
            let s = spec(order);
            let p = fit_power_curve(&s).unwrap();
            assert!((p.eval(s.min_temp, order) - 0.0).abs() <= FIT_TOLERANCE);
            assert!((p.eval(s.max_temp, order) - 100.0).abs() <= FIT_TOLERANCE);
        }
    }

    #[test]
    fn test_fractional_fit_stays_in_domain() {
        let s = spec(0.5);
        let p = fit_power_curve(&s).unwrap();
        assert!(s.min_temp + p.a >= 0.0);
        assert!(p.eval(s.min_temp, s.order).is_finite());
    }

    #[test]
    fn test_overflowing_order_is_non_finite() {
        assert_eq!(fit_power_curve(&spec(500.0)), Err(FitError::NonFinite));
    }

    #[test]
    fn test_flat_order_does_not_converge() {
        // A near-zero order makes the model flat: 5% and 100% cannot both be hit.
        let s = CurveSpec {
            min_fan: 5,
            ..spec(1e-9)
        };
        let err = fit_power_curve(&s).unwrap_err();
        assert!(matches!(
            err,
            FitError::NotConverged { .. } | FitError::SingularJacobian { .. }
        ));
    }

    #[test]
    fn test_domain_edge_refits_scale() {
        // Stops exactly on x + a = 0; b must still be solved.
        let p = fit_power_curve(&spec(0.5)).unwrap();
        assert!((p.eval(60.0, 0.5) - 100.0).abs() <= FIT_TOLERANCE);
    }

    #[test]
    fn test_falling_curve() {
        let s = CurveSpec {
            min_fan: 100,
            max_fan: 20,
            ..spec(1.0)
        };
        let p = fit_power_curve(&s).unwrap();
        assert!((p.a + 67.5).abs() < 1e-6, "a = {}", p.a);
        assert!((p.b + 80.0 / 30.0).abs() < 1e-6, "b = {}", p.b);
    }

    #[test]
    fn test_falling_fractional_curve_is_non_finite() {
        let s = CurveSpec {
            min_fan: 100,
            max_fan: 20,
            ..spec(0.5)
        };
        assert_eq!(fit_power_curve(&s), Err(FitError::NonFinite));
    }

    #[test]
    fn test_constant_fan_fits_flat_curve() {
        for fan in [20, 50, 100] {
            for order in [0.5, 1.0, 2.0, 3.0, 4.0] {
                let s = CurveSpec {
                    min_fan: fan,
                    max_fan: fan,
                    ..spec(order)
                };
                let p = fit_power_curve(&s).unwrap_or_else(|e| panic!("{s:?}: {e}"));
                for t in [30.0, 45.0, 60.0] {
                    let v = p.eval(t, order);
                    assert!((v - f64::from(fan)).abs() <= FIT_TOLERANCE, "{t}C -> {v}");
                }
            }
        }
    }

    #[test]
    fn test_steep_orders_fit_both_directions() {
        for (min_fan, max_fan) in [(5, 100), (40, 60), (100, 20), (60, 40)] {
            for order in [5.0, 8.0, 20.0] {
                let s = CurveSpec {
                    min_fan,
                    max_fan,
                    ..spec(order)
                };
                let p = fit_power_curve(&s).unwrap_or_else(|e| panic!("{s:?}: {e}"));
                assert!((p.eval(30.0, order) - f64::from(min_fan)).abs() <= FIT_TOLERANCE);
                assert!((p.eval(60.0, order) - f64::from(max_fan)).abs() <= FIT_TOLERANCE);
            }
        }
    }

    #[test]
    fn test_all_zero_fan_fits_flat_curve() {
        let s = CurveSpec {
            max_fan: 0,
            ..spec(2.0)
        };
        let p = fit_power_curve(&s).unwrap();
        assert!(p.eval(45.0, s.order).abs() <= FIT_TOLERANCE);
    }
}
