// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan curve definitions and evaluation.
//!
//! A curve maps temperature readings to fan duty percentages (0-100).
//! Between `min_temp` and `max_temp` the value comes from a fitted power-law
//! model; outside that range the configured boundary percentages are
//! returned verbatim.

use crate::error::CurveError;
use crate::fit::{self, FittedParameters};
use serde::{Deserialize, Serialize};

/// Upper bound on the rows produced by [`FanCurve::table`].
pub const MAX_TABLE_ROWS: usize = 10_000;

/// Boundary points and shape of a response curve.
///
/// Fields missing from a config document take their value from
/// [`CurveSpec::default`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurveSpec {
    /// Temperature (C) at which the fan runs at `min_fan`.
    pub min_temp: f64,
    /// Temperature (C) at which the fan runs at `max_fan`.
    pub max_temp: f64,
    /// Fan percent at and below `min_temp`.
    pub min_fan: u8,
    /// Fan percent at and above `max_temp`.
    pub max_fan: u8,
    /// Power-law exponent. Higher values concentrate the rise near `max_temp`.
    pub order: f64,
}

impl Default for CurveSpec {
    /// Quiet Raspberry Pi case fan: 5% at 40C, full at 55C, quadratic ramp.
    fn default() -> Self {
        Self {
            min_temp: 40.0,
            max_temp: 55.0,
            min_fan: 5,
            max_fan: 100,
            order: 2.0,
        }
    }
}

impl CurveSpec {
    /// Check the spec describes a well-posed fit.
    ///
    /// A decreasing curve (`min_fan > max_fan`) is allowed.
    pub fn validate(&self) -> Result<(), CurveError> {
        if !self.min_temp.is_finite() || !self.max_temp.is_finite() {
            return Err(CurveError::Config(
                "Temperatures must be finite".to_string(),
            ));
        }
        if self.min_temp >= self.max_temp {
            return Err(CurveError::Config(format!(
                "min_temp ({}) must be below max_temp ({})",
                self.min_temp, self.max_temp
            )));
        }
        for (name, value) in [("min_fan", self.min_fan), ("max_fan", self.max_fan)] {
            if value > 100 {
                return Err(CurveError::Config(format!(
                    "{name} ({value}) must be within 0-100"
                )));
            }
        }
        if !self.order.is_finite() || self.order <= 0.0 {
            return Err(CurveError::Config(format!(
                "order ({}) must be a positive number",
                self.order
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// A temperature-to-percent response with boundary clamping.
///
/// Implementors provide the unclamped model value; [`fan_percent`] applies
/// the clamp policy shared by every curve.
///
/// [`fan_percent`]: ResponseCurve::fan_percent
pub trait ResponseCurve {
    /// Boundaries of the operating range.
    fn spec(&self) -> &CurveSpec;

    /// Unclamped model output in percent.
    fn raw_percent(&self, temp: f64) -> f64;

    /// Fan percent for `temp`, always within 0-100.
    ///
    /// - Below `min_temp`: `min_fan`
    /// - Above `max_temp`: `max_fan`
    /// - Otherwise (boundaries included): the model value rounded up, then
    ///   clamped to 0-100
    fn fan_percent(&self, temp: f64) -> u8 {
        let spec = self.spec();
        if temp < spec.min_temp {
            return spec.min_fan;
        }
        if temp > spec.max_temp {
            return spec.max_fan;
        }

        let raw = self.raw_percent(temp);
        if !raw.is_finite() {
            // Only reachable with a NaN temperature; fail hot.
            return spec.max_fan.min(100);
        }
        raw.ceil().clamp(0.0, 100.0) as u8
    }
}

/// A power-law fan curve fitted through its two boundary points.
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FanCurve {
    spec: CurveSpec,
    params: FittedParameters,
}

impl FanCurve {
    /// Validate `spec` and fit the model through its boundary points.
    pub fn new(spec: CurveSpec) -> Result<Self, CurveError> {
        spec.validate()?;
        let params = fit::fit_power_curve(&spec)?;
        Ok(Self { spec, params })
    }

    /// Fan percent for a temperature reading.
    pub fn evaluate(&self, temp: f64) -> u8 {
        self.fan_percent(temp)
    }

    pub fn spec(&self) -> &CurveSpec {
        &self.spec
    }

    pub fn params(&self) -> FittedParameters {
        self.params
    }

    /// Sample the curve from `min_temp` to `max_temp` (both included) every
    /// `step` degrees.
    ///
    /// The step is widened when needed to stay within [`MAX_TABLE_ROWS`].
    pub fn table(&self, step: f64) -> Vec<(f64, u8)> {
        let (lo, hi) = (self.spec.min_temp, self.spec.max_temp);
        let mut rows = Vec::new();

        if step > 0.0 {
            let step = step.max((hi - lo) / (MAX_TABLE_ROWS - 1) as f64);
            let n = ((hi - lo) / step).floor() as usize;
            for i in 0..=n {
                let t = lo + i as f64 * step;
                rows.push((t, self.evaluate(t)));
            }
        } else {
            rows.push((lo, self.evaluate(lo)));
        }

        if rows.last().is_none_or(|&(t, _)| t < hi) {
            rows.push((hi, self.evaluate(hi)));
        }
        rows
    }
}

impl ResponseCurve for FanCurve {
    fn spec(&self) -> &CurveSpec {
        &self.spec
    }

    fn raw_percent(&self, temp: f64) -> f64 {
        self.params.eval(temp, self.spec.order)
    }
}
