// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Error types for curve construction.
//!
//! Runtime conditions (bad sensor reads, failed fan writes) are not errors
//! of the curve: they are absorbed by the clamp or logged by the control loop.

use thiserror::Error;

/// Failure to build a [`FanCurve`](crate::curve::FanCurve).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    /// The curve parameters are invalid.
    #[error("Invalid curve configuration: {0}")]
    Config(String),

    /// The response model could not be fitted to the boundary points.
    #[error("Curve fit failed: {0}")]
    Fit(#[from] FitError),
}

/// Failure of the two-point power-law fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// No finite model evaluation was reachable from the starting point.
    #[error("model is not finite at the boundary points")]
    NonFinite,

    /// The Jacobian lost rank and the boundary points were not reproduced.
    #[error("singular Jacobian, boundary residual {residual:.3}")]
    SingularJacobian { residual: f64 },

    /// The solver stopped without reproducing the boundary points.
    #[error("no convergence after {iterations} iterations, boundary residual {residual:.3}")]
    NotConverged { iterations: usize, residual: f64 },
}
