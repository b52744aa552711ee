// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Temperature-driven fan control with fitted power-law response curves.
//!
//! A [`FanCurve`] is fitted once from a [`CurveSpec`] and then evaluated on
//! every tick of a [`ControlLoop`], which reads a [`TemperatureSource`] and
//! commands a [`FanActuator`].

pub mod actuator;
pub mod config;
pub mod control;
pub mod curve;
pub mod error;
pub mod fit;
pub mod hwmon;
pub mod sensor;

pub use actuator::FanActuator;
pub use control::ControlLoop;
pub use curve::{CurveSpec, FanCurve, ResponseCurve};
pub use error::{CurveError, FitError};
pub use fit::FittedParameters;
pub use sensor::TemperatureSource;
