// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Temperature sources.
//!
//! A failed read is reported as [`SENSOR_FAILURE_TEMP`], a value below any
//! sane curve range, so the curve's low clamp turns it into `min_fan`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default CPU thermal zone on a Raspberry Pi.
pub const DEFAULT_SENSOR_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// sysfs temperature files are in millidegrees.
pub const DEFAULT_DIVISOR: f64 = 1000.0;

/// Reading reported when the sensor cannot be read.
pub const SENSOR_FAILURE_TEMP: f64 = -1.0;

/// Something that yields one temperature reading (C) per call.
pub trait TemperatureSource {
    /// Current temperature, or [`SENSOR_FAILURE_TEMP`] on failure.
    fn read(&mut self) -> f64;
}

impl<F: FnMut() -> f64> TemperatureSource for F {
    fn read(&mut self) -> f64 {
        self()
    }
}

/// An integer sysfs temperature file such as a thermal zone or hwmon input.
#[derive(Debug, Clone)]
pub struct SysfsTemperature {
    path: PathBuf,
    divisor: f64,
}

impl SysfsTemperature {
    pub fn new(path: impl Into<PathBuf>, divisor: f64) -> Self {
        Self {
            path: path.into(),
            divisor,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and scale the file, surfacing I/O and parse failures.
    pub fn try_read(&self) -> io::Result<f64> {
        let raw = fs::read_to_string(&self.path)?;
        let value = raw.trim().parse::<i64>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Bad temperature value {:?}: {e}", raw.trim()),
            )
        })?;
        Ok(value as f64 / self.divisor)
    }
}

impl Default for SysfsTemperature {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_PATH, DEFAULT_DIVISOR)
    }
}

impl TemperatureSource for SysfsTemperature {
    fn read(&mut self) -> f64 {
        match self.try_read() {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Failed to read {}: {e}", self.path.display());
                SENSOR_FAILURE_TEMP
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("pi-fan-curve-sensor-{name}-{}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reads_millidegrees() {
        let path = scratch_file("ok", "48312\n");
        let mut sensor = SysfsTemperature::new(&path, DEFAULT_DIVISOR);
        assert!((sensor.read() - 48.312).abs() < 1e-9);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file_is_sentinel() {
        let mut sensor = SysfsTemperature::new("/nonexistent/thermal_zone9/temp", DEFAULT_DIVISOR);
        assert!(sensor.try_read().is_err());
        assert_eq!(sensor.read(), SENSOR_FAILURE_TEMP);
    }

    #[test]
    fn test_garbage_is_sentinel() {
        let path = scratch_file("garbage", "hot\n");
        let mut sensor = SysfsTemperature::new(&path, DEFAULT_DIVISOR);
        assert_eq!(
            sensor.try_read().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
        assert_eq!(sensor.read(), SENSOR_FAILURE_TEMP);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_closure_source() {
        let mut readings = vec![50.0, 42.0].into_iter();
        let mut source = move || readings.next().unwrap_or(SENSOR_FAILURE_TEMP);
        assert_eq!(source.read(), 50.0);
        assert_eq!(source.read(), 42.0);
        assert_eq!(source.read(), SENSOR_FAILURE_TEMP);
    }
}
