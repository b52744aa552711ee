// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Configuration file handling.
//!
//! Curve, sensor, fan driver and loop settings in TOML.
//! Default path: `/etc/fancurve/config.toml`

use crate::actuator::DEFAULT_I2C_ADDRESS;
use crate::curve::CurveSpec;
use crate::sensor::{DEFAULT_DIVISOR, DEFAULT_SENSOR_PATH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/fancurve/config.toml";

/// Default tick interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Response curve.
    #[serde(default)]
    pub curve: CurveSpec,

    /// Temperature input.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Fan driver.
    #[serde(default)]
    pub fan: FanConfig,

    /// Daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Where temperatures come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorConfig {
    /// sysfs file holding an integer reading.
    #[serde(default = "default_sensor_path")]
    pub path: PathBuf,

    /// Divide the raw reading by this to get degrees C.
    #[serde(default = "default_divisor")]
    pub divisor: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            path: default_sensor_path(),
            divisor: DEFAULT_DIVISOR,
        }
    }
}

/// How fan commands are delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "driver")]
pub enum FanConfig {
    /// Single-byte percent writes to an I2C fan controller.
    #[serde(rename = "i2c")]
    I2c {
        /// Bus number; detected when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bus: Option<u8>,
        /// 7-bit device address.
        #[serde(default = "default_i2c_address")]
        address: u16,
    },

    /// A hwmon `pwmN` output.
    #[serde(rename = "hwmon")]
    Hwmon {
        /// Absolute path to the `pwmN` file
        pwm_path: PathBuf,
    },
}

impl Default for FanConfig {
    fn default() -> Self {
        FanConfig::I2c {
            bus: None,
            address: DEFAULT_I2C_ADDRESS,
        }
    }
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Delay between ticks, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Whether to hand the fan back to firmware control on exit.
    #[serde(default = "default_true")]
    pub restore_on_exit: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            restore_on_exit: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Load / Save
// ---------------------------------------------------------------------------

/// Load config from a TOML file, or return the default if the file doesn't exist.
pub fn load_config(path: &Path) -> io::Result<Config> {
    if !path.exists() {
        log::info!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config = parse_config(&contents)?;

    log::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Parse a TOML config document.
pub fn parse_config(contents: &str) -> io::Result<Config> {
    toml::from_str(contents).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to parse config: {e}"),
        )
    })
}

/// Save config to a TOML file, creating parent directories if needed.
pub fn save_config(path: &Path, config: &Config) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to serialize config: {e}"),
        )
    })?;

    fs::write(path, contents)?;
    log::info!("Saved config to {}", path.display());
    Ok(())
}

/// Resolve the config file path from CLI arg or default.
pub fn resolve_config_path(cli_path: Option<&str>) -> PathBuf {
    cli_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn default_sensor_path() -> PathBuf {
    PathBuf::from(DEFAULT_SENSOR_PATH)
}

fn default_divisor() -> f64 {
    DEFAULT_DIVISOR
}

fn default_i2c_address() -> u16 {
    DEFAULT_I2C_ADDRESS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn test_full_document() {
        let cfg = parse_config(
            r#"
            [curve]
            min_temp = 30.0
            max_temp = 60.0
            order = 0.5

            [sensor]
            path = "/sys/class/hwmon/hwmon1/temp1_input"

            [fan]
            driver = "i2c"
            bus = 0
            address = 0x2A

            [daemon]
            poll_interval_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.curve.min_fan, 5);
        assert_eq!(cfg.curve.max_fan, 100);
        assert_eq!(cfg.curve.order, 0.5);
        assert_eq!(cfg.sensor.path, PathBuf::from("/sys/class/hwmon/hwmon1/temp1_input"));
        assert_eq!(cfg.sensor.divisor, 1000.0);
        assert_eq!(
            cfg.fan,
            FanConfig::I2c {
                bus: Some(0),
                address: 0x2A
            }
        );
        assert_eq!(cfg.daemon.poll_interval_ms, 1000);
        assert!(cfg.daemon.restore_on_exit);
    }

    #[test]
    fn test_sample_config_matches_defaults() {
        let cfg = parse_config(include_str!("../contrib/config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_hwmon_driver() {
        let cfg = parse_config(
            "[fan]\ndriver = \"hwmon\"\npwm_path = \"/sys/class/hwmon/hwmon2/pwm1\"\n",
        )
        .unwrap();
        assert_eq!(
            cfg.fan,
            FanConfig::Hwmon {
                pwm_path: PathBuf::from("/sys/class/hwmon/hwmon2/pwm1")
            }
        );
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let err = parse_config("[fan]\ndriver = \"gpio\"\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("pi-fan-curve-config-{}", std::process::id()));
        let path = dir.join("nested/config.toml");

        let mut cfg = Config::default();
        cfg.curve.order = 1.5;
        cfg.fan = FanConfig::Hwmon {
            pwm_path: PathBuf::from("/sys/class/hwmon/hwmon4/pwm2"),
        };
        save_config(&path, &cfg).unwrap();
        assert_eq!(load_config(&path).unwrap(), cfg);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_default() {
        let cfg = load_config(Path::new("/nonexistent/fancurve.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }
}
