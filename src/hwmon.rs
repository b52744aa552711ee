// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! sysfs discovery and PWM control.
//!
//! Scans `/sys/class/thermal/` and `/sys/class/hwmon/` for temperature
//! inputs and PWM outputs so a sensor path and fan driver can be picked for
//! the config file, and provides the raw PWM writes used by the hwmon fan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";
pub const THERMAL_ROOT: &str = "/sys/class/thermal";

/// `pwmN_enable` mode for manual duty control.
pub const PWM_ENABLE_MANUAL: u8 = 1;
/// `pwmN_enable` mode for firmware (automatic) control.
pub const PWM_ENABLE_AUTO: u8 = 2;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A discovered temperature input file (millidegrees C).
#[derive(Debug, Clone, PartialEq)]
pub struct TempInput {
    /// Unique identifier, e.g. "thermal_zone0" or "hwmon3/temp1"
    pub id: String,
    /// Zone type or hwmon label, if available
    pub label: Option<String>,
    /// Absolute path to the readable file
    pub path: PathBuf,
}

/// A discovered PWM output.
#[derive(Debug, Clone, PartialEq)]
pub struct PwmOutput {
    /// Unique identifier, e.g. "hwmon3/pwm1"
    pub id: String,
    /// Human-readable label if available
    pub label: Option<String>,
    /// Absolute path to the `pwmN` file
    pub pwm_path: PathBuf,
    /// Name of the parent hwmon device
    pub hwmon_name: String,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Every thermal zone and hwmon temperature input on this machine.
pub fn discover_temp_inputs() -> io::Result<Vec<TempInput>> {
    discover_temp_inputs_in(Path::new(THERMAL_ROOT), Path::new(HWMON_ROOT))
}

pub fn discover_temp_inputs_in(
    thermal_root: &Path,
    hwmon_root: &Path,
) -> io::Result<Vec<TempInput>> {
    let mut inputs = Vec::new();

    if thermal_root.is_dir() {
        for entry in fs::read_dir(thermal_root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with("thermal_zone") {
                continue;
            }
            let path = entry.path().join("temp");
            if !path.exists() {
                continue;
            }
            inputs.push(TempInput {
                id: name,
                label: read_trimmed(&entry.path().join("type")),
                path,
            });
        }
    }

    if hwmon_root.is_dir() {
        for entry in fs::read_dir(hwmon_root)? {
            let entry = entry?;
            let hwmon_dir = entry.path();
            let hwmon_basename = entry.file_name().to_string_lossy().to_string();

            for n in 1..=32 {
                let path = hwmon_dir.join(format!("temp{n}_input"));
                if !path.exists() {
                    break;
                }
                inputs.push(TempInput {
                    id: format!("{hwmon_basename}/temp{n}"),
                    label: read_trimmed(&hwmon_dir.join(format!("temp{n}_label")))
                        .or_else(|| read_trimmed(&hwmon_dir.join("name"))),
                    path,
                });
            }
        }
    }

    inputs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(inputs)
}

/// Every hwmon PWM output on this machine.
pub fn discover_pwm_outputs() -> io::Result<Vec<PwmOutput>> {
    discover_pwm_outputs_in(Path::new(HWMON_ROOT))
}

pub fn discover_pwm_outputs_in(hwmon_root: &Path) -> io::Result<Vec<PwmOutput>> {
    let mut outputs = Vec::new();
    if !hwmon_root.is_dir() {
        return Ok(outputs);
    }

    for entry in fs::read_dir(hwmon_root)? {
        let entry = entry?;
        let hwmon_dir = entry.path();
        let hwmon_name = read_trimmed(&hwmon_dir.join("name")).unwrap_or_default();
        let hwmon_basename = entry.file_name().to_string_lossy().to_string();

        for n in 1..=16 {
            let pwm_path = hwmon_dir.join(format!("pwm{n}"));
            if !pwm_path.exists() {
                break;
            }
            outputs.push(PwmOutput {
                id: format!("{hwmon_basename}/pwm{n}"),
                label: read_trimmed(&hwmon_dir.join(format!("fan{n}_label"))),
                pwm_path,
                hwmon_name: hwmon_name.clone(),
            });
        }
    }

    outputs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(outputs)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// The `pwmN_enable` file next to a `pwmN` file.
pub fn enable_path_for(pwm_path: &Path) -> PathBuf {
    let mut name = pwm_path.as_os_str().to_os_string();
    name.push("_enable");
    PathBuf::from(name)
}

/// Set PWM enable mode.
///   1 = manual PWM control
///   2 = automatic (BIOS/firmware)
pub fn set_pwm_enable(enable_path: &Path, mode: u8) -> io::Result<()> {
    fs::write(enable_path, format!("{mode}"))
}

/// Set the PWM duty value (0-255). The output must already be in manual mode.
pub fn set_pwm(pwm_path: &Path, value: u8) -> io::Result<()> {
    fs::write(pwm_path, format!("{value}"))
}

/// Scale a 0-100 percentage to a 0-255 PWM duty, rounding to nearest.
pub fn percent_to_pwm(percent: u8) -> u8 {
    ((u32::from(percent.min(100)) * 255 + 50) / 100) as u8
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("pi-fan-curve-hwmon-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_percent_to_pwm() {
        assert_eq!(percent_to_pwm(0), 0);
        assert_eq!(percent_to_pwm(50), 128);
        assert_eq!(percent_to_pwm(100), 255);
        assert_eq!(percent_to_pwm(200), 255);
    }

    #[test]
    fn test_enable_path() {
        assert_eq!(
            enable_path_for(Path::new("/sys/class/hwmon/hwmon2/pwm1")),
            PathBuf::from("/sys/class/hwmon/hwmon2/pwm1_enable")
        );
    }

    #[test]
    fn test_discovery() {
        let root = scratch_dir("discover");
        let thermal = root.join("thermal");
        let hwmon = root.join("hwmon");

        fs::create_dir_all(thermal.join("thermal_zone0")).unwrap();
        fs::write(thermal.join("thermal_zone0/temp"), "48312\n").unwrap();
        fs::write(thermal.join("thermal_zone0/type"), "cpu-thermal\n").unwrap();
        fs::create_dir_all(thermal.join("cooling_device0")).unwrap();

        fs::create_dir_all(hwmon.join("hwmon1")).unwrap();
        fs::write(hwmon.join("hwmon1/name"), "nct6775\n").unwrap();
        fs::write(hwmon.join("hwmon1/temp1_input"), "41000\n").unwrap();
        fs::write(hwmon.join("hwmon1/pwm1"), "128\n").unwrap();
        fs::write(hwmon.join("hwmon1/pwm2"), "255\n").unwrap();
        fs::write(hwmon.join("hwmon1/fan2_label"), "CPU_FAN\n").unwrap();

        let temps = discover_temp_inputs_in(&thermal, &hwmon).unwrap();
        let ids: Vec<_> = temps.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["hwmon1/temp1", "thermal_zone0"]);
        assert_eq!(temps[0].label.as_deref(), Some("nct6775"));
        assert_eq!(temps[1].label.as_deref(), Some("cpu-thermal"));

        let pwms = discover_pwm_outputs_in(&hwmon).unwrap();
        assert_eq!(pwms.len(), 2);
        assert_eq!(pwms[1].label.as_deref(), Some("CPU_FAN"));
        assert_eq!(pwms[0].hwmon_name, "nct6775");

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_discovery_without_sysfs() {
        let root = scratch_dir("empty");
        assert!(discover_temp_inputs_in(&root.join("a"), &root.join("b")).unwrap().is_empty());
        assert!(discover_pwm_outputs_in(&root.join("b")).unwrap().is_empty());
        fs::remove_dir_all(&root).unwrap();
    }
}
