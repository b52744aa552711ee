// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! Fan actuators.
//!
//! Every actuator clamps the command to 0-100 at the point of transmission,
//! independently of the clamp the curve already applies.

use crate::hwmon;
use std::ffi::c_int;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

/// Fan controller address of the Argon ONE case.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x1A;

/// `I2C_SLAVE` request from `linux/i2c-dev.h`.
const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(i2c_set_slave, I2C_SLAVE);

/// Something that accepts a fan duty command in percent.
pub trait FanActuator {
    /// Transmit `percent` (clamped to 0-100).
    fn set(&mut self, percent: u8) -> io::Result<()>;

    /// Hand the fan back to firmware control on shutdown.
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<A: FanActuator + ?Sized> FanActuator for Box<A> {
    fn set(&mut self, percent: u8) -> io::Result<()> {
        (**self).set(percent)
    }

    fn release(&mut self) -> io::Result<()> {
        (**self).release()
    }
}

/// Restrict a command to 0-100.
pub fn clamp_percent(percent: u8) -> u8 {
    percent.min(100)
}

// ---------------------------------------------------------------------------
// I2C
// ---------------------------------------------------------------------------

/// A fan controller on an I2C bus that takes one byte: the duty percent.
#[derive(Debug)]
pub struct I2cFan {
    file: File,
    bus: u8,
    address: u16,
}

impl I2cFan {
    /// Open `/dev/i2c-<bus>` and bind it to the controller at `address`.
    pub fn open(bus: u8, address: u16) -> io::Result<Self> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // SAFETY: the descriptor is open for the duration of the call and
        // I2C_SLAVE takes the address by value.
        unsafe { i2c_set_slave(file.as_raw_fd(), c_int::from(address)) }
            .map_err(io::Error::from)?;

        log::debug!("Bound {path} to address {address:#04x}");
        Ok(Self { file, bus, address })
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn address(&self) -> u16 {
        self.address
    }
}

impl FanActuator for I2cFan {
    fn set(&mut self, percent: u8) -> io::Result<()> {
        self.file.write_all(&[clamp_percent(percent)])
    }
}

/// Bus 1 on every Pi since revision 2 boards, bus 0 on the original boards.
pub fn default_i2c_bus() -> u8 {
    if Path::new("/dev/i2c-1").exists() { 1 } else { 0 }
}

// ---------------------------------------------------------------------------
// hwmon
// ---------------------------------------------------------------------------

/// A hwmon PWM output. Switched to manual mode on first write.
#[derive(Debug, Clone)]
pub struct HwmonFan {
    pwm_path: PathBuf,
    enable_path: PathBuf,
    manual: bool,
}

impl HwmonFan {
    pub fn new(pwm_path: impl Into<PathBuf>) -> Self {
        let pwm_path = pwm_path.into();
        Self {
            enable_path: hwmon::enable_path_for(&pwm_path),
            pwm_path,
            manual: false,
        }
    }
}

impl FanActuator for HwmonFan {
    fn set(&mut self, percent: u8) -> io::Result<()> {
        if !self.manual {
            hwmon::set_pwm_enable(&self.enable_path, hwmon::PWM_ENABLE_MANUAL)?;
            self.manual = true;
        }
        hwmon::set_pwm(&self.pwm_path, hwmon::percent_to_pwm(clamp_percent(percent)))
    }

    fn release(&mut self) -> io::Result<()> {
        hwmon::set_pwm_enable(&self.enable_path, hwmon::PWM_ENABLE_AUTO)?;
        self.manual = false;
        log::info!("Restored {} to automatic control", self.pwm_path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Logs commands instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct DryRunFan {
    pub last: Option<u8>,
}

impl FanActuator for DryRunFan {
    fn set(&mut self, percent: u8) -> io::Result<()> {
        let percent = clamp_percent(percent);
        log::info!("[dry-run] fan -> {percent}%");
        self.last = Some(percent);
        Ok(())
    }
}
