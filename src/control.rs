// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! The control loop: read the sensor, evaluate the curve, command the fan,
//! sleep a fixed interval.
//!
//! Nothing here escalates. A failed sensor read arrives as a sentinel the
//! curve clamps to `min_fan`; a failed fan write is logged and retried
//! naturally on the next tick.

use crate::actuator::FanActuator;
use crate::curve::ResponseCurve;
use crate::sensor::TemperatureSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Longest uninterrupted sleep, so a stop request is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(100);

pub struct ControlLoop<C, S, A> {
    curve: C,
    source: S,
    actuator: A,
    interval: Duration,
}

impl<C, S, A> ControlLoop<C, S, A>
where
    C: ResponseCurve,
    S: TemperatureSource,
    A: FanActuator,
{
    pub fn new(curve: C, source: S, actuator: A, interval: Duration) -> Self {
        Self {
            curve,
            source,
            actuator,
            interval,
        }
    }

    /// One read -> evaluate -> set cycle. Returns the command issued.
    pub fn tick(&mut self) -> u8 {
        let temp = self.source.read();
        let percent = self.curve.fan_percent(temp);
        log::info!("Temperature {temp:.1}°C -> fan {percent}%");

        if let Err(e) = self.actuator.set(percent) {
            log::error!("Failed to set fan to {percent}%: {e}");
        }
        percent
    }

    /// Tick every `interval` until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!(
            "Monitoring temperature every {} ms",
            self.interval.as_millis()
        );
        while !stop.load(Ordering::Relaxed) {
            self.tick();
            sleep_unless_stopped(self.interval, stop);
        }
        log::info!("Control loop stopped");
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn into_actuator(self) -> A {
        self.actuator
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let mut left = total;
    while !left.is_zero() && !stop.load(Ordering::Relaxed) {
        let nap = left.min(STOP_POLL);
        thread::sleep(nap);
        left -= nap;
    }
}
