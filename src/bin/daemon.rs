// Copyright (c) 2026 Pegasus Heavy Industries LLC
// Licensed under the MIT License

//! fancurve-daemon: samples a temperature sensor, maps it through the
//! configured fan curve and commands the fan on a fixed interval.

use anyhow::Context;
use clap::Parser;
use pi_fan_curve::actuator::{self, DryRunFan, FanActuator, HwmonFan, I2cFan};
use pi_fan_curve::config::{self, FanConfig};
use pi_fan_curve::control::ControlLoop;
use pi_fan_curve::curve::FanCurve;
use pi_fan_curve::hwmon;
use pi_fan_curve::sensor::SysfsTemperature;
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "fancurve-daemon", about = "Temperature-driven fan curve daemon")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Override the tick interval.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Log fan commands instead of sending them.
    #[arg(long)]
    dry_run: bool,

    /// Run a single tick and exit.
    #[arg(long)]
    once: bool,

    /// Print the fitted curve and exit.
    #[arg(long)]
    preview: bool,

    /// List temperature inputs and PWM outputs and exit.
    #[arg(long)]
    list_devices: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let config_path = config::resolve_config_path(Some(&cli.config));
    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Could not load config {}", config_path.display()))?;

    let curve = FanCurve::new(cfg.curve).context("Could not build the fan curve")?;
    let params = curve.params();
    log::info!(
        "Fan curve {}-{}°C -> {}-{}%, order {} (a={:.4}, b={:.4e})",
        cfg.curve.min_temp,
        cfg.curve.max_temp,
        cfg.curve.min_fan,
        cfg.curve.max_fan,
        cfg.curve.order,
        params.a,
        params.b
    );

    if cli.preview {
        print_preview(&curve);
        return Ok(());
    }

    let source = SysfsTemperature::new(&cfg.sensor.path, cfg.sensor.divisor);
    log::info!("Sensor: {}", source.path().display());
    let fan = open_fan(&cfg.fan, cli.dry_run)?;
    let interval = Duration::from_millis(cli.interval_ms.unwrap_or(cfg.daemon.poll_interval_ms));
    let mut ctl = ControlLoop::new(curve, source, fan, interval);

    if cli.once {
        ctl.tick();
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop))
            .context("Could not install signal handler")?;
    }

    log::info!("Monitoring temperature and adjusting fan speed in real time...");
    ctl.run(&stop);
    log::info!("Received shutdown signal");

    if cfg.daemon.restore_on_exit {
        if let Err(e) = ctl.actuator_mut().release() {
            log::warn!("Failed to release fan: {e}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fan driver
// ---------------------------------------------------------------------------

fn open_fan(fan: &FanConfig, dry_run: bool) -> anyhow::Result<Box<dyn FanActuator>> {
    if dry_run {
        log::info!("Dry run: fan commands will only be logged");
        return Ok(Box::new(DryRunFan::default()));
    }

    match fan {
        FanConfig::I2c { bus, address } => {
            let bus = bus.unwrap_or_else(actuator::default_i2c_bus);
            let fan = I2cFan::open(bus, *address)
                .with_context(|| format!("Could not open I2C fan {address:#04x} on bus {bus}"))?;
            log::info!("Fan: I2C bus {} address {:#04x}", fan.bus(), fan.address());
            Ok(Box::new(fan))
        }
        FanConfig::Hwmon { pwm_path } => {
            if !pwm_path.exists() {
                anyhow::bail!("PWM output {} does not exist", pwm_path.display());
            }
            Ok(Box::new(HwmonFan::new(pwm_path)))
        }
    }
}

// ---------------------------------------------------------------------------
// One-shot commands
// ---------------------------------------------------------------------------

fn print_preview(curve: &FanCurve) {
    let spec = curve.spec();
    let (below, above) = (spec.min_temp - 5.0, spec.max_temp + 5.0);
    println!("{:>8}  {:>5}", "Temp", "Fan");
    println!("{below:>7.1}°  {:>4}%  (below range)", curve.evaluate(below));
    for (temp, percent) in curve.table(5.0) {
        println!("{temp:>7.1}°  {percent:>4}%");
    }
    println!("{above:>7.1}°  {:>4}%  (above range)", curve.evaluate(above));
}

fn list_devices() -> anyhow::Result<()> {
    let temps = hwmon::discover_temp_inputs().context("Could not scan temperature inputs")?;
    let pwms = hwmon::discover_pwm_outputs().context("Could not scan PWM outputs")?;

    println!("Temperature inputs:");
    for t in &temps {
        let reading = SysfsTemperature::new(&t.path, 1000.0)
            .try_read()
            .map(|c| format!("{c:.1}°C"))
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "  {:<20} {:<16} {:>8}  {}",
            t.id,
            t.label.as_deref().unwrap_or("-"),
            reading,
            t.path.display()
        );
    }

    println!("PWM outputs:");
    for p in &pwms {
        println!(
            "  {:<20} {:<16} {:<12} {}",
            p.id,
            p.label.as_deref().unwrap_or("-"),
            p.hwmon_name,
            p.pwm_path.display()
        );
    }

    if temps.is_empty() && pwms.is_empty() {
        log::warn!("No sysfs temperature inputs or PWM outputs found");
    }
    Ok(())
}
