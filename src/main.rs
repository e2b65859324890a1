//! Main entry point for the fan controller

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use pi_fan_control::cancel::cancellation;
use pi_fan_control::cpu_temp::SysfsTemperature;
use pi_fan_control::gpio::rppal_driver::RppalDriver;
use pi_fan_control::{args::Args, logging, notify, shutdown, ControllerConfig, FanControlLoop};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    pi_fan_control::print_version("pi-fan-control");
    let args = Args::parse();

    if let Err(e) = logging::setup(args.verbose, args.systemd) {
        eprintln!("Unable to set up logging: {}", e);
        return ExitCode::from(2);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(2);
        }
    };

    if args.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Unable to print configuration: {}", e);
                ExitCode::from(2)
            }
        };
    }

    run(config, args.systemd).await
}

/// Configuration file (or defaults) with command line overrides applied.
fn load_config(args: &Args) -> anyhow::Result<ControllerConfig> {
    let mut config =
        ControllerConfig::load(args.config.as_deref()).context("Unable to load configuration")?;

    if let Some(gpiochip) = args.gpiochip {
        config.gpiochip = gpiochip;
    }
    if let Some(gpio) = args.gpio {
        config.gpio = gpio;
    }
    if let Some(frequency) = args.frequency {
        config.frequency_hz = frequency;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.interval_ms = interval_ms;
    }
    if let Some(sensor) = &args.sensor {
        config.sensor_path = sensor.clone();
    }

    config.validate().context("Invalid command line setting")?;
    Ok(config)
}

async fn run(config: ControllerConfig, systemd: bool) -> ExitCode {
    let (handle, signal) = cancellation();
    let on_signal: fn() = if systemd { notify::stopping } else { || {} };
    if let Err(e) = shutdown::cancel_on_signals(handle, on_signal) {
        error!("Unable to install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = config.loop_settings();
    let sensor = SysfsTemperature::new(&config.sensor_path);
    info!(
        "Controlling fan on GPIO chip {} line {} at {} Hz, sampling {} every {:?}",
        settings.chip,
        settings.line,
        settings.frequency_hz,
        sensor.path().display(),
        settings.interval
    );
    let fan_loop = FanControlLoop::new(RppalDriver::default(), sensor, config.curve(), settings);

    if systemd {
        notify::ready();
    }

    let outcome = fan_loop
        .run(signal, |sample, duty| {
            info!("{:.2}°C -> {}%", sample.temperature, duty)
        })
        .await;

    match outcome {
        Ok(never) => match never {},
        Err(e) if e.is_clean_cancellation() => {
            warn!("Cancelled");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Signal-driven shutdowns already reported STOPPING.
            if systemd && !e.is_cancelled() {
                notify::stopping();
            }
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
