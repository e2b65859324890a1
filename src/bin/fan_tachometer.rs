//! Prints fan speed from the tachometer line once per period

use clap::Parser;
use log::{error, warn};
use pi_fan_control::cancel::cancellation;
use pi_fan_control::fan_monitor::{measure, TachSettings};
use pi_fan_control::gpio::rppal_driver::RppalDriver;
use pi_fan_control::{args::TachArgs, logging, shutdown};
use std::process::ExitCode;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    pi_fan_control::print_version("fan-tachometer");
    let args = TachArgs::parse();

    if let Err(e) = logging::setup(args.verbose, false) {
        eprintln!("Unable to set up logging: {}", e);
        return ExitCode::from(2);
    }

    let settings = TachSettings {
        chip: args.gpiochip,
        line: args.gpio,
        samples: args.samples,
        period: Duration::from_millis(args.period_ms),
    };

    let (handle, signal) = cancellation();
    if let Err(e) = shutdown::cancel_on_signals(handle, || {}) {
        error!("Unable to install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    match measure(RppalDriver::default(), &settings, signal, |rpm| {
        println!("{rpm:.0} RPM")
    })
    .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_clean_cancellation() => {
            warn!("Cancelled");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
