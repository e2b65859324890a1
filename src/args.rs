//! Command line argument parsing for the fan controller

use crate::fan_monitor::DEFAULT_TACH_GPIO;
use clap::Parser;
use std::path::PathBuf;

/// Raspberry Pi fan controller
///
/// Drives a PWM fan from the CPU temperature until interrupted, then stops the fan.
#[derive(Parser, Debug)]
#[command(name = "pi-fan-control")]
#[command(about = "Temperature-driven PWM fan control")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// GPIO chip index
    #[arg(long)]
    pub gpiochip: Option<u32>,

    /// GPIO line the fan PWM input is wired to
    #[arg(long)]
    pub gpio: Option<u32>,

    /// Running under systemd: notify readiness and omit log timestamps
    #[arg(long)]
    pub systemd: bool,

    /// Configuration file (default: ~/.pi_fan_control/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// PWM frequency in Hz
    #[arg(long)]
    pub frequency: Option<u32>,

    /// Milliseconds between temperature samples
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Temperature sensor file (millidegrees Celsius)
    #[arg(long)]
    pub sensor: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Fan tachometer
///
/// Prints the fan speed once per period.
#[derive(Parser, Debug)]
#[command(name = "fan-tachometer")]
#[command(about = "Measure fan RPM from tachometer pulses")]
#[command(version)]
pub struct TachArgs {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// GPIO chip index
    #[arg(long, default_value_t = 0)]
    pub gpiochip: u32,

    /// GPIO line the tachometer output is wired to
    #[arg(long, default_value_t = DEFAULT_TACH_GPIO)]
    pub gpio: u32,

    /// Number of samples to take
    #[arg(long, default_value_t = 30)]
    pub samples: usize,

    /// Milliseconds per sample
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub period_ms: u64,
}
