//! Raspberry Pi Fan Controller
//!
//! Drives a PWM fan from the CPU temperature, parking it at 0% and releasing
//! the GPIO line on shutdown. Also measures fan speed from tachometer pulses.

pub mod args;
pub mod cancel;
pub mod config;
pub mod cpu_temp;
pub mod daemon;
pub mod errors;
pub mod fan;
pub mod fan_control;
pub mod fan_monitor;
pub mod gpio;
pub mod logging;
pub mod notify;
pub mod shutdown;

// Re-export commonly used types
pub use config::ControllerConfig;
pub use daemon::{FanControlLoop, LoopSettings};
pub use errors::{Error, Result};
pub use fan::DutyCycleCurve;

/// Print version and build metadata to stderr for binary identity verification.
pub fn print_version(bin: &str) {
    let pkg_version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let git_desc = option_env!("GIT_DESC").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    eprintln!(
        "{} v{} (git {} / {}) built {}",
        bin, pkg_version, git_hash, git_desc, build_time
    );
}
