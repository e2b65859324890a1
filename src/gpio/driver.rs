//! Raw GPIO capability consumed by the fan controller
//!
//! Every operation follows the chip driver convention: a non-negative return is
//! success (a handle, a callback id or a queue depth), a negative return is an
//! error status. Nothing outside the `gpio` module sees the raw integers; they
//! are turned into [`Status`] by [`check`] at the guard layer.

use std::fmt;
use std::time::Instant;

/// Opaque chip session token handed out by [`GpioDriver::chip_open`].
pub type Handle = i32;

/// Callback invoked with the time an edge was detected.
///
/// Drivers may call it from their own interrupt thread.
pub type EdgeCallback = Box<dyn FnMut(Instant) + Send + 'static>;

/// Negative driver status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(pub i32);

impl Status {
    pub const UNKNOWN: Status = Status(-1);
    pub const BAD_HANDLE: Status = Status(-5);
    pub const BAD_CHIP: Status = Status(-6);
    pub const BAD_LINE: Status = Status(-7);
    pub const LINE_BUSY: Status = Status(-8);
    pub const NOT_PERMITTED: Status = Status(-9);
    pub const NOT_CLAIMED: Status = Status(-10);
    pub const BAD_PWM: Status = Status(-11);
    pub const BAD_CALLBACK: Status = Status(-12);
    pub const CHIP_BUSY: Status = Status(-13);
    pub const IO: Status = Status(-14);

    fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::UNKNOWN => "unknown error",
            Status::BAD_HANDLE => "bad chip handle",
            Status::BAD_CHIP => "no such chip",
            Status::BAD_LINE => "no such line",
            Status::LINE_BUSY => "line in use",
            Status::NOT_PERMITTED => "permission denied",
            Status::NOT_CLAIMED => "line not claimed",
            Status::BAD_PWM => "bad PWM parameters",
            Status::BAD_CALLBACK => "bad callback",
            Status::CHIP_BUSY => "chip already open",
            Status::IO => "I/O error",
            _ => return None,
        };
        Some(name)
    }

    /// Raw status value as returned by the driver.
    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

/// Convert a driver return value into a checked result.
pub fn check(status: i32) -> Result<u32, Status> {
    if status >= 0 {
        Ok(status as u32)
    } else {
        Err(Status(status))
    }
}

/// Pull resistor applied to a claimed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Leave the line's bias as configured by firmware
    #[default]
    AsIs,
    PullUp,
    PullDown,
}

/// Edge that triggers an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Rising => write!(f, "rising edge"),
            Edge::Falling => write!(f, "falling edge"),
            Edge::Both => write!(f, "both edges"),
        }
    }
}

/// Operations a GPIO chip driver exposes to the controller.
///
/// Methods take `&self`; implementations keep their bookkeeping behind
/// interior mutability so guards can share one driver through a chip handle.
pub trait GpioDriver {
    /// Open chip `chip`, returning a session handle.
    fn chip_open(&self, chip: u32) -> i32;

    /// Close a session opened by [`chip_open`](Self::chip_open).
    fn chip_close(&self, handle: Handle) -> i32;

    /// Claim `line` as a push-pull output.
    fn claim_output(&self, handle: Handle, line: u32, bias: Bias) -> i32;

    /// Claim `line` as a plain input.
    fn claim_input(&self, handle: Handle, line: u32, bias: Bias) -> i32;

    /// Claim `line` as an input that reports `edge` transitions.
    fn claim_alert(&self, handle: Handle, line: u32, edge: Edge, bias: Bias) -> i32;

    /// Release a claimed line.
    fn free(&self, handle: Handle, line: u32) -> i32;

    /// Start a PWM waveform on an output line, returning the queue depth.
    fn tx_pwm(&self, handle: Handle, line: u32, frequency_hz: u32, duty_percent: u8) -> i32;

    /// Register `func` for `edge` events on an alert line, returning a callback id.
    fn callback(&self, handle: Handle, line: u32, edge: Edge, func: EdgeCallback) -> i32;

    /// Stop delivering events to a registered callback.
    fn callback_cancel(&self, id: u32) -> i32;
}

impl<T: GpioDriver + ?Sized> GpioDriver for &T {
    fn chip_open(&self, chip: u32) -> i32 {
        (**self).chip_open(chip)
    }

    fn chip_close(&self, handle: Handle) -> i32 {
        (**self).chip_close(handle)
    }

    fn claim_output(&self, handle: Handle, line: u32, bias: Bias) -> i32 {
        (**self).claim_output(handle, line, bias)
    }

    fn claim_input(&self, handle: Handle, line: u32, bias: Bias) -> i32 {
        (**self).claim_input(handle, line, bias)
    }

    fn claim_alert(&self, handle: Handle, line: u32, edge: Edge, bias: Bias) -> i32 {
        (**self).claim_alert(handle, line, edge, bias)
    }

    fn free(&self, handle: Handle, line: u32) -> i32 {
        (**self).free(handle, line)
    }

    fn tx_pwm(&self, handle: Handle, line: u32, frequency_hz: u32, duty_percent: u8) -> i32 {
        (**self).tx_pwm(handle, line, frequency_hz, duty_percent)
    }

    fn callback(&self, handle: Handle, line: u32, edge: Edge, func: EdgeCallback) -> i32 {
        (**self).callback(handle, line, edge, func)
    }

    fn callback_cancel(&self, id: u32) -> i32 {
        (**self).callback_cancel(id)
    }
}
