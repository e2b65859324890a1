//! Scoped ownership of GPIO chip sessions and line claims
//!
//! A [`ChipHandle`] owns one open chip session. Lines claimed from it borrow the
//! handle, so the compiler rejects closing the chip while any [`ClaimedLine`] is
//! still alive, and locals drop in reverse claim order. Each guard releases its
//! resource exactly once: explicitly through `release`/`close`/`cancel`, which
//! report failures, or on drop, which logs them.

pub mod driver;
#[cfg(test)]
pub mod mock;
pub mod rppal_driver;

use crate::errors::ResourceError;
use driver::{check, Bias, Edge, EdgeCallback, GpioDriver, Handle, Status};
use log::{debug, error};
use std::fmt;

/// Direction a line is claimed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMode {
    Output,
    Input,
    Alert(Edge),
}

impl fmt::Display for LineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineMode::Output => write!(f, "output"),
            LineMode::Input => write!(f, "input"),
            LineMode::Alert(edge) => write!(f, "alert ({})", edge),
        }
    }
}

/// An open GPIO chip session
pub struct ChipHandle<D: GpioDriver> {
    driver: D,
    chip: u32,
    handle: Handle,
    open: bool,
}

impl<D: GpioDriver> ChipHandle<D> {
    /// Open chip `chip` through `driver`.
    pub fn open(driver: D, chip: u32) -> Result<Self, ResourceError> {
        let handle = check(driver.chip_open(chip))
            .map_err(|status| ResourceError::ChipOpen { chip, status })?;
        debug!("Opened GPIO chip {} (handle {})", chip, handle);

        Ok(Self {
            driver,
            chip,
            handle: handle as Handle,
            open: true,
        })
    }

    /// Claim `line` as an output.
    pub fn claim_output(&self, line: u32, bias: Bias) -> Result<ClaimedLine<'_, D>, ResourceError> {
        self.claim(line, LineMode::Output, bias)
    }

    /// Claim `line` as an input.
    pub fn claim_input(&self, line: u32, bias: Bias) -> Result<ClaimedLine<'_, D>, ResourceError> {
        self.claim(line, LineMode::Input, bias)
    }

    /// Claim `line` as an input reporting `edge` transitions.
    pub fn claim_alert(
        &self,
        line: u32,
        edge: Edge,
        bias: Bias,
    ) -> Result<ClaimedLine<'_, D>, ResourceError> {
        self.claim(line, LineMode::Alert(edge), bias)
    }

    fn claim(&self, line: u32, mode: LineMode, bias: Bias) -> Result<ClaimedLine<'_, D>, ResourceError> {
        let status = match mode {
            LineMode::Output => self.driver.claim_output(self.handle, line, bias),
            LineMode::Input => self.driver.claim_input(self.handle, line, bias),
            LineMode::Alert(edge) => self.driver.claim_alert(self.handle, line, edge, bias),
        };
        check(status).map_err(|status| ResourceError::Claim { line, mode, status })?;
        debug!("Claimed GPIO {} line {} ({:?} bias)", mode, line, bias);

        Ok(ClaimedLine {
            chip: self,
            line,
            mode,
            bias,
            claimed: true,
        })
    }

    /// Close the session, reporting a failed close.
    pub fn close(mut self) -> Result<(), ResourceError> {
        self.shut()
    }

    fn shut(&mut self) -> Result<(), ResourceError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        check(self.driver.chip_close(self.handle)).map_err(|status| ResourceError::ChipClose {
            chip: self.chip,
            status,
        })?;
        debug!("Closed GPIO chip {}", self.chip);
        Ok(())
    }
}

impl<D: GpioDriver> Drop for ChipHandle<D> {
    fn drop(&mut self) {
        if let Err(e) = self.shut() {
            error!("{}", e);
        }
    }
}

impl<D: GpioDriver> fmt::Debug for ChipHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChipHandle")
            .field("chip", &self.chip)
            .field("handle", &self.handle)
            .field("open", &self.open)
            .finish()
    }
}

/// A line claimed on an open chip
pub struct ClaimedLine<'c, D: GpioDriver> {
    chip: &'c ChipHandle<D>,
    line: u32,
    mode: LineMode,
    bias: Bias,
    claimed: bool,
}

impl<'c, D: GpioDriver> ClaimedLine<'c, D> {
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Emit a PWM waveform, returning the driver's queue depth.
    pub fn tx_pwm(&self, frequency_hz: u32, duty_percent: u8) -> Result<u32, Status> {
        check(
            self.chip
                .driver
                .tx_pwm(self.chip.handle, self.line, frequency_hz, duty_percent),
        )
    }

    /// Deliver this alert line's edges to `func` until the watch is cancelled.
    pub fn watch(&self, func: EdgeCallback) -> Result<EdgeWatch<'_, D>, ResourceError> {
        let edge = match self.mode {
            LineMode::Alert(edge) => edge,
            mode => {
                return Err(ResourceError::NotAlert {
                    line: self.line,
                    mode,
                })
            }
        };

        let id = check(
            self.chip
                .driver
                .callback(self.chip.handle, self.line, edge, func),
        )
        .map_err(|status| ResourceError::Callback {
            line: self.line,
            status,
        })?;
        debug!("Watching {} on GPIO line {}", edge, self.line);

        Ok(EdgeWatch {
            line: self,
            id,
            active: true,
        })
    }

    /// Free the line, reporting a failed free.
    pub fn release(mut self) -> Result<(), ResourceError> {
        self.free()
    }

    fn free(&mut self) -> Result<(), ResourceError> {
        if !self.claimed {
            return Ok(());
        }
        self.claimed = false;

        check(self.chip.driver.free(self.chip.handle, self.line)).map_err(|status| {
            ResourceError::Free {
                line: self.line,
                mode: self.mode,
                status,
            }
        })?;
        debug!("Freed GPIO {} line {}", self.mode, self.line);
        Ok(())
    }
}

impl<D: GpioDriver> Drop for ClaimedLine<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            error!("{}", e);
        }
    }
}

impl<D: GpioDriver> fmt::Debug for ClaimedLine<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimedLine")
            .field("chip", &self.chip.chip)
            .field("line", &self.line)
            .field("mode", &self.mode)
            .field("bias", &self.bias)
            .field("claimed", &self.claimed)
            .finish()
    }
}

/// A registered edge callback on an alert line
pub struct EdgeWatch<'l, D: GpioDriver> {
    line: &'l ClaimedLine<'l, D>,
    id: u32,
    active: bool,
}

impl<D: GpioDriver> EdgeWatch<'_, D> {
    /// Stop edge delivery, reporting a failed cancel.
    pub fn cancel(mut self) -> Result<(), ResourceError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ResourceError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        check(self.line.chip.driver.callback_cancel(self.id)).map_err(|status| {
            ResourceError::CallbackCancel {
                line: self.line.line,
                status,
            }
        })?;
        debug!("Stopped watching GPIO line {}", self.line.line);
        Ok(())
    }
}

impl<D: GpioDriver> fmt::Debug for EdgeWatch<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeWatch")
            .field("line", &self.line.line)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

impl<D: GpioDriver> Drop for EdgeWatch<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{}", e);
        }
    }
}
