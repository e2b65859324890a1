//! Raspberry Pi GPIO driver backed by `rppal`
//!
//! The Pi exposes a single GPIO chip, index 0. PWM is rppal's software PWM,
//! and edge callbacks run on rppal's interrupt thread.

use super::driver::{Bias, Edge, EdgeCallback, GpioDriver, Handle, Status};
use log::warn;
use rppal::gpio::{Error as RppalError, Gpio, InputPin, OutputPin, Pin, Trigger};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Instant;

/// Index of the only chip the Pi's GPIO controller exposes
pub const PI_GPIO_CHIP: u32 = 0;

enum ClaimedPin {
    Output(OutputPin),
    // Held only to keep the line claimed.
    Input(#[allow(dead_code)] InputPin),
    Alert { pin: InputPin, edge: Edge },
}

struct Session {
    gpio: Gpio,
    handle: Handle,
    lines: HashMap<u32, ClaimedPin>,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    next_handle: Handle,
    // callback id -> line
    callbacks: HashMap<u32, u32>,
    next_callback: u32,
}

/// Driver for the Raspberry Pi's BCM GPIO lines
#[derive(Default)]
pub struct RppalDriver {
    state: RefCell<State>,
}

impl RppalDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn status_of(err: &RppalError) -> Status {
    warn!("rppal: {}", err);
    match err {
        RppalError::PinUsed(_) => Status::LINE_BUSY,
        RppalError::PinNotAvailable(_) => Status::BAD_LINE,
        RppalError::PermissionDenied(_) => Status::NOT_PERMITTED,
        RppalError::UnknownModel => Status::BAD_CHIP,
        RppalError::Io(_) => Status::IO,
        _ => Status::UNKNOWN,
    }
}

fn trigger_for(edge: Edge) -> Trigger {
    match edge {
        Edge::Rising => Trigger::RisingEdge,
        Edge::Falling => Trigger::FallingEdge,
        Edge::Both => Trigger::Both,
    }
}

fn into_input(pin: Pin, bias: Bias) -> InputPin {
    match bias {
        Bias::AsIs => pin.into_input(),
        Bias::PullUp => pin.into_input_pullup(),
        Bias::PullDown => pin.into_input_pulldown(),
    }
}

impl State {
    fn session(&mut self, handle: Handle) -> Result<&mut Session, Status> {
        match self.session.as_mut() {
            Some(session) if session.handle == handle => Ok(session),
            _ => Err(Status::BAD_HANDLE),
        }
    }

    fn claim(
        &mut self,
        handle: Handle,
        line: u32,
        make: impl FnOnce(Pin) -> ClaimedPin,
    ) -> Result<i32, Status> {
        let session = self.session(handle)?;
        if session.lines.contains_key(&line) {
            return Err(Status::LINE_BUSY);
        }

        let bcm = u8::try_from(line).map_err(|_| Status::BAD_LINE)?;
        let pin = session.gpio.get(bcm).map_err(|e| status_of(&e))?;
        session.lines.insert(line, make(pin));
        Ok(0)
    }
}

fn code(result: Result<i32, Status>) -> i32 {
    result.unwrap_or_else(Status::code)
}

impl GpioDriver for RppalDriver {
    fn chip_open(&self, chip: u32) -> i32 {
        let mut state = self.state.borrow_mut();
        let result = if chip != PI_GPIO_CHIP {
            Err(Status::BAD_CHIP)
        } else if state.session.is_some() {
            Err(Status::CHIP_BUSY)
        } else {
            Gpio::new().map_err(|e| status_of(&e)).map(|gpio| {
                let handle = state.next_handle;
                state.next_handle += 1;
                state.session = Some(Session {
                    gpio,
                    handle,
                    lines: HashMap::new(),
                });
                handle
            })
        };
        code(result)
    }

    fn chip_close(&self, handle: Handle) -> i32 {
        let mut state = self.state.borrow_mut();
        let result = state.session(handle).map(|_| 0);
        if result.is_ok() {
            // Dropping the session resets every line still claimed on it.
            state.session = None;
            state.callbacks.clear();
        }
        code(result)
    }

    fn claim_output(&self, handle: Handle, line: u32, _bias: Bias) -> i32 {
        let mut state = self.state.borrow_mut();
        code(state.claim(handle, line, |pin| ClaimedPin::Output(pin.into_output())))
    }

    fn claim_input(&self, handle: Handle, line: u32, bias: Bias) -> i32 {
        let mut state = self.state.borrow_mut();
        code(state.claim(handle, line, |pin| ClaimedPin::Input(into_input(pin, bias))))
    }

    fn claim_alert(&self, handle: Handle, line: u32, edge: Edge, bias: Bias) -> i32 {
        let mut state = self.state.borrow_mut();
        code(state.claim(handle, line, |pin| ClaimedPin::Alert {
            pin: into_input(pin, bias),
            edge,
        }))
    }

    fn free(&self, handle: Handle, line: u32) -> i32 {
        let mut state = self.state.borrow_mut();
        let result = state.session(handle).and_then(|session| {
            session
                .lines
                .remove(&line)
                .map(|_| 0)
                .ok_or(Status::NOT_CLAIMED)
        });
        if result.is_ok() {
            state.callbacks.retain(|_, watched| *watched != line);
        }
        code(result)
    }

    fn tx_pwm(&self, handle: Handle, line: u32, frequency_hz: u32, duty_percent: u8) -> i32 {
        let mut state = self.state.borrow_mut();
        let result = state.session(handle).and_then(|session| {
            if duty_percent > 100 {
                return Err(Status::BAD_PWM);
            }
            match session.lines.get_mut(&line) {
                Some(ClaimedPin::Output(pin)) => pin
                    .set_pwm_frequency(f64::from(frequency_hz), f64::from(duty_percent) / 100.0)
                    .map(|()| 0)
                    .map_err(|e| status_of(&e)),
                Some(_) => Err(Status::BAD_LINE),
                None => Err(Status::NOT_CLAIMED),
            }
        });
        code(result)
    }

    fn callback(&self, handle: Handle, line: u32, edge: Edge, mut func: EdgeCallback) -> i32 {
        let mut state = self.state.borrow_mut();
        let result = state.session(handle).and_then(|session| match session.lines.get_mut(&line) {
            Some(ClaimedPin::Alert { pin, edge: claimed }) if *claimed == edge => pin
                .set_async_interrupt(trigger_for(edge), move |_level| func(Instant::now()))
                .map_err(|e| status_of(&e)),
            Some(_) => Err(Status::BAD_CALLBACK),
            None => Err(Status::NOT_CLAIMED),
        });

        let result = result.map(|()| {
            let id = state.next_callback;
            state.next_callback += 1;
            state.callbacks.insert(id, line);
            id as i32
        });
        code(result)
    }

    fn callback_cancel(&self, id: u32) -> i32 {
        let mut state = self.state.borrow_mut();
        let Some(line) = state.callbacks.remove(&id) else {
            return Status::BAD_CALLBACK.code();
        };

        let result = match state.session.as_mut().and_then(|s| s.lines.get_mut(&line)) {
            Some(ClaimedPin::Alert { pin, .. }) => pin
                .clear_async_interrupt()
                .map(|()| 0)
                .map_err(|e| status_of(&e)),
            _ => Err(Status::NOT_CLAIMED),
        };
        code(result)
    }
}
