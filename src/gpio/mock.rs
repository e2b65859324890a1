//! Recording driver for tests

use super::driver::{Bias, Edge, EdgeCallback, GpioDriver, Handle, Status};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

/// Driver operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ChipOpen,
    ChipClose,
    ClaimOutput,
    ClaimInput,
    ClaimAlert,
    Free,
    TxPwm,
    Callback,
    CallbackCancel,
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ChipOpen(u32),
    ChipClose,
    ClaimOutput(u32),
    ClaimInput(u32),
    ClaimAlert(u32),
    Free(u32),
    TxPwm { line: u32, frequency_hz: u32, duty: u8 },
    Callback(u32),
    CallbackCancel(u32),
}

impl Call {
    fn op(&self) -> Op {
        match self {
            Call::ChipOpen(_) => Op::ChipOpen,
            Call::ChipClose => Op::ChipClose,
            Call::ClaimOutput(_) => Op::ClaimOutput,
            Call::ClaimInput(_) => Op::ClaimInput,
            Call::ClaimAlert(_) => Op::ClaimAlert,
            Call::Free(_) => Op::Free,
            Call::TxPwm { .. } => Op::TxPwm,
            Call::Callback(_) => Op::Callback,
            Call::CallbackCancel(_) => Op::CallbackCancel,
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    failures: HashMap<(Op, usize), Status>,
    claims: usize,
    callbacks: Vec<Option<EdgeCallback>>,
}

/// Driver that records every call and succeeds unless told otherwise.
///
/// Clones share the same log, so a test keeps one clone for inspection while
/// the code under test owns another.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Rc<RefCell<State>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `nth` (zero-based) call of `op` return `status`.
    pub fn fail(&self, op: Op, nth: usize, status: Status) {
        self.state.borrow_mut().failures.insert((op, nth), status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Duty cycles written by `tx_pwm`, in order.
    pub fn duties(&self) -> Vec<u8> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::TxPwm { duty, .. } => Some(*duty),
                _ => None,
            })
            .collect()
    }

    /// Claims that were never matched by a free.
    pub fn outstanding_claims(&self) -> usize {
        self.state.borrow().claims
    }

    /// Deliver an edge at `at` to callback `id`.
    pub fn fire(&self, id: u32, at: Instant) {
        let mut state = self.state.borrow_mut();
        if let Some(Some(callback)) = state.callbacks.get_mut(id as usize) {
            callback(at);
        }
    }

    fn record(&self, call: Call, ok: i32) -> i32 {
        let mut state = self.state.borrow_mut();
        let op = call.op();
        let nth = state.calls.iter().filter(|c| c.op() == op).count();
        state.calls.push(call);

        match state.failures.get(&(op, nth)) {
            Some(status) => status.code(),
            None => ok,
        }
    }
}

impl GpioDriver for MockDriver {
    fn chip_open(&self, chip: u32) -> i32 {
        self.record(Call::ChipOpen(chip), 0)
    }

    fn chip_close(&self, _handle: Handle) -> i32 {
        self.record(Call::ChipClose, 0)
    }

    fn claim_output(&self, _handle: Handle, line: u32, _bias: Bias) -> i32 {
        let status = self.record(Call::ClaimOutput(line), 0);
        if status >= 0 {
            self.state.borrow_mut().claims += 1;
        }
        status
    }

    fn claim_input(&self, _handle: Handle, line: u32, _bias: Bias) -> i32 {
        let status = self.record(Call::ClaimInput(line), 0);
        if status >= 0 {
            self.state.borrow_mut().claims += 1;
        }
        status
    }

    fn claim_alert(&self, _handle: Handle, line: u32, _edge: Edge, _bias: Bias) -> i32 {
        let status = self.record(Call::ClaimAlert(line), 0);
        if status >= 0 {
            self.state.borrow_mut().claims += 1;
        }
        status
    }

    fn free(&self, _handle: Handle, line: u32) -> i32 {
        let status = self.record(Call::Free(line), 0);
        if status >= 0 {
            self.state.borrow_mut().claims -= 1;
        }
        status
    }

    fn tx_pwm(&self, _handle: Handle, line: u32, frequency_hz: u32, duty: u8) -> i32 {
        self.record(
            Call::TxPwm {
                line,
                frequency_hz,
                duty,
            },
            0,
        )
    }

    fn callback(&self, _handle: Handle, line: u32, _edge: Edge, func: EdgeCallback) -> i32 {
        let id = self.state.borrow().callbacks.len() as i32;
        let status = self.record(Call::Callback(line), id);
        if status >= 0 {
            self.state.borrow_mut().callbacks.push(Some(func));
        }
        status
    }

    fn callback_cancel(&self, id: u32) -> i32 {
        let status = self.record(Call::CallbackCancel(id), 0);
        if let Some(slot) = self.state.borrow_mut().callbacks.get_mut(id as usize) {
            slot.take();
        }
        status
    }
}
