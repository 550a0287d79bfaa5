//! Start gate shared by the capture workers of one pipeline.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    arrived: usize,
    open: bool,
    aborted: bool,
}

/// Holds workers until all of them have arrived, or until the start is aborted.
///
/// If the pipeline fails to spawn a worker, the ones already waiting are
/// let go with `false` and exit without capturing.
#[derive(Debug)]
pub struct StartGate {
    expected: usize,
    state: Mutex<GateState>,
    cvar: Condvar,
}

impl StartGate {
    pub fn new(expected: usize) -> Self {
        Self {
            expected: expected.max(1),
            state: Mutex::new(GateState::default()),
            cvar: Condvar::new(),
        }
    }

    /// Arrive and block until the gate opens (`true`) or is aborted (`false`).
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.arrived += 1;
        if state.arrived >= self.expected && !state.aborted {
            state.open = true;
            self.cvar.notify_all();
        }
        while !state.open && !state.aborted {
            state = self.cvar.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.open
    }

    /// Release every waiting and future arrival with `false`.
    /// No effect once the gate is open.
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.open {
            state.aborted = true;
            self.cvar.notify_all();
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).open
    }
}
