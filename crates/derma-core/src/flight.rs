//! Single-admission guard for request/response rounds.
//!
//! Each orchestrator owns one [`FlightGate`]. The gate is an explicit
//! two-state machine: a call either finds it `Idle` and moves it to
//! `InFlight`, or finds it `InFlight` and is rejected. Nothing is queued and
//! nothing is cancelled.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Idle,
    InFlight,
}

#[derive(Debug)]
pub struct FlightGate {
    state: Mutex<FlightState>,
}

impl Default for FlightGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Idle),
        }
    }

    pub fn state(&self) -> FlightState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_in_flight(&self) -> bool {
        self.state() == FlightState::InFlight
    }

    /// Admits a round if the gate is idle.
    ///
    /// The returned permit moves the gate back to `Idle` when dropped, which
    /// covers success, failure and unwinding alike.
    pub fn try_admit(&self) -> Option<FlightPermit<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            FlightState::InFlight => None,
            FlightState::Idle => {
                *state = FlightState::InFlight;
                Some(FlightPermit { gate: self })
            }
        }
    }

    fn release(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = FlightState::Idle;
    }
}

/// Proof that a round was admitted. Dropping it ends the round.
#[derive(Debug)]
#[must_use = "dropping the permit immediately ends the round"]
pub struct FlightPermit<'a> {
    gate: &'a FlightGate,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
