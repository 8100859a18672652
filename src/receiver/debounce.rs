// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Repeat confirmation for decoded command codes
//!
//! A remote retransmits its burst for as long as a button is held. The gate
//! emits a code once per press: only after it has been seen on enough
//! consecutive packets, and not again until the press is released. A silence
//! longer than the timeout counts as a release.
//!
//! ```text
//!            same code (count reached)
//!   Idle ──► ArmedUnconfirmed ─────────────────────► ArmedConfirmed
//!    ▲            │  ▲ different code                  │ same code: nothing
//!    │            └──┘                                 │ different code
//!    │                  ◄──────────────────────────────┘ (re-arm)
//!    └──── gap > timeout (from any state)
//! ```

use std::time::{Duration, Instant};

use log::trace;

/// Default silence after which a press is considered released
pub const DEFAULT_DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(70);

/// Default number of consecutive matching packets before a code is emitted
pub const DEFAULT_REPEATS_TO_CONFIRM: u32 = 2;

/// Position of the gate in the press cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No press in progress
    Idle,
    /// A code was seen but not yet often enough
    ArmedUnconfirmed,
    /// The current press has been emitted
    ArmedConfirmed,
}

/// Observable view of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    pub last_code: Option<u8>,
    pub last_arrival: Option<Instant>,
    pub armed: bool,
    pub fired: bool,
}

/// Per-press de-duplication of decoded codes
#[derive(Debug, Clone)]
pub struct DebounceGate {
    timeout: Duration,
    repeats_to_confirm: u32,
    state: GateState,
    last_code: Option<u8>,
    matches: u32,
    last_arrival: Option<Instant>,
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_TIMEOUT, DEFAULT_REPEATS_TO_CONFIRM)
    }
}

impl DebounceGate {
    /// Create a gate; a `repeats_to_confirm` of 0 is treated as 1
    pub fn new(timeout: Duration, repeats_to_confirm: u32) -> Self {
        Self {
            timeout,
            repeats_to_confirm: repeats_to_confirm.max(1),
            state: GateState::Idle,
            last_code: None,
            matches: 0,
            last_arrival: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn repeats_to_confirm(&self) -> u32 {
        self.repeats_to_confirm
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn debounce_state(&self) -> DebounceState {
        DebounceState {
            last_code: self.last_code,
            last_arrival: self.last_arrival,
            armed: self.state != GateState::Idle,
            fired: self.state == GateState::ArmedConfirmed,
        }
    }

    /// Forget the current press
    pub fn reset(&mut self) {
        self.state = GateState::Idle;
        self.last_code = None;
        self.matches = 0;
    }

    /// Feed a decoded code observed at `arrival`
    ///
    /// Returns the code when this packet confirms a new press. Arrival times
    /// going backwards are treated as a zero gap.
    pub fn feed(&mut self, code: u8, arrival: Instant) -> Option<u8> {
        if let Some(previous) = self.last_arrival {
            let gap = arrival.saturating_duration_since(previous);
            if gap > self.timeout && self.state != GateState::Idle {
                trace!("Press released after {:?} of silence", gap);
                self.reset();
            }
        }
        self.last_arrival = Some(arrival);

        match self.state {
            GateState::Idle => self.arm(code),
            GateState::ArmedUnconfirmed if self.last_code == Some(code) => {
                self.matches += 1;
                self.confirm_if_ready()
            }
            GateState::ArmedConfirmed if self.last_code == Some(code) => None,
            GateState::ArmedUnconfirmed | GateState::ArmedConfirmed => self.arm(code),
        }
    }

    fn arm(&mut self, code: u8) -> Option<u8> {
        self.state = GateState::ArmedUnconfirmed;
        self.last_code = Some(code);
        self.matches = 1;
        self.confirm_if_ready()
    }

    fn confirm_if_ready(&mut self) -> Option<u8> {
        if self.matches < self.repeats_to_confirm {
            return None;
        }
        self.state = GateState::ArmedConfirmed;
        self.last_code
    }
}
