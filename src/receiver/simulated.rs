// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated remote control
//!
//! Generates the bursts a real HS1527 remote would send when its buttons are
//! pressed, with pulse jitter and optional truncated bursts, so the whole
//! decode chain can run without capture hardware.

use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::capture::CaptureSource;
use super::decoder::{encode_burst, Burst};
use crate::config::SimulatedRemoteConfig;

/// Capture source producing synthetic button presses
pub struct SimulatedRemote {
    config: SimulatedRemoteConfig,
    rng: StdRng,
    next_burst_at: Instant,
    code_index: usize,
    repeats_left: u32,
}

impl SimulatedRemote {
    pub fn new(config: SimulatedRemoteConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create a remote with a reproducible jitter sequence
    pub fn seeded(config: SimulatedRemoteConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulatedRemoteConfig, rng: StdRng) -> Self {
        let repeats_left = config.repeats_per_press.max(1);
        Self {
            config,
            rng,
            next_burst_at: Instant::now(),
            code_index: 0,
            repeats_left,
        }
    }

    /// Code of the press currently being transmitted
    pub fn current_code(&self) -> Option<u8> {
        if self.config.codes.is_empty() {
            return None;
        }
        Some(self.config.codes[self.code_index % self.config.codes.len()])
    }

    fn jitter(&mut self, duration: u32) -> u32 {
        let jitter = i64::from(self.config.jitter_us);
        if jitter == 0 {
            return duration;
        }
        let offset = self.rng.random_range(-jitter..=jitter);
        (i64::from(duration) + offset).clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Synthesize the next burst of the current press and advance the schedule
    pub fn next_burst(&mut self) -> Option<Burst> {
        let code = self.current_code()?;
        let mut burst = encode_burst(self.config.address, code, self.config.timing());
        for pair in burst.iter_mut() {
            pair.high = self.jitter(pair.high);
            pair.low = self.jitter(pair.low);
        }

        let probability = self.config.dropout_probability.clamp(0.0, 1.0);
        if probability > 0.0 && self.rng.random_bool(probability) {
            let kept = self.rng.random_range(0..burst.len());
            burst.truncate(kept);
            debug!("Simulated remote dropped the tail of a burst ({} pairs kept)", kept);
        }

        self.repeats_left = self.repeats_left.saturating_sub(1);
        let wait = if self.repeats_left == 0 {
            self.code_index = (self.code_index + 1) % self.config.codes.len();
            self.repeats_left = self.config.repeats_per_press.max(1);
            self.config.press_interval_ms
        } else {
            self.config.repeat_interval_ms
        };
        self.next_burst_at = Instant::now() + Duration::from_millis(wait);

        Some(burst)
    }
}

impl CaptureSource for SimulatedRemote {
    fn receive_burst(&mut self, timeout: Duration) -> Option<Burst> {
        let now = Instant::now();
        if self.next_burst_at > now {
            let wait = self.next_burst_at - now;
            if wait > timeout {
                thread::sleep(timeout);
                return None;
            }
            thread::sleep(wait);
        }
        if self.config.codes.is_empty() {
            thread::sleep(timeout);
            return None;
        }
        self.next_burst()
    }
}
