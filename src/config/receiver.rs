// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Remote control receiver configuration
//!
//! Timing parameters of the pulse decoder and debounce gate, and the settings
//! of the simulated remote used when no capture hardware is attached.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::receiver::decoder::{
    PulseTiming, DEFAULT_MIN_PAIRS, DEFAULT_PAYLOAD_OFFSET, DEFAULT_THRESHOLD_US,
};
use crate::receiver::debounce::DEFAULT_REPEATS_TO_CONFIRM;

/// Where captured bursts come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSourceKind {
    /// Bursts generated by [`SimulatedRemote`](crate::receiver::SimulatedRemote)
    #[default]
    Simulated,
    /// Bursts pushed by an embedding capture driver through the daemon's burst sender
    External,
}

/// Remote control receiver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Run the decode pipeline
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub source: CaptureSourceKind,

    /// High pulses strictly longer than this are decoded as `1`, in microseconds
    #[serde(default = "default_threshold_us")]
    pub threshold_us: u32,

    /// Bursts with fewer pulse pairs are discarded
    #[serde(default = "default_min_pulses")]
    pub min_pulses: usize,

    /// Index of the first of the five command pulses
    #[serde(default = "default_payload_offset")]
    pub payload_offset: usize,

    /// Silence after which a held button counts as released, in milliseconds
    #[serde(default = "default_debounce_timeout_ms")]
    pub debounce_timeout_ms: u64,

    /// Consecutive identical packets needed before a command is emitted
    #[serde(default = "default_repeats_to_confirm")]
    pub repeats_to_confirm: u32,

    /// How long one capture poll waits for a burst, in milliseconds
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,

    /// Capacity of the confirmed command queue
    #[serde(default = "default_command_queue")]
    pub command_queue: usize,

    #[serde(default)]
    pub simulated: SimulatedRemoteConfig,
}

/// Simulated button presses
///
/// Each press transmits `repeats_per_press` bursts `repeat_interval_ms` apart,
/// then the remote stays silent until the next press. Codes are pressed in
/// order, cycling through the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedRemoteConfig {
    /// 20-bit remote address sent before every command
    #[serde(default = "default_remote_address")]
    pub address: u32,

    /// Command codes (0-31) to press in turn
    #[serde(default = "default_codes")]
    pub codes: Vec<u8>,

    #[serde(default = "default_press_interval_ms")]
    pub press_interval_ms: u64,

    #[serde(default = "default_repeats_per_press")]
    pub repeats_per_press: u32,

    #[serde(default = "default_repeat_interval_ms")]
    pub repeat_interval_ms: u64,

    /// Duration of a short pulse, in microseconds
    #[serde(default = "default_short_pulse_us")]
    pub short_pulse_us: u32,

    /// Duration of a long pulse, in microseconds
    #[serde(default = "default_long_pulse_us")]
    pub long_pulse_us: u32,

    /// Maximum random deviation applied to every pulse, in microseconds
    #[serde(default = "default_jitter_us")]
    pub jitter_us: u32,

    /// Probability (0.0-1.0) that a burst is cut short and must be discarded
    #[serde(default)]
    pub dropout_probability: f64,
}

fn default_threshold_us() -> u32 {
    DEFAULT_THRESHOLD_US
}

fn default_min_pulses() -> usize {
    DEFAULT_MIN_PAIRS
}

fn default_payload_offset() -> usize {
    DEFAULT_PAYLOAD_OFFSET
}

fn default_debounce_timeout_ms() -> u64 {
    70
}

fn default_repeats_to_confirm() -> u32 {
    DEFAULT_REPEATS_TO_CONFIRM
}

fn default_capture_timeout_ms() -> u64 {
    10
}

fn default_command_queue() -> usize {
    16
}

fn default_remote_address() -> u32 {
    0x5A5A5
}

fn default_codes() -> Vec<u8> {
    vec![1, 2, 4, 8]
}

fn default_press_interval_ms() -> u64 {
    5000
}

fn default_repeats_per_press() -> u32 {
    4
}

fn default_repeat_interval_ms() -> u64 {
    40
}

fn default_short_pulse_us() -> u32 {
    PulseTiming::default().short_us
}

fn default_long_pulse_us() -> u32 {
    PulseTiming::default().long_us
}

fn default_jitter_us() -> u32 {
    60
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: CaptureSourceKind::default(),
            threshold_us: default_threshold_us(),
            min_pulses: default_min_pulses(),
            payload_offset: default_payload_offset(),
            debounce_timeout_ms: default_debounce_timeout_ms(),
            repeats_to_confirm: default_repeats_to_confirm(),
            capture_timeout_ms: default_capture_timeout_ms(),
            command_queue: default_command_queue(),
            simulated: SimulatedRemoteConfig::default(),
        }
    }
}

impl Default for SimulatedRemoteConfig {
    fn default() -> Self {
        Self {
            address: default_remote_address(),
            codes: default_codes(),
            press_interval_ms: default_press_interval_ms(),
            repeats_per_press: default_repeats_per_press(),
            repeat_interval_ms: default_repeat_interval_ms(),
            short_pulse_us: default_short_pulse_us(),
            long_pulse_us: default_long_pulse_us(),
            jitter_us: default_jitter_us(),
            dropout_probability: 0.0,
        }
    }
}

impl ReceiverConfig {
    pub fn debounce_timeout(&self) -> Duration {
        Duration::from_millis(self.debounce_timeout_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

impl SimulatedRemoteConfig {
    pub fn timing(&self) -> PulseTiming {
        PulseTiming {
            short_us: self.short_pulse_us,
            long_us: self.long_pulse_us,
        }
    }
}
