// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RF remote control receiver
//!
//! This module turns captured pulse trains from an HS1527-style 433 MHz remote
//! into de-duplicated command codes.
//!
//! ## Key Components
//!
//! - `CaptureSource`: where bursts come from. `ChannelCapture` is fed by a
//!   hardware driver, `SimulatedRemote` synthesizes button presses.
//! - `BurstFraming` and `PulseDecoder`: select the five command pulses of a
//!   burst and classify them into a 5-bit code.
//! - `DebounceGate`: emits a code once per button press.
//! - `DecodePipeline`: chains the above and delivers `RemoteCommand`s to a
//!   bounded tokio channel.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! use rust_register_bridge::config::ReceiverConfig;
//! use rust_register_bridge::diagnostics::Diagnostics;
//! use rust_register_bridge::receiver::{ChannelCapture, DecodePipeline};
//!
//! let config = ReceiverConfig::default();
//! let (bursts, capture) = ChannelCapture::new(8);
//! let (commands, mut received) = tokio::sync::mpsc::channel(config.command_queue);
//! let pipeline = DecodePipeline::new(capture, &config, commands, Diagnostics::shared());
//!
//! let running = Arc::new(AtomicBool::new(true));
//! std::thread::spawn(move || pipeline.run(running));
//! // a capture driver now sends bursts through `bursts`
//! ```

pub mod capture;
pub mod debounce;
pub mod decoder;
pub mod pipeline;
pub mod simulated;

pub use capture::{CaptureSource, ChannelCapture};
pub use debounce::{DebounceGate, DebounceState, GateState};
pub use decoder::{
    encode_burst, Burst, BurstFraming, PulseDecoder, PulsePacket, PulsePair, PulseTiming,
};
pub use pipeline::{DecodePipeline, RemoteCommand};
pub use simulated::SimulatedRemote;
