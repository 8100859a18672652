// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Capture to command pipeline
//!
//! [`DecodePipeline`] is the single consumer of a [`CaptureSource`]. For every
//! burst it frames the command packet, decodes it, passes the code through the
//! [`DebounceGate`] and hands confirmed commands to a bounded queue.
//!
//! The pipeline runs on a blocking thread and never waits on the queue: a full
//! or closed queue drops the command, counts it and logs a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::capture::CaptureSource;
use super::debounce::DebounceGate;
use super::decoder::{BurstFraming, PulseDecoder, PulsePair};
use crate::config::ReceiverConfig;
use crate::diagnostics::SharedDiagnostics;

/// A confirmed remote control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommand {
    /// 5-bit command code
    pub code: u8,
    /// Wall-clock time the confirming burst was processed
    pub received_at: DateTime<Utc>,
}

/// Framing, decoding and debouncing of captured bursts
pub struct DecodePipeline<C: CaptureSource> {
    capture: C,
    framing: BurstFraming,
    decoder: PulseDecoder,
    gate: DebounceGate,
    capture_timeout: Duration,
    sink: mpsc::Sender<RemoteCommand>,
    diagnostics: SharedDiagnostics,
}

impl<C: CaptureSource> DecodePipeline<C> {
    /// Build a pipeline from the receiver configuration
    pub fn new(
        capture: C,
        config: &ReceiverConfig,
        sink: mpsc::Sender<RemoteCommand>,
        diagnostics: SharedDiagnostics,
    ) -> Self {
        Self {
            capture,
            framing: BurstFraming::new(config.min_pulses, config.payload_offset),
            decoder: PulseDecoder::new(config.threshold_us),
            gate: DebounceGate::new(config.debounce_timeout(), config.repeats_to_confirm),
            capture_timeout: config.capture_timeout(),
            sink,
            diagnostics,
        }
    }

    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    /// Run one burst through the chain
    ///
    /// Returns the command when this burst confirmed a press, whether or not
    /// the queue accepted it.
    pub fn process_burst(&mut self, burst: &[PulsePair], arrival: Instant) -> Option<RemoteCommand> {
        self.diagnostics.record_burst_received(1);

        let Some(packet) = self.framing.frame(burst) else {
            self.diagnostics.record_burst_discarded(1);
            trace!(
                "Discarded burst of {} pairs (need {})",
                burst.len(),
                self.framing.min_pairs()
            );
            return None;
        };

        let code = self.decoder.decode(&packet);
        trace!("Decoded code {} from {:?}", code, packet.pulses);

        let code = self.gate.feed(code, arrival)?;
        let command = RemoteCommand {
            code,
            received_at: Utc::now(),
        };
        self.deliver(command);
        Some(command)
    }

    fn deliver(&self, command: RemoteCommand) {
        match self.sink.try_send(command) {
            Ok(()) => {
                self.diagnostics.record_command_emitted(1);
                debug!("Remote command {} confirmed", command.code);
            }
            Err(TrySendError::Full(command)) => {
                self.diagnostics.record_command_dropped(1);
                warn!("Remote command queue full, dropping command {}", command.code);
            }
            Err(TrySendError::Closed(command)) => {
                self.diagnostics.record_command_dropped(1);
                warn!("Remote command queue closed, dropping command {}", command.code);
            }
        }
    }

    /// Wait for one burst and process it
    pub fn poll(&mut self) -> Option<RemoteCommand> {
        let burst = self.capture.receive_burst(self.capture_timeout)?;
        self.process_burst(&burst, Instant::now())
    }

    /// Process bursts until `running` is cleared or the command queue closes
    ///
    /// Blocking; meant for a dedicated thread.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        info!("Remote control decode pipeline started");
        while running.load(Ordering::Relaxed) {
            if self.sink.is_closed() {
                warn!("Remote command consumer went away, stopping the decode pipeline");
                break;
            }
            self.poll();
        }
        info!("Remote control decode pipeline stopped");
    }
}
