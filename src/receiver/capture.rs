// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pulse capture sources
//!
//! A capture source hands over one complete burst at a time, in the order the
//! bursts were received. The decode pipeline owns its source and is the only
//! consumer of its bursts.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use log::warn;

use super::decoder::Burst;

/// Producer of captured pulse bursts
pub trait CaptureSource: Send {
    /// Wait up to `timeout` for the next burst
    ///
    /// `None` means nothing arrived in time; the caller simply polls again.
    fn receive_burst(&mut self, timeout: Duration) -> Option<Burst>;
}

/// Capture source fed through a bounded channel
///
/// A hardware driver (or a test) keeps the [`SyncSender`] returned by
/// [`ChannelCapture::new`] and sends each burst as soon as it is complete.
pub struct ChannelCapture {
    rx: Receiver<Burst>,
    disconnected: bool,
}

impl ChannelCapture {
    /// Create a capture source buffering up to `capacity` bursts
    pub fn new(capacity: usize) -> (SyncSender<Burst>, Self) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (
            tx,
            Self {
                rx,
                disconnected: false,
            },
        )
    }
}

impl CaptureSource for ChannelCapture {
    fn receive_burst(&mut self, timeout: Duration) -> Option<Burst> {
        match self.rx.recv_timeout(timeout) {
            Ok(burst) => Some(burst),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                if !self.disconnected {
                    warn!("Pulse capture producer went away, no more bursts will arrive");
                    self.disconnected = true;
                }
                // keep the caller's polling cadence instead of spinning
                std::thread::sleep(timeout);
                None
            }
        }
    }
}
