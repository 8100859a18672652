// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The holding register table
//!
//! A fixed number of 16-bit registers guarded by a single mutex. Every
//! operation, single or multi-register, holds the guard for its whole
//! duration, so a reader never observes half of a `write_range` or
//! `write_text`. When a [`RegisterSyncBridge`] is attached, each stored value
//! is pushed to the transport inside the same critical section.
//!
//! The table takes no other lock of its own and never calls back into
//! application code while the guard is held. Logging of sync failures is
//! deferred until the guard has been released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use super::error::{RegisterError, SyncError};
use super::sync::RegisterSyncBridge;
use super::text::TextBlock;
use crate::diagnostics::SharedDiagnostics;

/// Shared handle to the register table
pub type SharedRegisterTable = Arc<RegisterTable>;

/// What to do with requests that do not fit inside the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsPolicy {
    /// Store the in-range prefix, silently drop the rest
    #[default]
    Ignore,
    /// Refuse the whole request and return [`RegisterError::OutOfRange`]
    Report,
}

/// Fixed-size table of holding registers
pub struct RegisterTable {
    values: Mutex<Vec<u16>>,
    policy: BoundsPolicy,
    bridge: Option<RegisterSyncBridge>,
    diagnostics: SharedDiagnostics,
    poison_reported: AtomicBool,
}

impl RegisterTable {
    /// Create a table of `len` registers, all zero
    pub fn new(len: usize, policy: BoundsPolicy, diagnostics: SharedDiagnostics) -> Self {
        Self {
            values: Mutex::new(vec![0; len]),
            policy,
            bridge: None,
            diagnostics,
            poison_reported: AtomicBool::new(false),
        }
    }

    /// Attach the transport bridge and push the initial (all zero) table
    pub fn with_bridge(mut self, bridge: RegisterSyncBridge) -> Self {
        if usize::from(bridge.register_count()) < self.len() {
            warn!(
                "Transport exposes {} registers but the table holds {}, the upper registers will not be mirrored",
                bridge.register_count(),
                self.len()
            );
        }
        self.bridge = Some(bridge);
        if let Err(e) = self.resync_all() {
            warn!("Initial register synchronisation failed: {}", e);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    pub fn bridge(&self) -> Option<&RegisterSyncBridge> {
        self.bridge.as_ref()
    }

    pub fn diagnostics(&self) -> &SharedDiagnostics {
        &self.diagnostics
    }

    /// Acquire the guard, recovering it if a previous holder panicked
    ///
    /// A poisoned guard must not stop the register service. The table keeps
    /// serving the recovered values and the recovery is logged and counted.
    fn lock(&self) -> MutexGuard<'_, Vec<u16>> {
        match self.values.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.diagnostics.record_lock_recovery(1);
                if !self.poison_reported.swap(true, Ordering::Relaxed) {
                    error!(
                        "REGISTER TABLE GUARD POISONED: a writer panicked inside a critical section. \
                         Serving the recovered table, values written by that call may be partial"
                    );
                }
                self.values.clear_poison();
                poisoned.into_inner()
            }
        }
    }

    /// Number of registers of `start..start + count` that lie inside the table
    fn in_range(len: usize, start: usize, count: usize) -> usize {
        if start >= len {
            0
        } else {
            count.min(len - start)
        }
    }

    /// Apply the bounds policy to a request, returning how many registers to touch
    fn admit(&self, len: usize, start: usize, count: usize) -> Result<usize, RegisterError> {
        let fits = Self::in_range(len, start, count);
        if fits == count {
            return Ok(count);
        }

        self.diagnostics.record_out_of_range(1);
        match self.policy {
            BoundsPolicy::Ignore => {
                debug!(
                    "Register request {}..{} clipped to {} registers (table size {})",
                    start,
                    start + count,
                    fits,
                    len
                );
                Ok(fits)
            }
            BoundsPolicy::Report => Err(RegisterError::OutOfRange {
                start,
                end: start + count,
                len,
            }),
        }
    }

    /// Store values starting at `start` and push each one to the transport
    ///
    /// Must be called with the guard held; returns the first sync error.
    fn store(&self, values: &mut [u16], start: usize, new_values: &[u16]) -> Option<SyncError> {
        let mut first_error = None;
        for (offset, &value) in new_values.iter().enumerate() {
            let index = start + offset;
            values[index] = value;
            match &self.bridge {
                Some(bridge) if bridge.mirrors(index) => {
                    if let Err(e) = bridge.push(index as u16, value) {
                        first_error.get_or_insert(e);
                    }
                }
                _ => {}
            }
        }
        first_error
    }

    fn report_sync_error(error: Option<SyncError>, start: usize, count: usize) {
        if let Some(e) = error {
            warn!(
                "Registers {}..{} stored but not mirrored to the transport: {}",
                start,
                start + count,
                e
            );
        }
    }

    /// Read one register, 0 if `index` is outside the table
    pub fn read(&self, index: u16) -> u16 {
        let values = self.lock();
        match values.get(usize::from(index)) {
            Some(&value) => value,
            None => {
                self.diagnostics.record_out_of_range(1);
                0
            }
        }
    }

    /// Read one register, reporting out-of-range access
    pub fn try_read(&self, index: u16) -> Result<u16, RegisterError> {
        let values = self.lock();
        let len = values.len();
        values.get(usize::from(index)).copied().ok_or_else(|| {
            self.diagnostics.record_out_of_range(1);
            RegisterError::OutOfRange {
                start: usize::from(index),
                end: usize::from(index) + 1,
                len,
            }
        })
    }

    /// Read up to `count` registers starting at `start`
    ///
    /// Only the in-range prefix is returned, and nothing if `start` is out of
    /// range. The whole range is read under one acquisition of the guard.
    pub fn read_range(&self, start: u16, count: u16) -> Vec<u16> {
        let values = self.lock();
        let start = usize::from(start);
        let fits = Self::in_range(values.len(), start, usize::from(count));
        if fits < usize::from(count) {
            self.diagnostics.record_out_of_range(1);
        }
        values[start.min(values.len())..][..fits].to_vec()
    }

    /// Copy of the whole table
    pub fn snapshot(&self) -> Vec<u16> {
        self.lock().clone()
    }

    /// Write one register and mirror it to the transport
    ///
    /// Returns the number of registers stored (0 when out of range under
    /// [`BoundsPolicy::Ignore`]).
    pub fn write(&self, index: u16, value: u16) -> Result<usize, RegisterError> {
        self.write_range(index, std::slice::from_ref(&value))
    }

    /// Write one register, reporting out-of-range access regardless of policy
    pub fn try_write(&self, index: u16, value: u16) -> Result<(), RegisterError> {
        let sync_error = {
            let mut values = self.lock();
            let index = usize::from(index);
            if index >= values.len() {
                self.diagnostics.record_out_of_range(1);
                return Err(RegisterError::OutOfRange {
                    start: index,
                    end: index + 1,
                    len: values.len(),
                });
            }
            self.store(&mut values, index, &[value])
        };
        Self::report_sync_error(sync_error, usize::from(index), 1);
        Ok(())
    }

    /// Write consecutive registers as one indivisible operation
    ///
    /// Under [`BoundsPolicy::Ignore`] only the in-range prefix is written.
    pub fn write_range(&self, start: u16, new_values: &[u16]) -> Result<usize, RegisterError> {
        let start = usize::from(start);
        let (stored, sync_error) = {
            let mut values = self.lock();
            let len = values.len();
            let fits = self.admit(len, start, new_values.len())?;
            if fits == 0 {
                return Ok(0);
            }
            let error = self.store(&mut values, start, &new_values[..fits]);
            (fits, error)
        };
        Self::report_sync_error(sync_error, start, stored);
        Ok(stored)
    }

    /// Encode `text` into a `width`-register block and write it at `start`
    ///
    /// Malformed bytes are skipped and counted; the block is written with
    /// [`RegisterTable::write_range`] semantics.
    pub fn write_text(
        &self,
        start: u16,
        text: impl AsRef<[u8]>,
        width: usize,
        centered: bool,
    ) -> Result<usize, RegisterError> {
        let block = TextBlock::encode(text.as_ref(), width, centered);
        if block.malformed_bytes() > 0 {
            self.diagnostics
                .record_malformed_bytes(block.malformed_bytes() as u64);
            debug!(
                "Skipped {} malformed bytes while encoding text at register {}",
                block.malformed_bytes(),
                start
            );
        }
        self.write_range(start, block.as_slice())
    }

    /// Copy a controller-written register from the transport into the table
    ///
    /// The transport is read while the guard is held, so an application write
    /// to the same register either lands before the read (and is what gets
    /// pulled) or after the copy. Returns `Ok(false)` when there is nothing to
    /// pull: no bridge, or `index` outside the table or the transport.
    pub fn pull_external(&self, index: u16) -> Result<bool, SyncError> {
        let Some(bridge) = &self.bridge else {
            return Ok(false);
        };

        let mut values = self.lock();
        let slot = usize::from(index);
        if slot >= values.len() {
            self.diagnostics.record_out_of_range(1);
            return Ok(false);
        }
        if !bridge.mirrors(slot) {
            return Ok(false);
        }
        values[slot] = bridge.pull(index)?;
        Ok(true)
    }

    /// Read a register and reset it to zero in one critical section
    ///
    /// A mirrored register is swapped out of the transport itself, so a
    /// controller write that arrived after the last pull is returned rather
    /// than overwritten. Returns 0 when the register is clear or out of range.
    pub fn take(&self, index: u16) -> u16 {
        let (value, sync_error) = {
            let mut values = self.lock();
            let slot = usize::from(index);
            let Some(&current) = values.get(slot) else {
                self.diagnostics.record_out_of_range(1);
                return 0;
            };
            let taken = match &self.bridge {
                Some(bridge) if bridge.mirrors(slot) => bridge.take(index),
                _ => Ok(current),
            };
            values[slot] = 0;
            match taken {
                Ok(value) => (value, None),
                Err(e) => (current, Some(e)),
            }
        };
        Self::report_sync_error(sync_error, usize::from(index), 1);
        value
    }

    /// Push every register to the transport under one acquisition of the guard
    ///
    /// Registers beyond the transport's own size are skipped. The bridge is
    /// marked as synchronised only if every push succeeded.
    pub fn resync_all(&self) -> Result<(), SyncError> {
        let Some(bridge) = &self.bridge else {
            return Ok(());
        };

        let values = self.lock();
        let mirrored = values.len().min(usize::from(bridge.register_count()));
        let mut first_error = None;
        for (index, &value) in values[..mirrored].iter().enumerate() {
            if let Err(e) = bridge.push(index as u16, value) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            None => {
                bridge.mark_synced();
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}
