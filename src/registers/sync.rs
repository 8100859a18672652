// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Synchronisation between the register table and the transport
//!
//! The register table is the single authoritative copy of every holding
//! register. The fieldbus transport keeps its own register storage, which is
//! what the controller actually reads and writes. [`RegisterSyncBridge`] is the
//! only path between the two:
//!
//! - `push` copies a table value into the transport. It runs inside the table
//!   critical section and must stay bounded in time.
//! - `pull` reads a value the controller wrote into the transport so the
//!   service loop can copy it back into the table.
//!
//! A failed push never touches the table value. The bridge only remembers that
//! the transport is out of date, and the next service tick pushes the whole
//! table again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use super::error::SyncError;
use crate::diagnostics::SharedDiagnostics;

/// Register storage owned by a fieldbus transport
///
/// Implementations must never call back into the register table: the table
/// holds its guard while calling [`Transport::set_register`].
pub trait Transport: Send + Sync {
    /// Number of registers the transport exposes
    fn register_count(&self) -> u16;

    /// Current value of a transport register
    fn get_register(&self, index: u16) -> Result<u16, SyncError>;

    /// Overwrite a transport register on behalf of the application
    fn set_register(&self, index: u16, value: u16) -> Result<(), SyncError>;

    /// Read a register and reset it to zero
    ///
    /// Stores shared with a controller should override this so that a
    /// controller write cannot slip between the read and the reset.
    fn take_register(&self, index: u16) -> Result<u16, SyncError> {
        let value = self.get_register(index)?;
        self.set_register(index, 0)?;
        Ok(value)
    }

    /// Periodic service hook
    ///
    /// Returns the addresses written by the controller since the previous
    /// call, in ascending order and without duplicates.
    fn service(&self) -> Result<Vec<u16>, SyncError>;
}

/// One-directional push/pull boundary between the table and a [`Transport`]
pub struct RegisterSyncBridge {
    transport: Arc<dyn Transport>,
    diagnostics: SharedDiagnostics,
    out_of_sync: AtomicBool,
}

impl RegisterSyncBridge {
    pub fn new(transport: Arc<dyn Transport>, diagnostics: SharedDiagnostics) -> Self {
        Self {
            transport,
            diagnostics,
            out_of_sync: AtomicBool::new(false),
        }
    }

    /// Forward a table value into the transport store
    ///
    /// On failure the error is counted and the bridge is flagged for a full
    /// resynchronisation; there is no synchronous retry.
    pub fn push(&self, index: u16, value: u16) -> Result<(), SyncError> {
        self.transport.set_register(index, value).inspect_err(|_| {
            self.diagnostics.record_sync_failure(1);
            self.out_of_sync.store(true, Ordering::Release);
        })
    }

    /// Read a register the controller may have written
    pub fn pull(&self, index: u16) -> Result<u16, SyncError> {
        self.transport
            .get_register(index)
            .inspect_err(|_| self.diagnostics.record_sync_failure(1))
    }

    /// Read a register and reset it to zero in the transport
    ///
    /// A failure flags the bridge for a full resynchronisation, as `push` does.
    pub fn take(&self, index: u16) -> Result<u16, SyncError> {
        self.transport.take_register(index).inspect_err(|_| {
            self.diagnostics.record_sync_failure(1);
            self.out_of_sync.store(true, Ordering::Release);
        })
    }

    /// Pump the transport and collect the addresses written by the controller
    pub fn service(&self) -> Result<Vec<u16>, SyncError> {
        self.transport
            .service()
            .inspect_err(|_| self.diagnostics.record_sync_failure(1))
    }

    /// Whether a push failed since the last full resynchronisation
    pub fn needs_resync(&self) -> bool {
        self.out_of_sync.load(Ordering::Acquire)
    }

    pub(crate) fn mark_synced(&self) {
        if self.out_of_sync.swap(false, Ordering::AcqRel) {
            debug!("Transport registers reconciled with the register table");
        }
    }

    pub fn register_count(&self) -> u16 {
        self.transport.register_count()
    }

    /// Whether the transport holds a copy of register `index`
    pub fn mirrors(&self, index: usize) -> bool {
        index < usize::from(self.transport.register_count())
    }

    pub fn diagnostics(&self) -> &SharedDiagnostics {
        &self.diagnostics
    }
}
