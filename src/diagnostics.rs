// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Diagnostic counters
//!
//! Neither the register table nor the decode pipeline is allowed to take the
//! process down. Every recoverable fault is counted here instead, and the
//! daemon heartbeat periodically logs a [`DiagnosticsSnapshot`].
//!
//! The counters are plain atomics so they can be bumped from inside the
//! register table critical section without taking another lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shared handle to the diagnostic counters
pub type SharedDiagnostics = Arc<Diagnostics>;

/// Lock-free fault and activity counters
#[derive(Debug, Default)]
pub struct Diagnostics {
    out_of_range: AtomicU64,
    malformed_bytes: AtomicU64,
    sync_failures: AtomicU64,
    lock_recoveries: AtomicU64,
    external_writes: AtomicU64,
    bursts_received: AtomicU64,
    bursts_discarded: AtomicU64,
    commands_emitted: AtomicU64,
    commands_dropped: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    /// Register requests clipped or refused because they left the table
    pub out_of_range: u64,
    /// Bytes skipped while encoding text blocks
    pub malformed_bytes: u64,
    /// Failed pushes or pulls between the table and the transport
    pub sync_failures: u64,
    /// Times a poisoned register guard had to be recovered
    pub lock_recoveries: u64,
    /// Register values written by the controller and pulled into the table
    pub external_writes: u64,
    /// Bursts handed over by the capture source
    pub bursts_received: u64,
    /// Bursts too short to carry a command
    pub bursts_discarded: u64,
    /// Confirmed remote commands delivered to the sink
    pub commands_emitted: u64,
    /// Confirmed remote commands lost because the sink was full or closed
    pub commands_dropped: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }
    };
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new shared instance
    pub fn shared() -> SharedDiagnostics {
        Arc::new(Self::new())
    }

    counter!(record_out_of_range, out_of_range);
    counter!(record_malformed_bytes, malformed_bytes);
    counter!(record_sync_failure, sync_failures);
    counter!(record_lock_recovery, lock_recoveries);
    counter!(record_external_writes, external_writes);
    counter!(record_burst_received, bursts_received);
    counter!(record_burst_discarded, bursts_discarded);
    counter!(record_command_emitted, commands_emitted);
    counter!(record_command_dropped, commands_dropped);

    /// Read all counters
    ///
    /// Each counter is read independently, the snapshot is not atomic across
    /// counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            out_of_range: self.out_of_range.load(Ordering::Relaxed),
            malformed_bytes: self.malformed_bytes.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            lock_recoveries: self.lock_recoveries.load(Ordering::Relaxed),
            external_writes: self.external_writes.load(Ordering::Relaxed),
            bursts_received: self.bursts_received.load(Ordering::Relaxed),
            bursts_discarded: self.bursts_discarded.load(Ordering::Relaxed),
            commands_emitted: self.commands_emitted.load(Ordering::Relaxed),
            commands_dropped: self.commands_dropped.load(Ordering::Relaxed),
        }
    }
}

impl DiagnosticsSnapshot {
    /// Whether any fault counter is non-zero
    pub fn has_faults(&self) -> bool {
        self.out_of_range > 0
            || self.malformed_bytes > 0
            || self.sync_failures > 0
            || self.lock_recoveries > 0
            || self.commands_dropped > 0
    }
}
