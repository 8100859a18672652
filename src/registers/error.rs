// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use thiserror::Error;

/// Errors reported by the register table
///
/// None of these are fatal. Under the default bounds policy out-of-range
/// requests are silently clipped and never reach the caller as an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Register range {start}..{end} is outside the table (size {len})")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("Synchronisation with the transport failed: {0}")]
    Sync(#[from] SyncError),
}

/// Errors raised by the transport side of the register bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Transport register {index} does not exist (transport holds {count})")]
    OutOfRange { index: u16, count: u16 },

    #[error("Transport register store lock is poisoned")]
    Poisoned,

    #[error("Transport unavailable: {reason}")]
    Unavailable { reason: String },
}
