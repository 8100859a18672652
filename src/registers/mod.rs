// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Holding register table
//!
//! This module owns the single authoritative copy of the holding registers
//! exposed to the external controller.
//!
//! ## Key Components
//!
//! - [`RegisterTable`]: the guarded register array with single, range and
//!   text operations.
//! - [`TextBlock`]: fixed-width UTF-8 to register encoding used by
//!   [`RegisterTable::write_text`].
//! - [`RegisterSyncBridge`] and the [`Transport`] trait: the push/pull boundary
//!   towards the fieldbus transport's own register storage.
//!
//! ## Usage
//!
//! ```no_run
//! use rust_register_bridge::diagnostics::Diagnostics;
//! use rust_register_bridge::registers::{BoundsPolicy, RegisterTable};
//!
//! let table = RegisterTable::new(170, BoundsPolicy::Ignore, Diagnostics::shared());
//! table.write_text(0, "Radio Paradise", 50, true).unwrap();
//! table.write(60, 12).unwrap();
//! assert_eq!(table.read(60), 12);
//! ```

pub mod error;
pub mod sync;
pub mod table;
pub mod text;

pub use error::{RegisterError, SyncError};
pub use sync::{RegisterSyncBridge, Transport};
pub use table::{BoundsPolicy, RegisterTable, SharedRegisterTable};
pub use text::{registers_to_string, TextBlock};
