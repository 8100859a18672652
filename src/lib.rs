// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust register bridge library
//!
//! Maintains a table of 16-bit holding registers shared between application
//! code and a Modbus TCP controller, and turns the pulse trains of an
//! HS1527-style RF remote into de-duplicated command codes.

pub mod config;
pub mod daemon;
pub mod diagnostics;
pub mod modbus;
pub mod receiver;
pub mod registers;
pub mod service;
