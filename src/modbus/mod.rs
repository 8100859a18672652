// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides the Modbus TCP server that exposes the holding
//! registers to an external controller.
//!
//! ## Key Components
//!
//! - `HoldingRegisterStore`: the transport-side register copy, implementing
//!   the [`Transport`](crate::registers::Transport) seam used by the register
//!   sync bridge.
//! - `RegisterModbusService`: the request handler that serves the store.
//!
//! ## Usage
//!
//! The Modbus server is normally started by the daemon:
//!
//! ```no_run
//! use rust_register_bridge::config::Config;
//! use rust_register_bridge::daemon::launch_daemon::Daemon;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let mut daemon = Daemon::new();
//! daemon.launch(&config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Register Map
//!
//! The map is a flat address space of holding registers whose layout is
//! described by the `registers` configuration section (text fields, command
//! trigger register, remote command register).

pub mod modbus_server;
pub mod store;

pub use modbus_server::{serve_tcp, RegisterModbusService};
pub use store::HoldingRegisterStore;
