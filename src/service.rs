// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register service routine
//!
//! [`ServiceLoop::tick`] is run periodically by the daemon. One tick:
//!
//! 1. pumps the transport and copies every register the controller wrote back
//!    into the register table,
//! 2. pushes the whole table again if an earlier push failed,
//! 3. relays the command trigger register, if one is configured, and clears it.
//!
//! A tick never blocks on anything but the register table guard and never
//! panics; failures are logged and counted.
//!
//! [`RemoteCommandMirror`] is the other direction: it publishes confirmed
//! remote commands in a register the controller can poll.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::config::RegistersConfig;
use crate::receiver::RemoteCommand;
use crate::registers::{RegisterError, SharedRegisterTable};

/// Command bits posted by the controller in the trigger register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerCommand {
    pub register: u16,
    pub bits: u16,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Registers copied from the transport into the table
    pub pulled: usize,
    /// Whether a full resynchronisation was attempted and succeeded
    pub resynced: bool,
    /// Command bits relayed this tick
    pub command: Option<ControllerCommand>,
}

/// Periodic reconciliation between the register table and the transport
pub struct ServiceLoop {
    table: SharedRegisterTable,
    command_register: Option<u16>,
    commands: Option<mpsc::Sender<ControllerCommand>>,
}

impl ServiceLoop {
    pub fn new(table: SharedRegisterTable, command_register: Option<u16>) -> Self {
        Self {
            table,
            command_register,
            commands: None,
        }
    }

    /// Relay controller commands to `sink`
    pub fn with_command_sink(mut self, sink: mpsc::Sender<ControllerCommand>) -> Self {
        self.commands = Some(sink);
        self
    }

    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let Some(bridge) = self.table.bridge() else {
            report.command = self.relay_command();
            return report;
        };

        match bridge.service() {
            Ok(written) => {
                for index in written {
                    match self.table.pull_external(index) {
                        Ok(true) => report.pulled += 1,
                        Ok(false) => {}
                        Err(e) => warn!("Failed to pull register {} from the transport: {}", index, e),
                    }
                }
            }
            Err(e) => warn!("Transport service failed: {}", e),
        }
        if report.pulled > 0 {
            self.table
                .diagnostics()
                .record_external_writes(report.pulled as u64);
            debug!("Pulled {} controller-written registers", report.pulled);
        }

        if bridge.needs_resync() {
            match self.table.resync_all() {
                Ok(()) => {
                    info!("Transport registers resynchronised");
                    report.resynced = true;
                }
                Err(e) => warn!("Register resynchronisation failed, retrying next tick: {}", e),
            }
        }

        report.command = self.relay_command();
        report
    }

    fn relay_command(&self) -> Option<ControllerCommand> {
        let register = self.command_register?;
        let bits = self.table.take(register);
        if bits == 0 {
            return None;
        }

        let command = ControllerCommand { register, bits };
        info!(
            "Controller command bits {:#06x} in register {}",
            bits, register
        );
        if let Some(sink) = &self.commands {
            match sink.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Controller command queue full, dropping bits {:#06x}", bits)
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Controller command consumer gone, bits {:#06x} only logged", bits)
                }
            }
        }
        Some(command)
    }
}

/// Publishes confirmed remote commands in a holding register
///
/// The register holds `sequence << 8 | code`. The sequence runs 1 to 255 and
/// wraps back to 1, so the value changes on every press, including repeated
/// presses of the same button, and is never 0 once a command arrived.
pub struct RemoteCommandMirror {
    table: SharedRegisterTable,
    register: Option<u16>,
    sequence: u8,
}

impl RemoteCommandMirror {
    pub fn new(table: SharedRegisterTable, register: Option<u16>) -> Self {
        Self {
            table,
            register,
            sequence: 0,
        }
    }

    /// Record `command`, returning the register value written
    pub fn publish(&mut self, command: &RemoteCommand) -> Option<u16> {
        info!(
            "Remote command {} received at {}",
            command.code, command.received_at
        );
        let register = self.register?;
        self.sequence = self.sequence.checked_add(1).unwrap_or(1);
        let value = (u16::from(self.sequence) << 8) | u16::from(command.code);
        match self.table.write(register, value) {
            Ok(_) => Some(value),
            Err(e) => {
                warn!("Could not mirror remote command into register {}: {}", register, e);
                None
            }
        }
    }
}

/// Write the configured initial text of every text field
pub fn write_initial_text(
    table: &SharedRegisterTable,
    registers: &RegistersConfig,
) -> Result<(), RegisterError> {
    for field in &registers.text_fields {
        if let Some(text) = &field.initial {
            table.write_text(field.start, text, usize::from(field.width), field.centered)?;
            debug!("Initialised text field '{}' with {:?}", field.name, text);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::registers::{BoundsPolicy, RegisterTable};

    fn table() -> SharedRegisterTable {
        Arc::new(RegisterTable::new(8, BoundsPolicy::Ignore, Diagnostics::shared()))
    }

    fn command(code: u8) -> RemoteCommand {
        RemoteCommand {
            code,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn mirror_sequence_changes_on_repeated_codes() {
        let table = table();
        let mut mirror = RemoteCommandMirror::new(Arc::clone(&table), Some(3));

        assert_eq!(mirror.publish(&command(5)), Some(0x0105));
        assert_eq!(mirror.publish(&command(5)), Some(0x0205));
        assert_eq!(table.read(3), 0x0205);
    }

    #[test]
    fn mirror_sequence_skips_zero() {
        let table = table();
        let mut mirror = RemoteCommandMirror::new(Arc::clone(&table), Some(0));
        mirror.sequence = 255;
        assert_eq!(mirror.publish(&command(31)), Some(0x011F));
    }

    #[test]
    fn mirror_without_register_only_logs() {
        let mut mirror = RemoteCommandMirror::new(table(), None);
        assert_eq!(mirror.publish(&command(1)), None);
    }

    #[test]
    fn command_register_is_relayed_without_transport() {
        let table = table();
        let (tx, mut rx) = mpsc::channel(2);
        let service = ServiceLoop::new(Arc::clone(&table), Some(7)).with_command_sink(tx);

        table.write(7, 0b0110).unwrap();
        let report = service.tick();
        assert_eq!(
            report.command,
            Some(ControllerCommand {
                register: 7,
                bits: 0b0110
            })
        );
        assert_eq!(table.read(7), 0);
        assert_eq!(rx.try_recv().unwrap().bits, 0b0110);
        assert_eq!(service.tick(), TickReport::default());
    }

    #[test]
    fn initial_text_is_written() {
        let table = table();
        let mut registers = RegistersConfig {
            count: 8,
            command_register: None,
            remote_command_register: None,
            ..Default::default()
        };
        registers.text_fields = vec![crate::config::TextFieldConfig {
            name: "label".to_string(),
            start: 2,
            width: 4,
            centered: false,
            initial: Some("ok".to_string()),
        }];

        write_initial_text(&table, &registers).unwrap();
        assert_eq!(table.read_range(2, 4), vec![0x6F, 0x6B, 0x20, 0x20]);
    }
}
