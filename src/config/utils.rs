// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{CaptureSourceKind, Config};
use crate::receiver::decoder::{ADDRESS_BITS, PACKET_LEN};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_register_bridge --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **Port Range**: the Modbus port is within 1-65534
/// - **IP Address Format**: a warning is logged for unusual Modbus addresses
/// - **Register Map**: text fields and reserved registers lie inside the
///   table, text fields have unique names and do not overlap each other or a
///   reserved register, and the two reserved registers are distinct
/// - **Framing**: the five command pulses fit inside the minimum burst length
/// - **Simulated Remote**: codes fit in 5 bits, the address in 20 bits, and
///   jittered pulses stay on their side of the decode threshold
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid port number: {}", config.modbus.port);
    }

    if !is_valid_ip_address(&config.modbus.address) {
        warn!(
            "Potentially invalid Modbus address format: {}",
            config.modbus.address
        );
    }

    validate_register_map(config)?;
    validate_receiver(config)?;

    Ok(())
}

fn validate_register_map(config: &Config) -> Result<()> {
    let registers = &config.registers;
    let count = usize::from(registers.count);
    if count == 0 {
        anyhow::bail!("The register table must hold at least one register");
    }

    let mut names = HashSet::new();
    let mut claimed: Vec<(usize, &str)> = Vec::new();
    for field in &registers.text_fields {
        if !names.insert(field.name.as_str()) {
            anyhow::bail!("Duplicate text field name: {}", field.name);
        }
        if field.width == 0 {
            anyhow::bail!("Text field '{}' has a zero width", field.name);
        }
        let range = field.range();
        if range.end > count {
            anyhow::bail!(
                "Text field '{}' covers registers {}..{} but the table only holds {}",
                field.name,
                range.start,
                range.end,
                count
            );
        }
        for index in range {
            if let Some((_, other)) = claimed.iter().find(|(claimed, _)| *claimed == index) {
                anyhow::bail!(
                    "Text fields '{}' and '{}' overlap at register {}",
                    other,
                    field.name,
                    index
                );
            }
            claimed.push((index, field.name.as_str()));
        }
    }

    let reserved = [
        ("command_register", registers.command_register),
        ("remote_command_register", registers.remote_command_register),
    ];
    for (name, register) in reserved {
        let Some(register) = register else { continue };
        let index = usize::from(register);
        if index >= count {
            anyhow::bail!(
                "{} {} is outside of the {} register table",
                name,
                register,
                count
            );
        }
        if let Some((_, field)) = claimed.iter().find(|(claimed, _)| *claimed == index) {
            anyhow::bail!("{} {} lies inside text field '{}'", name, register, field);
        }
    }
    if registers.command_register.is_some()
        && registers.command_register == registers.remote_command_register
    {
        anyhow::bail!("command_register and remote_command_register must differ");
    }

    Ok(())
}

fn validate_receiver(config: &Config) -> Result<()> {
    let receiver = &config.receiver;

    if receiver.payload_offset + PACKET_LEN > receiver.min_pulses {
        anyhow::bail!(
            "payload_offset {} leaves no room for {} command pulses in bursts of {} pairs",
            receiver.payload_offset,
            PACKET_LEN,
            receiver.min_pulses
        );
    }
    if receiver.repeats_to_confirm == 0 {
        anyhow::bail!("repeats_to_confirm must be at least 1");
    }
    if receiver.command_queue == 0 {
        anyhow::bail!("command_queue must be at least 1");
    }

    if receiver.source != CaptureSourceKind::Simulated {
        return Ok(());
    }
    let simulated = &receiver.simulated;
    if let Some(code) = simulated.codes.iter().find(|&&code| code > 31) {
        anyhow::bail!("Simulated remote code {} does not fit in 5 bits", code);
    }
    if simulated.address >= 1 << ADDRESS_BITS {
        anyhow::bail!(
            "Simulated remote address {:#x} does not fit in {} bits",
            simulated.address,
            ADDRESS_BITS
        );
    }
    let short_max = simulated.short_pulse_us.saturating_add(simulated.jitter_us);
    let long_min = simulated.long_pulse_us.saturating_sub(simulated.jitter_us);
    if short_max > receiver.threshold_us || long_min <= receiver.threshold_us {
        anyhow::bail!(
            "Simulated pulses ({}us/{}us +/- {}us) straddle the {}us decode threshold",
            simulated.short_pulse_us,
            simulated.long_pulse_us,
            simulated.jitter_us,
            receiver.threshold_us
        );
    }
    if !(0.0..=1.0).contains(&simulated.dropout_probability) {
        anyhow::bail!(
            "dropout_probability {} must be between 0 and 1",
            simulated.dropout_probability
        );
    }
    if simulated.repeat_interval_ms >= receiver.debounce_timeout_ms {
        warn!(
            "Simulated repeats every {} ms exceed the {} ms debounce timeout, held buttons will fire repeatedly",
            simulated.repeat_interval_ms, receiver.debounce_timeout_ms
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextFieldConfig;

    #[test]
    fn default_configuration_is_valid() {
        validate_specific_rules(&Config::default()).unwrap();
    }

    #[test]
    fn text_field_past_the_table_is_rejected() {
        let mut config = Config::default();
        config.registers.count = 100;
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("'title'"));
    }

    #[test]
    fn reserved_register_inside_a_text_field_is_rejected() {
        let mut config = Config::default();
        config.registers.command_register = Some(10);
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("station"));
    }

    #[test]
    fn overlapping_text_fields_are_rejected() {
        let mut config = Config::default();
        config.registers.text_fields.push(TextFieldConfig {
            name: "artist".to_string(),
            start: 40,
            width: 20,
            centered: false,
            initial: None,
        });
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn payload_must_fit_the_burst() {
        let mut config = Config::default();
        config.receiver.payload_offset = 21;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn simulated_codes_are_five_bits() {
        let mut config = Config::default();
        config.receiver.simulated.codes = vec![1, 32];
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn jitter_must_not_cross_the_threshold() {
        let mut config = Config::default();
        config.receiver.simulated.jitter_us = 200;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn special_addresses_are_accepted() {
        assert!(is_valid_ip_address("localhost"));
        assert!(is_valid_ip_address("::1"));
        assert!(!is_valid_ip_address("not an address"));
    }
}
