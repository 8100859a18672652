// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register map configuration
//!
//! The register table itself knows nothing about what its registers mean.
//! This section describes the layout shared with the controller: which ranges
//! hold text, where the controller posts command bits and where the last
//! remote command is mirrored.

use serde::{Deserialize, Serialize};

use crate::registers::BoundsPolicy;

/// Register map and table behaviour
///
/// # Example
///
/// ```
/// use rust_register_bridge::config::{RegistersConfig, TextFieldConfig};
///
/// let registers = RegistersConfig {
///     count: 70,
///     text_fields: vec![TextFieldConfig {
///         name: "station".to_string(),
///         start: 0,
///         width: 50,
///         centered: true,
///         initial: Some("Radio Paradise".to_string()),
///     }],
///     command_register: Some(60),
///     remote_command_register: None,
///     ..Default::default()
/// };
/// assert_eq!(registers.text_field("station").unwrap().width, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistersConfig {
    /// Number of holding registers in the table, fixed for the process lifetime
    #[serde(default = "default_count")]
    pub count: u16,

    /// Handling of requests reaching past the end of the table
    #[serde(default)]
    pub bounds_policy: BoundsPolicy,

    /// Period of the service loop pumping the Modbus transport, in milliseconds
    #[serde(default = "default_service_interval_ms")]
    pub service_interval_ms: u64,

    /// Register whose bits the controller sets to request an action
    ///
    /// The service loop relays any non-zero value and clears the register.
    #[serde(default = "default_command_register")]
    pub command_register: Option<u16>,

    /// Register receiving every confirmed remote command
    ///
    /// The low byte holds the command code and the high byte a sequence
    /// number (1-255) that changes on every press, so 0 means "no command yet".
    #[serde(default = "default_remote_command_register")]
    pub remote_command_register: Option<u16>,

    /// Text ranges of the register map
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<TextFieldConfig>,
}

/// A fixed-width text range of the register map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFieldConfig {
    /// Name used in logs and by the command line client
    pub name: String,
    /// First register of the field
    pub start: u16,
    /// Number of registers, one character per register
    pub width: u16,
    /// Center the text inside the field instead of left-aligning it
    #[serde(default)]
    pub centered: bool,
    /// Text written when the daemon starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
}

impl TextFieldConfig {
    /// Registers covered by the field
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = usize::from(self.start);
        start..start + usize::from(self.width)
    }
}

impl RegistersConfig {
    /// Look up a text field by name
    pub fn text_field(&self, name: &str) -> Option<&TextFieldConfig> {
        self.text_fields.iter().find(|field| field.name == name)
    }
}

fn default_count() -> u16 {
    170
}

fn default_service_interval_ms() -> u64 {
    10
}

fn default_command_register() -> Option<u16> {
    Some(160)
}

fn default_remote_command_register() -> Option<u16> {
    Some(161)
}

fn default_text_fields() -> Vec<TextFieldConfig> {
    vec![
        TextFieldConfig {
            name: "station".to_string(),
            start: 0,
            width: 50,
            centered: true,
            initial: None,
        },
        TextFieldConfig {
            name: "title".to_string(),
            start: 50,
            width: 100,
            centered: false,
            initial: None,
        },
    ]
}

impl Default for RegistersConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            bounds_policy: BoundsPolicy::default(),
            service_interval_ms: default_service_interval_ms(),
            command_register: default_command_register(),
            remote_command_register: default_remote_command_register(),
            text_fields: default_text_fields(),
        }
    }
}
