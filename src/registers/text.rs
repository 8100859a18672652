// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Text blocks
//!
//! A text block is a fixed-width window of holding registers carrying one
//! display line, one UTF-16 code unit per register. Strings are decoded from
//! UTF-8 with a deliberately small decoder: one, two and three byte sequences
//! map to a single register, anything else is skipped byte by byte. There is
//! no surrogate pair handling, four byte sequences never reach the registers.
//!
//! The decoder stops at the end of the input or at the first `0x00` byte,
//! whichever comes first.

/// Register value used to pad a text block
pub const PADDING: u16 = 0x0020;

/// A fixed-width block of encoded text
///
/// The block always holds exactly `width` registers. Text longer than the
/// block is truncated, shorter text is padded with [`PADDING`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    units: Vec<u16>,
    text_len: usize,
    malformed: usize,
}

/// Result of decoding a byte string into register values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedText {
    /// One register value per decoded code unit
    pub units: Vec<u16>,
    /// Number of bytes skipped because they could not be decoded
    pub malformed: usize,
}

/// Decode at most `limit` register values from a UTF-8 byte string
pub fn decode_units(bytes: &[u8], limit: usize) -> DecodedText {
    let mut decoded = DecodedText {
        units: Vec::with_capacity(limit.min(bytes.len())),
        malformed: 0,
    };

    // A continuation byte only counts if it exists and is not the terminator
    let continuation = |at: usize| bytes.get(at).copied().filter(|&b| b != 0);

    let mut i = 0;
    while i < bytes.len() && decoded.units.len() < limit {
        let lead = bytes[i];
        if lead == 0 {
            break;
        }

        if lead & 0x80 == 0 {
            decoded.units.push(u16::from(lead));
            i += 1;
        } else if lead & 0xE0 == 0xC0 {
            match continuation(i + 1) {
                Some(c1) => {
                    decoded
                        .units
                        .push((u16::from(lead & 0x1F) << 6) | u16::from(c1 & 0x3F));
                    i += 2;
                }
                None => {
                    decoded.malformed += 1;
                    i += 1;
                }
            }
        } else if lead & 0xF0 == 0xE0 {
            match (continuation(i + 1), continuation(i + 2)) {
                (Some(c1), Some(c2)) => {
                    decoded.units.push(
                        (u16::from(lead & 0x0F) << 12)
                            | (u16::from(c1 & 0x3F) << 6)
                            | u16::from(c2 & 0x3F),
                    );
                    i += 3;
                }
                _ => {
                    decoded.malformed += 1;
                    i += 1;
                }
            }
        } else {
            decoded.malformed += 1;
            i += 1;
        }
    }

    decoded
}

impl TextBlock {
    /// A block of `width` padding registers
    pub fn blank(width: usize) -> Self {
        Self {
            units: vec![PADDING; width],
            text_len: 0,
            malformed: 0,
        }
    }

    /// Encode `text` into a block of exactly `width` registers
    ///
    /// With `centered` the padding is split `floor((width - len) / 2)` on the
    /// left and the remainder on the right, otherwise all of it goes right.
    pub fn encode(text: &[u8], width: usize, centered: bool) -> Self {
        let decoded = decode_units(text, width);
        let text_len = decoded.units.len();
        let left = if centered { (width - text_len) / 2 } else { 0 };

        let mut block = Self::blank(width);
        block.units[left..left + text_len].copy_from_slice(&decoded.units);
        block.text_len = text_len;
        block.malformed = decoded.malformed;
        block
    }

    pub fn width(&self) -> usize {
        self.units.len()
    }

    /// Number of registers occupied by decoded text, padding excluded
    pub fn text_len(&self) -> usize {
        self.text_len
    }

    /// Number of input bytes that were skipped as malformed
    pub fn malformed_bytes(&self) -> usize {
        self.malformed
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.units
    }

    pub fn into_inner(self) -> Vec<u16> {
        self.units
    }
}

/// Render register values back into a string, trimming the padding
///
/// Values that are not valid scalar values are replaced by U+FFFD. Used by
/// the inspection client and by tests.
pub fn registers_to_string(registers: &[u16]) -> String {
    let text: String = registers
        .iter()
        .take_while(|&&unit| unit != 0)
        .map(|&unit| char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    text.trim_matches(' ').to_string()
}
