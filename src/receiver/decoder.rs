// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-register-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pulse train framing and decoding
//!
//! An HS1527-style remote sends a burst of 25 pulse pairs: a 20-bit address
//! followed by a 5-bit command, most significant bit first. Each bit is a high
//! pulse followed by a low gap; a long high pulse is a `1`, a short one a `0`.
//!
//! ```text
//! pair  0 ........................ 19 | 20 ...... 24
//!       address (not interpreted)     | command code
//! ```

/// Number of pulses in a command packet
pub const PACKET_LEN: usize = 5;

/// High pulses longer than this many microseconds are a `1`
pub const DEFAULT_THRESHOLD_US: u32 = 450;

/// Shortest burst that can carry a command
pub const DEFAULT_MIN_PAIRS: usize = 25;

/// Index of the first command pulse inside a burst
pub const DEFAULT_PAYLOAD_OFFSET: usize = 20;

/// Number of address bits preceding the command
pub const ADDRESS_BITS: u32 = 20;

/// One captured high/low pulse pair, durations in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulsePair {
    pub high: u32,
    pub low: u32,
}

/// A captured burst, as handed over by the capture source
pub type Burst = Vec<PulsePair>;

/// The five command pulse durations of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulsePacket {
    pub pulses: [u32; PACKET_LEN],
}

/// Classifies pulse durations into a 5-bit command code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseDecoder {
    threshold_us: u32,
}

impl Default for PulseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_US)
    }
}

impl PulseDecoder {
    pub fn new(threshold_us: u32) -> Self {
        Self { threshold_us }
    }

    pub fn threshold_us(&self) -> u32 {
        self.threshold_us
    }

    /// Decode a packet, first pulse is the most significant bit
    ///
    /// Every duration classifies deterministically, zero included.
    pub fn decode(&self, packet: &PulsePacket) -> u8 {
        packet
            .pulses
            .iter()
            .fold(0u8, |code, &duration| {
                (code << 1) | u8::from(duration > self.threshold_us)
            })
    }
}

/// Selects the command packet out of a raw burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstFraming {
    min_pairs: usize,
    payload_offset: usize,
}

impl Default for BurstFraming {
    fn default() -> Self {
        Self {
            min_pairs: DEFAULT_MIN_PAIRS,
            payload_offset: DEFAULT_PAYLOAD_OFFSET,
        }
    }
}

impl BurstFraming {
    /// Create a framing rule
    ///
    /// `min_pairs` is raised if needed so the payload always fits.
    pub fn new(min_pairs: usize, payload_offset: usize) -> Self {
        Self {
            min_pairs: min_pairs.max(payload_offset + PACKET_LEN),
            payload_offset,
        }
    }

    pub fn min_pairs(&self) -> usize {
        self.min_pairs
    }

    /// Extract the command packet, `None` for bursts that are too short
    pub fn frame(&self, burst: &[PulsePair]) -> Option<PulsePacket> {
        if burst.len() < self.min_pairs {
            return None;
        }
        let mut pulses = [0; PACKET_LEN];
        for (slot, pair) in pulses
            .iter_mut()
            .zip(&burst[self.payload_offset..self.payload_offset + PACKET_LEN])
        {
            *slot = pair.high;
        }
        Some(PulsePacket { pulses })
    }
}

/// Short and long pulse durations used when synthesising bursts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTiming {
    pub short_us: u32,
    pub long_us: u32,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            short_us: 300,
            long_us: 900,
        }
    }
}

/// Build the burst a remote would transmit for `address` and `code`
///
/// Only the low 20 bits of `address` and the low 5 bits of `code` are used.
pub fn encode_burst(address: u32, code: u8, timing: PulseTiming) -> Burst {
    let bit = |set: bool| {
        if set {
            PulsePair {
                high: timing.long_us,
                low: timing.short_us,
            }
        } else {
            PulsePair {
                high: timing.short_us,
                low: timing.long_us,
            }
        }
    };

    let address_bits = (0..ADDRESS_BITS).rev().map(|i| address >> i & 1 == 1);
    let code_bits = (0..PACKET_LEN as u32).rev().map(|i| code >> i & 1 == 1);
    address_bits.chain(code_bits).map(bit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_most_significant_bit_first() {
        let packet = PulsePacket {
            pulses: [500, 400, 500, 400, 500],
        };
        assert_eq!(PulseDecoder::new(450).decode(&packet), 0b10101);
    }

    #[test]
    fn threshold_itself_is_a_zero() {
        let packet = PulsePacket {
            pulses: [450, 451, 0, u32::MAX, 0],
        };
        assert_eq!(PulseDecoder::new(450).decode(&packet), 0b01010);
    }

    #[test]
    fn short_bursts_are_not_framed() {
        let burst = encode_burst(0xABCDE, 7, PulseTiming::default());
        let framing = BurstFraming::default();
        assert!(framing.frame(&burst[..24]).is_none());
        assert!(framing.frame(&[]).is_none());
    }

    #[test]
    fn framing_takes_the_pulses_after_the_address() {
        let burst = encode_burst(0xFFFFF, 0b00110, PulseTiming::default());
        let packet = BurstFraming::default().frame(&burst).unwrap();
        assert_eq!(packet.pulses, [300, 300, 900, 900, 300]);
    }

    #[test]
    fn longer_bursts_still_use_the_fixed_offset() {
        let mut burst = encode_burst(0, 19, PulseTiming::default());
        burst.push(PulsePair { high: 900, low: 900 });
        let packet = BurstFraming::default().frame(&burst).unwrap();
        assert_eq!(PulseDecoder::default().decode(&packet), 19);
    }

    #[test]
    fn encoded_burst_has_address_and_code() {
        let burst = encode_burst(1, 0b10000, PulseTiming::default());
        assert_eq!(burst.len(), DEFAULT_MIN_PAIRS);
        assert_eq!(burst[19].high, 900);
        assert_eq!(burst[18].high, 300);
        assert_eq!(burst[20].high, 900);
        assert_eq!(burst[24].high, 300);
    }

    #[test]
    fn min_pairs_cover_the_payload() {
        assert_eq!(BurstFraming::new(3, 20).min_pairs(), 25);
    }
}
