// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16,
    Unaligned,
};

/// SDP flags byte: a reply is expected and should be routed back to us.
pub const FLAG_REPLY_EXPECTED: u8 = 0x87;

/// SDP flags byte: fire-and-forget, the peer must not answer.
pub const FLAG_NO_REPLY: u8 = 0x07;

/// Transient IP tag for traffic that originates off-machine; the monitor
/// fills in the return route from the UDP source address.
pub const TAG_TRANSIENT: u8 = 0xff;

/// SDP port the monitor processor services SCP on.
pub const PORT_SCAMP: u8 = 0;

/// Packs an SDP port (0..=7) and a virtual CPU id (0..=31) into the single
/// port/CPU byte of the SDP header.
#[inline]
pub const fn port_cpu(port: u8, cpu: u8) -> u8 {
    ((port & 0x07) << 5) | (cpu & 0x1f)
}

/// Packs chip coordinates into the 16-bit chip address (`x` in the high
/// byte, `y` in the low byte).
#[inline]
pub const fn chip_addr(x: u8, y: u8) -> u16 {
    ((x as u16) << 8) | y as u16
}

/// The 8-byte SDP header.
///
/// All multi-byte fields are little-endian on the wire; `Unaligned` keeps
/// the struct readable at any buffer offset.
#[repr(C)]
#[derive(
    Debug, Default, Clone, PartialEq, Eq, ZFromBytes, IntoBytes, KnownLayout,
    Immutable, Unaligned,
)]
pub struct SdpHeader {
    pub flags: u8,                    // 0
    pub tag: u8,                      // 1
    pub dest_port_cpu: u8,            // 2
    pub srce_port_cpu: u8,            // 3
    pub dest_addr: U16<LittleEndian>, // 4..6
    pub srce_addr: U16<LittleEndian>, // 6..8
}

impl SdpHeader {
    /// Header for an outbound command to the monitor port of `(dest_addr,
    /// dest_cpu)`, with the source fields describing off-machine origin.
    pub fn for_request(dest_addr: u16, dest_cpu: u8) -> Self {
        Self {
            flags: FLAG_REPLY_EXPECTED,
            tag: TAG_TRANSIENT,
            dest_port_cpu: port_cpu(PORT_SCAMP, dest_cpu),
            srce_port_cpu: port_cpu(7, 31),
            dest_addr: U16::new(dest_addr),
            srce_addr: U16::new(0),
        }
    }
}
