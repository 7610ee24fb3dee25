// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

/// UDP port the machine's monitor firmware listens on for SCP.
pub const SCP_PORT: u16 = 17893;

/// Two zero bytes of padding precede the SDP header in every UDP frame.
pub const SDP_PAD_LEN: usize = 2;

/// Fixed SDP header: flags, IP tag, port/CPU bytes, chip addresses.
pub const SDP_HEADER_LEN: usize = 8;

/// Fixed SCP header: `cmd_rc` and `seq`, both 16-bit little-endian.
pub const SCP_HEADER_LEN: usize = 4;

/// Fixed prefix of every SCP datagram (pad + SDP + SCP headers).
pub const HEADER_LEN: usize = SDP_PAD_LEN + SDP_HEADER_LEN + SCP_HEADER_LEN;

/// Byte offset of the 16-bit sequence field inside a packed datagram.
pub const SEQ_OFFSET: usize = SDP_PAD_LEN + SDP_HEADER_LEN + 2;

/// A command or response carries at most this many 32-bit argument words.
pub const MAX_ARGS: usize = 3;

/// Payload cap used when the peer has not advertised another one.
pub const DEFAULT_SCP_DATA_LENGTH: usize = 256;

/// Errors produced while packing or unpacking SCP datagrams.
///
/// Unpacking fails only on buffers shorter than the fixed header; every
/// other byte pattern is accepted and interpreted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("datagram too short: {len} bytes, need at least {need}")]
    ShortDatagram { len: usize, need: usize },

    #[error("data segment of {len} bytes exceeds the {max}-byte limit")]
    DataTooLong { len: usize, max: usize },

    #[error("{n} argument words requested, at most {MAX_ARGS} fit")]
    TooManyArgs { n: usize },
}
