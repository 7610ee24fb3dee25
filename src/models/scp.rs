// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16,
    Unaligned,
};

use crate::models::{
    common::{
        CodecError, HEADER_LEN, MAX_ARGS, SCP_HEADER_LEN, SDP_HEADER_LEN, SDP_PAD_LEN,
        SEQ_OFFSET,
    },
    sdp::SdpHeader,
};

/// The 4-byte SCP header that follows the SDP header.
///
/// On a request `cmd_rc` carries the command code; on a response it carries
/// the result code. The sequence number is echoed by the peer and is what
/// the receive path demultiplexes on.
#[repr(C)]
#[derive(
    Debug, Default, Clone, PartialEq, Eq, ZFromBytes, IntoBytes, KnownLayout,
    Immutable, Unaligned,
)]
pub struct ScpHeader {
    pub cmd_rc: U16<LittleEndian>, // 0..2
    pub seq: U16<LittleEndian>,    // 2..4
}

/// One logical SCP command before it is assigned a sequence number.
///
/// `pack` serialises the full datagram with the sequence field zeroed; the
/// transport stamps the allocated sequence with [`write_seq`] just before
/// first transmit. The packed buffer is owned by the request for its whole
/// lifetime, so retransmissions reuse it byte-for-byte.
#[derive(Debug, Clone)]
pub struct ScpRequest {
    pub dest_addr: u16,
    pub dest_cpu: u8,
    pub cmd: u16,
    pub n_args: usize,
    pub args: [u32; MAX_ARGS],
    pub data: Bytes,
}

impl ScpRequest {
    pub fn new(dest_addr: u16, dest_cpu: u8, cmd: u16, args: &[u32], data: Bytes) -> Self {
        let mut fixed = [0u32; MAX_ARGS];
        let n_args = args.len().min(MAX_ARGS);
        fixed[..n_args].copy_from_slice(&args[..n_args]);
        Self {
            dest_addr,
            dest_cpu,
            cmd,
            n_args: args.len(),
            args: fixed,
            data,
        }
    }

    /// Serialises the datagram: pad, SDP header, SCP header, `n_args`
    /// little-endian argument words, then the data segment.
    pub fn pack(&self, scp_data_length: usize) -> Result<BytesMut, CodecError> {
        if self.n_args > MAX_ARGS {
            return Err(CodecError::TooManyArgs { n: self.n_args });
        }
        if self.data.len() > scp_data_length {
            return Err(CodecError::DataTooLong {
                len: self.data.len(),
                max: scp_data_length,
            });
        }

        let mut buf =
            BytesMut::with_capacity(HEADER_LEN + 4 * self.n_args + self.data.len());
        buf.put_bytes(0, SDP_PAD_LEN);
        buf.put_slice(SdpHeader::for_request(self.dest_addr, self.dest_cpu).as_bytes());
        buf.put_slice(
            ScpHeader {
                cmd_rc: U16::new(self.cmd),
                seq: U16::new(0),
            }
            .as_bytes(),
        );
        for arg in &self.args[..self.n_args] {
            buf.put_u32_le(*arg);
        }
        buf.put_slice(&self.data);
        Ok(buf)
    }
}

/// Stamps the sequence field of an already-packed datagram.
#[inline]
pub fn write_seq(packet: &mut [u8], seq: u16) {
    packet[SEQ_OFFSET..SEQ_OFFSET + 2].copy_from_slice(&seq.to_le_bytes());
}

/// Reads the sequence field of a received datagram without a full unpack.
/// Returns `None` when the datagram cannot hold one.
#[inline]
pub fn peek_seq(datagram: &[u8]) -> Option<u16> {
    let raw = datagram.get(SEQ_OFFSET..SEQ_OFFSET + 2)?;
    Some(u16::from_le_bytes([raw[0], raw[1]]))
}

/// A decoded SCP response.
#[derive(Debug, Clone)]
pub struct ScpResponse {
    pub cmd_rc: u16,
    pub seq: u16,
    /// Argument words actually present, capped by the caller's expectation.
    pub n_args: usize,
    /// Words beyond `n_args` read as zero.
    pub args: [u32; MAX_ARGS],
    /// Data segment view starting after the last argument word.
    pub data: Bytes,
}

impl ScpResponse {
    /// Decodes a received datagram.
    ///
    /// `n_args_max` is how many argument words the issued command expects
    /// back; fewer may be present when the datagram is short, and the data
    /// view starts after whichever count is smaller.
    pub fn unpack(datagram: &Bytes, n_args_max: usize) -> Result<Self, CodecError> {
        if datagram.len() < HEADER_LEN {
            return Err(CodecError::ShortDatagram {
                len: datagram.len(),
                need: HEADER_LEN,
            });
        }

        let scp_at = SDP_PAD_LEN + SDP_HEADER_LEN;
        let header = ScpHeader::read_from_bytes(&datagram[scp_at..scp_at + SCP_HEADER_LEN])
            .map_err(|_| CodecError::ShortDatagram {
                len: datagram.len(),
                need: HEADER_LEN,
            })?;

        let body = &datagram[HEADER_LEN..];
        let n_args = n_args_max.min(MAX_ARGS).min(body.len() / 4);
        let mut args = [0u32; MAX_ARGS];
        for (i, arg) in args.iter_mut().enumerate().take(n_args) {
            let off = i * 4;
            *arg = u32::from_le_bytes([
                body[off],
                body[off + 1],
                body[off + 2],
                body[off + 3],
            ]);
        }

        Ok(Self {
            cmd_rc: header.cmd_rc.get(),
            seq: header.seq.get(),
            n_args,
            args,
            data: datagram.slice(HEADER_LEN + 4 * n_args..),
        })
    }
}
