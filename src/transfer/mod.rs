// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod segments;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::task::JoinSet;
use tracing::debug;

use crate::{
    client::connection::ScpConnection,
    error::ScpError,
    models::{
        command::{AccessMode, ScpCommand},
        common::CodecError,
    },
    transfer::segments::{Segment, plan},
};

impl ScpConnection {
    /// Reads `len` bytes of remote memory starting at `addr` on
    /// `(dest_addr, dest_cpu)`.
    ///
    /// The transfer is segmented into exchanges of at most
    /// `scp_data_length` bytes, issued concurrently through the window.
    /// Segments may complete in any order; each copies into its own
    /// disjoint range of the result, so reordering is harmless. If a
    /// segment fails, the remaining segments still run to completion and
    /// the first error observed is returned.
    pub async fn read(
        self: &Arc<Self>,
        dest_addr: u16,
        dest_cpu: u8,
        addr: u32,
        len: usize,
    ) -> Result<Bytes, ScpError> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::zeroed(len);
        let mut set: JoinSet<Result<(Segment, Bytes), ScpError>> = JoinSet::new();

        for seg in plan(len, self.link.scp_data_length) {
            let conn = Arc::clone(self);
            set.spawn(async move {
                let seg_addr = addr.wrapping_add(seg.offset as u32);
                let mode = AccessMode::for_transfer(seg_addr, seg.len as u32);
                let resp = conn
                    .send_scp(
                        dest_addr,
                        dest_cpu,
                        ScpCommand::Read.code(),
                        &[seg_addr, seg.len as u32, mode.arg()],
                        Bytes::new(),
                        0,
                    )
                    .await?;
                resp.check()?;
                if resp.data.len() < seg.len {
                    return Err(ScpError::Codec(CodecError::ShortDatagram {
                        len: resp.data.len(),
                        need: seg.len,
                    }));
                }
                Ok((seg, resp.data.slice(..seg.len)))
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((seg, data))) => {
                    out[seg.offset..seg.offset + seg.len].copy_from_slice(&data);
                },
                Ok(Err(e)) => {
                    debug!("read segment failed: {e}");
                    first_error.get_or_insert(e);
                },
                // A joined task only errors if it was torn down mid-flight.
                Err(_) => {
                    first_error.get_or_insert(ScpError::Cancelled);
                },
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(out.freeze()),
        }
    }

    /// Writes `data` to remote memory starting at `addr` on
    /// `(dest_addr, dest_cpu)`.
    ///
    /// Segmentation and error collapse follow [`ScpConnection::read`];
    /// per-segment sources are zero-copy slices of `data`.
    pub async fn write(
        self: &Arc<Self>,
        dest_addr: u16,
        dest_cpu: u8,
        addr: u32,
        data: Bytes,
    ) -> Result<(), ScpError> {
        if data.is_empty() {
            return Ok(());
        }

        let mut set: JoinSet<Result<(), ScpError>> = JoinSet::new();

        for seg in plan(data.len(), self.link.scp_data_length) {
            let conn = Arc::clone(self);
            let chunk = data.slice(seg.offset..seg.offset + seg.len);
            set.spawn(async move {
                let seg_addr = addr.wrapping_add(seg.offset as u32);
                let mode = AccessMode::for_transfer(seg_addr, seg.len as u32);
                conn.send_scp(
                    dest_addr,
                    dest_cpu,
                    ScpCommand::Write.code(),
                    &[seg_addr, seg.len as u32, mode.arg()],
                    chunk,
                    0,
                )
                .await?
                .check()?;
                Ok(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(())) => {},
                Ok(Err(e)) => {
                    debug!("write segment failed: {e}");
                    first_error.get_or_insert(e);
                },
                Err(_) => {
                    first_error.get_or_insert(ScpError::Cancelled);
                },
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
