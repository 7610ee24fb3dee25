// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::models::{command::RC_OK, common::CodecError, scp::ScpResponse};

/// Errors a request can resolve with.
///
/// A response whose `cmd_rc` is not [`RC_OK`] is *not* an error at the
/// transport layer: `send_scp` hands it back as a normal [`ScpResponse`]
/// and the caller inspects the code, via [`ScpResponse::check`] when the
/// command is only useful on success (the bulk engine does exactly that).
#[derive(Debug, Error)]
pub enum ScpError {
    /// The retry budget was exhausted without a matching response.
    #[error("no response after {attempts} transmissions")]
    Timeout { attempts: u32 },

    /// A UDP send failed at the socket.
    #[error("transport failure: {0}")]
    Transport(#[source] std::io::Error),

    /// The connection was freed while the request was queued or in flight.
    #[error("connection freed while request pending")]
    Cancelled,

    /// The peer answered with a non-OK response code.
    #[error("peer returned cmd_rc={cmd_rc:#06x}")]
    Protocol { cmd_rc: u16 },

    /// The request could not be serialised, or a response did not carry
    /// what the issued command requires.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ScpResponse {
    /// Maps a non-OK response code to [`ScpError::Protocol`].
    pub fn check(&self) -> Result<&Self, ScpError> {
        if self.cmd_rc == RC_OK {
            Ok(self)
        } else {
            Err(ScpError::Protocol {
                cmd_rc: self.cmd_rc,
            })
        }
    }
}
