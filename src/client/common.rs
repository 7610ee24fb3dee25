// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

/// One received datagram, routed raw to the request that owns its
/// sequence number. Decoding happens on the request's own task so the
/// receive loop never blocks on a slow consumer.
#[derive(Debug, Clone)]
pub(crate) struct RawScp {
    pub datagram: Bytes,
}
