// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Mutex;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::mpsc;

use crate::client::common::RawScp;

/// Datagrams buffered per pending request. Retransmission can provoke
/// duplicate responses; anything beyond this depth is a stray and is
/// dropped at the routing step.
const SLOT_QUEUE_DEPTH: usize = 4;

/// The set of requests currently awaiting a response, keyed by sequence
/// number. Doubles as the sequence allocator: `register` probes the
/// 16-bit space from a monotonic counter until it finds a free value, so
/// pending sequences are pairwise distinct by construction.
#[derive(Debug)]
pub(crate) struct PendingTable {
    entries: DashMap<u16, mpsc::Sender<RawScp>>,
    next_seq: Mutex<u16>,
}

impl PendingTable {
    pub fn new(initial_seq: u16) -> Self {
        Self {
            entries: DashMap::new(),
            next_seq: Mutex::new(initial_seq),
        }
    }

    /// Allocates a fresh sequence number and registers its delivery
    /// channel. Returns `None` only if the entire 16-bit space is pending,
    /// which the window cap rules out in any validated configuration.
    pub fn register(&self) -> Option<PendingSlot<'_>> {
        let mut next = match self.next_seq.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for _ in 0..=u16::MAX as u32 {
            let seq = *next;
            *next = next.wrapping_add(1);
            match self.entries.entry(seq) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(vacant) => {
                    let (tx, rx) = mpsc::channel(SLOT_QUEUE_DEPTH);
                    vacant.insert(tx);
                    return Some(PendingSlot {
                        table: self,
                        seq,
                        rx,
                    });
                },
            }
        }
        None
    }

    /// Hands a received datagram to the request pending on `seq`. Returns
    /// false when no such request exists (stray or long-gone response).
    pub fn route(&self, seq: u16, raw: RawScp) -> bool {
        match self.entries.get(&seq) {
            Some(tx) => tx.try_send(raw).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registered sequence number plus the receive side of its delivery
/// channel. Dropping the slot deregisters the sequence, so every exit
/// path of a request releases it for reuse.
#[derive(Debug)]
pub(crate) struct PendingSlot<'a> {
    table: &'a PendingTable,
    seq: u16,
    rx: mpsc::Receiver<RawScp>,
}

impl PendingSlot<'_> {
    #[inline]
    pub fn seq(&self) -> u16 {
        self.seq
    }

    pub async fn recv(&mut self) -> Option<RawScp> {
        self.rx.recv().await
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.table.entries.remove(&self.seq);
    }
}
