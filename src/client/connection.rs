// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use anyhow::{Result, ensure};
use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::Semaphore,
    time::{Instant, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::{
    cfg::config::{Config, LinkConfig},
    client::{common::RawScp, pending::PendingTable},
    error::ScpError,
    models::{
        common::{HEADER_LEN, MAX_ARGS},
        scp::{self, ScpRequest, ScpResponse},
    },
};

/// How long `free` waits for in-flight request futures to observe the
/// cancellation before giving up on the drain.
const FREE_DRAIN_LIMIT: Duration = Duration::from_secs(1);
const FREE_DRAIN_STEP: Duration = Duration::from_millis(10);

/// A single SCP connection to a remote machine over UDP.
///
/// Owns the socket, the window of `n_outstanding` concurrent exchanges,
/// the sequence allocator, and the receive loop that routes responses back
/// to their requests. Requests beyond the window queue FIFO and are
/// dispatched as slots free up. All request state lives in the issuing
/// future, so dropping a request future releases its slot.
#[derive(Debug)]
pub struct ScpConnection {
    socket: UdpSocket,
    peer: SocketAddrV4,
    pub(crate) link: LinkConfig,
    window: Semaphore,
    pending: PendingTable,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl ScpConnection {
    /// Connects according to a loaded [`Config`].
    pub async fn connect(cfg: &Config) -> Result<Arc<Self>> {
        Self::connect_addr(cfg.socket_addr()?, cfg.link.clone()).await
    }

    /// Binds an ephemeral IPv4 port, connects it to `peer`, and spawns the
    /// receive loop. The peer is IPv4-only by protocol.
    pub async fn connect_addr(peer: SocketAddrV4, link: LinkConfig) -> Result<Arc<Self>> {
        ensure!(link.n_tries >= 1, "n_tries must be >= 1");
        ensure!(
            (1..=u16::MAX as usize).contains(&link.n_outstanding),
            "n_outstanding must be in 1..=65535"
        );

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(peer).await?;

        let conn = Arc::new(Self {
            socket,
            peer,
            window: Semaphore::new(link.n_outstanding),
            pending: PendingTable::new(rand::random::<u16>()),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            link,
        });

        let reader = Arc::clone(&conn);
        conn.tasks.spawn(async move { reader.read_loop().await });

        Ok(conn)
    }

    #[inline]
    pub fn peer(&self) -> SocketAddrV4 {
        self.peer
    }

    /// Largest data segment one exchange may carry.
    #[inline]
    pub fn scp_data_length(&self) -> usize {
        self.link.scp_data_length
    }

    /// True once `free` has begun; new requests are refused from then on.
    #[inline]
    pub fn freeing(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Issues one SCP command and awaits its response.
    ///
    /// Admission through the window is FIFO; the call never blocks the
    /// runtime, it just waits its turn. `args` holds up to three words;
    /// `n_args_resp` is how many words the response is expected to carry.
    /// The response is returned whatever its `cmd_rc`; callers that need
    /// success can chain [`ScpResponse::check`].
    pub async fn send_scp(
        &self,
        dest_addr: u16,
        dest_cpu: u8,
        cmd: u16,
        args: &[u32],
        data: Bytes,
        n_args_resp: usize,
    ) -> Result<ScpResponse, ScpError> {
        if self.cancel.is_cancelled() {
            return Err(ScpError::Cancelled);
        }

        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ScpError::Cancelled),
            permit = self.window.acquire() => {
                permit.map_err(|_| ScpError::Cancelled)?
            },
        };

        let req = ScpRequest::new(dest_addr, dest_cpu, cmd, args, data);
        self.exchange(&req, n_args_resp).await
    }

    /// The retry state machine of one exchange: transmit, wait for the
    /// matching response or the per-attempt timeout, retransmit up to the
    /// retry budget. The packed datagram is reused across attempts and the
    /// timer is armed only after a send has completed, so the buffer is
    /// never touched while the OS may still be reading it.
    async fn exchange(
        &self,
        req: &ScpRequest,
        n_args_resp: usize,
    ) -> Result<ScpResponse, ScpError> {
        let mut packet = req.pack(self.link.scp_data_length)?;
        let mut slot = self
            .pending
            .register()
            .ok_or_else(|| ScpError::Transport(std::io::Error::other(
                "sequence space exhausted",
            )))?;
        scp::write_seq(&mut packet, slot.seq());

        let mut attempts = 0u32;
        while attempts < self.link.n_tries {
            attempts += 1;
            if self.cancel.is_cancelled() {
                return Err(ScpError::Cancelled);
            }

            debug!(seq = slot.seq(), attempt = attempts, cmd = req.cmd, "transmit");
            self.socket
                .send(&packet)
                .await
                .map_err(ScpError::Transport)?;

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ScpError::Cancelled),
                _ = sleep(self.link.timeout) => {
                    debug!(seq = slot.seq(), attempt = attempts, "attempt timed out");
                },
                raw = slot.recv() => {
                    let Some(RawScp { datagram }) = raw else {
                        return Err(ScpError::Cancelled);
                    };
                    return Ok(ScpResponse::unpack(&datagram, n_args_resp)?);
                },
            }
        }

        Err(ScpError::Timeout { attempts })
    }

    /// Receive half of the connection: reads datagrams into a recycled
    /// scratch buffer and routes them by sequence number. Short, stray,
    /// and error deliveries are dropped after a debug log; retransmission
    /// papers over whatever caused them.
    async fn read_loop(self: Arc<Self>) {
        let mut scratch =
            vec![0u8; HEADER_LEN + 4 * MAX_ARGS + self.link.scp_data_length];

        loop {
            let n = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("read loop stopped");
                    return;
                },
                res = self.socket.recv(&mut scratch) => match res {
                    Ok(n) => n,
                    Err(e) => {
                        debug!("receive error dropped: {e}");
                        continue;
                    },
                },
            };

            if n < HEADER_LEN {
                debug!(len = n, "short datagram dropped");
                continue;
            }

            let datagram = Bytes::copy_from_slice(&scratch[..n]);
            let Some(seq) = scp::peek_seq(&datagram) else {
                continue;
            };
            if !self.pending.route(seq, RawScp { datagram }) {
                debug!(seq, "stray datagram dropped");
            }
        }
    }

    /// Initiates shutdown: every queued request is refused and every
    /// in-flight request resolves with [`ScpError::Cancelled`] at its next
    /// suspension point, after any send it has handed to the OS completes.
    /// Waits for the receive loop to exit and (bounded) for pending
    /// requests to drain. Idempotent. The socket itself closes when the
    /// last handle to the connection drops.
    pub async fn free(&self) {
        self.cancel.cancel();
        self.window.close();
        self.tasks.close();
        self.tasks.wait().await;

        let deadline = Instant::now() + FREE_DRAIN_LIMIT;
        while !self.pending.is_empty() {
            if Instant::now() >= deadline {
                warn!(left = self.pending.len(), "freed with requests still draining");
                return;
            }
            sleep(FREE_DRAIN_STEP).await;
        }
    }
}
