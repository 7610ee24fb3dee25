// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use scp_client_rs::{
    client::connection::ScpConnection,
    error::ScpError,
    models::command::{RC_OK, ScpCommand},
};
use serial_test::serial;
use tokio::time::Instant;

use crate::integration_tests::common::{MockPeer, PeerOptions, link};

#[tokio::test]
#[serial]
async fn success_on_the_third_attempt_when_two_are_lost() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions {
        drop_per_seq: 2,
        ..PeerOptions::default()
    })
    .await;
    let timeout = Duration::from_millis(80);
    let conn = ScpConnection::connect_addr(peer.addr(), link(timeout, 5, 4)).await?;

    let started = Instant::now();
    let resp = conn
        .send_scp(0, 0, ScpCommand::Ver.code(), &[0, 0, 0], Bytes::new(), 3)
        .await?;
    let elapsed = started.elapsed();

    assert_eq!(resp.cmd_rc, RC_OK);
    // Two whole attempt timeouts pass before the third transmit gets
    // through; the answer itself is near-instant on loopback.
    assert!(elapsed >= 2 * timeout - Duration::from_millis(5), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");

    conn.free().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn timeout_after_the_retry_budget_is_spent() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions {
        drop_all: true,
        ..PeerOptions::default()
    })
    .await;
    let timeout = Duration::from_millis(50);
    let conn = ScpConnection::connect_addr(peer.addr(), link(timeout, 3, 4)).await?;

    let started = Instant::now();
    let err = conn
        .send_scp(0, 0, ScpCommand::Ver.code(), &[0, 0, 0], Bytes::new(), 3)
        .await
        .expect_err("nothing ever answers");
    let elapsed = started.elapsed();

    assert!(matches!(err, ScpError::Timeout { attempts: 3 }), "{err:?}");
    assert!(elapsed >= 3 * timeout - Duration::from_millis(5), "{elapsed:?}");

    conn.free().await;
    Ok(())
}

#[tokio::test]
#[serial]
async fn a_late_response_to_an_early_attempt_still_matches() -> Result<()> {
    // The peer answers only after the first datagram has been followed by
    // a retransmission; both carry the same sequence, so whichever answer
    // lands resolves the request exactly once.
    let peer = MockPeer::spawn(PeerOptions {
        drop_per_seq: 1,
        ..PeerOptions::default()
    })
    .await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(60), 4, 4),
    )
    .await?;

    let resp = conn
        .send_scp(0, 0, ScpCommand::Ver.code(), &[0, 0, 0], Bytes::new(), 3)
        .await?;
    assert_eq!(resp.cmd_rc, RC_OK);

    conn.free().await;
    Ok(())
}
