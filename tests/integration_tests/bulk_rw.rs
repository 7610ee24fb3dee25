// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use scp_client_rs::{client::connection::ScpConnection, error::ScpError};

use crate::integration_tests::common::{
    MEM_BASE, MEM_SIZE, MockPeer, PeerOptions, RC_BAD_ARGS, link,
};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8).collect()
}

#[tokio::test]
async fn write_then_read_round_trips_128k() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions::default()).await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(500), 5, 8),
    )
    .await?;

    // 128 KiB over a 256-byte segment cap: 512 segments through a window
    // of 8.
    let data = pattern(128 * 1024);
    conn.write(0, 0, MEM_BASE, Bytes::from(data.clone())).await?;
    assert_eq!(peer.peek(MEM_BASE, data.len()), data);

    let back = conn.read(0, 0, MEM_BASE, data.len()).await?;
    assert_eq!(&back[..], &data[..]);

    conn.free().await;
    Ok(())
}

#[tokio::test]
async fn read_reassembles_segments_answered_in_reverse() -> Result<()> {
    // Four segments; the peer answers the earliest arrival last.
    let peer = MockPeer::spawn(PeerOptions {
        reverse_first: 4,
        ..PeerOptions::default()
    })
    .await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(500), 2, 4),
    )
    .await?;

    let image = pattern(1024);
    peer.poke(MEM_BASE, &image);

    let back = conn.read(0, 0, MEM_BASE, image.len()).await?;
    assert_eq!(&back[..], &image[..]);

    conn.free().await;
    Ok(())
}

#[tokio::test]
async fn window_of_one_issues_segments_in_order() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions::default()).await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(500), 3, 1),
    )
    .await?;

    conn.write(0, 0, MEM_BASE, Bytes::from(pattern(8 * 256))).await?;

    let log = peer.write_log.lock().expect("write log lock").clone();
    assert_eq!(log.len(), 8);
    assert!(log.windows(2).all(|w| w[0] <= w[1]), "{log:?}");

    conn.free().await;
    Ok(())
}

#[tokio::test]
async fn a_failing_segment_collapses_to_a_single_error() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions::default()).await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(500), 3, 4),
    )
    .await?;

    // First segment lands exactly on the end of the image, the second
    // falls outside and is refused by the peer.
    let addr = MEM_BASE + (MEM_SIZE as u32) - 256;
    let err = conn
        .write(0, 0, addr, Bytes::from(pattern(512)))
        .await
        .expect_err("second segment is out of range");
    assert!(
        matches!(err, ScpError::Protocol { cmd_rc } if cmd_rc == RC_BAD_ARGS),
        "{err:?}"
    );

    // The in-range segment still completed internally.
    assert_eq!(peer.peek(addr, 256), pattern(512)[..256].to_vec());

    conn.free().await;
    Ok(())
}

#[tokio::test]
async fn zero_length_transfers_complete_without_wire_traffic() -> Result<()> {
    let peer = MockPeer::spawn(PeerOptions::default()).await;
    let conn = ScpConnection::connect_addr(
        peer.addr(),
        link(Duration::from_millis(200), 3, 4),
    )
    .await?;

    let empty = conn.read(0, 0, MEM_BASE, 0).await?;
    assert!(empty.is_empty());
    conn.write(0, 0, MEM_BASE, Bytes::new()).await?;
    assert!(peer.write_log.lock().expect("write log lock").is_empty());

    conn.free().await;
    Ok(())
}
