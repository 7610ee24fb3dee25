// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use scp_client_rs::transfer::segments::{Segment, plan};

#[test]
fn partitions_the_buffer_in_order() {
    let segs: Vec<Segment> = plan(1000, 256).collect();
    assert_eq!(segs.len(), 4);

    let mut expected_offset = 0;
    for seg in &segs {
        assert_eq!(seg.offset, expected_offset);
        assert!(seg.len >= 1 && seg.len <= 256);
        expected_offset += seg.len;
    }
    assert_eq!(expected_offset, 1000);
    assert_eq!(segs.last().map(|s| s.len), Some(1000 - 3 * 256));
}

#[test]
fn segment_count_is_len_over_chunk_rounded_up() {
    for (len, chunk, n) in [
        (0usize, 256usize, 0usize),
        (1, 256, 1),
        (255, 256, 1),
        (256, 256, 1),
        (257, 256, 2),
        (128 * 1024, 256, 512),
        (5, 1, 5),
    ] {
        let segs: Vec<Segment> = plan(len, chunk).collect();
        assert_eq!(segs.len(), n, "len={len} chunk={chunk}");
        assert_eq!(segs.iter().map(|s| s.len).sum::<usize>(), len);
    }
}

#[test]
fn exact_size_matches_collected_count() {
    let it = plan(1000, 300);
    assert_eq!(it.len(), 4);
    assert_eq!(it.count(), 4);
}
