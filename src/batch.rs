//! Chunking of buffered data points across connections.
//!
//! A buffer of N points with a per-connection cap C is sent as
//! `ceil(N / C)` consecutive chunks, each in its own connection. Without a
//! cap (or with a cap of at least N) everything goes in one chunk.

use std::slice::Chunks;

use bytes::Bytes;

use crate::error::Result;
use crate::message::{DataPoint, SenderMessage};
use crate::protocol::encode_message;

/// Number of points per chunk for a buffer of `len` points.
///
/// `None`, or a cap of at least `len`, means a single chunk of `len`.
/// `Some(0)` means no chunks at all.
///
/// # Example
///
/// ```
/// use zabbix_sender::batch::effective_chunk_size;
///
/// assert_eq!(effective_chunk_size(10, None), 10);
/// assert_eq!(effective_chunk_size(10, Some(3)), 3);
/// assert_eq!(effective_chunk_size(10, Some(50)), 10);
/// assert_eq!(effective_chunk_size(10, Some(0)), 0);
/// ```
pub fn effective_chunk_size(len: usize, max_per_conn: Option<usize>) -> usize {
    match max_per_conn {
        Some(cap) if cap < len => cap,
        _ => len,
    }
}

/// Split `points` into consecutive chunks, preserving order.
///
/// Yields nothing for an empty slice or a zero cap.
pub fn partition(points: &[DataPoint], max_per_conn: Option<usize>) -> Chunks<'_, DataPoint> {
    // `chunks` panics on 0; an empty slice chunked by 1 yields nothing.
    let size = effective_chunk_size(points.len(), max_per_conn);
    let points = if size == 0 { &points[..0] } else { points };
    points.chunks(size.max(1))
}

/// Encode one framed `sender data` message per chunk.
///
/// Frames are built up front so the caller's buffer is no longer borrowed
/// once sending starts. A chunk that fails to encode keeps its position as an
/// `Err` so outcomes stay aligned with chunks.
pub fn encode_chunks(
    points: &[DataPoint],
    max_per_conn: Option<usize>,
    packet_clock: Option<i64>,
) -> Vec<Result<Bytes>> {
    partition(points, max_per_conn)
        .map(|chunk| encode_message(&SenderMessage::sender_data(chunk, packet_clock)))
        .collect()
}
