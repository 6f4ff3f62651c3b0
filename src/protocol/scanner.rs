//! Frame scanner
//!
//! Locates frames in a byte stream that may start mid-frame, carry line noise
//! or arrive split across reads. [`scan`] is the stateless search over a
//! buffer; [`FrameScanner`] owns the reassembly buffer and hands out whole
//! frames.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

use super::constants::*;
use super::crc;

/// Outcome of one scan over a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// No whole frame available yet
    Incomplete,
    /// A checksummed frame spans `[from, to)`
    Complete { from: usize, to: usize },
    /// A candidate frame spans `[from, to)` but is not valid
    Invalid { from: usize, to: usize },
}

/// Search `buf` for the first frame
///
/// A sync byte whose length field cannot describe a frame is reported as
/// `Invalid` covering only the sync byte, so the caller resumes the search at
/// the next byte.
pub fn scan(buf: &[u8]) -> ScanResult {
    let Some(from) = buf.iter().position(|&b| b == SYNC_BYTE) else {
        return ScanResult::Incomplete;
    };

    let length_at = from + LENGTH_OFFSET;
    if buf.len() < length_at + 2 {
        return ScanResult::Incomplete;
    }

    let length = usize::from(u16::from_le_bytes([buf[length_at], buf[length_at + 1]]));
    if !(HEADER_LENGTH..=MAX_FRAME_LENGTH).contains(&length) {
        return ScanResult::Invalid {
            from,
            to: from + 1,
        };
    }

    let to = from + length + CHECKSUM_LENGTH;
    if buf.len() < to {
        return ScanResult::Incomplete;
    }

    if crc::crc8(&buf[from..from + length]) == buf[from + length] {
        ScanResult::Complete { from, to }
    } else {
        ScanResult::Invalid { from, to }
    }
}

/// Item produced by [`FrameScanner::next_event`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A whole frame with a valid checksum
    Frame(Bytes),
    /// Bytes discarded as a corrupt frame
    Corrupt(Bytes),
}

/// Scanner counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScannerStats {
    pub frames: u64,
    pub corrupt: u64,
    /// Bytes dropped outside any frame: noise before a sync byte, or
    /// overflow of the buffer limit
    pub discarded: u64,
}

/// Reassembly buffer over [`scan`]
///
/// Bytes are consumed from the front once per extracted frame. Noise ahead of
/// the first sync byte is dropped as soon as it is seen, and the buffer never
/// grows past `max_buffer_size`. A push that would overflow the buffer first
/// extracts whatever frames it holds and queues them for [`next_event`], so
/// only bytes that cannot start a frame are ever dropped.
///
/// [`next_event`]: FrameScanner::next_event
#[derive(Debug)]
pub struct FrameScanner {
    buf: BytesMut,
    pending: VecDeque<ScanEvent>,
    max_buffer_size: usize,
    stats: ScannerStats,
}

impl FrameScanner {
    /// Create a scanner holding at most `max_buffer_size` bytes
    ///
    /// The limit is raised to one maximum-sized frame if it is smaller.
    pub fn new(max_buffer_size: usize) -> Self {
        let max_buffer_size = max_buffer_size.max(MAX_FRAME_LENGTH + CHECKSUM_LENGTH);
        Self {
            buf: BytesMut::with_capacity(max_buffer_size),
            pending: VecDeque::new(),
            max_buffer_size,
            stats: ScannerStats::default(),
        }
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);

        while self.buf.len() > self.max_buffer_size {
            if let Some(event) = self.scan_next() {
                self.pending.push_back(event);
                continue;
            }

            let excess = self.buf.len().saturating_sub(self.max_buffer_size);
            if excess > 0 {
                self.discard(excess);
                tracing::warn!(
                    dropped = excess,
                    limit = self.max_buffer_size,
                    "Scanner buffer full, dropping oldest bytes"
                );
            }
            break;
        }
    }

    /// Extract the next frame or corrupt candidate
    ///
    /// Returns `None` when more bytes are needed.
    pub fn next_event(&mut self) -> Option<ScanEvent> {
        self.pending.pop_front().or_else(|| self.scan_next())
    }

    fn scan_next(&mut self) -> Option<ScanEvent> {
        match scan(&self.buf) {
            ScanResult::Incomplete => {
                let noise = self
                    .buf
                    .iter()
                    .position(|&b| b == SYNC_BYTE)
                    .unwrap_or(self.buf.len());
                self.discard(noise);
                None
            }
            ScanResult::Complete { from, to } => {
                self.discard(from);
                self.stats.frames += 1;
                Some(ScanEvent::Frame(self.buf.split_to(to - from).freeze()))
            }
            ScanResult::Invalid { from, to } => {
                self.discard(from);
                self.stats.corrupt += 1;
                Some(ScanEvent::Corrupt(self.buf.split_to(to - from).freeze()))
            }
        }
    }

    /// Bytes held in the reassembly buffer, queued events excluded
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> ScannerStats {
        self.stats
    }

    fn discard(&mut self, count: usize) {
        if count > 0 {
            self.buf.advance(count);
            self.stats.discarded += count as u64;
        }
    }
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self::new(4096)
    }
}
