//! Link counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes read from the flight controller
    pub bytes_received: u64,
    /// Frames decoded and passed to the hub
    pub frames_received: u64,
    /// Frames written to the flight controller, acks included
    pub frames_sent: u64,
    /// Acks written
    pub acks_sent: u64,
    /// Frames with a bad checksum or impossible length
    pub corrupt_frames: u64,
    /// Frames for objects missing from the registry
    pub unknown_objects: u64,
    /// Checksummed frames that still failed to decode
    pub decode_errors: u64,
    /// Hub messages that could not be encoded
    pub encode_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct LinkCounters {
    pub bytes_received: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_sent: AtomicU64,
    pub acks_sent: AtomicU64,
    pub corrupt_frames: AtomicU64,
    pub unknown_objects: AtomicU64,
    pub decode_errors: AtomicU64,
    pub encode_errors: AtomicU64,
}

impl LinkCounters {
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            acks_sent: self.acks_sent.load(Ordering::Relaxed),
            corrupt_frames: self.corrupt_frames.load(Ordering::Relaxed),
            unknown_objects: self.unknown_objects.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
        }
    }
}
