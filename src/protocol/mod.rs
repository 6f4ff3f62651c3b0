//! UAVTalk framing
//!
//! # Read path
//!
//! ```text
//!   link bytes ──► FrameScanner ──► Frame(Bytes) ──► Packet::decode ──► Packet
//!   (any chunk)    sync / length /        │            (registry lookup,
//!                  crc8                   │             payload decode)
//!                       │                 │
//!                       └──► Corrupt(Bytes) ──► logged, skipped
//! ```
//!
//! # Write path
//!
//! ```text
//!   Packet ──► Packet::encode ──► header | instance | payload | crc8 ──► link
//! ```
//!
//! The scanner knows nothing about object layouts. Everything past the
//! object ID is interpreted by [`Packet`] using the schema registry.

pub mod constants;
pub mod crc;
pub mod packet;
pub mod scanner;

pub use packet::{hex_dump, Cmd, Packet};
pub use scanner::{scan, FrameScanner, ScanEvent, ScanResult, ScannerStats};
