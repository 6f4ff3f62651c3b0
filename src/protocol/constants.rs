//! UAVTalk wire constants

/// Marker byte that starts every frame
pub const SYNC_BYTE: u8 = 0x3C;

/// Protocol version tag OR'd into the command byte
pub const VERSION_MASK: u8 = 0x20;

/// sync(1) + cmd(1) + length(2) + object ID(4)
pub const HEADER_LENGTH: usize = 8;

/// Instance ID, present only on multi-instance objects
pub const INSTANCE_ID_LENGTH: usize = 2;

/// Trailing CRC-8
pub const CHECKSUM_LENGTH: usize = 1;

/// Largest payload the flight controller accepts
pub const MAX_PAYLOAD_LENGTH: usize = 256;

/// Largest value of the length field (header through payload, checksum excluded)
pub const MAX_FRAME_LENGTH: usize = HEADER_LENGTH + INSTANCE_ID_LENGTH + MAX_PAYLOAD_LENGTH;

/// Offset of the length field from the sync byte
pub(crate) const LENGTH_OFFSET: usize = 2;
