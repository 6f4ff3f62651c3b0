//! CRC-8 used to checksum frames
//!
//! Polynomial 0x07 (x^8 + x^2 + x + 1), initial value 0, no reflection and
//! no final XOR. This is the checksum used by the flight controller firmware.

use ::crc::{Crc, CRC_8_SMBUS};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Continue a CRC-8 over `data`
pub fn update(crc: u8, data: &[u8]) -> u8 {
    let mut digest = CRC8.digest_with_initial(crc);
    digest.update(data);
    digest.finalize()
}

/// CRC-8 of `data`
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}
