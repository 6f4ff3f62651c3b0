//! UAVTalk packets
//!
//! Frame layout:
//! ```text
//! +------+-----+--------+-----------+-------------+-----------+-----+
//! | sync | cmd | length | object ID | instance ID | payload   | crc |
//! | 0x3C | |0x20| u16 LE | u32 LE    | u16 LE      | N bytes   | u8  |
//! +------+-----+--------+-----------+-------------+-----------+-----+
//!    1      1      2         4        0 or 2        0 or N      1
//! ```
//!
//! `length` counts every byte from the sync byte through the payload; the
//! checksum byte is not included. The instance ID is present only for
//! multi-instance objects and the payload only for `Cmd`/`CmdWithAck`.

use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::*;
use super::crc;
use crate::codec::{decode_payload, encode_payload, ObjectData};
use crate::error::{CodecError, FrameError};
use crate::schema::{Definition, SchemaRegistry};

/// Packet command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cmd {
    /// Object data, no acknowledgement wanted
    Cmd = 0,
    /// Request for object data
    Request = 1,
    /// Object data, acknowledgement wanted
    CmdWithAck = 2,
    /// Acknowledgement of a `CmdWithAck`
    Ack = 3,
    /// Negative acknowledgement
    Nack = 4,
}

impl Cmd {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Cmd::Cmd),
            1 => Some(Cmd::Request),
            2 => Some(Cmd::CmdWithAck),
            3 => Some(Cmd::Ack),
            4 => Some(Cmd::Nack),
            _ => None,
        }
    }

    /// Whether frames with this command carry a payload
    pub fn has_payload(self) -> bool {
        matches!(self, Cmd::Cmd | Cmd::CmdWithAck)
    }
}

/// Logical content of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    definition: Arc<Definition>,
    cmd: Cmd,
    instance_id: u16,
    data: ObjectData,
}

impl Packet {
    /// Build a packet for the write path
    ///
    /// `instance_id` is ignored for single-instance objects and `data` is
    /// ignored for commands without a payload.
    pub fn new(definition: Arc<Definition>, cmd: Cmd, instance_id: u16, data: ObjectData) -> Self {
        let instance_id = if definition.single_instance() {
            0
        } else {
            instance_id
        };
        let data = if cmd.has_payload() {
            data
        } else {
            ObjectData::new()
        };
        Self {
            definition,
            cmd,
            instance_id,
            data,
        }
    }

    /// Object data packet
    pub fn object(definition: Arc<Definition>, instance_id: u16, data: ObjectData) -> Self {
        Self::new(definition, Cmd::Cmd, instance_id, data)
    }

    /// Request for object data
    pub fn request(definition: Arc<Definition>, instance_id: u16) -> Self {
        Self::new(definition, Cmd::Request, instance_id, ObjectData::new())
    }

    /// Acknowledgement
    pub fn ack(definition: Arc<Definition>, instance_id: u16) -> Self {
        Self::new(definition, Cmd::Ack, instance_id, ObjectData::new())
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn object_id(&self) -> u32 {
        self.definition.object_id()
    }

    pub fn cmd(&self) -> Cmd {
        self.cmd
    }

    pub fn instance_id(&self) -> u16 {
        self.instance_id
    }

    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    /// Consume into the decoded data
    pub fn into_data(self) -> ObjectData {
        self.data
    }

    /// Value of the length field for this packet
    pub fn length(&self) -> usize {
        expected_length(&self.definition, self.cmd)
    }

    /// Encode into a complete frame, checksum included
    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let length = self.length();
        let wire_length = match u16::try_from(length) {
            Ok(n) if length <= MAX_FRAME_LENGTH => n,
            _ => {
                return Err(CodecError::FrameTooLarge {
                    length,
                    max: MAX_FRAME_LENGTH,
                })
            }
        };
        let mut buf = BytesMut::with_capacity(length + CHECKSUM_LENGTH);

        buf.put_u8(SYNC_BYTE);
        buf.put_u8(self.cmd as u8 | VERSION_MASK);
        buf.put_u16_le(wire_length);
        buf.put_u32_le(self.definition.object_id());

        if !self.definition.single_instance() {
            buf.put_u16_le(self.instance_id);
        }

        if self.cmd.has_payload() {
            let payload = encode_payload(&self.definition, &self.data)?;
            buf.put_slice(&payload);
        }

        let checksum = crc::crc8(&buf);
        buf.put_u8(checksum);

        Ok(buf.freeze())
    }

    /// Decode a frame extracted by the scanner
    ///
    /// The checksum is verified by the scanner and not checked again here.
    /// The object ID must be known to `registry`, since the instance ID and
    /// payload layout depend on the definition.
    pub fn decode(frame: &[u8], registry: &SchemaRegistry) -> Result<Self, FrameError> {
        if frame.len() < HEADER_LENGTH + CHECKSUM_LENGTH {
            return Err(FrameError::TooShort(frame.len()));
        }

        let mut header = &frame[1..HEADER_LENGTH];
        let cmd_byte = header.get_u8() & !VERSION_MASK;
        let length = usize::from(header.get_u16_le());
        let object_id = header.get_u32_le();

        let cmd = Cmd::from_u8(cmd_byte).ok_or(FrameError::UnknownCommand(cmd_byte))?;
        let definition = registry
            .get(object_id)
            .ok_or(FrameError::UnknownObjectId(object_id))?;

        let expected = expected_length(&definition, cmd);
        if length != expected || frame.len() != expected + CHECKSUM_LENGTH {
            return Err(FrameError::LengthMismatch {
                object_id,
                expected,
                actual: length,
            });
        }

        let mut body = &frame[HEADER_LENGTH..expected];
        let instance_id = if definition.single_instance() {
            0
        } else {
            body.get_u16_le()
        };

        let data = if cmd.has_payload() {
            decode_payload(&definition, body)?
        } else {
            ObjectData::new()
        };

        Ok(Self {
            definition,
            cmd,
            instance_id,
            data,
        })
    }
}

fn expected_length(definition: &Definition, cmd: Cmd) -> usize {
    let mut length = HEADER_LENGTH;
    if !definition.single_instance() {
        length += INSTANCE_ID_LENGTH;
    }
    if cmd.has_payload() {
        length += definition.byte_length();
    }
    length
}

/// Space-separated hex dump for diagnostics
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Value;
    use crate::schema::{DefinitionSource, FieldSource};

    fn registry() -> SchemaRegistry {
        let home = DefinitionSource::new("HomeLocation")
            .object_id(0xCA32_B032)
            .single_instance(true)
            .field(FieldSource::new("Latitude", "float32"))
            .field(FieldSource::new("Longitude", "float32"))
            .field(FieldSource::new("Altitude", "float32"))
            .resolve()
            .unwrap();
        let waypoint = DefinitionSource::new("Waypoint")
            .object_id(0x1000)
            .field(FieldSource::new("Position", "float").element_names(["North", "East", "Down"]))
            .field(FieldSource::new("Action", "enum").options(["Hold", "Land"]))
            .resolve()
            .unwrap();
        SchemaRegistry::from_definitions([home, waypoint]).unwrap()
    }

    fn home_data() -> ObjectData {
        ["Latitude", "Longitude", "Altitude"]
            .into_iter()
            .map(|name| (name.to_string(), Value::Float32(0.0)))
            .collect()
    }

    #[test]
    fn test_home_location_frame() {
        let registry = registry();
        let def = registry.get(0xCA32_B032).unwrap();
        let packet = Packet::object(def, 0, home_data());

        let frame = packet.encode().unwrap();
        assert_eq!(frame.len(), 21);
        assert_eq!(
            &frame[..8],
            &[0x3C, 0x20, 0x14, 0x00, 0x32, 0xB0, 0x32, 0xCA]
        );
        assert_eq!(&frame[8..20], &[0u8; 12]);
        assert_eq!(frame[20], 0x1E);

        let decoded = Packet::decode(&frame, &registry).unwrap();
        assert_eq!(decoded.cmd(), Cmd::Cmd);
        assert_eq!(decoded.data(), &home_data());
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_multi_instance_round_trip() {
        let registry = registry();
        let def = registry.get(0x1000).unwrap();
        let mut data = ObjectData::new();
        data.insert("Position".into(), Value::from(vec![1.5f32, -2.0, 10.0]));
        data.insert("Action".into(), Value::Enum("Land".into()));

        let packet = Packet::new(def, Cmd::CmdWithAck, 7, data);
        let frame = packet.encode().unwrap();
        assert_eq!(frame.len(), 8 + 2 + 13 + 1);
        assert_eq!(frame[1], 0x22);
        assert_eq!(&frame[8..10], &[7, 0]);

        let decoded = Packet::decode(&frame, &registry).unwrap();
        assert_eq!(decoded.instance_id(), 7);
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_request_has_no_payload() {
        let registry = registry();
        let def = registry.get(0x1000).unwrap();
        let packet = Packet::new(def, Cmd::Request, 3, home_data());
        assert!(packet.data().is_empty());

        let frame = packet.encode().unwrap();
        assert_eq!(frame.len(), 11);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 10);

        let decoded = Packet::decode(&frame, &registry).unwrap();
        assert_eq!(decoded.cmd(), Cmd::Request);
        assert_eq!(decoded.instance_id(), 3);
    }

    #[test]
    fn test_single_instance_ignores_instance_id() {
        let registry = registry();
        let def = registry.get(0xCA32_B032).unwrap();
        let packet = Packet::ack(def, 9);
        assert_eq!(packet.instance_id(), 0);
        assert_eq!(packet.encode().unwrap().len(), 9);
    }

    #[test]
    fn test_unknown_object_id() {
        let registry = registry();
        let mut frame = vec![0x3C, 0x21, 0x08, 0x00, 0xEF, 0xBE, 0xAD, 0xDE];
        frame.push(crc::crc8(&frame));
        assert_eq!(
            Packet::decode(&frame, &registry),
            Err(FrameError::UnknownObjectId(0xDEAD_BEEF))
        );
    }

    #[test]
    fn test_unknown_command() {
        let registry = registry();
        let mut frame = vec![0x3C, 0x27, 0x08, 0x00, 0x32, 0xB0, 0x32, 0xCA];
        frame.push(crc::crc8(&frame));
        assert_eq!(
            Packet::decode(&frame, &registry),
            Err(FrameError::UnknownCommand(0x07))
        );
    }

    #[test]
    fn test_length_mismatch() {
        let registry = registry();
        // Cmd for HomeLocation needs a 12 byte payload, length says none
        let mut frame = vec![0x3C, 0x20, 0x08, 0x00, 0x32, 0xB0, 0x32, 0xCA];
        frame.push(crc::crc8(&frame));
        assert!(matches!(
            Packet::decode(&frame, &registry),
            Err(FrameError::LengthMismatch {
                expected: 20,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            Packet::decode(&[0x3C, 0x20, 0x08], &registry()),
            Err(FrameError::TooShort(3))
        );
    }

    #[test]
    fn test_encode_missing_field() {
        let registry = registry();
        let def = registry.get(0xCA32_B032).unwrap();
        let packet = Packet::object(def, 0, ObjectData::new());
        assert_eq!(
            packet.encode(),
            Err(CodecError::MissingField("Latitude".into()))
        );
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x3C, 0x0A, 0xFF]), "3C 0A FF");
        assert_eq!(hex_dump(&[]), "");
    }
}
