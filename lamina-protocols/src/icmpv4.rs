//! ICMPv4 message layer
//!
//! The checksum covers the message alone - no pseudo-header, unlike
//! ICMPv6.

use lamina_core::{checksum, endian, Result};
use lamina_core::ByteSlice;

use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// ICMPv4 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    EchoReply,
    DestinationUnreachable,
    SourceQuench,
    Redirect,
    EchoRequest,
    TimeExceeded,
    ParameterProblem,
    Timestamp,
    TimestampReply,
    Custom(u8),
}

impl IcmpType {
    pub fn to_u8(self) -> u8 {
        match self {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::SourceQuench => 4,
            IcmpType::Redirect => 5,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
            IcmpType::ParameterProblem => 12,
            IcmpType::Timestamp => 13,
            IcmpType::TimestampReply => 14,
            IcmpType::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            4 => IcmpType::SourceQuench,
            5 => IcmpType::Redirect,
            8 => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            12 => IcmpType::ParameterProblem,
            13 => IcmpType::Timestamp,
            14 => IcmpType::TimestampReply,
            val => IcmpType::Custom(val),
        }
    }
}

/// ICMPv4 message
#[derive(Debug)]
pub struct Icmpv4Packet {
    header: ByteSlice,
    payload: Payload,
}

impl Icmpv4Packet {
    /// Type, code, checksum and the 4-byte rest-of-header word
    pub const HEADER_SIZE: usize = 8;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));
        Ok(Self {
            header,
            payload: Payload::from_body(body),
        })
    }

    /// Synthesize an echo request
    pub fn echo_request(identifier: u16, sequence: u16) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0] = IcmpType::EchoRequest.to_u8();
        raw[4..6].copy_from_slice(&identifier.to_be_bytes());
        raw[6..8].copy_from_slice(&sequence.to_be_bytes());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn icmp_type(&self) -> Result<IcmpType> {
        Ok(IcmpType::from_u8(self.header.byte_at(0)?))
    }

    pub fn code(&self) -> Result<u8> {
        self.header.byte_at(1)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    /// Identifier of an echo message
    pub fn identifier(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    /// Sequence number of an echo message
    pub fn sequence(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 6)
    }

    pub fn set_icmp_type(&mut self, icmp_type: IcmpType) -> Result<()> {
        self.header.set_byte_at(0, icmp_type.to_u8())
    }

    pub fn set_code(&mut self, code: u8) -> Result<()> {
        self.header.set_byte_at(1, code)
    }

    pub fn set_identifier(&mut self, id: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 4, id)
    }

    pub fn set_sequence(&mut self, seq: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 6, seq)
    }

    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }

    fn message_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image
    }

    pub fn calculate_checksum(&self) -> u16 {
        let mut message = self.message_image();
        message[2] = 0;
        message[3] = 0;
        checksum::ones_complement_sum(&message)
    }

    pub fn valid_checksum(&self) -> bool {
        checksum::ones_sum(&self.message_image()) == 0xFFFF
    }

    pub fn update_checksum(&mut self) -> Result<()> {
        let value = self.calculate_checksum();
        endian::write_u16_be(&mut self.header, 2, value)
    }
}

impl Layer for Icmpv4Packet {
    fn header(&self) -> &ByteSlice {
        &self.header
    }

    fn header_mut(&mut self) -> &mut ByteSlice {
        &mut self.header
    }

    fn payload(&self) -> &Payload {
        &self.payload
    }

    fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Icmpv4
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        self.update_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_checksum_cycle() {
        let mut packet = Icmpv4Packet::echo_request(0x1234, 1);
        packet.set_payload_bytes(b"abcdefgh".to_vec());
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());

        packet.set_sequence(2).unwrap();
        assert!(!packet.valid_checksum());
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());
    }

    #[test]
    fn test_parse_fields() {
        let raw = vec![0x08, 0x00, 0x00, 0x00, 0x12, 0x34, 0x00, 0x01, 0xAA];
        let packet = Icmpv4Packet::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(packet.icmp_type().unwrap(), IcmpType::EchoRequest);
        assert_eq!(packet.identifier().unwrap(), 0x1234);
        assert_eq!(packet.sequence().unwrap(), 1);
        assert_eq!(packet.payload().as_bytes().unwrap().len(), 1);
    }
}
