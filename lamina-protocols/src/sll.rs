//! Linux cooked capture (SLL) layer
//!
//! The 16-byte pseudo-header libpcap writes when capturing on the "any"
//! device: packet type, ARPHRD type, link address length, 8 bytes of link
//! address storage, then a protocol field interpreted as an EtherType.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// SLL packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SllPacketType {
    /// Addressed to us (0)
    Host,
    /// Broadcast (1)
    Broadcast,
    /// Multicast (2)
    Multicast,
    /// Addressed to someone else, seen in promiscuous mode (3)
    OtherHost,
    /// Sent by us (4)
    Outgoing,
    Custom(u16),
}

impl SllPacketType {
    pub fn to_u16(self) -> u16 {
        match self {
            SllPacketType::Host => 0,
            SllPacketType::Broadcast => 1,
            SllPacketType::Multicast => 2,
            SllPacketType::OtherHost => 3,
            SllPacketType::Outgoing => 4,
            SllPacketType::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => SllPacketType::Host,
            1 => SllPacketType::Broadcast,
            2 => SllPacketType::Multicast,
            3 => SllPacketType::OtherHost,
            4 => SllPacketType::Outgoing,
            val => SllPacketType::Custom(val),
        }
    }
}

/// Linux cooked capture frame
#[derive(Debug)]
pub struct SllFrame {
    header: ByteSlice,
    payload: Payload,
}

impl SllFrame {
    pub const HEADER_SIZE: usize = 16;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let address_length = endian::read_u16_be(&header, 4)? as usize;
        if address_length > 8 {
            return Err(Error::invariant(format!(
                "SLL link address length {} exceeds the 8-byte field",
                address_length
            )));
        }

        let protocol = endian::read_u16_be(&header, 14)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));

        let payload = match dispatch::from_ethertype(protocol, body.clone())? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => Payload::from_body(body),
        };

        Ok(Self { header, payload })
    }

    pub fn packet_type(&self) -> Result<SllPacketType> {
        Ok(SllPacketType::from_u16(endian::read_u16_be(&self.header, 0)?))
    }

    /// ARPHRD hardware type of the capturing interface
    pub fn hardware_type(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn address_length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    /// The used portion of the 8-byte link address field
    pub fn address(&self) -> Result<Vec<u8>> {
        let len = (self.address_length()? as usize).min(8);
        self.header.read_slice(6, len)
    }

    pub fn protocol(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 14)
    }
}

impl Layer for SllFrame {
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
        ProtocolKind::LinuxSll
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::AnyLayer;

    #[test]
    fn test_parse_with_ipv4_payload() {
        let mut raw = vec![
            0x00, 0x00, // packet type: host
            0x00, 0x01, // ARPHRD_ETHER
            0x00, 0x06, // address length
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x00, 0x00, // address + padding
            0x08, 0x00, // IPv4
        ];
        raw.extend_from_slice(&hex::decode("450000140000000040fd0000c0a80001c0a80002").unwrap());

        let frame = SllFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.packet_type().unwrap(), SllPacketType::Host);
        assert_eq!(frame.hardware_type().unwrap(), 1);
        assert_eq!(frame.address().unwrap(), vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert!(matches!(
            frame.payload().as_layer(),
            Some(AnyLayer::Ipv4(_))
        ));
    }

    #[test]
    fn test_bad_address_length() {
        let mut raw = vec![0u8; 16];
        raw[5] = 12;
        assert!(matches!(
            SllFrame::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }
}
