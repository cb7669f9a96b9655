//! ARP packet layer
//!
//! Fixed 28-byte layout for the Ethernet/IPv4 case the address accessors
//! assume; the raw hardware/protocol address setters validate against the
//! length fields in the header instead.

use std::net::Ipv4Addr;

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::ethernet::MacAddress;
use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// Hardware type for Ethernet
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol type for IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// ARP operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    /// ARP request (1)
    Request,
    /// ARP reply (2)
    Reply,
    /// RARP request (3)
    RarpRequest,
    /// RARP reply (4)
    RarpReply,
    /// Any other opcode
    Custom(u16),
}

impl ArpOperation {
    pub fn to_u16(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::RarpRequest => 3,
            ArpOperation::RarpReply => 4,
            ArpOperation::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            3 => ArpOperation::RarpRequest,
            4 => ArpOperation::RarpReply,
            val => ArpOperation::Custom(val),
        }
    }
}

/// ARP packet
#[derive(Debug)]
pub struct ArpPacket {
    header: ByteSlice,
    payload: Payload,
}

impl ArpPacket {
    /// Header size for 6-byte hardware and 4-byte protocol addresses
    pub const HEADER_SIZE: usize = 28;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;
        // Anything after the fixed header is link padding
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));
        Ok(Self {
            header,
            payload: Payload::from_body(body),
        })
    }

    /// Synthesize an Ethernet/IPv4 ARP packet
    pub fn new(
        operation: ArpOperation,
        sender_mac: MacAddress,
        sender_ip: Ipv4Addr,
        target_mac: MacAddress,
        target_ip: Ipv4Addr,
    ) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0..2].copy_from_slice(&HTYPE_ETHERNET.to_be_bytes());
        raw[2..4].copy_from_slice(&PTYPE_IPV4.to_be_bytes());
        raw[4] = 6;
        raw[5] = 4;
        raw[6..8].copy_from_slice(&operation.to_u16().to_be_bytes());
        raw[8..14].copy_from_slice(sender_mac.as_bytes());
        raw[14..18].copy_from_slice(&sender_ip.octets());
        raw[18..24].copy_from_slice(target_mac.as_bytes());
        raw[24..28].copy_from_slice(&target_ip.octets());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn hardware_type(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 0)
    }

    pub fn protocol_type(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn hardware_address_length(&self) -> Result<u8> {
        self.header.byte_at(4)
    }

    pub fn protocol_address_length(&self) -> Result<u8> {
        self.header.byte_at(5)
    }

    pub fn operation(&self) -> Result<ArpOperation> {
        Ok(ArpOperation::from_u16(endian::read_u16_be(&self.header, 6)?))
    }

    pub fn sender_hardware_address(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(8, 6)?)
    }

    pub fn sender_protocol_address(&self) -> Result<Ipv4Addr> {
        let octets = self.header.read_slice(14, 4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub fn target_hardware_address(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(18, 6)?)
    }

    pub fn target_protocol_address(&self) -> Result<Ipv4Addr> {
        let octets = self.header.read_slice(24, 4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub fn set_operation(&mut self, operation: ArpOperation) -> Result<()> {
        endian::write_u16_be(&mut self.header, 6, operation.to_u16())
    }

    /// Overwrite the sender hardware address; the byte count must match
    /// the header's hardware address length
    pub fn set_sender_hardware_address(&mut self, addr: &[u8]) -> Result<()> {
        let expected = self.hardware_address_length()? as usize;
        if addr.len() != expected {
            return Err(Error::InvalidAddress {
                expected,
                actual: addr.len(),
            });
        }
        self.header.write_slice(8, addr)
    }

    pub fn set_sender_protocol_address(&mut self, addr: &[u8]) -> Result<()> {
        let expected = self.protocol_address_length()? as usize;
        if addr.len() != expected {
            return Err(Error::InvalidAddress {
                expected,
                actual: addr.len(),
            });
        }
        self.header.write_slice(14, addr)
    }

    pub fn set_target_hardware_address(&mut self, addr: &[u8]) -> Result<()> {
        let expected = self.hardware_address_length()? as usize;
        if addr.len() != expected {
            return Err(Error::InvalidAddress {
                expected,
                actual: addr.len(),
            });
        }
        self.header.write_slice(18, addr)
    }

    pub fn set_target_protocol_address(&mut self, addr: &[u8]) -> Result<()> {
        let expected = self.protocol_address_length()? as usize;
        if addr.len() != expected {
            return Err(Error::InvalidAddress {
                expected,
                actual: addr.len(),
            });
        }
        self.header.write_slice(24, addr)
    }
}

impl Layer for ArpPacket {
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
        ProtocolKind::Arp
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let sender_mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let packet = ArpPacket::new(
            ArpOperation::Request,
            sender_mac,
            Ipv4Addr::new(10, 0, 0, 1),
            MacAddress::ZERO,
            Ipv4Addr::new(10, 0, 0, 2),
        );

        let reparsed = ArpPacket::parse(ByteSlice::new(packet.bytes())).unwrap();
        assert_eq!(reparsed.operation().unwrap(), ArpOperation::Request);
        assert_eq!(reparsed.hardware_type().unwrap(), HTYPE_ETHERNET);
        assert_eq!(reparsed.sender_hardware_address().unwrap(), sender_mac);
        assert_eq!(
            reparsed.target_protocol_address().unwrap(),
            Ipv4Addr::new(10, 0, 0, 2)
        );
    }

    #[test]
    fn test_wrong_length_address_rejected() {
        let mut packet = ArpPacket::new(
            ArpOperation::Reply,
            MacAddress::ZERO,
            Ipv4Addr::UNSPECIFIED,
            MacAddress::ZERO,
            Ipv4Addr::UNSPECIFIED,
        );
        assert!(matches!(
            packet.set_sender_hardware_address(&[1, 2, 3]),
            Err(Error::InvalidAddress { expected: 6, actual: 3 })
        ));
        assert!(matches!(
            packet.set_target_protocol_address(&[1, 2, 3, 4, 5]),
            Err(Error::InvalidAddress { expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            ArpPacket::parse(ByteSlice::new(vec![0; 20])),
            Err(Error::ShortBuffer { needed: 28, available: 20 })
        ));
    }
}
