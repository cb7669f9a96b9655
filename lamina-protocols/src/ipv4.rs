//! IPv4 datagram layer
//!
//! Version and IHL share byte 0; the header checksum covers the header
//! only. The payload handed to the encapsulated layer is bounded by
//! `TotalLength - IHL*4`, which strips trailing link-layer capture padding
//! before a transport layer ever sees it.

use std::net::Ipv4Addr;

use lamina_core::{checksum, endian, Error, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::layer::{require_len, AnyLayer, Layer, NetContext, Payload, ProtocolKind};

/// IP protocol numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    /// ICMP (1)
    ICMP,
    /// IGMP (2)
    IGMP,
    /// TCP (6)
    TCP,
    /// UDP (17)
    UDP,
    /// ICMPv6 (58)
    ICMPv6,
    /// OSPF (89)
    OSPF,
    /// Any other protocol number
    Custom(u8),
}

impl IpProtocol {
    pub fn to_u8(self) -> u8 {
        match self {
            IpProtocol::ICMP => 1,
            IpProtocol::IGMP => 2,
            IpProtocol::TCP => 6,
            IpProtocol::UDP => 17,
            IpProtocol::ICMPv6 => 58,
            IpProtocol::OSPF => 89,
            IpProtocol::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => IpProtocol::ICMP,
            2 => IpProtocol::IGMP,
            6 => IpProtocol::TCP,
            17 => IpProtocol::UDP,
            58 => IpProtocol::ICMPv6,
            89 => IpProtocol::OSPF,
            val => IpProtocol::Custom(val),
        }
    }
}

/// IPv4 fragment flags (top 3 bits of the flags/offset word)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IpFlags {
    /// Reserved bit (must be 0)
    pub reserved: bool,
    /// Don't Fragment
    pub dont_fragment: bool,
    /// More Fragments
    pub more_fragments: bool,
}

impl IpFlags {
    pub fn to_u8(self) -> u8 {
        let mut bits = 0u8;
        if self.reserved {
            bits |= 0b100;
        }
        if self.dont_fragment {
            bits |= 0b010;
        }
        if self.more_fragments {
            bits |= 0b001;
        }
        bits
    }

    pub fn from_u8(value: u8) -> Self {
        IpFlags {
            reserved: value & 0b100 != 0,
            dont_fragment: value & 0b010 != 0,
            more_fragments: value & 0b001 != 0,
        }
    }
}

/// IPv4 packet
#[derive(Debug)]
pub struct Ipv4Packet {
    header: ByteSlice,
    payload: Payload,
}

impl Ipv4Packet {
    /// Minimum IPv4 header size (IHL = 5)
    pub const MIN_HEADER_SIZE: usize = 20;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::MIN_HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::MIN_HEADER_SIZE)?;

        let first = header.byte_at(0)?;
        if first >> 4 != 4 {
            return Err(Error::invariant(format!(
                "IPv4 version nibble is {}",
                first >> 4
            )));
        }

        let header_len = ((first & 0x0F) as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::invariant(format!(
                "IPv4 IHL of {} bytes below minimum header",
                header_len
            )));
        }
        if header_len > region.len() {
            return Err(Error::invariant(format!(
                "IPv4 IHL of {} bytes exceeds the {} available",
                header_len,
                region.len()
            )));
        }
        header.set_len(header_len)?;

        let total_length = endian::read_u16_be(&header, 2)? as usize;
        if total_length < header_len || total_length > region.len() {
            return Err(Error::invariant(format!(
                "IPv4 total length {} outside of {}..={}",
                total_length,
                header_len,
                region.len()
            )));
        }

        let body = header.encapsulated(Some(total_length - header_len));
        let protocol = header.byte_at(9)?;
        let net = NetContext::V4(header.clone());

        let payload = match dispatch::from_ip_protocol(protocol, body.clone(), net)? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => {
                if !body.is_empty() {
                    tracing::debug!(protocol, "no dissector for IP protocol, keeping raw bytes");
                }
                Payload::from_body(body)
            }
        };

        Ok(Self { header, payload })
    }

    /// Synthesize a minimal header with no options and an empty payload slot
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, protocol: IpProtocol) -> Self {
        let mut raw = vec![0u8; Self::MIN_HEADER_SIZE];
        raw[0] = 0x45; // version 4, IHL 5
        raw[2..4].copy_from_slice(&(Self::MIN_HEADER_SIZE as u16).to_be_bytes());
        raw[8] = 64; // default TTL
        raw[9] = protocol.to_u8();
        raw[12..16].copy_from_slice(&source.octets());
        raw[16..20].copy_from_slice(&destination.octets());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn version(&self) -> Result<u8> {
        Ok(self.header.byte_at(0)? >> 4)
    }

    /// Header length in 32-bit words
    pub fn header_length(&self) -> Result<u8> {
        Ok(self.header.byte_at(0)? & 0x0F)
    }

    pub fn type_of_service(&self) -> Result<u8> {
        self.header.byte_at(1)
    }

    pub fn total_length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    /// Payload length derived from `TotalLength - IHL*4`
    pub fn payload_length(&self) -> Result<u16> {
        let header_len = self.header_length()? as u16 * 4;
        Ok(self.total_length()?.saturating_sub(header_len))
    }

    pub fn identification(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    pub fn flags(&self) -> Result<IpFlags> {
        Ok(IpFlags::from_u8((self.header.byte_at(6)? >> 5) & 0b111))
    }

    /// Fragment offset in 8-byte units (low 13 bits of the flags word)
    pub fn fragment_offset(&self) -> Result<u16> {
        Ok(endian::read_u16_be(&self.header, 6)? & 0x1FFF)
    }

    pub fn ttl(&self) -> Result<u8> {
        self.header.byte_at(8)
    }

    pub fn protocol(&self) -> Result<IpProtocol> {
        Ok(IpProtocol::from_u8(self.header.byte_at(9)?))
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 10)
    }

    pub fn source(&self) -> Result<Ipv4Addr> {
        let octets = self.header.read_slice(12, 4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub fn destination(&self) -> Result<Ipv4Addr> {
        let octets = self.header.read_slice(16, 4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub fn set_type_of_service(&mut self, tos: u8) -> Result<()> {
        self.header.set_byte_at(1, tos)
    }

    pub fn set_total_length(&mut self, length: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, length)
    }

    pub fn set_identification(&mut self, id: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 4, id)
    }

    pub fn set_flags(&mut self, flags: IpFlags) -> Result<()> {
        let current = self.header.byte_at(6)?;
        self.header.set_byte_at(6, (flags.to_u8() << 5) | (current & 0x1F))
    }

    pub fn set_fragment_offset(&mut self, offset: u16) -> Result<()> {
        if offset > 0x1FFF {
            return Err(Error::ValueTooLarge {
                max: 0x1FFF,
                actual: offset as usize,
            });
        }
        let word = endian::read_u16_be(&self.header, 6)?;
        endian::write_u16_be(&mut self.header, 6, (word & 0xE000) | offset)
    }

    pub fn set_ttl(&mut self, ttl: u8) -> Result<()> {
        self.header.set_byte_at(8, ttl)
    }

    pub fn set_protocol(&mut self, protocol: IpProtocol) -> Result<()> {
        self.header.set_byte_at(9, protocol.to_u8())
    }

    pub fn set_source(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.header.write_slice(12, &addr.octets())
    }

    pub fn set_destination(&mut self, addr: Ipv4Addr) -> Result<()> {
        self.header.write_slice(16, &addr.octets())
    }

    /// Install a child layer, updating the protocol field and handing the
    /// child this header for its pseudo-header checksum
    pub fn set_payload(&mut self, mut child: AnyLayer) -> Result<()> {
        let protocol = match &child {
            AnyLayer::Tcp(_) => Some(6),
            AnyLayer::Udp(_) => Some(17),
            AnyLayer::Icmpv4(_) => Some(1),
            AnyLayer::Igmp(_) => Some(2),
            AnyLayer::Ospf(_) => Some(89),
            _ => None,
        };
        if let Some(protocol) = protocol {
            self.header.set_byte_at(9, protocol)?;
        }
        child.set_net_context(NetContext::V4(self.header.clone()));
        self.payload = Payload::Layer(Box::new(child));
        Ok(())
    }

    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }

    /// The checksum the header should carry, over the header bytes with the
    /// checksum field zeroed
    pub fn calculate_checksum(&self) -> u16 {
        let mut header = self.header.actual();
        header[10] = 0;
        header[11] = 0;
        checksum::ones_complement_sum(&header)
    }

    /// Whether the stored header checksum is consistent
    pub fn valid_checksum(&self) -> bool {
        checksum::ones_sum(&self.header.actual()) == 0xFFFF
    }

    /// Recompute and store the header checksum
    pub fn update_checksum(&mut self) -> Result<()> {
        let value = self.calculate_checksum();
        endian::write_u16_be(&mut self.header, 10, value)
    }
}

impl Layer for Ipv4Packet {
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
        ProtocolKind::Ipv4
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        let total = self.header.len() + self.payload.byte_len();
        self.set_total_length(total as u16)?;
        self.update_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Vec<u8> {
        // 20-byte header, proto 253 (experimental), 4 payload bytes
        let mut raw = hex::decode("450000180001000040fd0000c0a80001c0a80002").unwrap();
        raw.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        raw
    }

    #[test]
    fn test_parse_fields() {
        let packet = Ipv4Packet::parse(ByteSlice::new(sample_header())).unwrap();
        assert_eq!(packet.version().unwrap(), 4);
        assert_eq!(packet.header_length().unwrap(), 5);
        assert_eq!(packet.total_length().unwrap(), 24);
        assert_eq!(packet.payload_length().unwrap(), 4);
        assert_eq!(packet.ttl().unwrap(), 64);
        assert_eq!(packet.source().unwrap(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(packet.destination().unwrap(), Ipv4Addr::new(192, 168, 0, 2));
        let body = packet.payload().as_bytes().expect("raw payload");
        assert_eq!(body.actual(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_capture_padding_excluded() {
        // Four bytes of trailing padding beyond TotalLength
        let mut raw = sample_header();
        raw.extend_from_slice(&[0, 0, 0, 0]);
        let packet = Ipv4Packet::parse(ByteSlice::new(raw)).unwrap();
        let body = packet.payload().as_bytes().expect("raw payload");
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_total_length_beyond_buffer() {
        let mut raw = sample_header();
        raw[3] = 0xFF; // total length 0x18FF... larger than buffer either way
        let err = Ipv4Packet::parse(ByteSlice::new(raw)).unwrap_err();
        assert!(matches!(err, Error::InvariantViolated(_)));
    }

    #[test]
    fn test_wrong_version() {
        let mut raw = sample_header();
        raw[0] = 0x65;
        assert!(Ipv4Packet::parse(ByteSlice::new(raw)).is_err());
    }

    #[test]
    fn test_checksum_cycle() {
        let mut packet = Ipv4Packet::parse(ByteSlice::new(sample_header())).unwrap();
        assert!(!packet.valid_checksum());
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());

        // Any header mutation invalidates, recompute restores
        packet.set_ttl(32).unwrap();
        assert!(!packet.valid_checksum());
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());
    }

    #[test]
    fn test_flags_and_fragment_offset() {
        let mut packet = Ipv4Packet::parse(ByteSlice::new(sample_header())).unwrap();
        packet
            .set_flags(IpFlags { reserved: false, dont_fragment: true, more_fragments: false })
            .unwrap();
        packet.set_fragment_offset(100).unwrap();

        assert!(packet.flags().unwrap().dont_fragment);
        assert_eq!(packet.fragment_offset().unwrap(), 100);
        assert!(packet.set_fragment_offset(0x2000).is_err());
    }

    #[test]
    fn test_update_calculated_values_sets_length() {
        let mut packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            IpProtocol::UDP,
        );
        packet.set_payload_bytes(vec![0; 12]);
        packet.update_calculated_values().unwrap();
        assert_eq!(packet.total_length().unwrap(), 32);
        assert!(packet.valid_checksum());
    }
}
