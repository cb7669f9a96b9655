//! IPv6 datagram layer
//!
//! Fixed 40-byte header; the payload length is explicit and there is no
//! layer-3 checksum. Hop limit takes the place of IPv4's TTL.

use std::net::Ipv6Addr;

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::ipv4::IpProtocol;
use crate::layer::{require_len, AnyLayer, Layer, NetContext, Payload, ProtocolKind};

/// IPv6 packet
#[derive(Debug)]
pub struct Ipv6Packet {
    header: ByteSlice,
    payload: Payload,
}

impl Ipv6Packet {
    /// Fixed IPv6 header size
    pub const HEADER_SIZE: usize = 40;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let first = header.byte_at(0)?;
        if first >> 4 != 6 {
            return Err(Error::invariant(format!(
                "IPv6 version nibble is {}",
                first >> 4
            )));
        }

        let payload_length = endian::read_u16_be(&header, 4)? as usize;
        if payload_length > region.len() - Self::HEADER_SIZE {
            return Err(Error::invariant(format!(
                "IPv6 payload length {} exceeds the {} available",
                payload_length,
                region.len() - Self::HEADER_SIZE
            )));
        }

        let body = header.encapsulated(Some(payload_length));
        let next_header = header.byte_at(6)?;
        let net = NetContext::V6(header.clone());

        let payload = match dispatch::from_ip_protocol(next_header, body.clone(), net)? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => {
                if !body.is_empty() {
                    tracing::debug!(next_header, "no dissector for next header, keeping raw bytes");
                }
                Payload::from_body(body)
            }
        };

        Ok(Self { header, payload })
    }

    /// Synthesize a header with an empty payload slot
    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, next_header: IpProtocol) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0] = 0x60; // version 6
        raw[6] = next_header.to_u8();
        raw[7] = 64; // default hop limit
        raw[8..24].copy_from_slice(&source.octets());
        raw[24..40].copy_from_slice(&destination.octets());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn version(&self) -> Result<u8> {
        Ok(self.header.byte_at(0)? >> 4)
    }

    pub fn traffic_class(&self) -> Result<u8> {
        let word = endian::read_u32_be(&self.header, 0)?;
        Ok(((word >> 20) & 0xFF) as u8)
    }

    pub fn flow_label(&self) -> Result<u32> {
        Ok(endian::read_u32_be(&self.header, 0)? & 0x000F_FFFF)
    }

    pub fn payload_length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    pub fn next_header(&self) -> Result<IpProtocol> {
        Ok(IpProtocol::from_u8(self.header.byte_at(6)?))
    }

    pub fn hop_limit(&self) -> Result<u8> {
        self.header.byte_at(7)
    }

    pub fn source(&self) -> Result<Ipv6Addr> {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.header.read_slice(8, 16)?);
        Ok(Ipv6Addr::from(octets))
    }

    pub fn destination(&self) -> Result<Ipv6Addr> {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&self.header.read_slice(24, 16)?);
        Ok(Ipv6Addr::from(octets))
    }

    pub fn set_traffic_class(&mut self, class: u8) -> Result<()> {
        let word = endian::read_u32_be(&self.header, 0)?;
        let word = (word & 0xF00F_FFFF) | ((class as u32) << 20);
        endian::write_u32_be(&mut self.header, 0, word)
    }

    pub fn set_flow_label(&mut self, label: u32) -> Result<()> {
        if label > 0x000F_FFFF {
            return Err(Error::ValueTooLarge {
                max: 0x000F_FFFF,
                actual: label as usize,
            });
        }
        let word = endian::read_u32_be(&self.header, 0)?;
        endian::write_u32_be(&mut self.header, 0, (word & 0xFFF0_0000) | label)
    }

    pub fn set_payload_length(&mut self, length: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 4, length)
    }

    pub fn set_next_header(&mut self, protocol: IpProtocol) -> Result<()> {
        self.header.set_byte_at(6, protocol.to_u8())
    }

    pub fn set_hop_limit(&mut self, hops: u8) -> Result<()> {
        self.header.set_byte_at(7, hops)
    }

    pub fn set_source(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.header.write_slice(8, &addr.octets())
    }

    pub fn set_destination(&mut self, addr: Ipv6Addr) -> Result<()> {
        self.header.write_slice(24, &addr.octets())
    }

    /// Install a child layer, updating the next-header field and handing
    /// the child this header for its pseudo-header checksum
    pub fn set_payload(&mut self, mut child: AnyLayer) -> Result<()> {
        let next_header = match &child {
            AnyLayer::Tcp(_) => Some(6),
            AnyLayer::Udp(_) => Some(17),
            AnyLayer::Icmpv6(_) => Some(58),
            AnyLayer::Ospf(_) => Some(89),
            _ => None,
        };
        if let Some(next_header) = next_header {
            self.header.set_byte_at(6, next_header)?;
        }
        child.set_net_context(NetContext::V6(self.header.clone()));
        self.payload = Payload::Layer(Box::new(child));
        Ok(())
    }

    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }
}

impl Layer for Ipv6Packet {
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
        ProtocolKind::Ipv6
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        self.set_payload_length(self.payload.byte_len() as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Vec<u8> {
        let mut raw = vec![0u8; 44];
        raw[0] = 0x60;
        raw[4..6].copy_from_slice(&4u16.to_be_bytes()); // payload length
        raw[6] = 59; // no next header
        raw[7] = 64;
        raw[8..24].copy_from_slice(&Ipv6Addr::LOCALHOST.octets());
        raw[24..40].copy_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
        raw[40..44].copy_from_slice(&[1, 2, 3, 4]);
        raw
    }

    #[test]
    fn test_parse_fields() {
        let packet = Ipv6Packet::parse(ByteSlice::new(sample_packet())).unwrap();
        assert_eq!(packet.version().unwrap(), 6);
        assert_eq!(packet.payload_length().unwrap(), 4);
        assert_eq!(packet.hop_limit().unwrap(), 64);
        assert_eq!(packet.source().unwrap(), Ipv6Addr::LOCALHOST);
        assert_eq!(
            packet.destination().unwrap(),
            "2001:db8::2".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn test_payload_length_exceeds_buffer() {
        let mut raw = sample_packet();
        raw[5] = 200;
        assert!(matches!(
            Ipv6Packet::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }

    #[test]
    fn test_traffic_class_and_flow_label() {
        let mut packet = Ipv6Packet::parse(ByteSlice::new(sample_packet())).unwrap();
        packet.set_traffic_class(0xAB).unwrap();
        packet.set_flow_label(0x12345).unwrap();
        assert_eq!(packet.traffic_class().unwrap(), 0xAB);
        assert_eq!(packet.flow_label().unwrap(), 0x12345);
        assert_eq!(packet.version().unwrap(), 6);
        assert!(packet.set_flow_label(0x100000).is_err());
    }

    #[test]
    fn test_short_buffer() {
        let err = Ipv6Packet::parse(ByteSlice::new(vec![0x60; 20])).unwrap_err();
        assert!(matches!(err, Error::ShortBuffer { needed: 40, .. }));
    }
}
