//! PPP frame layer
//!
//! Two-byte protocol field; the value drives encapsulation the way an
//! EtherType does for Ethernet. Control protocols (LCP, IPCP and friends)
//! stay raw bytes.

use lamina_core::{endian, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// PPP protocol field values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PppProtocol {
    /// IPv4 (0x0021)
    IPv4,
    /// IPv6 (0x0057)
    IPv6,
    /// Link Control Protocol (0xC021)
    Lcp,
    /// IP Control Protocol (0x8021)
    Ipcp,
    /// IPv6 Control Protocol (0x8057)
    Ipv6cp,
    /// Password Authentication Protocol (0xC023)
    Pap,
    /// Challenge Handshake Authentication Protocol (0xC223)
    Chap,
    Custom(u16),
}

impl PppProtocol {
    pub fn to_u16(self) -> u16 {
        match self {
            PppProtocol::IPv4 => 0x0021,
            PppProtocol::IPv6 => 0x0057,
            PppProtocol::Lcp => 0xC021,
            PppProtocol::Ipcp => 0x8021,
            PppProtocol::Ipv6cp => 0x8057,
            PppProtocol::Pap => 0xC023,
            PppProtocol::Chap => 0xC223,
            PppProtocol::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0021 => PppProtocol::IPv4,
            0x0057 => PppProtocol::IPv6,
            0xC021 => PppProtocol::Lcp,
            0x8021 => PppProtocol::Ipcp,
            0x8057 => PppProtocol::Ipv6cp,
            0xC023 => PppProtocol::Pap,
            0xC223 => PppProtocol::Chap,
            val => PppProtocol::Custom(val),
        }
    }
}

/// PPP frame
#[derive(Debug)]
pub struct PppFrame {
    header: ByteSlice,
    payload: Payload,
}

impl PppFrame {
    /// Protocol field only
    pub const HEADER_SIZE: usize = 2;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let protocol = endian::read_u16_be(&header, 0)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));

        let payload = match dispatch::from_ppp_protocol(protocol, body.clone())? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => Payload::from_body(body),
        };

        Ok(Self { header, payload })
    }

    pub fn protocol(&self) -> Result<PppProtocol> {
        Ok(PppProtocol::from_u16(endian::read_u16_be(&self.header, 0)?))
    }

    pub fn set_protocol(&mut self, protocol: PppProtocol) -> Result<()> {
        endian::write_u16_be(&mut self.header, 0, protocol.to_u16())
    }
}

impl Layer for PppFrame {
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
        ProtocolKind::Ppp
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
    fn test_ipv4_encapsulation() {
        let mut raw = vec![0x00, 0x21];
        raw.extend_from_slice(&hex::decode("450000140000000040fd0000c0a80001c0a80002").unwrap());

        let frame = PppFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.protocol().unwrap(), PppProtocol::IPv4);
        assert!(matches!(
            frame.payload().as_layer(),
            Some(AnyLayer::Ipv4(_))
        ));
    }

    #[test]
    fn test_control_protocol_stays_raw() {
        let raw = vec![0xC0, 0x21, 0x01, 0x01, 0x00, 0x04];
        let frame = PppFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.protocol().unwrap(), PppProtocol::Lcp);
        assert!(frame.payload().as_bytes().is_some());
    }
}
