//! Ethernet II frame layer
//!
//! The root of most packet trees. The EtherType field doubles as the
//! encapsulation discriminator: parsing dissects the payload by EtherType,
//! and setting a payload layer writes the matching EtherType back.

use std::fmt;

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::layer::{require_len, AnyLayer, Layer, Payload, ProtocolKind};

/// Common EtherType values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    /// IPv4 (0x0800)
    IPv4,
    /// ARP (0x0806)
    ARP,
    /// Wake-on-LAN (0x0842)
    WakeOnLan,
    /// VLAN-tagged frame (0x8100)
    VLAN,
    /// IPv6 (0x86DD)
    IPv6,
    /// PPPoE Discovery (0x8863)
    PPPoEDiscovery,
    /// PPPoE Session (0x8864)
    PPPoESession,
    /// Q-in-Q/802.1ad (0x88A8)
    QinQ,
    /// LLDP (0x88CC)
    LLDP,
    /// Any other EtherType
    Custom(u16),
}

impl EtherType {
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => 0x0800,
            EtherType::ARP => 0x0806,
            EtherType::WakeOnLan => 0x0842,
            EtherType::VLAN => 0x8100,
            EtherType::IPv6 => 0x86DD,
            EtherType::PPPoEDiscovery => 0x8863,
            EtherType::PPPoESession => 0x8864,
            EtherType::QinQ => 0x88A8,
            EtherType::LLDP => 0x88CC,
            EtherType::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::ARP,
            0x0842 => EtherType::WakeOnLan,
            0x8100 => EtherType::VLAN,
            0x86DD => EtherType::IPv6,
            0x8863 => EtherType::PPPoEDiscovery,
            0x8864 => EtherType::PPPoESession,
            0x88A8 => EtherType::QinQ,
            0x88CC => EtherType::LLDP,
            val => EtherType::Custom(val),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::ARP => write!(f, "ARP"),
            EtherType::WakeOnLan => write!(f, "Wake-on-LAN"),
            EtherType::VLAN => write!(f, "VLAN"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::PPPoEDiscovery => write!(f, "PPPoE-Discovery"),
            EtherType::PPPoESession => write!(f, "PPPoE-Session"),
            EtherType::QinQ => write!(f, "Q-in-Q"),
            EtherType::LLDP => write!(f, "LLDP"),
            EtherType::Custom(val) => write!(f, "0x{:04X}", val),
        }
    }
}

/// MAC address (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Broadcast MAC address (FF:FF:FF:FF:FF:FF)
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Zero MAC address (00:00:00:00:00:00)
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    /// LLDP multicast address, nearest bridge (01:80:C2:00:00:0E)
    pub const LLDP_MULTICAST: MacAddress = MacAddress([0x01, 0x80, 0xC2, 0x00, 0x00, 0x0E]);

    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Create a MAC address from a slice, failing on any other length
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != 6 {
            return Err(Error::InvalidAddress {
                expected: 6,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; 6];
        bytes.copy_from_slice(slice);
        Ok(MacAddress(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xFF; 6]
    }

    /// Bit 0 of the first octet marks a group address
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast() && !self.is_broadcast()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

/// Ethernet II frame
#[derive(Debug)]
pub struct EthernetFrame {
    header: ByteSlice,
    payload: Payload,
}

impl EthernetFrame {
    /// Ethernet header size (dst + src + type)
    pub const HEADER_SIZE: usize = 14;

    /// Parse a frame from `region`, dissecting the payload by EtherType
    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let ethertype = endian::read_u16_be(&header, 12)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));

        let payload = match dispatch::from_ethertype(ethertype, body.clone())? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => {
                if !body.is_empty() {
                    tracing::debug!(ethertype, "no dissector for ethertype, keeping raw bytes");
                }
                Payload::from_body(body)
            }
        };

        Ok(Self { header, payload })
    }

    /// Synthesize a frame with an empty payload slot
    pub fn new(destination: MacAddress, source: MacAddress, ethertype: EtherType) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0..6].copy_from_slice(destination.as_bytes());
        raw[6..12].copy_from_slice(source.as_bytes());
        raw[12..14].copy_from_slice(&ethertype.to_u16().to_be_bytes());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn destination(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(0, 6)?)
    }

    pub fn source(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(6, 6)?)
    }

    pub fn ethertype(&self) -> Result<EtherType> {
        Ok(EtherType::from_u16(endian::read_u16_be(&self.header, 12)?))
    }

    pub fn set_destination(&mut self, mac: MacAddress) -> Result<()> {
        self.header.write_slice(0, mac.as_bytes())
    }

    pub fn set_source(&mut self, mac: MacAddress) -> Result<()> {
        self.header.write_slice(6, mac.as_bytes())
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) -> Result<()> {
        endian::write_u16_be(&mut self.header, 12, ethertype.to_u16())
    }

    /// Install a child layer, updating the EtherType field to match
    pub fn set_payload(&mut self, child: AnyLayer) -> Result<()> {
        endian::write_u16_be(&mut self.header, 12, child.ethertype_value())?;
        self.payload = Payload::Layer(Box::new(child));
        Ok(())
    }

    /// Install terminal payload bytes without touching the EtherType
    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }
}

impl Layer for EthernetFrame {
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
        ProtocolKind::Ethernet
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        // Ethernet itself has no derived fields
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_display() {
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(format!("{}", mac), "00:11:22:33:44:55");
    }

    #[test]
    fn test_mac_address_classes() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(MacAddress::LLDP_MULTICAST.is_multicast());
        assert!(MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]).is_unicast());
    }

    #[test]
    fn test_mac_address_wrong_length() {
        assert!(matches!(
            MacAddress::from_slice(&[1, 2, 3]),
            Err(Error::InvalidAddress { expected: 6, actual: 3 })
        ));
    }

    #[test]
    fn test_parse_unknown_ethertype_keeps_bytes() {
        let mut raw = vec![
            0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, // dst
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // src
            0xBE, 0xEF, // unknown ethertype
        ];
        raw.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let frame = EthernetFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.ethertype().unwrap(), EtherType::Custom(0xBEEF));
        let bytes = frame.payload().as_bytes().expect("raw payload");
        assert_eq!(bytes.actual(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_parse_too_short() {
        let err = EthernetFrame::parse(ByteSlice::new(vec![0; 10])).unwrap_err();
        assert!(matches!(err, Error::ShortBuffer { needed: 14, available: 10 }));
    }

    #[test]
    fn test_synthesized_header_fields() {
        let dst = MacAddress::BROADCAST;
        let src = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let mut frame = EthernetFrame::new(dst, src, EtherType::IPv4);

        assert_eq!(frame.destination().unwrap(), dst);
        assert_eq!(frame.source().unwrap(), src);
        assert_eq!(frame.ethertype().unwrap(), EtherType::IPv4);

        frame.set_ethertype(EtherType::ARP).unwrap();
        assert_eq!(frame.bytes()[12..14], [0x08, 0x06]);
    }

    #[test]
    fn test_mutation_visible_through_clone() {
        let raw = vec![0u8; 20];
        let mut frame = EthernetFrame::parse(ByteSlice::new(raw)).unwrap();
        let view = frame.header().clone();
        frame.set_source(MacAddress([1, 2, 3, 4, 5, 6])).unwrap();
        assert_eq!(view.read_slice(6, 6).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }
}
