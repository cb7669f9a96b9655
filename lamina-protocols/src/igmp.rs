//! IGMP message layer (v1/v2 framing)

use std::net::Ipv4Addr;

use lamina_core::{checksum, endian, Result};
use lamina_core::ByteSlice;

use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// IGMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgmpType {
    /// Membership query (0x11)
    MembershipQuery,
    /// IGMPv1 membership report (0x12)
    V1MembershipReport,
    /// IGMPv2 membership report (0x16)
    V2MembershipReport,
    /// Leave group (0x17)
    LeaveGroup,
    /// IGMPv3 membership report (0x22)
    V3MembershipReport,
    Custom(u8),
}

impl IgmpType {
    pub fn to_u8(self) -> u8 {
        match self {
            IgmpType::MembershipQuery => 0x11,
            IgmpType::V1MembershipReport => 0x12,
            IgmpType::V2MembershipReport => 0x16,
            IgmpType::LeaveGroup => 0x17,
            IgmpType::V3MembershipReport => 0x22,
            IgmpType::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0x11 => IgmpType::MembershipQuery,
            0x12 => IgmpType::V1MembershipReport,
            0x16 => IgmpType::V2MembershipReport,
            0x17 => IgmpType::LeaveGroup,
            0x22 => IgmpType::V3MembershipReport,
            val => IgmpType::Custom(val),
        }
    }
}

/// IGMP message
#[derive(Debug)]
pub struct IgmpPacket {
    header: ByteSlice,
    payload: Payload,
}

impl IgmpPacket {
    /// Type, max response time, checksum, group address
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

    /// Synthesize an IGMPv2 membership report for `group`
    pub fn membership_report(group: Ipv4Addr) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0] = IgmpType::V2MembershipReport.to_u8();
        raw[4..8].copy_from_slice(&group.octets());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    pub fn igmp_type(&self) -> Result<IgmpType> {
        Ok(IgmpType::from_u8(self.header.byte_at(0)?))
    }

    pub fn max_response_time(&self) -> Result<u8> {
        self.header.byte_at(1)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn group_address(&self) -> Result<Ipv4Addr> {
        let octets = self.header.read_slice(4, 4)?;
        Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    pub fn set_igmp_type(&mut self, igmp_type: IgmpType) -> Result<()> {
        self.header.set_byte_at(0, igmp_type.to_u8())
    }

    pub fn set_max_response_time(&mut self, time: u8) -> Result<()> {
        self.header.set_byte_at(1, time)
    }

    pub fn set_group_address(&mut self, group: Ipv4Addr) -> Result<()> {
        self.header.write_slice(4, &group.octets())
    }

    fn message_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image
    }

    /// Checksum over the message alone, no pseudo-header
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

impl Layer for IgmpPacket {
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
        ProtocolKind::Igmp
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        self.update_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_checksum() {
        let mut packet = IgmpPacket::membership_report(Ipv4Addr::new(224, 0, 0, 251));
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());
        assert_eq!(packet.igmp_type().unwrap(), IgmpType::V2MembershipReport);
        assert_eq!(
            packet.group_address().unwrap(),
            Ipv4Addr::new(224, 0, 0, 251)
        );
    }

    #[test]
    fn test_parse_query() {
        let raw = vec![0x11, 0x64, 0x00, 0x00, 224, 0, 0, 1];
        let packet = IgmpPacket::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(packet.igmp_type().unwrap(), IgmpType::MembershipQuery);
        assert_eq!(packet.max_response_time().unwrap(), 100);
    }
}
