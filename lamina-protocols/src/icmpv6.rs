//! ICMPv6 message layer
//!
//! Same 4-byte prologue as ICMPv4, but the checksum is computed over the
//! IPv6 pseudo-header followed by the message.

use lamina_core::{checksum, endian, Error, Result};
use lamina_core::ByteSlice;

use crate::layer::{require_len, Layer, NetContext, Payload, ProtocolKind};

/// ICMPv6 message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icmpv6Type {
    DestinationUnreachable,
    PacketTooBig,
    TimeExceeded,
    ParameterProblem,
    EchoRequest,
    EchoReply,
    RouterSolicitation,
    RouterAdvertisement,
    NeighborSolicitation,
    NeighborAdvertisement,
    Custom(u8),
}

impl Icmpv6Type {
    pub fn to_u8(self) -> u8 {
        match self {
            Icmpv6Type::DestinationUnreachable => 1,
            Icmpv6Type::PacketTooBig => 2,
            Icmpv6Type::TimeExceeded => 3,
            Icmpv6Type::ParameterProblem => 4,
            Icmpv6Type::EchoRequest => 128,
            Icmpv6Type::EchoReply => 129,
            Icmpv6Type::RouterSolicitation => 133,
            Icmpv6Type::RouterAdvertisement => 134,
            Icmpv6Type::NeighborSolicitation => 135,
            Icmpv6Type::NeighborAdvertisement => 136,
            Icmpv6Type::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Icmpv6Type::DestinationUnreachable,
            2 => Icmpv6Type::PacketTooBig,
            3 => Icmpv6Type::TimeExceeded,
            4 => Icmpv6Type::ParameterProblem,
            128 => Icmpv6Type::EchoRequest,
            129 => Icmpv6Type::EchoReply,
            133 => Icmpv6Type::RouterSolicitation,
            134 => Icmpv6Type::RouterAdvertisement,
            135 => Icmpv6Type::NeighborSolicitation,
            136 => Icmpv6Type::NeighborAdvertisement,
            val => Icmpv6Type::Custom(val),
        }
    }
}

/// ICMPv6 message
#[derive(Debug)]
pub struct Icmpv6Packet {
    header: ByteSlice,
    payload: Payload,
    net: Option<NetContext>,
}

impl Icmpv6Packet {
    /// Type, code and checksum
    pub const HEADER_SIZE: usize = 4;

    pub(crate) fn parse(region: ByteSlice, net: Option<NetContext>) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));
        Ok(Self {
            header,
            payload: Payload::from_body(body),
            net,
        })
    }

    pub(crate) fn set_net_context(&mut self, net: NetContext) {
        self.net = Some(net);
    }

    pub fn icmp_type(&self) -> Result<Icmpv6Type> {
        Ok(Icmpv6Type::from_u8(self.header.byte_at(0)?))
    }

    pub fn code(&self) -> Result<u8> {
        self.header.byte_at(1)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn set_icmp_type(&mut self, icmp_type: Icmpv6Type) -> Result<()> {
        self.header.set_byte_at(0, icmp_type.to_u8())
    }

    pub fn set_code(&mut self, code: u8) -> Result<()> {
        self.header.set_byte_at(1, code)
    }

    fn message_len(&self) -> usize {
        self.header.len() + self.payload.byte_len()
    }

    fn message_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image
    }

    pub fn calculate_checksum(&self) -> Result<u16> {
        let net = self
            .net
            .as_ref()
            .ok_or(Error::NotImplemented("ICMPv6 checksum without a network layer"))?;
        let mut data = net.pseudo_header(58, self.message_len())?;
        let mut message = self.message_image();
        message[2] = 0;
        message[3] = 0;
        data.extend_from_slice(&message);
        Ok(checksum::ones_complement_sum(&data))
    }

    pub fn valid_checksum(&self) -> bool {
        let Some(net) = self.net.as_ref() else {
            return false;
        };
        let Ok(mut data) = net.pseudo_header(58, self.message_len()) else {
            return false;
        };
        data.extend_from_slice(&self.message_image());
        checksum::ones_sum(&data) == 0xFFFF
    }

    pub fn update_checksum(&mut self) -> Result<()> {
        let value = self.calculate_checksum()?;
        endian::write_u16_be(&mut self.header, 2, value)
    }
}

impl Layer for Icmpv6Packet {
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
        ProtocolKind::Icmpv6
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if self.net.is_some() {
            self.update_checksum()?;
        }
        Ok(())
    }
}
