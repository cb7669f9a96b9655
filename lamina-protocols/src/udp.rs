//! UDP datagram layer

use lamina_core::{checksum, endian, Result};
use lamina_core::{ByteSlice, Error};

use crate::layer::{require_len, AnyLayer, Layer, NetContext, Payload, ProtocolKind};
use crate::wol::WakeOnLanPacket;

/// UDP datagram
#[derive(Debug)]
pub struct UdpDatagram {
    header: ByteSlice,
    payload: Payload,
    net: Option<NetContext>,
}

impl UdpDatagram {
    /// UDP header size
    pub const HEADER_SIZE: usize = 8;

    pub(crate) fn parse(region: ByteSlice, net: Option<NetContext>) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let length = endian::read_u16_be(&header, 4)? as usize;
        if length < Self::HEADER_SIZE || length > region.len() {
            return Err(Error::invariant(format!(
                "UDP length {} outside of {}..={}",
                length,
                Self::HEADER_SIZE,
                region.len()
            )));
        }

        let body = header.encapsulated(Some(length - Self::HEADER_SIZE));
        let destination_port = endian::read_u16_be(&header, 2)?;
        let payload = Self::dissect_body(destination_port, body);

        Ok(Self { header, payload, net })
    }

    // Wake-on-LAN conventionally rides UDP ports 7 and 9; promote the
    // payload only when the magic packet actually validates.
    fn dissect_body(destination_port: u16, body: ByteSlice) -> Payload {
        if matches!(destination_port, 7 | 9) {
            if let Ok(wol) = WakeOnLanPacket::parse(body.clone()) {
                return Payload::Layer(Box::new(AnyLayer::WakeOnLan(wol)));
            }
        }
        Payload::from_body(body)
    }

    /// Synthesize a header with length and checksum left zero
    pub fn new(source_port: u16, destination_port: u16) -> Self {
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0..2].copy_from_slice(&source_port.to_be_bytes());
        raw[2..4].copy_from_slice(&destination_port.to_be_bytes());
        raw[4..6].copy_from_slice(&(Self::HEADER_SIZE as u16).to_be_bytes());
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
            net: None,
        }
    }

    pub(crate) fn set_net_context(&mut self, net: NetContext) {
        self.net = Some(net);
    }

    pub fn source_port(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 0)
    }

    pub fn destination_port(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 6)
    }

    pub fn set_source_port(&mut self, port: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 0, port)
    }

    pub fn set_destination_port(&mut self, port: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, port)
    }

    pub fn set_length(&mut self, length: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 4, length)
    }

    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }

    fn datagram_len(&self) -> usize {
        self.header.len() + self.payload.byte_len()
    }

    fn datagram_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image
    }

    /// The checksum the datagram should carry, over the pseudo-header and
    /// the datagram with the checksum field zeroed
    pub fn calculate_checksum(&self) -> Result<u16> {
        let net = self
            .net
            .as_ref()
            .ok_or(Error::NotImplemented("UDP checksum without a network layer"))?;
        let mut data = net.pseudo_header(17, self.datagram_len())?;
        let mut datagram = self.datagram_image();
        datagram[6] = 0;
        datagram[7] = 0;
        data.extend_from_slice(&datagram);
        Ok(checksum::ones_complement_sum(&data))
    }

    /// Whether the stored checksum is consistent; `false` without a
    /// network context
    pub fn valid_checksum(&self) -> bool {
        let Some(net) = self.net.as_ref() else {
            return false;
        };
        let Ok(mut data) = net.pseudo_header(17, self.datagram_len()) else {
            return false;
        };
        data.extend_from_slice(&self.datagram_image());
        checksum::ones_sum(&data) == 0xFFFF
    }

    /// Recompute and store the checksum
    ///
    /// A computed zero is transmitted as `0xFFFF`; zero on the wire means
    /// the sender did not compute a checksum at all.
    pub fn update_checksum(&mut self) -> Result<()> {
        let value = match self.calculate_checksum()? {
            0 => 0xFFFF,
            value => value,
        };
        endian::write_u16_be(&mut self.header, 6, value)
    }
}

impl Layer for UdpDatagram {
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
        ProtocolKind::Udp
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        self.set_length(self.datagram_len() as u16)?;
        if self.net.is_some() {
            self.update_checksum()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_datagram() -> Vec<u8> {
        let mut raw = vec![0u8; 12];
        raw[0..2].copy_from_slice(&5353u16.to_be_bytes());
        raw[2..4].copy_from_slice(&53u16.to_be_bytes());
        raw[4..6].copy_from_slice(&12u16.to_be_bytes());
        raw[8..12].copy_from_slice(&[1, 2, 3, 4]);
        raw
    }

    #[test]
    fn test_parse_fields() {
        let datagram = UdpDatagram::parse(ByteSlice::new(sample_datagram()), None).unwrap();
        assert_eq!(datagram.source_port().unwrap(), 5353);
        assert_eq!(datagram.destination_port().unwrap(), 53);
        assert_eq!(datagram.length().unwrap(), 12);
        let body = datagram.payload().as_bytes().expect("raw payload");
        assert_eq!(body.actual(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_length_below_header() {
        let mut raw = sample_datagram();
        raw[5] = 4;
        assert!(matches!(
            UdpDatagram::parse(ByteSlice::new(raw), None),
            Err(Error::InvariantViolated(_))
        ));
    }

    #[test]
    fn test_update_sets_length() {
        let mut datagram = UdpDatagram::new(1000, 2000);
        datagram.set_payload_bytes(vec![0; 10]);
        datagram.update_calculated_values().unwrap();
        assert_eq!(datagram.length().unwrap(), 18);
    }

    #[test]
    fn test_port_7_without_magic_stays_raw() {
        let mut raw = vec![0u8; 16];
        raw[2..4].copy_from_slice(&7u16.to_be_bytes());
        raw[4..6].copy_from_slice(&16u16.to_be_bytes());
        let datagram = UdpDatagram::parse(ByteSlice::new(raw), None).unwrap();
        assert!(datagram.payload().as_bytes().is_some());
    }
}
