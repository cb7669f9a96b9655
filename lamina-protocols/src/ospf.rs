//! OSPFv2 packet layer
//!
//! A 24-byte header followed by a type-specific body. The body is kept as
//! a raw slice on the layer; typed views (`OspfHello`, `Lsa`,
//! `RouterLink`, `ExternalRoute`) are parsed out of it on demand. The
//! checksum covers the whole packet with the 8 authentication bytes
//! excluded.

use std::net::Ipv4Addr;

use lamina_core::{checksum, endian, Error, Result};
use lamina_core::ByteSlice;

use crate::layer::{require_len, Layer, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

pub const OSPF_VERSION: u8 = 2;

/// OSPF packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OspfPacketType {
    Hello = 1,
    DatabaseDescription = 2,
    LinkStateRequest = 3,
    LinkStateUpdate = 4,
    LinkStateAck = 5,
}

impl OspfPacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Hello),
            2 => Some(Self::DatabaseDescription),
            3 => Some(Self::LinkStateRequest),
            4 => Some(Self::LinkStateUpdate),
            5 => Some(Self::LinkStateAck),
            _ => None,
        }
    }
}

/// OSPF LSA types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OspfLsaType {
    RouterLsa = 1,
    NetworkLsa = 2,
    SummaryLsa = 3,
    AsbrSummaryLsa = 4,
    ExternalLsa = 5,
}

impl OspfLsaType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RouterLsa),
            2 => Some(Self::NetworkLsa),
            3 => Some(Self::SummaryLsa),
            4 => Some(Self::AsbrSummaryLsa),
            5 => Some(Self::ExternalLsa),
            _ => None,
        }
    }
}

fn ipv4_at(slice: &ByteSlice, at: usize) -> Result<Ipv4Addr> {
    let octets = slice.read_slice(at, 4)?;
    Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

/// Hello body view
#[derive(Debug, Clone)]
pub struct OspfHello {
    slice: ByteSlice,
}

impl OspfHello {
    /// Fixed part before the neighbor list
    pub const FIXED_SIZE: usize = 20;

    pub fn network_mask(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 0)
    }

    pub fn hello_interval(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 4)
    }

    pub fn options(&self) -> Result<u8> {
        self.slice.byte_at(6)
    }

    pub fn router_priority(&self) -> Result<u8> {
        self.slice.byte_at(7)
    }

    pub fn router_dead_interval(&self) -> Result<u32> {
        endian::read_u32_be(&self.slice, 8)
    }

    pub fn designated_router(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 12)
    }

    pub fn backup_designated_router(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 16)
    }

    pub fn neighbors(&self) -> Result<Vec<Ipv4Addr>> {
        let mut neighbors = Vec::new();
        let mut at = Self::FIXED_SIZE;
        while at + 4 <= self.slice.len() {
            neighbors.push(ipv4_at(&self.slice, at)?);
            at += 4;
        }
        Ok(neighbors)
    }
}

/// A link record within a router LSA
#[derive(Debug, Clone)]
pub struct RouterLink {
    slice: ByteSlice,
}

impl RouterLink {
    pub const SIZE: usize = 12;

    pub fn link_id(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 0)
    }

    pub fn link_data(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 4)
    }

    pub fn link_type(&self) -> Result<u8> {
        self.slice.byte_at(8)
    }

    pub fn tos_count(&self) -> Result<u8> {
        self.slice.byte_at(9)
    }

    pub fn metric(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 10)
    }
}

/// An AS-external route record within a type-5 LSA
#[derive(Debug, Clone)]
pub struct ExternalRoute {
    slice: ByteSlice,
}

impl ExternalRoute {
    pub const SIZE: usize = 12;

    /// Type-2 external metric bit, the top bit of the 32-bit TOS/metric
    /// word
    pub fn external_type_2(&self) -> Result<bool> {
        Ok(endian::read_u32_be(&self.slice, 0)? & 0x8000_0000 != 0)
    }

    /// Metric in the low 24 bits
    pub fn metric(&self) -> Result<u32> {
        Ok(endian::read_u32_be(&self.slice, 0)? & 0x00FF_FFFF)
    }

    pub fn forwarding_address(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 4)
    }

    pub fn route_tag(&self) -> Result<u32> {
        endian::read_u32_be(&self.slice, 8)
    }
}

/// The 20-byte LSA header, shared by every LSA type
#[derive(Debug, Clone)]
pub struct LsaHeader {
    slice: ByteSlice,
}

impl LsaHeader {
    pub const SIZE: usize = 20;

    pub fn age(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 0)
    }

    pub fn options(&self) -> Result<u8> {
        self.slice.byte_at(2)
    }

    pub fn lsa_type(&self) -> Result<Option<OspfLsaType>> {
        Ok(OspfLsaType::from_u8(self.slice.byte_at(3)?))
    }

    pub fn link_state_id(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 4)
    }

    pub fn advertising_router(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.slice, 8)
    }

    pub fn sequence(&self) -> Result<u32> {
        endian::read_u32_be(&self.slice, 12)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 16)
    }

    /// Length of the whole LSA, header included
    pub fn length(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 18)
    }
}

/// A complete LSA: header plus type-specific body
#[derive(Debug, Clone)]
pub struct Lsa {
    header: LsaHeader,
    body: ByteSlice,
}

impl Lsa {
    pub fn header(&self) -> &LsaHeader {
        &self.header
    }

    /// Link records of a router LSA
    pub fn router_links(&self) -> Result<Vec<RouterLink>> {
        if self.header.lsa_type()? != Some(OspfLsaType::RouterLsa) {
            return Err(Error::invariant("not a router LSA"));
        }
        // flags(1) zero(1) link count(2)
        let count = endian::read_u16_be(&self.body, 2)? as usize;
        let mut links = Vec::with_capacity(count);
        let mut at = 4;
        for _ in 0..count {
            if at + RouterLink::SIZE > self.body.len() {
                return Err(Error::invariant("router link runs past the LSA body"));
            }
            links.push(RouterLink {
                slice: self.body.window(at, RouterLink::SIZE)?,
            });
            // TOS entries follow the fixed part of each link
            let tos = self.body.byte_at(at + 9)? as usize;
            at += RouterLink::SIZE + tos * 4;
        }
        Ok(links)
    }

    /// Network mask and route records of an AS-external LSA
    pub fn external(&self) -> Result<(Ipv4Addr, Vec<ExternalRoute>)> {
        if self.header.lsa_type()? != Some(OspfLsaType::ExternalLsa) {
            return Err(Error::invariant("not an AS-external LSA"));
        }
        let mask = ipv4_at(&self.body, 0)?;
        let mut routes = Vec::new();
        let mut at = 4;
        while at + ExternalRoute::SIZE <= self.body.len() {
            routes.push(ExternalRoute {
                slice: self.body.window(at, ExternalRoute::SIZE)?,
            });
            at += ExternalRoute::SIZE;
        }
        Ok((mask, routes))
    }
}

/// OSPFv2 packet
#[derive(Debug)]
pub struct OspfPacket {
    header: ByteSlice,
    payload: Payload,
}

impl OspfPacket {
    pub const HEADER_SIZE: usize = 24;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let packet_length = endian::read_u16_be(&header, 2)? as usize;
        if packet_length < Self::HEADER_SIZE || packet_length > region.len() {
            return Err(Error::invariant(format!(
                "OSPF packet length {} outside of {}..={}",
                packet_length,
                Self::HEADER_SIZE,
                region.len()
            )));
        }

        let body = header.encapsulated(Some(packet_length - Self::HEADER_SIZE));
        Ok(Self {
            header,
            payload: Payload::from_body(body),
        })
    }

    pub fn version(&self) -> Result<u8> {
        self.header.byte_at(0)
    }

    pub fn packet_type(&self) -> Result<Option<OspfPacketType>> {
        Ok(OspfPacketType::from_u8(self.header.byte_at(1)?))
    }

    pub fn packet_length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn router_id(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.header, 4)
    }

    pub fn area_id(&self) -> Result<Ipv4Addr> {
        ipv4_at(&self.header, 8)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 12)
    }

    pub fn auth_type(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 14)
    }

    pub fn authentication(&self) -> Result<Vec<u8>> {
        self.header.read_slice(16, 8)
    }

    pub fn set_router_id(&mut self, id: Ipv4Addr) -> Result<()> {
        self.header.write_slice(4, &id.octets())
    }

    pub fn set_area_id(&mut self, id: Ipv4Addr) -> Result<()> {
        self.header.write_slice(8, &id.octets())
    }

    fn body(&self) -> Result<&ByteSlice> {
        self.payload
            .as_bytes()
            .ok_or_else(|| Error::invariant("OSPF packet has no body"))
    }

    /// Hello view over the body of a type-1 packet
    pub fn hello(&self) -> Result<OspfHello> {
        if self.packet_type()? != Some(OspfPacketType::Hello) {
            return Err(Error::invariant("not an OSPF hello packet"));
        }
        let body = self.body()?;
        if body.len() < OspfHello::FIXED_SIZE {
            return Err(Error::short(OspfHello::FIXED_SIZE, body.len()));
        }
        Ok(OspfHello { slice: body.clone() })
    }

    /// LSAs of a link-state update packet
    pub fn lsas(&self) -> Result<Vec<Lsa>> {
        if self.packet_type()? != Some(OspfPacketType::LinkStateUpdate) {
            return Err(Error::invariant("not a link-state update packet"));
        }
        let body = self.body()?;
        let count = endian::read_u32_be(body, 0)? as usize;

        let mut cursor = RegionCursor::new(body, 4, body.len())?;
        let mut lsas = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = cursor.position();
            let header_slice = cursor.window(LsaHeader::SIZE)?;
            let header = LsaHeader { slice: header_slice };
            let total = header.length()? as usize;
            if total < LsaHeader::SIZE {
                return Err(Error::invariant(format!(
                    "LSA length {} below the header size",
                    total
                )));
            }
            let body_len = total - LsaHeader::SIZE;
            let body_slice = body.window(offset + LsaHeader::SIZE, body_len)?;
            cursor.skip(body_len)?;
            lsas.push(Lsa {
                header,
                body: body_slice,
            });
        }
        Ok(lsas)
    }

    /// LSA headers acknowledged by a link-state acknowledgment packet
    pub fn acknowledged_lsa_headers(&self) -> Result<Vec<LsaHeader>> {
        if self.packet_type()? != Some(OspfPacketType::LinkStateAck) {
            return Err(Error::invariant("not a link-state acknowledgment packet"));
        }
        let body = self.body()?;
        let mut headers = Vec::new();
        let mut at = 0;
        while at + LsaHeader::SIZE <= body.len() {
            headers.push(LsaHeader {
                slice: body.window(at, LsaHeader::SIZE)?,
            });
            at += LsaHeader::SIZE;
        }
        Ok(headers)
    }

    // Packet image with the 8 authentication bytes spliced out, the
    // region the checksum is defined over.
    fn checksum_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image.drain(16..24);
        image
    }

    pub fn calculate_checksum(&self) -> u16 {
        let mut image = self.checksum_image();
        image[12] = 0;
        image[13] = 0;
        checksum::ones_complement_sum(&image)
    }

    pub fn valid_checksum(&self) -> bool {
        checksum::ones_sum(&self.checksum_image()) == 0xFFFF
    }

    pub fn update_checksum(&mut self) -> Result<()> {
        let value = self.calculate_checksum();
        endian::write_u16_be(&mut self.header, 12, value)
    }
}

impl Layer for OspfPacket {
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
        ProtocolKind::Ospf
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        let total = self.header.len() + self.payload.byte_len();
        endian::write_u16_be(&mut self.header, 2, total as u16)?;
        self.update_checksum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ospf_header(packet_type: u8, body: &[u8]) -> Vec<u8> {
        let mut raw = vec![0u8; 24];
        raw[0] = OSPF_VERSION;
        raw[1] = packet_type;
        raw[2..4].copy_from_slice(&((24 + body.len()) as u16).to_be_bytes());
        raw[4..8].copy_from_slice(&[10, 0, 0, 1]); // router id
        raw[8..12].copy_from_slice(&[0, 0, 0, 0]); // backbone area
        raw.extend_from_slice(body);
        raw
    }

    fn hello_body(neighbors: &[[u8; 4]]) -> Vec<u8> {
        let mut body = vec![0u8; 20];
        body[0..4].copy_from_slice(&[255, 255, 255, 0]);
        body[4..6].copy_from_slice(&10u16.to_be_bytes());
        body[6] = 0x02;
        body[7] = 1;
        body[8..12].copy_from_slice(&40u32.to_be_bytes());
        for neighbor in neighbors {
            body.extend_from_slice(neighbor);
        }
        body
    }

    #[test]
    fn test_hello_fields() {
        let raw = ospf_header(1, &hello_body(&[[10, 0, 0, 2], [10, 0, 0, 3]]));
        let packet = OspfPacket::parse(ByteSlice::new(raw)).unwrap();

        assert_eq!(packet.version().unwrap(), 2);
        assert_eq!(packet.packet_type().unwrap(), Some(OspfPacketType::Hello));
        assert_eq!(packet.router_id().unwrap(), Ipv4Addr::new(10, 0, 0, 1));

        let hello = packet.hello().unwrap();
        assert_eq!(hello.network_mask().unwrap(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(hello.hello_interval().unwrap(), 10);
        assert_eq!(hello.router_dead_interval().unwrap(), 40);
        assert_eq!(
            hello.neighbors().unwrap(),
            vec![Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 3)]
        );
    }

    #[test]
    fn test_checksum_excludes_authentication() {
        let raw = ospf_header(1, &hello_body(&[]));
        let mut packet = OspfPacket::parse(ByteSlice::new(raw)).unwrap();
        packet.update_checksum().unwrap();
        assert!(packet.valid_checksum());

        // Auth bytes are outside the checksum
        packet.header_mut().write_slice(16, &[0xAB; 8]).unwrap();
        assert!(packet.valid_checksum());

        // The router id is not
        packet.set_router_id(Ipv4Addr::new(10, 0, 0, 9)).unwrap();
        assert!(!packet.valid_checksum());
    }

    fn external_lsa(metric: u32, type_2: bool) -> Vec<u8> {
        let mut lsa = vec![0u8; 20];
        lsa[3] = 5; // external
        lsa[18..20].copy_from_slice(&36u16.to_be_bytes());
        lsa.extend_from_slice(&[255, 255, 255, 0]); // mask
        let mut word = metric & 0x00FF_FFFF;
        if type_2 {
            word |= 0x8000_0000;
        }
        lsa.extend_from_slice(&word.to_be_bytes());
        lsa.extend_from_slice(&[0, 0, 0, 0]); // forwarding address
        lsa.extend_from_slice(&7u32.to_be_bytes()); // route tag
        lsa
    }

    #[test]
    fn test_link_state_update_external_lsa() {
        let mut body = 1u32.to_be_bytes().to_vec();
        body.extend_from_slice(&external_lsa(100, true));
        let raw = ospf_header(4, &body);

        let packet = OspfPacket::parse(ByteSlice::new(raw)).unwrap();
        let lsas = packet.lsas().unwrap();
        assert_eq!(lsas.len(), 1);
        assert_eq!(lsas[0].header().lsa_type().unwrap(), Some(OspfLsaType::ExternalLsa));

        let (mask, routes) = lsas[0].external().unwrap();
        assert_eq!(mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(routes.len(), 1);
        assert!(routes[0].external_type_2().unwrap());
        assert_eq!(routes[0].metric().unwrap(), 100);
        assert_eq!(routes[0].route_tag().unwrap(), 7);
    }

    fn router_lsa(links: &[([u8; 4], [u8; 4], u8, u16)]) -> Vec<u8> {
        let body_len = 4 + links.len() * 12;
        let mut lsa = vec![0u8; 20];
        lsa[3] = 1; // router
        lsa[18..20].copy_from_slice(&((20 + body_len) as u16).to_be_bytes());
        lsa.extend_from_slice(&[0x01, 0x00]);
        lsa.extend_from_slice(&(links.len() as u16).to_be_bytes());
        for (id, data, link_type, metric) in links {
            lsa.extend_from_slice(id);
            lsa.extend_from_slice(data);
            lsa.push(*link_type);
            lsa.push(0); // no TOS entries
            lsa.extend_from_slice(&metric.to_be_bytes());
        }
        lsa
    }

    #[test]
    fn test_router_lsa_links() {
        let mut body = 1u32.to_be_bytes().to_vec();
        body.extend_from_slice(&router_lsa(&[
            ([10, 0, 0, 2], [10, 0, 0, 1], 2, 10),
            ([10, 0, 1, 0], [255, 255, 255, 0], 3, 1),
        ]));
        let raw = ospf_header(4, &body);

        let packet = OspfPacket::parse(ByteSlice::new(raw)).unwrap();
        let lsas = packet.lsas().unwrap();
        let links = lsas[0].router_links().unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].link_id().unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(links[0].metric().unwrap(), 10);
        assert_eq!(links[1].link_type().unwrap(), 3);
    }

    #[test]
    fn test_packet_length_invariant() {
        let mut raw = ospf_header(1, &hello_body(&[]));
        raw[3] = 0xFF;
        assert!(matches!(
            OspfPacket::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }
}
