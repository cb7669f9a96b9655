//! LLDP layer
//!
//! An LLDPDU is an ordered TLV sequence terminated by an End-of-LLDPDU
//! TLV. The TLV header is a 16-bit big-endian word: type in the top 7
//! bits, value length in the low 9. The list is re-parsed from the layer's
//! slice on every access; TLV handles obtained before a resizing setter
//! refer to the old buffer and must be re-read.

use std::fmt;

use bytes::{BufMut, BytesMut};
use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::ethernet::MacAddress;
use crate::layer::{Layer, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

/// Largest value a 9-bit TLV length field can describe
pub const TLV_VALUE_MAX: usize = 0x1FF;

/// LLDP TLV types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LldpTlvType {
    EndOfLldpdu,
    ChassisId,
    PortId,
    Ttl,
    PortDescription,
    SystemName,
    SystemDescription,
    SystemCapabilities,
    ManagementAddress,
    OrganizationSpecific,
    Custom(u8),
}

impl LldpTlvType {
    pub fn to_u8(self) -> u8 {
        match self {
            LldpTlvType::EndOfLldpdu => 0,
            LldpTlvType::ChassisId => 1,
            LldpTlvType::PortId => 2,
            LldpTlvType::Ttl => 3,
            LldpTlvType::PortDescription => 4,
            LldpTlvType::SystemName => 5,
            LldpTlvType::SystemDescription => 6,
            LldpTlvType::SystemCapabilities => 7,
            LldpTlvType::ManagementAddress => 8,
            LldpTlvType::OrganizationSpecific => 127,
            LldpTlvType::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LldpTlvType::EndOfLldpdu,
            1 => LldpTlvType::ChassisId,
            2 => LldpTlvType::PortId,
            3 => LldpTlvType::Ttl,
            4 => LldpTlvType::PortDescription,
            5 => LldpTlvType::SystemName,
            6 => LldpTlvType::SystemDescription,
            7 => LldpTlvType::SystemCapabilities,
            8 => LldpTlvType::ManagementAddress,
            127 => LldpTlvType::OrganizationSpecific,
            val => LldpTlvType::Custom(val),
        }
    }
}

/// Chassis ID subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChassisIdSubtype {
    ChassisComponent = 1,
    InterfaceAlias = 2,
    PortComponent = 3,
    MacAddress = 4,
    NetworkAddress = 5,
    InterfaceName = 6,
    LocallyAssigned = 7,
}

/// Port ID subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PortIdSubtype {
    InterfaceAlias = 1,
    PortComponent = 2,
    MacAddress = 3,
    NetworkAddress = 4,
    InterfaceName = 5,
    AgentCircuitId = 6,
    LocallyAssigned = 7,
}

/// Management address subtypes (IANA address family numbers)
pub const MGMT_ADDR_IPV4: u8 = 1;
pub const MGMT_ADDR_IPV6: u8 = 2;

/// A TLV within an LLDPDU, viewed in place
///
/// The slice spans the TLV's two header bytes and its value, aliasing the
/// packet buffer.
#[derive(Debug, Clone)]
pub struct LldpTlv {
    slice: ByteSlice,
    offset: usize,
}

impl LldpTlv {
    pub fn tlv_type(&self) -> Result<LldpTlvType> {
        let word = endian::read_u16_be(&self.slice, 0)?;
        Ok(LldpTlvType::from_u8((word >> 9) as u8))
    }

    /// Value length from the 9-bit length field
    pub fn value_len(&self) -> Result<usize> {
        Ok((endian::read_u16_be(&self.slice, 0)? & 0x1FF) as usize)
    }

    pub fn value(&self) -> Result<Vec<u8>> {
        let len = self.value_len()?;
        self.slice.read_slice(2, len)
    }

    /// Offset of this TLV within the LLDPDU
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whole TLV image, header bytes included
    pub fn bytes(&self) -> Vec<u8> {
        self.slice.actual()
    }
}

impl fmt::Display for LldpTlv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.tlv_type(), self.value()) {
            (Ok(tlv_type), Ok(value)) => {
                write!(f, "{:?}({})", tlv_type, hex::encode(value))
            }
            _ => write!(f, "<malformed TLV>"),
        }
    }
}

/// LLDP packet: the TLV list is the content
#[derive(Debug)]
pub struct LldpPacket {
    header: ByteSlice,
    payload: Payload,
}

impl LldpPacket {
    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        let packet = Self {
            header: region,
            payload: Payload::None,
        };
        // Surface malformed TLV lists at construction
        packet.tlvs()?;
        Ok(packet)
    }

    /// Assemble an LLDPDU from `(type, value)` pairs
    pub fn from_values(tlvs: &[(LldpTlvType, Vec<u8>)]) -> Result<Self> {
        let mut image = BytesMut::new();
        for (tlv_type, value) in tlvs {
            image.put_slice(&encode_tlv(*tlv_type, value)?);
        }
        Ok(Self {
            header: ByteSlice::new(image.to_vec()),
            payload: Payload::None,
        })
    }

    /// Assemble an LLDPDU with the three mandatory TLVs and the terminator
    pub fn new_basic(chassis_mac: MacAddress, port_id: &str, ttl: u16) -> Result<Self> {
        let mut chassis = vec![ChassisIdSubtype::MacAddress as u8];
        chassis.extend_from_slice(chassis_mac.as_bytes());
        let mut port = vec![PortIdSubtype::InterfaceName as u8];
        port.extend_from_slice(port_id.as_bytes());
        Self::from_values(&[
            (LldpTlvType::ChassisId, chassis),
            (LldpTlvType::PortId, port),
            (LldpTlvType::Ttl, ttl.to_be_bytes().to_vec()),
            (LldpTlvType::EndOfLldpdu, Vec::new()),
        ])
    }

    /// Parse the TLV list; stops after the End-of-LLDPDU TLV
    pub fn tlvs(&self) -> Result<Vec<LldpTlv>> {
        let mut tlvs = Vec::new();
        let mut cursor = RegionCursor::new(&self.header, 0, self.header.len())?;

        while cursor.remaining() >= 2 {
            let offset = cursor.position();
            let word = cursor.u16_be()?;
            let tlv_type = (word >> 9) as u8;
            let len = (word & 0x1FF) as usize;
            if len > cursor.remaining() {
                return Err(Error::invariant(format!(
                    "TLV length {} runs past the LLDPDU end",
                    len
                )));
            }
            cursor.skip(len)?;
            tlvs.push(LldpTlv {
                slice: self.header.window(offset, 2 + len)?,
                offset,
            });
            if tlv_type == 0 {
                break;
            }
        }

        Ok(tlvs)
    }

    fn find_tlv(&self, tlv_type: LldpTlvType) -> Result<Option<LldpTlv>> {
        Ok(self
            .tlvs()?
            .into_iter()
            .find(|tlv| tlv.tlv_type() == Ok(tlv_type)))
    }

    /// Chassis ID value bytes (subtype byte included)
    pub fn chassis_id(&self) -> Result<Option<Vec<u8>>> {
        match self.find_tlv(LldpTlvType::ChassisId)? {
            Some(tlv) => Ok(Some(tlv.value()?)),
            None => Ok(None),
        }
    }

    /// System name as UTF-8, when present and decodable
    pub fn system_name(&self) -> Result<Option<String>> {
        match self.find_tlv(LldpTlvType::SystemName)? {
            Some(tlv) => Ok(String::from_utf8(tlv.value()?).ok()),
            None => Ok(None),
        }
    }

    /// Time-to-live in seconds
    pub fn ttl(&self) -> Result<Option<u16>> {
        match self.find_tlv(LldpTlvType::Ttl)? {
            Some(tlv) => {
                let value = tlv.value()?;
                if value.len() != 2 {
                    return Err(Error::invariant("TTL TLV value is not two bytes"));
                }
                Ok(Some(u16::from_be_bytes([value[0], value[1]])))
            }
            None => Ok(None),
        }
    }

    /// Management address as `(subtype, address bytes)`
    pub fn management_address(&self) -> Result<Option<(u8, Vec<u8>)>> {
        let Some(tlv) = self.find_tlv(LldpTlvType::ManagementAddress)? else {
            return Ok(None);
        };
        let value = tlv.value()?;
        if value.is_empty() {
            return Err(Error::invariant("empty management address TLV"));
        }
        let addr_len = value[0] as usize;
        if addr_len < 1 || 1 + addr_len > value.len() {
            return Err(Error::invariant(
                "management address length runs past the TLV value",
            ));
        }
        Ok(Some((value[1], value[2..1 + addr_len].to_vec())))
    }

    /// Replace the management address, resizing the TLV when the new
    /// address length differs
    ///
    /// The address string length and the TLV length field are rewritten;
    /// the trailing interface-numbering and OID fields are preserved
    /// byte-for-byte, as are all other TLVs. A length change rebinds this
    /// layer to a fresh buffer.
    pub fn set_management_address(&mut self, subtype: u8, address: &[u8]) -> Result<()> {
        let tlv = self
            .find_tlv(LldpTlvType::ManagementAddress)?
            .ok_or_else(|| Error::invariant("no management address TLV to rewrite"))?;

        let old_value = tlv.value()?;
        if old_value.is_empty() {
            return Err(Error::invariant("empty management address TLV"));
        }
        let old_addr_len = old_value[0] as usize;
        if old_addr_len < 1 || 1 + old_addr_len > old_value.len() {
            return Err(Error::invariant(
                "management address length runs past the TLV value",
            ));
        }

        if address.len() > 254 {
            return Err(Error::ValueTooLarge {
                max: 254,
                actual: address.len(),
            });
        }

        let trailing = &old_value[1 + old_addr_len..];
        let mut new_value = Vec::with_capacity(2 + address.len() + trailing.len());
        new_value.push((address.len() + 1) as u8);
        new_value.push(subtype);
        new_value.extend_from_slice(address);
        new_value.extend_from_slice(trailing);

        self.replace_tlv(&tlv, LldpTlvType::ManagementAddress, &new_value)
    }

    /// Replace an organizationally-specific TLV's value with
    /// `OUI | subtype | info`, resizing as needed
    pub fn set_organization_specific(
        &mut self,
        oui: [u8; 3],
        subtype: u8,
        info: &[u8],
    ) -> Result<()> {
        let tlv = self
            .find_tlv(LldpTlvType::OrganizationSpecific)?
            .ok_or_else(|| Error::invariant("no organizationally-specific TLV to rewrite"))?;

        let mut new_value = Vec::with_capacity(4 + info.len());
        new_value.extend_from_slice(&oui);
        new_value.push(subtype);
        new_value.extend_from_slice(info);

        self.replace_tlv(&tlv, LldpTlvType::OrganizationSpecific, &new_value)
    }

    // Rebuilds the LLDPDU image around the replaced TLV and rebinds the
    // layer's slice to the fresh buffer.
    fn replace_tlv(&mut self, tlv: &LldpTlv, tlv_type: LldpTlvType, new_value: &[u8]) -> Result<()> {
        let old_image = self.header.actual();
        let start = tlv.offset();
        let end = start + 2 + tlv.value_len()?;

        let mut fresh = BytesMut::with_capacity(old_image.len());
        fresh.put_slice(&old_image[..start]);
        fresh.put_slice(&encode_tlv(tlv_type, new_value)?);
        fresh.put_slice(&old_image[end..]);

        self.header.rebind(fresh.to_vec());
        Ok(())
    }
}

/// Encode one TLV as `type(7) | length(9)` plus the value bytes
pub fn encode_tlv(tlv_type: LldpTlvType, value: &[u8]) -> Result<Vec<u8>> {
    if value.len() > TLV_VALUE_MAX {
        return Err(Error::ValueTooLarge {
            max: TLV_VALUE_MAX,
            actual: value.len(),
        });
    }
    let word = ((tlv_type.to_u8() as u16 & 0x7F) << 9) | (value.len() as u16);
    let mut bytes = Vec::with_capacity(2 + value.len());
    bytes.extend_from_slice(&word.to_be_bytes());
    bytes.extend_from_slice(value);
    Ok(bytes)
}

impl Layer for LldpPacket {
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
        ProtocolKind::Lldp
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mgmt_value(address: &[u8]) -> Vec<u8> {
        // addr string length | subtype | address | ifsubtype | ifnumber(4) | oid len
        let mut value = vec![(address.len() + 1) as u8, MGMT_ADDR_IPV4];
        value.extend_from_slice(address);
        value.extend_from_slice(&[2, 0, 0, 0, 7, 0]);
        value
    }

    #[test]
    fn test_tlv_header_split() {
        let packet = LldpPacket::from_values(&[
            (LldpTlvType::SystemName, b"TestRouter".to_vec()),
            (LldpTlvType::EndOfLldpdu, Vec::new()),
        ])
        .unwrap();

        let image = packet.bytes();
        // Type 5, length 10
        assert_eq!(image[0], 0x0A);
        assert_eq!(image[1], 0x0A);
        assert_eq!(packet.system_name().unwrap().unwrap(), "TestRouter");
    }

    #[test]
    fn test_basic_packet_roundtrip() {
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let packet = LldpPacket::new_basic(mac, "eth0", 120).unwrap();

        let reparsed = LldpPacket::parse(ByteSlice::new(packet.bytes())).unwrap();
        let tlvs = reparsed.tlvs().unwrap();
        assert_eq!(tlvs.len(), 4);
        assert_eq!(tlvs[0].tlv_type().unwrap(), LldpTlvType::ChassisId);
        assert_eq!(tlvs[3].tlv_type().unwrap(), LldpTlvType::EndOfLldpdu);
        assert_eq!(reparsed.ttl().unwrap(), Some(120));
    }

    #[test]
    fn test_truncated_tlv_rejected() {
        // SystemName TLV declaring 10 bytes with only 4 present
        let raw = vec![0x0A, 0x0A, b'a', b'b', b'c', b'd'];
        assert!(matches!(
            LldpPacket::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }

    #[test]
    fn test_management_address_resize_preserves_neighbors() {
        let packet = LldpPacket::from_values(&[
            (LldpTlvType::ManagementAddress, mgmt_value(&[10, 0, 0, 1])),
            (LldpTlvType::SystemName, b"core-switch".to_vec()),
            (LldpTlvType::EndOfLldpdu, Vec::new()),
        ])
        .unwrap();
        let mut packet = packet;

        let before: Vec<Vec<u8>> = packet.tlvs().unwrap()[1..]
            .iter()
            .map(|tlv| tlv.bytes())
            .collect();

        let v6 = "2001:db8::1".parse::<std::net::Ipv6Addr>().unwrap().octets();
        packet.set_management_address(MGMT_ADDR_IPV6, &v6).unwrap();

        let tlvs = packet.tlvs().unwrap();
        let (subtype, address) = packet.management_address().unwrap().unwrap();
        assert_eq!(subtype, MGMT_ADDR_IPV6);
        assert_eq!(address, v6);
        // Length field reflects the new value size
        assert_eq!(tlvs[0].value_len().unwrap(), 2 + 16 + 6);
        // Trailing fixed fields survive the resize
        assert_eq!(&tlvs[0].value().unwrap()[18..], &[2, 0, 0, 0, 7, 0]);
        // Subsequent TLVs are byte-identical
        let after: Vec<Vec<u8>> = tlvs[1..].iter().map(|tlv| tlv.bytes()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_oversized_value_rejected() {
        let packet = LldpPacket::from_values(&[
            (LldpTlvType::OrganizationSpecific, vec![0, 0, 0x0C, 1]),
            (LldpTlvType::EndOfLldpdu, Vec::new()),
        ])
        .unwrap();
        let mut packet = packet;
        let huge = vec![0u8; 600];
        assert!(matches!(
            packet.set_organization_specific([0, 0, 0x0C], 1, &huge),
            Err(Error::ValueTooLarge { .. })
        ));
    }
}
