//! PPPoE layer
//!
//! Six-byte header: version/type nibbles, code, session id and payload
//! length. Session traffic (code 0) encapsulates a PPP frame; discovery
//! packets carry a tag list in the same TLV cursor framework as LLDP,
//! except tag type and length are both 16-bit.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::layer::{require_len, AnyLayer, Layer, Payload, ProtocolKind};
use crate::ppp::PppFrame;
use crate::tlv::RegionCursor;

/// PPPoE discovery and session codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PppoeCode {
    /// Session data (0x00)
    SessionData,
    /// Active Discovery Offer (0x07)
    Pado,
    /// Active Discovery Initiation (0x09)
    Padi,
    /// Active Discovery Request (0x19)
    Padr,
    /// Active Discovery Session-confirmation (0x65)
    Pads,
    /// Active Discovery Terminate (0xA7)
    Padt,
    Custom(u8),
}

impl PppoeCode {
    pub fn to_u8(self) -> u8 {
        match self {
            PppoeCode::SessionData => 0x00,
            PppoeCode::Pado => 0x07,
            PppoeCode::Padi => 0x09,
            PppoeCode::Padr => 0x19,
            PppoeCode::Pads => 0x65,
            PppoeCode::Padt => 0xA7,
            PppoeCode::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => PppoeCode::SessionData,
            0x07 => PppoeCode::Pado,
            0x09 => PppoeCode::Padi,
            0x19 => PppoeCode::Padr,
            0x65 => PppoeCode::Pads,
            0xA7 => PppoeCode::Padt,
            val => PppoeCode::Custom(val),
        }
    }
}

/// PPPoE discovery tag types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PppoeTagType {
    EndOfList,
    ServiceName,
    AcName,
    HostUniq,
    AcCookie,
    VendorSpecific,
    RelaySessionId,
    ServiceNameError,
    AcSystemError,
    GenericError,
    Custom(u16),
}

impl PppoeTagType {
    pub fn to_u16(self) -> u16 {
        match self {
            PppoeTagType::EndOfList => 0x0000,
            PppoeTagType::ServiceName => 0x0101,
            PppoeTagType::AcName => 0x0102,
            PppoeTagType::HostUniq => 0x0103,
            PppoeTagType::AcCookie => 0x0104,
            PppoeTagType::VendorSpecific => 0x0105,
            PppoeTagType::RelaySessionId => 0x0110,
            PppoeTagType::ServiceNameError => 0x0201,
            PppoeTagType::AcSystemError => 0x0202,
            PppoeTagType::GenericError => 0x0203,
            PppoeTagType::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0x0000 => PppoeTagType::EndOfList,
            0x0101 => PppoeTagType::ServiceName,
            0x0102 => PppoeTagType::AcName,
            0x0103 => PppoeTagType::HostUniq,
            0x0104 => PppoeTagType::AcCookie,
            0x0105 => PppoeTagType::VendorSpecific,
            0x0110 => PppoeTagType::RelaySessionId,
            0x0201 => PppoeTagType::ServiceNameError,
            0x0202 => PppoeTagType::AcSystemError,
            0x0203 => PppoeTagType::GenericError,
            val => PppoeTagType::Custom(val),
        }
    }
}

/// A discovery tag viewed in place
#[derive(Debug, Clone)]
pub struct PppoeTag {
    slice: ByteSlice,
}

impl PppoeTag {
    pub fn tag_type(&self) -> Result<PppoeTagType> {
        Ok(PppoeTagType::from_u16(endian::read_u16_be(&self.slice, 0)?))
    }

    pub fn value(&self) -> Result<Vec<u8>> {
        let len = endian::read_u16_be(&self.slice, 2)? as usize;
        self.slice.read_slice(4, len)
    }
}

/// PPPoE packet
#[derive(Debug)]
pub struct PppoePacket {
    header: ByteSlice,
    payload: Payload,
}

impl PppoePacket {
    pub const HEADER_SIZE: usize = 6;

    /// Version and type nibbles for PPPoE v1
    pub const VERSION_TYPE: u8 = 0x11;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let length = endian::read_u16_be(&header, 4)? as usize;
        if length > region.len() - Self::HEADER_SIZE {
            return Err(Error::invariant(format!(
                "PPPoE length {} exceeds the {} available",
                length,
                region.len() - Self::HEADER_SIZE
            )));
        }

        let body = header.encapsulated(Some(length));
        let code = header.byte_at(1)?;

        let payload = if code == 0x00 && !body.is_empty() {
            Payload::Layer(Box::new(AnyLayer::Ppp(PppFrame::parse(body)?)))
        } else {
            Payload::from_body(body)
        };

        Ok(Self { header, payload })
    }

    pub fn version(&self) -> Result<u8> {
        Ok(self.header.byte_at(0)? >> 4)
    }

    pub fn pppoe_type(&self) -> Result<u8> {
        Ok(self.header.byte_at(0)? & 0x0F)
    }

    pub fn code(&self) -> Result<PppoeCode> {
        Ok(PppoeCode::from_u8(self.header.byte_at(1)?))
    }

    pub fn session_id(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 2)
    }

    pub fn length(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 4)
    }

    pub fn set_code(&mut self, code: PppoeCode) -> Result<()> {
        self.header.set_byte_at(1, code.to_u8())
    }

    pub fn set_session_id(&mut self, session_id: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, session_id)
    }

    pub fn set_length(&mut self, length: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 4, length)
    }

    /// Discovery tag list; empty for session traffic
    pub fn tags(&self) -> Result<Vec<PppoeTag>> {
        let Payload::Bytes(body) = &self.payload else {
            return Ok(Vec::new());
        };

        let mut tags = Vec::new();
        let mut cursor = RegionCursor::new(body, 0, body.len())?;
        while cursor.remaining() >= 4 {
            let offset = cursor.position();
            let tag_type = cursor.u16_be()?;
            let len = cursor.u16_be()? as usize;
            cursor.skip(len)?;
            tags.push(PppoeTag {
                slice: body.window(offset, 4 + len)?,
            });
            if tag_type == 0x0000 {
                break;
            }
        }
        Ok(tags)
    }
}

impl Layer for PppoePacket {
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
        ProtocolKind::Pppoe
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        self.set_length(self.payload.byte_len() as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_encapsulates_ppp() {
        let mut raw = vec![0x11, 0x00, 0x00, 0x01];
        let ppp = hex::decode("0021450000140000000040fd0000c0a80001c0a80002").unwrap();
        raw.extend_from_slice(&(ppp.len() as u16).to_be_bytes());
        raw.extend_from_slice(&ppp);

        let packet = PppoePacket::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(packet.code().unwrap(), PppoeCode::SessionData);
        assert_eq!(packet.session_id().unwrap(), 1);
        assert!(matches!(packet.payload().as_layer(), Some(AnyLayer::Ppp(_))));
    }

    #[test]
    fn test_discovery_tags() {
        // PADI with a service name tag and end-of-list
        let mut tags = vec![0x01, 0x01, 0x00, 0x04];
        tags.extend_from_slice(b"fibr");
        tags.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut raw = vec![0x11, 0x09, 0x00, 0x00];
        raw.extend_from_slice(&(tags.len() as u16).to_be_bytes());
        raw.extend_from_slice(&tags);

        let packet = PppoePacket::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(packet.code().unwrap(), PppoeCode::Padi);
        let tags = packet.tags().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].tag_type().unwrap(), PppoeTagType::ServiceName);
        assert_eq!(tags[0].value().unwrap(), b"fibr");
    }

    #[test]
    fn test_length_beyond_buffer() {
        let raw = vec![0x11, 0x09, 0x00, 0x00, 0x00, 0x20];
        assert!(matches!(
            PppoePacket::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }
}
