//! PPI (Per-Packet Information) envelope
//!
//! A little-endian header (version, flags, length, DLT) followed by
//! length-delimited field records, then the captured frame. Every field -
//! known or not - is preserved verbatim as a typed view, so round-tripping
//! is lossless by construction.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::ieee80211::frame::Ieee80211Frame;
use crate::layer::{require_len, AnyLayer, Layer, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

/// DLT value for IEEE 802.11 frames
pub const DLT_IEEE802_11: u32 = 105;

/// A PPI field record viewed in place
#[derive(Debug, Clone)]
pub struct PpiField {
    field_type: u16,
    slice: ByteSlice,
}

impl PpiField {
    /// 802.11-Common field type
    pub const COMMON_80211: u16 = 2;

    pub fn field_type(&self) -> u16 {
        self.field_type
    }

    /// The field's data bytes, headers excluded
    pub fn data(&self) -> Result<Vec<u8>> {
        self.slice.read_slice(4, self.slice.len() - 4)
    }

    /// Whole record image, type and length headers included
    pub fn bytes(&self) -> Vec<u8> {
        self.slice.actual()
    }
}

/// PPI envelope
#[derive(Debug)]
pub struct PpiFrame {
    header: ByteSlice,
    payload: Payload,
}

impl PpiFrame {
    /// Version, flags, length and DLT
    pub const MIN_HEADER_SIZE: usize = 8;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::MIN_HEADER_SIZE)?;

        let version = region.byte_at(0)?;
        if version != 0 {
            return Err(Error::invariant(format!("PPI version is {}", version)));
        }

        let header_len = endian::read_u16_le(&region, 2)? as usize;
        if header_len < Self::MIN_HEADER_SIZE || header_len > region.len() {
            return Err(Error::invariant(format!(
                "PPI length {} outside of {}..={}",
                header_len,
                Self::MIN_HEADER_SIZE,
                region.len()
            )));
        }

        let mut header = region.clone();
        header.set_len(header_len)?;

        let dlt = endian::read_u32_le(&header, 4)?;
        let body = header.encapsulated(Some(region.len() - header_len));
        let payload = if body.is_empty() {
            Payload::None
        } else if dlt == DLT_IEEE802_11 {
            Payload::Layer(Box::new(AnyLayer::Ieee80211(Ieee80211Frame::parse(body)?)))
        } else {
            Payload::Bytes(body)
        };

        let frame = Self { header, payload };
        frame.fields()?;
        Ok(frame)
    }

    pub fn version(&self) -> Result<u8> {
        self.header.byte_at(0)
    }

    pub fn flags(&self) -> Result<u8> {
        self.header.byte_at(1)
    }

    /// PPI header length, field records included
    pub fn header_length(&self) -> Result<u16> {
        endian::read_u16_le(&self.header, 2)
    }

    /// Data link type of the encapsulated frame
    pub fn dlt(&self) -> Result<u32> {
        endian::read_u32_le(&self.header, 4)
    }

    /// The field records between the fixed header and the frame
    pub fn fields(&self) -> Result<Vec<PpiField>> {
        let mut cursor = RegionCursor::new(&self.header, Self::MIN_HEADER_SIZE, self.header.len())?;
        let mut fields = Vec::new();

        while cursor.remaining() >= 4 {
            let offset = cursor.position();
            let field_type = cursor.u16_le()?;
            let data_len = cursor.u16_le()? as usize;
            cursor.skip(data_len)?;
            fields.push(PpiField {
                field_type,
                slice: self.header.window(offset, 4 + data_len)?,
            });
        }
        if cursor.remaining() != 0 {
            return Err(Error::invariant("dangling bytes after the last PPI field"));
        }

        Ok(fields)
    }
}

impl Layer for PpiFrame {
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
        ProtocolKind::Ppi
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
    use crate::ieee80211::frame::tests::beacon_frame;

    fn ppi_header(fields: &[(u16, &[u8])], dlt: u32) -> Vec<u8> {
        let fields_len: usize = fields.iter().map(|(_, data)| 4 + data.len()).sum();
        let mut raw = vec![0x00, 0x00];
        raw.extend_from_slice(&((8 + fields_len) as u16).to_le_bytes());
        raw.extend_from_slice(&dlt.to_le_bytes());
        for (field_type, data) in fields {
            raw.extend_from_slice(&field_type.to_le_bytes());
            raw.extend_from_slice(&(data.len() as u16).to_le_bytes());
            raw.extend_from_slice(data);
        }
        raw
    }

    #[test]
    fn test_fields_and_payload() {
        let common = [0u8; 20];
        let mut raw = ppi_header(&[(PpiField::COMMON_80211, &common)], DLT_IEEE802_11);
        raw.extend_from_slice(&beacon_frame(b"lab"));

        let frame = PpiFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.dlt().unwrap(), DLT_IEEE802_11);
        let fields = frame.fields().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type(), PpiField::COMMON_80211);
        assert_eq!(fields[0].data().unwrap(), common.to_vec());
        assert!(matches!(
            frame.payload().as_layer(),
            Some(AnyLayer::Ieee80211(_))
        ));
    }

    #[test]
    fn test_unknown_field_preserved() {
        let raw = ppi_header(&[(0x7FFF, &[1, 2, 3])], 1);
        let frame = PpiFrame::parse(ByteSlice::new(raw.clone())).unwrap();
        let fields = frame.fields().unwrap();
        assert_eq!(fields[0].field_type(), 0x7FFF);
        assert_eq!(fields[0].bytes(), &raw[8..]);
        assert_eq!(frame.bytes(), raw);
    }

    #[test]
    fn test_truncated_field_rejected() {
        let mut raw = ppi_header(&[(2, &[0u8; 20])], DLT_IEEE802_11);
        raw.truncate(raw.len() - 4);
        raw[2] = (raw.len() as u8).max(8); // keep declared length consistent
        assert!(PpiFrame::parse(ByteSlice::new(raw)).is_err());
    }
}
