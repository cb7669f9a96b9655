//! Radiotap radio metadata envelope
//!
//! A little-endian header (version, length, chained present bitmasks)
//! followed by naturally-aligned field records in present-bit order, then
//! the 802.11 frame itself. Parsing stops at the first present bit whose
//! layout is unknown; the remainder of the field region is preserved
//! verbatim so re-serialization is lossless.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::ieee80211::frame::Ieee80211Frame;
use crate::layer::{require_len, AnyLayer, Layer, Payload, ProtocolKind};

/// A parsed radiotap field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadiotapField {
    /// Bit 0: TSF timer at the first bit of the frame
    Tsft(u64),
    /// Bit 1
    Flags(u8),
    /// Bit 2: rate in 500 kbps units
    Rate(u8),
    /// Bit 3: frequency in MHz plus channel flags
    Channel { frequency: u16, flags: u16 },
    /// Bit 4
    Fhss { hop_set: u8, hop_pattern: u8 },
    /// Bit 5: dBm
    AntennaSignal(i8),
    /// Bit 6: dBm
    AntennaNoise(i8),
    /// Bit 7
    LockQuality(u16),
    /// Bit 8
    TxAttenuation(u16),
    /// Bit 9
    DbTxAttenuation(u16),
    /// Bit 10: dBm
    TxPower(i8),
    /// Bit 11
    Antenna(u8),
    /// Bit 12: dB
    DbAntennaSignal(u8),
    /// Bit 13: dB
    DbAntennaNoise(u8),
    /// First unknown present bit and the rest of the field region,
    /// preserved verbatim
    Unknown { bit: u8, bytes: Vec<u8> },
}

// (alignment, size) per known present bit
const FIELD_LAYOUT: [(usize, usize); 14] = [
    (8, 8), // TSFT
    (1, 1), // Flags
    (1, 1), // Rate
    (2, 4), // Channel
    (2, 2), // FHSS
    (1, 1), // AntennaSignal
    (1, 1), // AntennaNoise
    (2, 2), // LockQuality
    (2, 2), // TxAttenuation
    (2, 2), // DbTxAttenuation
    (1, 1), // TxPower
    (1, 1), // Antenna
    (1, 1), // DbAntennaSignal
    (1, 1), // DbAntennaNoise
];

/// Bit 31 chains another present word
const PRESENT_EXT: u32 = 1 << 31;

/// Radiotap envelope around an 802.11 frame
#[derive(Debug)]
pub struct RadiotapFrame {
    header: ByteSlice,
    payload: Payload,
}

impl RadiotapFrame {
    /// Version, pad, length and the first present word
    pub const MIN_HEADER_SIZE: usize = 8;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::MIN_HEADER_SIZE)?;

        let version = region.byte_at(0)?;
        if version != 0 {
            return Err(Error::invariant(format!(
                "radiotap version is {}",
                version
            )));
        }

        let header_len = endian::read_u16_le(&region, 2)? as usize;
        if header_len < Self::MIN_HEADER_SIZE || header_len > region.len() {
            return Err(Error::invariant(format!(
                "radiotap length {} outside of {}..={}",
                header_len,
                Self::MIN_HEADER_SIZE,
                region.len()
            )));
        }

        let mut header = region.clone();
        header.set_len(header_len)?;

        let body = header.encapsulated(Some(region.len() - header_len));
        let payload = if body.is_empty() {
            Payload::None
        } else {
            Payload::Layer(Box::new(AnyLayer::Ieee80211(Ieee80211Frame::parse(body)?)))
        };

        let frame = Self { header, payload };
        frame.fields()?;
        Ok(frame)
    }

    pub fn version(&self) -> Result<u8> {
        self.header.byte_at(0)
    }

    /// Radiotap header length, fields included
    pub fn header_length(&self) -> Result<u16> {
        endian::read_u16_le(&self.header, 2)
    }

    /// The present bitmask words, in chain order
    pub fn present_words(&self) -> Result<Vec<u32>> {
        let mut words = Vec::new();
        let mut at = 4;
        loop {
            let word = endian::read_u32_le(&self.header, at)?;
            words.push(word);
            if word & PRESENT_EXT == 0 {
                break;
            }
            at += 4;
        }
        Ok(words)
    }

    /// Parse the field records in present-bit order; re-parsed per call
    pub fn fields(&self) -> Result<Vec<RadiotapField>> {
        let words = self.present_words()?;
        let mut at = 4 + words.len() * 4;
        let mut fields = Vec::new();

        // Only the first word's bits describe field layouts we know
        let present = words[0];
        for bit in 0..31u8 {
            if present & (1 << bit) == 0 {
                continue;
            }
            let Some(&(alignment, size)) = FIELD_LAYOUT.get(bit as usize) else {
                // Alignment of later fields is unknowable from here; keep
                // the rest verbatim
                let rest = self.header.read_slice(at, self.header.len() - at)?;
                fields.push(RadiotapField::Unknown { bit, bytes: rest });
                return Ok(fields);
            };

            at = align(at, alignment);
            if at + size > self.header.len() {
                return Err(Error::invariant(
                    "radiotap field runs past the declared header length",
                ));
            }
            fields.push(self.read_field(bit, at)?);
            at += size;
        }

        Ok(fields)
    }

    fn read_field(&self, bit: u8, at: usize) -> Result<RadiotapField> {
        let field = match bit {
            0 => RadiotapField::Tsft(endian::read_u64_le(&self.header, at)?),
            1 => RadiotapField::Flags(self.header.byte_at(at)?),
            2 => RadiotapField::Rate(self.header.byte_at(at)?),
            3 => RadiotapField::Channel {
                frequency: endian::read_u16_le(&self.header, at)?,
                flags: endian::read_u16_le(&self.header, at + 2)?,
            },
            4 => RadiotapField::Fhss {
                hop_set: self.header.byte_at(at)?,
                hop_pattern: self.header.byte_at(at + 1)?,
            },
            5 => RadiotapField::AntennaSignal(self.header.byte_at(at)? as i8),
            6 => RadiotapField::AntennaNoise(self.header.byte_at(at)? as i8),
            7 => RadiotapField::LockQuality(endian::read_u16_le(&self.header, at)?),
            8 => RadiotapField::TxAttenuation(endian::read_u16_le(&self.header, at)?),
            9 => RadiotapField::DbTxAttenuation(endian::read_u16_le(&self.header, at)?),
            10 => RadiotapField::TxPower(self.header.byte_at(at)? as i8),
            11 => RadiotapField::Antenna(self.header.byte_at(at)?),
            12 => RadiotapField::DbAntennaSignal(self.header.byte_at(at)?),
            13 => RadiotapField::DbAntennaNoise(self.header.byte_at(at)?),
            _ => unreachable!("bits above 13 have no layout entry"),
        };
        Ok(field)
    }
}

fn align(at: usize, alignment: usize) -> usize {
    (at + alignment - 1) / alignment * alignment
}

impl Layer for RadiotapFrame {
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
        ProtocolKind::Radiotap
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

    fn radiotap_header() -> Vec<u8> {
        // present: flags | rate | channel | antenna signal
        let present: u32 = (1 << 1) | (1 << 2) | (1 << 3) | (1 << 5);
        let mut raw = vec![0x00, 0x00]; // version, pad
        raw.extend_from_slice(&16u16.to_le_bytes()); // header length
        raw.extend_from_slice(&present.to_le_bytes());
        raw.push(0x10); // flags: FCS at end
        raw.push(0x04); // rate: 2 Mbps
        raw.extend_from_slice(&2412u16.to_le_bytes()); // channel 1
        raw.extend_from_slice(&0x00A0u16.to_le_bytes()); // channel flags
        raw.push((-40i8) as u8); // signal
        raw.push(0x00); // padding up to the declared length
        raw
    }

    #[test]
    fn test_fields_and_payload() {
        let mut raw = radiotap_header();
        raw.extend_from_slice(&beacon_frame(b"lab"));

        let frame = RadiotapFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.version().unwrap(), 0);
        assert_eq!(frame.header_length().unwrap(), 16);
        assert_eq!(
            frame.fields().unwrap(),
            vec![
                RadiotapField::Flags(0x10),
                RadiotapField::Rate(0x04),
                RadiotapField::Channel { frequency: 2412, flags: 0x00A0 },
                RadiotapField::AntennaSignal(-40),
            ]
        );
        assert!(matches!(
            frame.payload().as_layer(),
            Some(AnyLayer::Ieee80211(_))
        ));
    }

    #[test]
    fn test_tsft_alignment() {
        // TSFT present alone: aligned to 8, right after the present word
        let present: u32 = 1;
        let mut raw = vec![0x00, 0x00];
        raw.extend_from_slice(&16u16.to_le_bytes());
        raw.extend_from_slice(&present.to_le_bytes());
        raw.extend_from_slice(&0x1122334455667788u64.to_le_bytes());

        let frame = RadiotapFrame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(
            frame.fields().unwrap(),
            vec![RadiotapField::Tsft(0x1122334455667788)]
        );
    }

    #[test]
    fn test_unknown_bit_preserves_rest() {
        // Bit 14 (RX flags) has no layout entry here
        let present: u32 = (1 << 1) | (1 << 14);
        let mut raw = vec![0x00, 0x00];
        raw.extend_from_slice(&12u16.to_le_bytes());
        raw.extend_from_slice(&present.to_le_bytes());
        raw.push(0x02); // flags value
        raw.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let frame = RadiotapFrame::parse(ByteSlice::new(raw)).unwrap();
        let fields = frame.fields().unwrap();
        assert_eq!(fields[0], RadiotapField::Flags(0x02));
        assert_eq!(
            fields[1],
            RadiotapField::Unknown { bit: 14, bytes: vec![0xAA, 0xBB, 0xCC] }
        );
        // Lossless round-trip regardless of the unknown field
        assert_eq!(frame.bytes().len(), 12);
    }

    #[test]
    fn test_bad_version() {
        let mut raw = radiotap_header();
        raw[0] = 1;
        assert!(matches!(
            RadiotapFrame::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }
}
