//! DRDA framing layer
//!
//! DRDA rides TCP as a sequence of DDM messages: a 16-bit length, the DDM
//! magic byte 0xD0, a format byte, a correlation id, a second length and a
//! code point. Only the framing is parsed; message parameters stay opaque
//! bytes, viewable per message.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::layer::{Layer, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

/// Common DDM code points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrdaCodepoint {
    /// Exchange server attributes (0x1041)
    Excsat,
    /// Access security (0x106D)
    Accsec,
    /// Security check (0x106E)
    Secchk,
    /// Access RDB (0x2001)
    Accrdb,
    /// Execute SQL statement (0x200A)
    Excsqlstt,
    /// Execute immediate SQL statement (0x200C)
    Excsqlimm,
    /// Prepare SQL statement (0x200D)
    Prpsqlstt,
    /// SQL statement data (0x2414)
    Sqlstt,
    /// Reply: access RDB response (0x2201)
    Accrdbrm,
    Custom(u16),
}

impl DrdaCodepoint {
    pub fn to_u16(self) -> u16 {
        match self {
            DrdaCodepoint::Excsat => 0x1041,
            DrdaCodepoint::Accsec => 0x106D,
            DrdaCodepoint::Secchk => 0x106E,
            DrdaCodepoint::Accrdb => 0x2001,
            DrdaCodepoint::Excsqlstt => 0x200A,
            DrdaCodepoint::Excsqlimm => 0x200C,
            DrdaCodepoint::Prpsqlstt => 0x200D,
            DrdaCodepoint::Sqlstt => 0x2414,
            DrdaCodepoint::Accrdbrm => 0x2201,
            DrdaCodepoint::Custom(val) => val,
        }
    }

    pub fn from_u16(value: u16) -> Self {
        match value {
            0x1041 => DrdaCodepoint::Excsat,
            0x106D => DrdaCodepoint::Accsec,
            0x106E => DrdaCodepoint::Secchk,
            0x2001 => DrdaCodepoint::Accrdb,
            0x200A => DrdaCodepoint::Excsqlstt,
            0x200C => DrdaCodepoint::Excsqlimm,
            0x200D => DrdaCodepoint::Prpsqlstt,
            0x2414 => DrdaCodepoint::Sqlstt,
            0x2201 => DrdaCodepoint::Accrdbrm,
            val => DrdaCodepoint::Custom(val),
        }
    }
}

/// One DDM message viewed in place
#[derive(Debug, Clone)]
pub struct DdmMessage {
    slice: ByteSlice,
}

impl DdmMessage {
    /// Whole-message length from the envelope
    pub fn length(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 0)
    }

    pub fn format(&self) -> Result<u8> {
        self.slice.byte_at(3)
    }

    pub fn correlation_id(&self) -> Result<u16> {
        endian::read_u16_be(&self.slice, 4)
    }

    pub fn codepoint(&self) -> Result<DrdaCodepoint> {
        Ok(DrdaCodepoint::from_u16(endian::read_u16_be(&self.slice, 8)?))
    }

    /// Parameter bytes after the 10-byte DDM prologue
    pub fn parameters(&self) -> Result<Vec<u8>> {
        self.slice
            .read_slice(DrdaPacket::DDM_HEADER_SIZE, self.slice.len() - DrdaPacket::DDM_HEADER_SIZE)
    }
}

/// DRDA packet: one or more DDM messages
#[derive(Debug)]
pub struct DrdaPacket {
    header: ByteSlice,
    payload: Payload,
}

impl DrdaPacket {
    /// Length, magic, format, correlation id, second length, code point
    pub const DDM_HEADER_SIZE: usize = 10;

    /// The DDM magic byte at offset 2 of every message
    pub const DDM_MAGIC: u8 = 0xD0;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        let packet = Self {
            header: region,
            payload: Payload::None,
        };
        let messages = packet.messages()?;
        if messages.is_empty() {
            return Err(Error::invariant("no DDM messages in DRDA payload"));
        }
        Ok(packet)
    }

    /// Parse the DDM message sequence; re-walked on every call
    pub fn messages(&self) -> Result<Vec<DdmMessage>> {
        let mut messages = Vec::new();
        let mut cursor = RegionCursor::new(&self.header, 0, self.header.len())?;

        while cursor.remaining() >= Self::DDM_HEADER_SIZE {
            let offset = cursor.position();
            let length = cursor.u16_be()? as usize;
            let magic = cursor.u8()?;
            if magic != Self::DDM_MAGIC {
                return Err(Error::invariant(format!(
                    "DDM magic byte is 0x{:02X}",
                    magic
                )));
            }
            if length < Self::DDM_HEADER_SIZE {
                return Err(Error::invariant(format!(
                    "DDM length {} below the envelope size",
                    length
                )));
            }
            // Past format, correlation id, length2 and code point, then the
            // parameters the envelope length covers
            cursor.skip(length - 3)?;
            messages.push(DdmMessage {
                slice: self.header.window(offset, length)?,
            });
        }

        if cursor.remaining() != 0 {
            return Err(Error::invariant(
                "trailing bytes after the last DDM message",
            ));
        }

        Ok(messages)
    }
}

impl Layer for DrdaPacket {
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
        ProtocolKind::Drda
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        Ok(())
    }
}
