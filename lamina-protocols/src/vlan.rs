//! IEEE 802.1Q VLAN tag layer
//!
//! A 4-byte shim between the Ethernet header and its payload: a 16-bit TCI
//! (PCP:3 | DEI:1 | VID:12) followed by the inner EtherType, which recurses
//! exactly like Ethernet's.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::dispatch;
use crate::ethernet::EtherType;
use crate::layer::{require_len, AnyLayer, Layer, Payload, ProtocolKind};

/// Maximum assignable VLAN ID (4095 is reserved)
pub const VLAN_ID_MAX: u16 = 4094;

/// 802.1Q tag
#[derive(Debug)]
pub struct Dot1qTag {
    header: ByteSlice,
    payload: Payload,
}

impl Dot1qTag {
    /// TCI plus inner EtherType
    pub const HEADER_SIZE: usize = 4;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::HEADER_SIZE)?;

        let ethertype = endian::read_u16_be(&header, 2)?;
        let body = header.encapsulated(Some(region.len() - Self::HEADER_SIZE));

        let payload = match dispatch::from_ethertype(ethertype, body.clone())? {
            Some(child) => Payload::Layer(Box::new(child)),
            None => Payload::from_body(body),
        };

        Ok(Self { header, payload })
    }

    /// Synthesize a tag with priority 0 and DEI clear
    pub fn new(vlan_id: u16, ethertype: EtherType) -> Result<Self> {
        if vlan_id > VLAN_ID_MAX {
            return Err(Error::ValueTooLarge {
                max: VLAN_ID_MAX as usize,
                actual: vlan_id as usize,
            });
        }
        let mut raw = vec![0u8; Self::HEADER_SIZE];
        raw[0..2].copy_from_slice(&vlan_id.to_be_bytes());
        raw[2..4].copy_from_slice(&ethertype.to_u16().to_be_bytes());
        Ok(Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        })
    }

    fn tci(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 0)
    }

    /// Priority code point (top 3 bits of the TCI)
    pub fn priority(&self) -> Result<u8> {
        Ok((self.tci()? >> 13) as u8)
    }

    /// Drop eligible indicator (bit 12)
    pub fn dei(&self) -> Result<bool> {
        Ok(self.tci()? & 0x1000 != 0)
    }

    /// VLAN identifier (low 12 bits)
    pub fn vlan_id(&self) -> Result<u16> {
        Ok(self.tci()? & 0x0FFF)
    }

    pub fn ethertype(&self) -> Result<EtherType> {
        Ok(EtherType::from_u16(endian::read_u16_be(&self.header, 2)?))
    }

    pub fn set_priority(&mut self, priority: u8) -> Result<()> {
        if priority > 7 {
            return Err(Error::ValueTooLarge {
                max: 7,
                actual: priority as usize,
            });
        }
        let tci = self.tci()?;
        endian::write_u16_be(&mut self.header, 0, (tci & 0x1FFF) | ((priority as u16) << 13))
    }

    pub fn set_dei(&mut self, dei: bool) -> Result<()> {
        let tci = self.tci()?;
        let tci = if dei { tci | 0x1000 } else { tci & !0x1000 };
        endian::write_u16_be(&mut self.header, 0, tci)
    }

    pub fn set_vlan_id(&mut self, vlan_id: u16) -> Result<()> {
        if vlan_id > VLAN_ID_MAX {
            return Err(Error::ValueTooLarge {
                max: VLAN_ID_MAX as usize,
                actual: vlan_id as usize,
            });
        }
        let tci = self.tci()?;
        endian::write_u16_be(&mut self.header, 0, (tci & 0xF000) | vlan_id)
    }

    pub fn set_ethertype(&mut self, ethertype: EtherType) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, ethertype.to_u16())
    }

    /// Install a child layer, updating the inner EtherType to match
    pub fn set_payload(&mut self, child: AnyLayer) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, child.ethertype_value())?;
        self.payload = Payload::Layer(Box::new(child));
        Ok(())
    }
}

impl Layer for Dot1qTag {
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
        ProtocolKind::Vlan
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        Ok(())
    }
}
