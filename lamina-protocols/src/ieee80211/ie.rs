//! 802.11 information elements
//!
//! One-byte id, one-byte length, value. Elements are viewed in place over
//! the frame buffer; the resize discipline lives on
//! [`Ieee80211Frame::set_information_element`].
//!
//! [`Ieee80211Frame::set_information_element`]: crate::ieee80211::frame::Ieee80211Frame::set_information_element

use lamina_core::Result;
use lamina_core::ByteSlice;

/// Well-known element ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationElementId {
    Ssid,
    SupportedRates,
    DsParameterSet,
    Tim,
    Country,
    HtCapabilities,
    RsnInformation,
    ExtendedSupportedRates,
    VendorSpecific,
    Custom(u8),
}

impl InformationElementId {
    pub fn to_u8(self) -> u8 {
        match self {
            InformationElementId::Ssid => 0,
            InformationElementId::SupportedRates => 1,
            InformationElementId::DsParameterSet => 3,
            InformationElementId::Tim => 5,
            InformationElementId::Country => 7,
            InformationElementId::HtCapabilities => 45,
            InformationElementId::RsnInformation => 48,
            InformationElementId::ExtendedSupportedRates => 50,
            InformationElementId::VendorSpecific => 221,
            InformationElementId::Custom(val) => val,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => InformationElementId::Ssid,
            1 => InformationElementId::SupportedRates,
            3 => InformationElementId::DsParameterSet,
            5 => InformationElementId::Tim,
            7 => InformationElementId::Country,
            45 => InformationElementId::HtCapabilities,
            48 => InformationElementId::RsnInformation,
            50 => InformationElementId::ExtendedSupportedRates,
            221 => InformationElementId::VendorSpecific,
            val => InformationElementId::Custom(val),
        }
    }
}

/// An information element viewed in place
#[derive(Debug, Clone)]
pub struct InformationElement {
    slice: ByteSlice,
    offset: usize,
}

impl InformationElement {
    pub(crate) fn new(slice: ByteSlice, offset: usize) -> Self {
        Self { slice, offset }
    }

    pub fn id(&self) -> Result<u8> {
        self.slice.byte_at(0)
    }

    pub fn element_id(&self) -> Result<InformationElementId> {
        Ok(InformationElementId::from_u8(self.id()?))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.slice.byte_at(1)? as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn value(&self) -> Result<Vec<u8>> {
        let len = self.len()?;
        self.slice.read_slice(2, len)
    }

    /// Offset of this element within its frame
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whole element image, id and length bytes included
    pub fn bytes(&self) -> Vec<u8> {
        self.slice.actual()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_view() {
        let raw = ByteSlice::new(vec![0x00, 0x03, b'l', b'a', b'b']);
        let element = InformationElement::new(raw, 0);
        assert_eq!(element.id().unwrap(), 0);
        assert_eq!(element.element_id().unwrap(), InformationElementId::Ssid);
        assert_eq!(element.len().unwrap(), 3);
        assert_eq!(element.value().unwrap(), b"lab");
        assert_eq!(element.bytes(), vec![0x00, 0x03, b'l', b'a', b'b']);
    }

    #[test]
    fn test_id_mapping() {
        assert_eq!(
            InformationElementId::from_u8(221),
            InformationElementId::VendorSpecific
        );
        assert_eq!(InformationElementId::HtCapabilities.to_u8(), 45);
    }
}
