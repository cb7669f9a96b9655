//! IEEE 802.11 MAC frames
//!
//! Management, control and data frames share the little-endian Frame
//! Control word; everything after it depends on the frame type and
//! subtype. Management frames carry fixed fields and then an information
//! element list; data frames carry their body as payload bytes.

use lamina_core::{endian, Error, Result};
use lamina_core::ByteSlice;

use crate::ethernet::MacAddress;
use crate::ieee80211::ie::InformationElement;
use crate::layer::{require_len, Layer, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

/// The three 802.11 frame classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Management,
    Control,
    Data,
    Extension,
}

impl FrameType {
    pub fn from_u8(value: u8) -> Self {
        match value & 0b11 {
            0 => FrameType::Management,
            1 => FrameType::Control,
            2 => FrameType::Data,
            _ => FrameType::Extension,
        }
    }
}

/// Management frame subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementSubtype {
    AssociationRequest,
    AssociationResponse,
    ReassociationRequest,
    ReassociationResponse,
    ProbeRequest,
    ProbeResponse,
    Beacon,
    Atim,
    Disassociation,
    Authentication,
    Deauthentication,
    Action,
    Custom(u8),
}

impl ManagementSubtype {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ManagementSubtype::AssociationRequest,
            1 => ManagementSubtype::AssociationResponse,
            2 => ManagementSubtype::ReassociationRequest,
            3 => ManagementSubtype::ReassociationResponse,
            4 => ManagementSubtype::ProbeRequest,
            5 => ManagementSubtype::ProbeResponse,
            8 => ManagementSubtype::Beacon,
            9 => ManagementSubtype::Atim,
            10 => ManagementSubtype::Disassociation,
            11 => ManagementSubtype::Authentication,
            12 => ManagementSubtype::Deauthentication,
            13 => ManagementSubtype::Action,
            val => ManagementSubtype::Custom(val),
        }
    }

    /// Size of the fixed parameters between the MAC header and the
    /// information elements
    fn fixed_field_len(self) -> usize {
        match self {
            ManagementSubtype::AssociationRequest => 4,
            ManagementSubtype::AssociationResponse => 6,
            ManagementSubtype::ReassociationRequest => 10,
            ManagementSubtype::ReassociationResponse => 6,
            ManagementSubtype::ProbeRequest => 0,
            ManagementSubtype::ProbeResponse | ManagementSubtype::Beacon => 12,
            ManagementSubtype::Atim => 0,
            ManagementSubtype::Disassociation | ManagementSubtype::Deauthentication => 2,
            ManagementSubtype::Authentication => 6,
            ManagementSubtype::Action | ManagementSubtype::Custom(_) => 0,
        }
    }
}

/// Control frame subtypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSubtype {
    BlockAckRequest,
    BlockAck,
    PsPoll,
    Rts,
    Cts,
    Ack,
    CfEnd,
    Custom(u8),
}

impl ControlSubtype {
    pub fn from_u8(value: u8) -> Self {
        match value {
            8 => ControlSubtype::BlockAckRequest,
            9 => ControlSubtype::BlockAck,
            10 => ControlSubtype::PsPoll,
            11 => ControlSubtype::Rts,
            12 => ControlSubtype::Cts,
            13 => ControlSubtype::Ack,
            14 => ControlSubtype::CfEnd,
            val => ControlSubtype::Custom(val),
        }
    }
}

/// Data frame subtypes; bit 3 marks the QoS variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSubtype {
    Data,
    Null,
    QosData,
    QosNull,
    Custom(u8),
}

impl DataSubtype {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => DataSubtype::Data,
            4 => DataSubtype::Null,
            8 => DataSubtype::QosData,
            12 => DataSubtype::QosNull,
            val => DataSubtype::Custom(val),
        }
    }
}

/// The little-endian Frame Control word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl(pub u16);

impl FrameControl {
    pub fn protocol_version(&self) -> u8 {
        (self.0 & 0b11) as u8
    }

    pub fn frame_type(&self) -> FrameType {
        FrameType::from_u8(((self.0 >> 2) & 0b11) as u8)
    }

    pub fn subtype(&self) -> u8 {
        ((self.0 >> 4) & 0b1111) as u8
    }

    pub fn to_ds(&self) -> bool {
        self.0 & 0x0100 != 0
    }

    pub fn from_ds(&self) -> bool {
        self.0 & 0x0200 != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.0 & 0x0400 != 0
    }

    pub fn retry(&self) -> bool {
        self.0 & 0x0800 != 0
    }

    pub fn power_management(&self) -> bool {
        self.0 & 0x1000 != 0
    }

    pub fn more_data(&self) -> bool {
        self.0 & 0x2000 != 0
    }

    pub fn protected(&self) -> bool {
        self.0 & 0x4000 != 0
    }

    pub fn order(&self) -> bool {
        self.0 & 0x8000 != 0
    }
}

/// An 802.11 MAC frame
///
/// For management and control frames the header slice spans the whole
/// frame (MAC header, fixed fields, information elements); for data
/// frames it spans the MAC header and the body becomes payload bytes.
#[derive(Debug)]
pub struct Ieee80211Frame {
    header: ByteSlice,
    payload: Payload,
}

impl Ieee80211Frame {
    /// Frame control plus duration, the prologue every frame shares
    pub const MIN_SIZE: usize = 10;

    /// MAC header of a management or three-address data frame
    pub const MAC_HEADER_SIZE: usize = 24;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::MIN_SIZE)?;
        let fc = FrameControl(endian::read_u16_le(&region, 0)?);

        match fc.frame_type() {
            FrameType::Management => Self::parse_management(region, fc),
            FrameType::Control => Self::parse_control(region, fc),
            FrameType::Data | FrameType::Extension => Self::parse_data(region, fc),
        }
    }

    fn parse_management(region: ByteSlice, fc: FrameControl) -> Result<Self> {
        require_len(&region, Self::MAC_HEADER_SIZE)?;
        let subtype = ManagementSubtype::from_u8(fc.subtype());
        let fixed_end = Self::MAC_HEADER_SIZE + subtype.fixed_field_len();
        require_len(&region, fixed_end)?;

        let frame = Self {
            header: region,
            payload: Payload::None,
        };
        // Surface malformed element lists at construction
        frame.information_elements()?;
        Ok(frame)
    }

    fn parse_control(region: ByteSlice, fc: FrameControl) -> Result<Self> {
        let size = match ControlSubtype::from_u8(fc.subtype()) {
            ControlSubtype::Cts | ControlSubtype::Ack => 10,
            ControlSubtype::Rts | ControlSubtype::PsPoll | ControlSubtype::CfEnd => 16,
            _ => region.len(),
        };
        require_len(&region, size)?;
        let mut header = region;
        header.set_len(size)?;
        Ok(Self {
            header,
            payload: Payload::None,
        })
    }

    fn parse_data(region: ByteSlice, fc: FrameControl) -> Result<Self> {
        let mut header_len = Self::MAC_HEADER_SIZE;
        if fc.to_ds() && fc.from_ds() {
            header_len += 6; // fourth address
        }
        if fc.subtype() & 0x08 != 0 {
            header_len += 2; // QoS control
        }
        require_len(&region, header_len)?;

        let mut header = region.clone();
        header.set_len(header_len)?;
        let body = header.encapsulated(Some(region.len() - header_len));
        Ok(Self {
            header,
            payload: Payload::from_body(body),
        })
    }

    pub fn frame_control(&self) -> Result<FrameControl> {
        Ok(FrameControl(endian::read_u16_le(&self.header, 0)?))
    }

    pub fn duration(&self) -> Result<u16> {
        endian::read_u16_le(&self.header, 2)
    }

    pub fn address1(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(4, 6)?)
    }

    pub fn address2(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(10, 6)?)
    }

    pub fn address3(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(16, 6)?)
    }

    /// Fourth address of a WDS data frame (ToDS and FromDS both set)
    pub fn address4(&self) -> Result<MacAddress> {
        let fc = self.frame_control()?;
        if !(fc.to_ds() && fc.from_ds()) {
            return Err(Error::invariant("frame has no fourth address"));
        }
        MacAddress::from_slice(&self.header.read_slice(24, 6)?)
    }

    /// Fragment number, the low 4 bits of the sequence control word
    pub fn fragment_number(&self) -> Result<u8> {
        Ok((endian::read_u16_le(&self.header, 22)? & 0x000F) as u8)
    }

    /// Sequence number, the top 12 bits of the sequence control word
    pub fn sequence_number(&self) -> Result<u16> {
        Ok(endian::read_u16_le(&self.header, 22)? >> 4)
    }

    /// QoS control word of a QoS data frame
    pub fn qos_control(&self) -> Result<u16> {
        let fc = self.frame_control()?;
        if fc.frame_type() != FrameType::Data || fc.subtype() & 0x08 == 0 {
            return Err(Error::invariant("frame has no QoS control field"));
        }
        let mut at = Self::MAC_HEADER_SIZE;
        if fc.to_ds() && fc.from_ds() {
            at += 6;
        }
        endian::read_u16_le(&self.header, at)
    }

    fn management_subtype(&self) -> Result<ManagementSubtype> {
        let fc = self.frame_control()?;
        if fc.frame_type() != FrameType::Management {
            return Err(Error::invariant("not a management frame"));
        }
        Ok(ManagementSubtype::from_u8(fc.subtype()))
    }

    /// TSF timestamp of a beacon or probe response
    pub fn beacon_timestamp(&self) -> Result<u64> {
        self.require_subtype(&[ManagementSubtype::Beacon, ManagementSubtype::ProbeResponse])?;
        endian::read_u64_le(&self.header, Self::MAC_HEADER_SIZE)
    }

    /// Beacon interval in time units
    pub fn beacon_interval(&self) -> Result<u16> {
        self.require_subtype(&[ManagementSubtype::Beacon, ManagementSubtype::ProbeResponse])?;
        endian::read_u16_le(&self.header, Self::MAC_HEADER_SIZE + 8)
    }

    /// Capability information of a beacon or probe response
    pub fn capability_info(&self) -> Result<u16> {
        self.require_subtype(&[ManagementSubtype::Beacon, ManagementSubtype::ProbeResponse])?;
        endian::read_u16_le(&self.header, Self::MAC_HEADER_SIZE + 10)
    }

    /// Reason code of a deauthentication or disassociation frame
    pub fn reason_code(&self) -> Result<u16> {
        self.require_subtype(&[
            ManagementSubtype::Deauthentication,
            ManagementSubtype::Disassociation,
        ])?;
        endian::read_u16_le(&self.header, Self::MAC_HEADER_SIZE)
    }

    fn require_subtype(&self, allowed: &[ManagementSubtype]) -> Result<()> {
        let subtype = self.management_subtype()?;
        if !allowed.contains(&subtype) {
            return Err(Error::invariant(format!(
                "field not present on {:?} frames",
                subtype
            )));
        }
        Ok(())
    }

    fn element_region_start(&self) -> Result<usize> {
        Ok(Self::MAC_HEADER_SIZE + self.management_subtype()?.fixed_field_len())
    }

    /// Information elements of a management frame; re-parsed on every call
    pub fn information_elements(&self) -> Result<Vec<InformationElement>> {
        let start = self.element_region_start()?;
        let mut cursor = RegionCursor::new(&self.header, start, self.header.len())?;
        let mut elements = Vec::new();

        while cursor.remaining() >= 2 {
            let offset = cursor.position();
            cursor.u8()?;
            let len = cursor.u8()? as usize;
            cursor.skip(len)?;
            elements.push(InformationElement::new(
                self.header.window(offset, 2 + len)?,
                offset,
            ));
        }
        if cursor.remaining() != 0 {
            return Err(Error::invariant("dangling byte after the last element"));
        }

        Ok(elements)
    }

    /// SSID advertised by a management frame, when the element is present
    pub fn ssid(&self) -> Result<Option<Vec<u8>>> {
        for element in self.information_elements()? {
            if element.id()? == 0 {
                return Ok(Some(element.value()?));
            }
        }
        Ok(None)
    }

    /// Replace the value of the first element with `id`, resizing the
    /// frame when the length changes
    ///
    /// Values are capped at the element length field's 255-byte range. A
    /// resize rebinds this layer to a fresh buffer; element handles
    /// obtained earlier go stale.
    pub fn set_information_element(&mut self, id: u8, new_value: &[u8]) -> Result<()> {
        if new_value.len() > u8::MAX as usize {
            return Err(Error::ValueTooLarge {
                max: u8::MAX as usize,
                actual: new_value.len(),
            });
        }

        let element = self
            .information_elements()?
            .into_iter()
            .find(|element| element.id() == Ok(id))
            .ok_or_else(|| Error::invariant(format!("no element with id {}", id)))?;

        let old_image = self.header.actual();
        let start = element.offset();
        let end = start + 2 + element.len()?;

        let mut fresh = Vec::with_capacity(old_image.len());
        fresh.extend_from_slice(&old_image[..start]);
        fresh.push(id);
        fresh.push(new_value.len() as u8);
        fresh.extend_from_slice(new_value);
        fresh.extend_from_slice(&old_image[end..]);

        self.header.rebind(fresh);
        Ok(())
    }
}

impl Layer for Ieee80211Frame {
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
        ProtocolKind::Ieee80211
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn beacon_frame(ssid: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x0080u16.to_le_bytes()); // type mgmt, subtype 8
        raw.extend_from_slice(&0u16.to_le_bytes()); // duration
        raw.extend_from_slice(&[0xFF; 6]); // da
        raw.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]); // sa
        raw.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]); // bssid
        raw.extend_from_slice(&(7u16 << 4).to_le_bytes()); // seq 7, frag 0
        raw.extend_from_slice(&0x0102030405060708u64.to_le_bytes()); // timestamp
        raw.extend_from_slice(&100u16.to_le_bytes()); // interval
        raw.extend_from_slice(&0x0431u16.to_le_bytes()); // capabilities
        raw.push(0); // SSID element
        raw.push(ssid.len() as u8);
        raw.extend_from_slice(ssid);
        raw.extend_from_slice(&[1, 2, 0x82, 0x84]); // supported rates
        raw
    }

    #[test]
    fn test_frame_control_bits() {
        let fc = FrameControl(u16::from_le_bytes([0x80, 0x00]));
        assert_eq!(fc.protocol_version(), 0);
        assert_eq!(fc.frame_type(), FrameType::Management);
        assert_eq!(fc.subtype(), 8);
        assert!(!fc.to_ds());

        let fc = FrameControl(u16::from_le_bytes([0x08, 0x42]));
        assert_eq!(fc.frame_type(), FrameType::Data);
        assert!(fc.from_ds());
        assert!(fc.protected());
    }

    #[test]
    fn test_beacon_fields_little_endian() {
        let frame = Ieee80211Frame::parse(ByteSlice::new(beacon_frame(b"lab"))).unwrap();
        assert_eq!(frame.beacon_timestamp().unwrap(), 0x0102030405060708);
        assert_eq!(frame.beacon_interval().unwrap(), 100);
        assert_eq!(frame.capability_info().unwrap(), 0x0431);
        assert_eq!(frame.sequence_number().unwrap(), 7);
        assert_eq!(frame.ssid().unwrap().unwrap(), b"lab");
        assert_eq!(frame.address1().unwrap(), MacAddress::BROADCAST);
    }

    #[test]
    fn test_information_element_resize() {
        let mut frame = Ieee80211Frame::parse(ByteSlice::new(beacon_frame(b"lab"))).unwrap();
        let rates_before = frame.information_elements().unwrap()[1].bytes();

        frame.set_information_element(0, b"conference-wifi").unwrap();
        assert_eq!(frame.ssid().unwrap().unwrap(), b"conference-wifi");

        let elements = frame.information_elements().unwrap();
        assert_eq!(elements[0].len().unwrap(), 15);
        assert_eq!(elements[1].bytes(), rates_before);
    }

    #[test]
    fn test_oversized_element_value() {
        let mut frame = Ieee80211Frame::parse(ByteSlice::new(beacon_frame(b"x"))).unwrap();
        assert!(matches!(
            frame.set_information_element(0, &[0u8; 300]),
            Err(Error::ValueTooLarge { max: 255, .. })
        ));
    }

    #[test]
    fn test_ack_frame() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x00D4u16.to_le_bytes()); // control, subtype 13
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&[0xAA; 6]);

        let frame = Ieee80211Frame::parse(ByteSlice::new(raw)).unwrap();
        let fc = frame.frame_control().unwrap();
        assert_eq!(fc.frame_type(), FrameType::Control);
        assert_eq!(ControlSubtype::from_u8(fc.subtype()), ControlSubtype::Ack);
        assert_eq!(frame.header().len(), 10);
    }

    #[test]
    fn test_qos_data_frame() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&0x0088u16.to_le_bytes()); // data, subtype 8 (QoS)
        raw.extend_from_slice(&0u16.to_le_bytes());
        raw.extend_from_slice(&[0x11; 6]);
        raw.extend_from_slice(&[0x22; 6]);
        raw.extend_from_slice(&[0x33; 6]);
        raw.extend_from_slice(&0u16.to_le_bytes()); // sequence control
        raw.extend_from_slice(&5u16.to_le_bytes()); // QoS control
        raw.extend_from_slice(&[0xDE, 0xAD]); // body

        let frame = Ieee80211Frame::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(frame.header().len(), 26);
        assert_eq!(frame.qos_control().unwrap(), 5);
        assert_eq!(frame.payload().as_bytes().unwrap().actual(), vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_truncated_management_frame() {
        let raw = beacon_frame(b"lab")[..30].to_vec();
        assert!(Ieee80211Frame::parse(ByteSlice::new(raw)).is_err());
    }
}
