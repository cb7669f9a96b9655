//! TCP segment layer
//!
//! The header spans `DataOffset * 4` bytes; the region between byte 20 and
//! the end of the header carries the option list. Options are re-parsed
//! from the header slice on every call to [`TcpSegment::options`], so there
//! is no cache to invalidate; callers that iterate repeatedly should hold
//! on to the returned vector.

use lamina_core::{checksum, endian, Error, Result};
use lamina_core::ByteSlice;

use crate::drda::DrdaPacket;
use crate::layer::{require_len, AnyLayer, Layer, NetContext, Payload, ProtocolKind};
use crate::tlv::RegionCursor;

/// TCP flags, the low 9 bits of the data-offset word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags {
    /// FIN - no more data from sender
    pub fin: bool,
    /// SYN - synchronize sequence numbers
    pub syn: bool,
    /// RST - reset the connection
    pub rst: bool,
    /// PSH - push function
    pub psh: bool,
    /// ACK - acknowledgment field is significant
    pub ack: bool,
    /// URG - urgent pointer field is significant
    pub urg: bool,
    /// ECE - ECN echo
    pub ece: bool,
    /// CWR - congestion window reduced
    pub cwr: bool,
    /// NS - ECN nonce sum
    pub ns: bool,
}

impl TcpFlags {
    pub const FIN: u16 = 0x001;
    pub const SYN: u16 = 0x002;
    pub const RST: u16 = 0x004;
    pub const PSH: u16 = 0x008;
    pub const ACK: u16 = 0x010;
    pub const URG: u16 = 0x020;
    pub const ECE: u16 = 0x040;
    pub const CWR: u16 = 0x080;
    pub const NS: u16 = 0x100;

    pub fn to_u16(self) -> u16 {
        let mut bits = 0u16;
        if self.fin {
            bits |= Self::FIN;
        }
        if self.syn {
            bits |= Self::SYN;
        }
        if self.rst {
            bits |= Self::RST;
        }
        if self.psh {
            bits |= Self::PSH;
        }
        if self.ack {
            bits |= Self::ACK;
        }
        if self.urg {
            bits |= Self::URG;
        }
        if self.ece {
            bits |= Self::ECE;
        }
        if self.cwr {
            bits |= Self::CWR;
        }
        if self.ns {
            bits |= Self::NS;
        }
        bits
    }

    pub fn from_u16(bits: u16) -> Self {
        TcpFlags {
            fin: bits & Self::FIN != 0,
            syn: bits & Self::SYN != 0,
            rst: bits & Self::RST != 0,
            psh: bits & Self::PSH != 0,
            ack: bits & Self::ACK != 0,
            urg: bits & Self::URG != 0,
            ece: bits & Self::ECE != 0,
            cwr: bits & Self::CWR != 0,
            ns: bits & Self::NS != 0,
        }
    }
}

/// A parsed TCP option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpOption {
    /// Kind 0, one byte, terminates the list
    EndOfOptionList,
    /// Kind 1, one byte of padding
    NoOperation,
    /// Kind 2
    MaximumSegmentSize(u16),
    /// Kind 3
    WindowScale(u8),
    /// Kind 4
    SackPermitted,
    /// Kind 5: (left edge, right edge) blocks
    Sack(Vec<(u32, u32)>),
    /// Kind 6
    Echo(u32),
    /// Kind 7
    EchoReply(u32),
    /// Kind 8
    Timestamp { value: u32, echo_reply: u32 },
    /// Kind 14
    AlternateChecksumRequest(u8),
    /// Kind 15
    AlternateChecksumData(Vec<u8>),
    /// Kind 19
    Md5Signature([u8; 16]),
    /// Kind 28
    UserTimeout(u16),
}

/// Experimental option kinds that are rejected rather than parsed
const EXPERIMENTAL_OPTION_KINDS: [u8; 6] = [9, 10, 11, 12, 13, 27];

/// TCP segment
#[derive(Debug)]
pub struct TcpSegment {
    header: ByteSlice,
    payload: Payload,
    net: Option<NetContext>,
}

impl TcpSegment {
    /// Minimum TCP header size (DataOffset = 5)
    pub const MIN_HEADER_SIZE: usize = 20;

    pub(crate) fn parse(region: ByteSlice, net: Option<NetContext>) -> Result<Self> {
        require_len(&region, Self::MIN_HEADER_SIZE)?;
        let mut header = region.clone();
        header.set_len(Self::MIN_HEADER_SIZE)?;

        let header_len = ((header.byte_at(12)? >> 4) as usize) * 4;
        if header_len < Self::MIN_HEADER_SIZE {
            return Err(Error::invariant(format!(
                "TCP data offset of {} bytes below minimum header",
                header_len
            )));
        }
        if header_len > region.len() {
            return Err(Error::invariant(format!(
                "TCP data offset of {} bytes exceeds the {} available",
                header_len,
                region.len()
            )));
        }
        header.set_len(header_len)?;

        let body = header.encapsulated(Some(region.len() - header_len));
        let payload = Self::dissect_body(body);

        Ok(Self { header, payload, net })
    }

    // DRDA rides on TCP with no port convention worth trusting; the DDM
    // magic byte at offset 2 is the heuristic. Anything that fails to
    // frame stays raw bytes.
    fn dissect_body(body: ByteSlice) -> Payload {
        if body.len() >= DrdaPacket::DDM_HEADER_SIZE
            && body.byte_at(2) == Ok(DrdaPacket::DDM_MAGIC)
        {
            if let Ok(drda) = DrdaPacket::parse(body.clone()) {
                return Payload::Layer(Box::new(AnyLayer::Drda(drda)));
            }
        }
        Payload::from_body(body)
    }

    /// Synthesize a minimal header with no options
    pub fn new(source_port: u16, destination_port: u16) -> Self {
        let mut raw = vec![0u8; Self::MIN_HEADER_SIZE];
        raw[0..2].copy_from_slice(&source_port.to_be_bytes());
        raw[2..4].copy_from_slice(&destination_port.to_be_bytes());
        raw[12] = 5 << 4; // data offset
        raw[14..16].copy_from_slice(&0xFFFFu16.to_be_bytes()); // window
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

    pub fn sequence_number(&self) -> Result<u32> {
        endian::read_u32_be(&self.header, 4)
    }

    pub fn acknowledgment_number(&self) -> Result<u32> {
        endian::read_u32_be(&self.header, 8)
    }

    /// Header length in 32-bit words
    pub fn data_offset(&self) -> Result<u8> {
        Ok(self.header.byte_at(12)? >> 4)
    }

    pub fn flags(&self) -> Result<TcpFlags> {
        Ok(TcpFlags::from_u16(endian::read_u16_be(&self.header, 12)? & 0x01FF))
    }

    pub fn window_size(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 14)
    }

    pub fn checksum(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 16)
    }

    pub fn urgent_pointer(&self) -> Result<u16> {
        endian::read_u16_be(&self.header, 18)
    }

    pub fn set_source_port(&mut self, port: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 0, port)
    }

    pub fn set_destination_port(&mut self, port: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 2, port)
    }

    pub fn set_sequence_number(&mut self, seq: u32) -> Result<()> {
        endian::write_u32_be(&mut self.header, 4, seq)
    }

    pub fn set_acknowledgment_number(&mut self, ack: u32) -> Result<()> {
        endian::write_u32_be(&mut self.header, 8, ack)
    }

    pub fn set_window_size(&mut self, window: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 14, window)
    }

    pub fn set_urgent_pointer(&mut self, pointer: u16) -> Result<()> {
        endian::write_u16_be(&mut self.header, 18, pointer)
    }

    fn flag(&self, mask: u16) -> Result<bool> {
        Ok(endian::read_u16_be(&self.header, 12)? & mask != 0)
    }

    fn set_flag(&mut self, mask: u16, value: bool) -> Result<()> {
        let word = endian::read_u16_be(&self.header, 12)?;
        let word = if value { word | mask } else { word & !mask };
        endian::write_u16_be(&mut self.header, 12, word)
    }

    pub fn fin(&self) -> Result<bool> {
        self.flag(TcpFlags::FIN)
    }

    pub fn syn(&self) -> Result<bool> {
        self.flag(TcpFlags::SYN)
    }

    pub fn rst(&self) -> Result<bool> {
        self.flag(TcpFlags::RST)
    }

    pub fn psh(&self) -> Result<bool> {
        self.flag(TcpFlags::PSH)
    }

    pub fn ack(&self) -> Result<bool> {
        self.flag(TcpFlags::ACK)
    }

    pub fn urg(&self) -> Result<bool> {
        self.flag(TcpFlags::URG)
    }

    pub fn set_fin(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::FIN, value)
    }

    pub fn set_syn(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::SYN, value)
    }

    pub fn set_rst(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::RST, value)
    }

    pub fn set_psh(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::PSH, value)
    }

    pub fn set_ack(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::ACK, value)
    }

    pub fn set_urg(&mut self, value: bool) -> Result<()> {
        self.set_flag(TcpFlags::URG, value)
    }

    /// Replace all nine flag bits at once, leaving the data offset alone
    pub fn set_flags(&mut self, flags: TcpFlags) -> Result<()> {
        let word = endian::read_u16_be(&self.header, 12)?;
        endian::write_u16_be(&mut self.header, 12, (word & 0xFE00) | flags.to_u16())
    }

    /// Parse the option list from the region between byte 20 and
    /// `DataOffset * 4`
    ///
    /// The list is re-parsed on every call. Experimental option kinds are
    /// rejected with [`Error::UnsupportedOption`]; kinds this library has
    /// never heard of fail with [`Error::UnknownOption`].
    pub fn options(&self) -> Result<Vec<TcpOption>> {
        let header_len = self.data_offset()? as usize * 4;
        let mut cursor = RegionCursor::new(&self.header, Self::MIN_HEADER_SIZE, header_len)?;
        let mut options = Vec::new();

        while !cursor.at_end() {
            let kind = cursor.u8()?;
            match kind {
                0 => {
                    options.push(TcpOption::EndOfOptionList);
                    break;
                }
                1 => options.push(TcpOption::NoOperation),
                kind if EXPERIMENTAL_OPTION_KINDS.contains(&kind) => {
                    return Err(Error::UnsupportedOption(kind));
                }
                kind => {
                    let length = cursor.u8()? as usize;
                    if length < 2 {
                        return Err(Error::invariant(format!(
                            "TCP option kind {} declares length {}",
                            kind, length
                        )));
                    }
                    let value = cursor.take(length - 2)?;
                    options.push(decode_option(kind, &value)?);
                }
            }
        }

        Ok(options)
    }

    /// Upper-layer length for the pseudo-header: header plus payload
    fn segment_len(&self) -> usize {
        self.header.len() + self.payload.byte_len()
    }

    fn segment_image(&self) -> Vec<u8> {
        let mut image = self.header.actual();
        image.extend_from_slice(&self.payload.byte_image());
        image
    }

    /// The checksum the segment should carry
    ///
    /// Computed over the pseudo-header followed by the segment with the
    /// checksum field zeroed. Fails with [`Error::NotImplemented`] when the
    /// segment has no network context to build a pseudo-header from.
    pub fn calculate_checksum(&self) -> Result<u16> {
        let net = self
            .net
            .as_ref()
            .ok_or(Error::NotImplemented("TCP checksum without a network layer"))?;
        let mut data = net.pseudo_header(6, self.segment_len())?;
        let mut segment = self.segment_image();
        segment[16] = 0;
        segment[17] = 0;
        data.extend_from_slice(&segment);
        Ok(checksum::ones_complement_sum(&data))
    }

    /// Whether the stored checksum is consistent with the segment and its
    /// pseudo-header. Never fails: a segment without network context simply
    /// reports `false`.
    pub fn valid_checksum(&self) -> bool {
        let Some(net) = self.net.as_ref() else {
            return false;
        };
        let Ok(mut data) = net.pseudo_header(6, self.segment_len()) else {
            return false;
        };
        data.extend_from_slice(&self.segment_image());
        checksum::ones_sum(&data) == 0xFFFF
    }

    /// Recompute and store the checksum
    pub fn update_checksum(&mut self) -> Result<()> {
        let value = self.calculate_checksum()?;
        endian::write_u16_be(&mut self.header, 16, value)
    }

    pub fn set_payload_bytes(&mut self, data: Vec<u8>) {
        self.payload = Payload::Bytes(ByteSlice::new(data));
    }
}

fn decode_option(kind: u8, value: &[u8]) -> Result<TcpOption> {
    let fixed = |expected: usize| -> Result<()> {
        if value.len() != expected {
            return Err(Error::invariant(format!(
                "TCP option kind {} carries {} value bytes, expected {}",
                kind,
                value.len(),
                expected
            )));
        }
        Ok(())
    };

    let option = match kind {
        2 => {
            fixed(2)?;
            TcpOption::MaximumSegmentSize(u16::from_be_bytes([value[0], value[1]]))
        }
        3 => {
            fixed(1)?;
            TcpOption::WindowScale(value[0])
        }
        4 => {
            fixed(0)?;
            TcpOption::SackPermitted
        }
        5 => {
            if value.len() % 8 != 0 {
                return Err(Error::invariant(format!(
                    "SACK option value of {} bytes is not a whole number of blocks",
                    value.len()
                )));
            }
            let blocks = value
                .chunks_exact(8)
                .map(|block| {
                    (
                        u32::from_be_bytes([block[0], block[1], block[2], block[3]]),
                        u32::from_be_bytes([block[4], block[5], block[6], block[7]]),
                    )
                })
                .collect();
            TcpOption::Sack(blocks)
        }
        6 => {
            fixed(4)?;
            TcpOption::Echo(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
        }
        7 => {
            fixed(4)?;
            TcpOption::EchoReply(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
        }
        8 => {
            fixed(8)?;
            TcpOption::Timestamp {
                value: u32::from_be_bytes([value[0], value[1], value[2], value[3]]),
                echo_reply: u32::from_be_bytes([value[4], value[5], value[6], value[7]]),
            }
        }
        14 => {
            fixed(1)?;
            TcpOption::AlternateChecksumRequest(value[0])
        }
        15 => TcpOption::AlternateChecksumData(value.to_vec()),
        19 => {
            fixed(16)?;
            let mut digest = [0u8; 16];
            digest.copy_from_slice(value);
            TcpOption::Md5Signature(digest)
        }
        28 => {
            fixed(2)?;
            TcpOption::UserTimeout(u16::from_be_bytes([value[0], value[1]]))
        }
        kind => return Err(Error::UnknownOption(kind)),
    };
    Ok(option)
}

impl Layer for TcpSegment {
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
        ProtocolKind::Tcp
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        if let Payload::Layer(child) = &mut self.payload {
            child.update_calculated_values()?;
        }
        // Without a network layer there is no pseudo-header to sum over
        if self.net.is_some() {
            self.update_checksum()?;
        }
        Ok(())
    }
}
