//! Wake-on-LAN magic packet layer
//!
//! Six bytes of 0xFF followed by sixteen repetitions of the target MAC,
//! optionally trailed by a SecureOn password. Reached from EtherType
//! 0x0842 or, heuristically, from UDP ports 7 and 9.

use lamina_core::{Error, Result};
use lamina_core::ByteSlice;

use crate::ethernet::MacAddress;
use crate::layer::{require_len, Layer, Payload, ProtocolKind};

/// Wake-on-LAN magic packet
#[derive(Debug)]
pub struct WakeOnLanPacket {
    header: ByteSlice,
    payload: Payload,
}

impl WakeOnLanPacket {
    /// Sync stream plus sixteen MAC repetitions
    pub const MIN_SIZE: usize = 6 + 16 * 6;

    pub(crate) fn parse(region: ByteSlice) -> Result<Self> {
        require_len(&region, Self::MIN_SIZE)?;

        for i in 0..6 {
            if region.byte_at(i)? != 0xFF {
                return Err(Error::invariant("magic packet sync stream is not all 0xFF"));
            }
        }

        let mac = region.read_slice(6, 6)?;
        for repetition in 1..16 {
            if region.read_slice(6 + repetition * 6, 6)? != mac {
                return Err(Error::invariant(format!(
                    "magic packet MAC repetition {} differs from the first",
                    repetition
                )));
            }
        }

        let mut header = region.clone();
        header.set_len(Self::MIN_SIZE)?;
        let password = header.encapsulated(Some(region.len() - Self::MIN_SIZE));

        Ok(Self {
            header,
            payload: Payload::from_body(password),
        })
    }

    /// Synthesize a magic packet for `target`
    pub fn new(target: MacAddress) -> Self {
        let mut raw = vec![0xFFu8; 6];
        for _ in 0..16 {
            raw.extend_from_slice(target.as_bytes());
        }
        Self {
            header: ByteSlice::new(raw),
            payload: Payload::None,
        }
    }

    /// The MAC the packet wakes
    pub fn destination_mac(&self) -> Result<MacAddress> {
        MacAddress::from_slice(&self.header.read_slice(6, 6)?)
    }

    /// Rewrite all sixteen repetitions
    pub fn set_destination_mac(&mut self, mac: MacAddress) -> Result<()> {
        for repetition in 0..16 {
            self.header.write_slice(6 + repetition * 6, mac.as_bytes())?;
        }
        Ok(())
    }

    /// SecureOn password bytes, when present
    pub fn password(&self) -> Option<Vec<u8>> {
        self.payload.as_bytes().map(|bytes| bytes.actual())
    }
}

impl Layer for WakeOnLanPacket {
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
        ProtocolKind::WakeOnLan
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let mac = MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let packet = WakeOnLanPacket::new(mac);
        let reparsed = WakeOnLanPacket::parse(ByteSlice::new(packet.bytes())).unwrap();
        assert_eq!(reparsed.destination_mac().unwrap(), mac);
        assert!(reparsed.password().is_none());
    }

    #[test]
    fn test_password_preserved() {
        let mac = MacAddress([0xAA; 6]);
        let mut raw = WakeOnLanPacket::new(mac).bytes();
        raw.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let packet = WakeOnLanPacket::parse(ByteSlice::new(raw)).unwrap();
        assert_eq!(packet.password().unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_broken_sync_stream() {
        let mut raw = WakeOnLanPacket::new(MacAddress::BROADCAST).bytes();
        raw[3] = 0x00;
        assert!(matches!(
            WakeOnLanPacket::parse(ByteSlice::new(raw)),
            Err(Error::InvariantViolated(_))
        ));
    }

    #[test]
    fn test_inconsistent_repetition() {
        let mut raw = WakeOnLanPacket::new(MacAddress([0x11; 6])).bytes();
        raw[6 + 5 * 6] ^= 0xFF;
        assert!(WakeOnLanPacket::parse(ByteSlice::new(raw)).is_err());
    }

    #[test]
    fn test_rewrite_updates_all_repetitions() {
        let mut packet = WakeOnLanPacket::new(MacAddress([0x11; 6]));
        packet.set_destination_mac(MacAddress([0x22; 6])).unwrap();
        let reparsed = WakeOnLanPacket::parse(ByteSlice::new(packet.bytes())).unwrap();
        assert_eq!(reparsed.destination_mac().unwrap(), MacAddress([0x22; 6]));
    }
}
