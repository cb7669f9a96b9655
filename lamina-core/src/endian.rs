//! Endian codec: multi-byte integer reads and writes within a [`ByteSlice`]
//!
//! Ethernet, IP, TCP, UDP, ICMP, ARP, PPP, LLDP and OSPF carry big-endian
//! multi-byte fields; IEEE 802.11, Radiotap and PPI carry little-endian
//! ones. Every protocol header field access routes through these functions,
//! which fail with [`Error::ShortBuffer`] when the region is not fully
//! inside the slice.
//!
//! [`Error::ShortBuffer`]: crate::error::Error::ShortBuffer

use crate::error::Result;
use crate::slice::ByteSlice;

macro_rules! codec {
    ($read:ident, $write:ident, $ty:ty, $from:ident, $to:ident) => {
        pub fn $read(slice: &ByteSlice, at: usize) -> Result<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let raw = slice.read_slice(at, N)?;
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(&raw);
            Ok(<$ty>::$from(bytes))
        }

        pub fn $write(slice: &mut ByteSlice, at: usize, value: $ty) -> Result<()> {
            slice.write_slice(at, &value.$to())
        }
    };
}

codec!(read_u16_be, write_u16_be, u16, from_be_bytes, to_be_bytes);
codec!(read_u32_be, write_u32_be, u32, from_be_bytes, to_be_bytes);
codec!(read_u64_be, write_u64_be, u64, from_be_bytes, to_be_bytes);
codec!(read_i16_be, write_i16_be, i16, from_be_bytes, to_be_bytes);
codec!(read_i32_be, write_i32_be, i32, from_be_bytes, to_be_bytes);

codec!(read_u16_le, write_u16_le, u16, from_le_bytes, to_le_bytes);
codec!(read_u32_le, write_u32_le, u32, from_le_bytes, to_le_bytes);
codec!(read_u64_le, write_u64_le, u64, from_le_bytes, to_le_bytes);
codec!(read_i16_le, write_i16_le, i16, from_le_bytes, to_le_bytes);
codec!(read_i32_le, write_i32_le, i32, from_le_bytes, to_le_bytes);
