//! IEEE 802.11 frames and their radio metadata envelopes
//!
//! Unlike everything on the Ethernet side of the library, all 802.11,
//! Radiotap and PPI multi-byte fields are little-endian.

pub mod frame;
pub mod ie;
pub mod ppi;
pub mod radiotap;

pub use frame::{
    ControlSubtype, DataSubtype, FrameControl, FrameType, Ieee80211Frame, ManagementSubtype,
};
pub use ie::{InformationElement, InformationElementId};
pub use ppi::{PpiField, PpiFrame};
pub use radiotap::{RadiotapField, RadiotapFrame};
