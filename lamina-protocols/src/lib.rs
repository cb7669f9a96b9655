//! Protocol layers, dissection and packet construction for lamina
//!
//! A packet is one shared byte buffer viewed through a tree of typed
//! layers. Parsing slices each header out of the buffer without copying;
//! field setters write back through the same windows, so an edit made
//! through any layer is visible to every other layer of the tree and to
//! the serialized image.
//!
//! # Dissecting a capture
//!
//! ```
//! use lamina_protocols::{parse_link_layer, AnyLayer, Layer, LinkKind};
//!
//! # fn main() -> lamina_core::Result<()> {
//! # let frame_bytes = lamina_protocols::PacketBuilder::new()
//! #     .ethernet(
//! #         lamina_protocols::ethernet::MacAddress::BROADCAST,
//! #         lamina_protocols::ethernet::MacAddress([0, 0x11, 0x22, 0x33, 0x44, 0x55]),
//! #     )
//! #     .ipv4("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())
//! #     .tcp(1234, 80, 0, lamina_protocols::tcp::TcpFlags { syn: true, ..Default::default() })
//! #     .build()?
//! #     .bytes();
//! let root = parse_link_layer(LinkKind::Ethernet, frame_bytes)?;
//! if let AnyLayer::Ethernet(eth) = &root {
//!     if let Some(AnyLayer::Ipv4(ip)) = eth.payload().as_layer() {
//!         assert!(ip.valid_checksum());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Building a frame
//!
//! ```
//! use lamina_protocols::ethernet::MacAddress;
//! use lamina_protocols::tcp::TcpFlags;
//! use lamina_protocols::{Layer, PacketBuilder};
//!
//! # fn main() -> lamina_core::Result<()> {
//! let frame = PacketBuilder::new()
//!     .ethernet(MacAddress::BROADCAST, MacAddress([0, 0x11, 0x22, 0x33, 0x44, 0x55]))
//!     .ipv4("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())
//!     .tcp(1234, 80, 0, TcpFlags { syn: true, ..Default::default() })
//!     .build()?
//!     .bytes();
//! # Ok(())
//! # }
//! ```

pub mod arp;
pub mod builder;
mod dispatch;
pub mod drda;
pub mod ethernet;
pub mod icmpv4;
pub mod icmpv6;
pub mod ieee80211;
pub mod igmp;
pub mod ipv4;
pub mod ipv6;
pub mod layer;
pub mod lldp;
pub mod ospf;
pub mod packet;
pub mod ppp;
pub mod pppoe;
pub mod sll;
pub mod tcp;
mod tlv;
pub mod udp;
pub mod vlan;
pub mod wol;

pub use builder::PacketBuilder;
pub use layer::{AnyLayer, Layer, NetContext, Payload, ProtocolKind};
pub use packet::{parse_link_layer, LinkKind};

// Re-export the substrate so dependents need only one crate
pub use lamina_core::{checksum, endian, ByteSlice, Error, Result};
