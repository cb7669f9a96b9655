//! The layer model
//!
//! Every protocol layer is a view over a region of the shared packet
//! buffer: a header [`ByteSlice`] plus a payload slot that holds either a
//! child layer, terminal raw bytes, or nothing. Child headers begin exactly
//! where the parent header ends, over the same buffer, so mutations through
//! any layer are visible everywhere in the tree.

use bytes::{BufMut, BytesMut};
use lamina_core::{checksum, Error, Result};
use lamina_core::ByteSlice;

use crate::arp::ArpPacket;
use crate::drda::DrdaPacket;
use crate::ethernet::EthernetFrame;
use crate::icmpv4::Icmpv4Packet;
use crate::icmpv6::Icmpv6Packet;
use crate::ieee80211::{Ieee80211Frame, PpiFrame, RadiotapFrame};
use crate::igmp::IgmpPacket;
use crate::ipv4::Ipv4Packet;
use crate::ipv6::Ipv6Packet;
use crate::lldp::LldpPacket;
use crate::ppp::PppFrame;
use crate::pppoe::PppoePacket;
use crate::sll::SllFrame;
use crate::tcp::TcpSegment;
use crate::udp::UdpDatagram;
use crate::vlan::Dot1qTag;
use crate::wol::WakeOnLanPacket;
use crate::ospf::OspfPacket;

/// Identifies the protocol of a layer at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    Ethernet,
    Vlan,
    Arp,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmpv4,
    Icmpv6,
    Igmp,
    Ospf,
    Lldp,
    Ppp,
    Pppoe,
    LinuxSll,
    WakeOnLan,
    Drda,
    Ieee80211,
    Radiotap,
    Ppi,
}

/// The payload slot of a layer
#[derive(Debug)]
pub enum Payload {
    /// An encapsulated child layer
    Layer(Box<AnyLayer>),
    /// Terminal bytes that no dissector claimed
    Bytes(ByteSlice),
    /// Nothing after the header
    None,
}

impl Payload {
    pub fn as_layer(&self) -> Option<&AnyLayer> {
        match self {
            Payload::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut AnyLayer> {
        match self {
            Payload::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteSlice> {
        match self {
            Payload::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    /// Length in bytes of whatever the slot holds
    pub fn byte_len(&self) -> usize {
        match self {
            Payload::Layer(layer) => layer.total_len(),
            Payload::Bytes(bytes) => bytes.len(),
            Payload::None => 0,
        }
    }

    /// Serialized image of whatever the slot holds
    pub fn byte_image(&self) -> Vec<u8> {
        match self {
            Payload::Layer(layer) => layer.bytes(),
            Payload::Bytes(bytes) => bytes.actual(),
            Payload::None => Vec::new(),
        }
    }

    pub(crate) fn from_body(body: ByteSlice) -> Payload {
        if body.is_empty() {
            Payload::None
        } else {
            Payload::Bytes(body)
        }
    }
}

/// A transport layer's view of the network header that encapsulates it
///
/// Holds a clone of the network layer's header slice - same shared buffer,
/// so later edits to the IP addresses are observed by the checksum code.
#[derive(Debug, Clone)]
pub enum NetContext {
    V4(ByteSlice),
    V6(ByteSlice),
}

impl NetContext {
    /// Build the pseudo-header for a transport checksum
    pub fn pseudo_header(&self, protocol: u8, upper_len: usize) -> Result<Vec<u8>> {
        match self {
            NetContext::V4(header) => {
                let mut src = [0u8; 4];
                let mut dst = [0u8; 4];
                src.copy_from_slice(&header.read_slice(12, 4)?);
                dst.copy_from_slice(&header.read_slice(16, 4)?);
                Ok(checksum::pseudo_header_v4(src, dst, protocol, upper_len as u16))
            }
            NetContext::V6(header) => {
                let mut src = [0u8; 16];
                let mut dst = [0u8; 16];
                src.copy_from_slice(&header.read_slice(8, 16)?);
                dst.copy_from_slice(&header.read_slice(24, 16)?);
                Ok(checksum::pseudo_header_v6(src, dst, protocol, upper_len as u32))
            }
        }
    }
}

/// Common capability set of every protocol layer
pub trait Layer {
    /// The slice spanning this layer's header
    fn header(&self) -> &ByteSlice;

    /// Mutable access to the header slice
    fn header_mut(&mut self) -> &mut ByteSlice;

    /// The payload slot
    fn payload(&self) -> &Payload;

    /// Mutable access to the payload slot
    fn payload_mut(&mut self) -> &mut Payload;

    /// Protocol discriminator of this layer
    fn kind(&self) -> ProtocolKind;

    /// Recompute derived length and checksum fields, innermost layer first
    fn update_calculated_values(&mut self) -> Result<()>;

    /// Serialized byte image of this layer and everything below it
    ///
    /// Header and payload images are concatenated, so trees whose layers
    /// live in different buffers (after a resizing setter, or when built
    /// from values) serialize correctly.
    fn bytes(&self) -> Vec<u8> {
        let mut image = BytesMut::with_capacity(self.total_len());
        image.put_slice(&self.header().actual());
        image.put_slice(&self.payload().byte_image());
        image.to_vec()
    }

    /// Total length in bytes of the header plus everything below it
    fn total_len(&self) -> usize {
        self.header().len() + self.payload().byte_len()
    }
}

/// Fail with [`Error::ShortBuffer`] unless `region` holds `needed` bytes
pub(crate) fn require_len(region: &ByteSlice, needed: usize) -> Result<()> {
    if region.len() < needed {
        return Err(Error::short(needed, region.len()));
    }
    Ok(())
}

/// A parsed layer of any supported protocol
#[derive(Debug)]
pub enum AnyLayer {
    Ethernet(EthernetFrame),
    Vlan(Dot1qTag),
    Arp(ArpPacket),
    Ipv4(Ipv4Packet),
    Ipv6(Ipv6Packet),
    Tcp(TcpSegment),
    Udp(UdpDatagram),
    Icmpv4(Icmpv4Packet),
    Icmpv6(Icmpv6Packet),
    Igmp(IgmpPacket),
    Ospf(OspfPacket),
    Lldp(LldpPacket),
    Ppp(PppFrame),
    Pppoe(PppoePacket),
    LinuxSll(SllFrame),
    WakeOnLan(WakeOnLanPacket),
    Drda(DrdaPacket),
    Ieee80211(Ieee80211Frame),
    Radiotap(RadiotapFrame),
    Ppi(PpiFrame),
}

macro_rules! each_layer {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            AnyLayer::Ethernet($inner) => $body,
            AnyLayer::Vlan($inner) => $body,
            AnyLayer::Arp($inner) => $body,
            AnyLayer::Ipv4($inner) => $body,
            AnyLayer::Ipv6($inner) => $body,
            AnyLayer::Tcp($inner) => $body,
            AnyLayer::Udp($inner) => $body,
            AnyLayer::Icmpv4($inner) => $body,
            AnyLayer::Icmpv6($inner) => $body,
            AnyLayer::Igmp($inner) => $body,
            AnyLayer::Ospf($inner) => $body,
            AnyLayer::Lldp($inner) => $body,
            AnyLayer::Ppp($inner) => $body,
            AnyLayer::Pppoe($inner) => $body,
            AnyLayer::LinuxSll($inner) => $body,
            AnyLayer::WakeOnLan($inner) => $body,
            AnyLayer::Drda($inner) => $body,
            AnyLayer::Ieee80211($inner) => $body,
            AnyLayer::Radiotap($inner) => $body,
            AnyLayer::Ppi($inner) => $body,
        }
    };
}

impl Layer for AnyLayer {
    fn header(&self) -> &ByteSlice {
        each_layer!(self, layer => layer.header())
    }

    fn header_mut(&mut self) -> &mut ByteSlice {
        each_layer!(self, layer => layer.header_mut())
    }

    fn payload(&self) -> &Payload {
        each_layer!(self, layer => layer.payload())
    }

    fn payload_mut(&mut self) -> &mut Payload {
        each_layer!(self, layer => layer.payload_mut())
    }

    fn kind(&self) -> ProtocolKind {
        each_layer!(self, layer => layer.kind())
    }

    fn update_calculated_values(&mut self) -> Result<()> {
        each_layer!(self, layer => layer.update_calculated_values())
    }
}

impl AnyLayer {
    /// The EtherType advertising this layer when it becomes the payload of
    /// an Ethernet or 802.1Q frame; zero when none applies
    pub(crate) fn ethertype_value(&self) -> u16 {
        match self {
            AnyLayer::Ipv4(_) => 0x0800,
            AnyLayer::Ipv6(_) => 0x86DD,
            AnyLayer::Arp(_) => 0x0806,
            AnyLayer::Lldp(_) => 0x88CC,
            AnyLayer::Pppoe(_) => 0x8864,
            AnyLayer::Vlan(_) => 0x8100,
            AnyLayer::WakeOnLan(_) => 0x0842,
            _ => 0,
        }
    }

    /// Hand a transport layer the network header it needs for its
    /// pseudo-header checksum; a no-op for anything else
    pub(crate) fn set_net_context(&mut self, net: NetContext) {
        match self {
            AnyLayer::Tcp(tcp) => tcp.set_net_context(net),
            AnyLayer::Udp(udp) => udp.set_net_context(net),
            AnyLayer::Icmpv6(icmp) => icmp.set_net_context(net),
            _ => {}
        }
    }

    /// Walk down the payload chain to the innermost layer
    pub fn innermost(&self) -> &AnyLayer {
        let mut current = self;
        while let Some(child) = current.payload().as_layer() {
            current = child;
        }
        current
    }
}
