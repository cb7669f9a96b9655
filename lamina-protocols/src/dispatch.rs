//! Encapsulation dispatch tables
//!
//! Each layer capable of encapsulation reads its next-protocol
//! discriminator and consults one of these tables. A hit constructs the
//! child layer over the encapsulated slice; a miss returns `None` and the
//! parent keeps the payload as raw bytes. Adding a protocol is one match
//! arm per table.

use lamina_core::Result;
use lamina_core::ByteSlice;

use crate::arp::ArpPacket;
use crate::icmpv4::Icmpv4Packet;
use crate::icmpv6::Icmpv6Packet;
use crate::igmp::IgmpPacket;
use crate::ipv4::Ipv4Packet;
use crate::ipv6::Ipv6Packet;
use crate::layer::{AnyLayer, NetContext};
use crate::lldp::LldpPacket;
use crate::ospf::OspfPacket;
use crate::pppoe::PppoePacket;
use crate::tcp::TcpSegment;
use crate::udp::UdpDatagram;
use crate::vlan::Dot1qTag;
use crate::wol::WakeOnLanPacket;

/// Child constructor table for EtherType discriminators (Ethernet, 802.1Q,
/// Linux SLL)
pub(crate) fn from_ethertype(ethertype: u16, region: ByteSlice) -> Result<Option<AnyLayer>> {
    let layer = match ethertype {
        0x0800 => AnyLayer::Ipv4(Ipv4Packet::parse(region)?),
        0x0806 => AnyLayer::Arp(ArpPacket::parse(region)?),
        0x0842 => AnyLayer::WakeOnLan(WakeOnLanPacket::parse(region)?),
        0x8100 => AnyLayer::Vlan(Dot1qTag::parse(region)?),
        0x86DD => AnyLayer::Ipv6(Ipv6Packet::parse(region)?),
        0x8863 | 0x8864 => AnyLayer::Pppoe(PppoePacket::parse(region)?),
        0x88CC => AnyLayer::Lldp(LldpPacket::parse(region)?),
        _ => return Ok(None),
    };
    Ok(Some(layer))
}

/// Child constructor table for IP protocol numbers (IPv4 protocol field,
/// IPv6 next-header)
pub(crate) fn from_ip_protocol(
    protocol: u8,
    region: ByteSlice,
    net: NetContext,
) -> Result<Option<AnyLayer>> {
    let layer = match protocol {
        1 => AnyLayer::Icmpv4(Icmpv4Packet::parse(region)?),
        2 => AnyLayer::Igmp(IgmpPacket::parse(region)?),
        6 => AnyLayer::Tcp(TcpSegment::parse(region, Some(net))?),
        17 => AnyLayer::Udp(UdpDatagram::parse(region, Some(net))?),
        58 => AnyLayer::Icmpv6(Icmpv6Packet::parse(region, Some(net))?),
        89 => AnyLayer::Ospf(OspfPacket::parse(region)?),
        _ => return Ok(None),
    };
    Ok(Some(layer))
}

/// Child constructor table for the PPP protocol field
pub(crate) fn from_ppp_protocol(protocol: u16, region: ByteSlice) -> Result<Option<AnyLayer>> {
    let layer = match protocol {
        0x0021 => AnyLayer::Ipv4(Ipv4Packet::parse(region)?),
        0x0057 => AnyLayer::Ipv6(Ipv6Packet::parse(region)?),
        _ => return Ok(None),
    };
    Ok(Some(layer))
}
