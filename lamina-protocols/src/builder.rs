//! Fluent construction of packet trees
//!
//! Builds the common stacks (Ethernet, optional VLAN tag, then
//! IPv4/IPv6/ARP, then TCP/UDP/ICMP and payload bytes) from field values,
//! wires the layers together through their `set_payload` methods - which
//! keeps discriminator fields and pseudo-header contexts consistent - and
//! finishes with an innermost-out recalculation pass so lengths and
//! checksums are correct in the returned tree.

use std::net::{Ipv4Addr, Ipv6Addr};

use lamina_core::{Error, Result};

use crate::arp::{ArpOperation, ArpPacket};
use crate::ethernet::{EtherType, EthernetFrame, MacAddress};
use crate::icmpv4::Icmpv4Packet;
use crate::ipv4::{IpProtocol, Ipv4Packet};
use crate::ipv6::Ipv6Packet;
use crate::layer::{AnyLayer, Layer};
use crate::tcp::{TcpFlags, TcpSegment};
use crate::udp::UdpDatagram;
use crate::vlan::Dot1qTag;

#[derive(Debug, Clone, Copy)]
struct EthernetSpec {
    destination: MacAddress,
    source: MacAddress,
}

#[derive(Debug, Clone, Copy)]
enum NetworkSpec {
    Ipv4 {
        source: Ipv4Addr,
        destination: Ipv4Addr,
        ttl: u8,
        identification: u16,
    },
    Ipv6 {
        source: Ipv6Addr,
        destination: Ipv6Addr,
        hop_limit: u8,
    },
    Arp {
        operation: ArpOperation,
        sender_mac: MacAddress,
        sender_ip: Ipv4Addr,
        target_mac: MacAddress,
        target_ip: Ipv4Addr,
    },
}

#[derive(Debug, Clone, Copy)]
enum TransportSpec {
    Tcp {
        source_port: u16,
        destination_port: u16,
        sequence: u32,
        acknowledgment: u32,
        flags: TcpFlags,
        window: u16,
    },
    Udp {
        source_port: u16,
        destination_port: u16,
    },
    IcmpEcho {
        identifier: u16,
        sequence: u16,
    },
}

/// Packet builder with a fluent API
pub struct PacketBuilder {
    ethernet: Option<EthernetSpec>,
    vlan: Option<u16>,
    network: Option<NetworkSpec>,
    transport: Option<TransportSpec>,
    payload: Vec<u8>,
}

impl PacketBuilder {
    pub fn new() -> Self {
        PacketBuilder {
            ethernet: None,
            vlan: None,
            network: None,
            transport: None,
            payload: Vec::new(),
        }
    }

    /// Root the packet in an Ethernet frame
    pub fn ethernet(mut self, destination: MacAddress, source: MacAddress) -> Self {
        self.ethernet = Some(EthernetSpec {
            destination,
            source,
        });
        self
    }

    /// Insert an 802.1Q tag between Ethernet and the network layer
    pub fn vlan(mut self, vlan_id: u16) -> Self {
        self.vlan = Some(vlan_id);
        self
    }

    pub fn ipv4(mut self, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        self.network = Some(NetworkSpec::Ipv4 {
            source,
            destination,
            ttl: 64,
            identification: 0,
        });
        self
    }

    /// Set the TTL of a previously added IPv4 layer
    pub fn ttl(mut self, new_ttl: u8) -> Self {
        if let Some(NetworkSpec::Ipv4 { ref mut ttl, .. }) = self.network {
            *ttl = new_ttl;
        }
        self
    }

    /// Set the identification of a previously added IPv4 layer
    pub fn identification(mut self, id: u16) -> Self {
        if let Some(NetworkSpec::Ipv4 {
            ref mut identification,
            ..
        }) = self.network
        {
            *identification = id;
        }
        self
    }

    pub fn ipv6(mut self, source: Ipv6Addr, destination: Ipv6Addr) -> Self {
        self.network = Some(NetworkSpec::Ipv6 {
            source,
            destination,
            hop_limit: 64,
        });
        self
    }

    pub fn arp(
        mut self,
        operation: ArpOperation,
        sender_mac: MacAddress,
        sender_ip: Ipv4Addr,
        target_mac: MacAddress,
        target_ip: Ipv4Addr,
    ) -> Self {
        self.network = Some(NetworkSpec::Arp {
            operation,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        });
        self
    }

    pub fn tcp(
        mut self,
        source_port: u16,
        destination_port: u16,
        sequence: u32,
        flags: TcpFlags,
    ) -> Self {
        self.transport = Some(TransportSpec::Tcp {
            source_port,
            destination_port,
            sequence,
            acknowledgment: 0,
            flags,
            window: 0xFFFF,
        });
        self
    }

    pub fn udp(mut self, source_port: u16, destination_port: u16) -> Self {
        self.transport = Some(TransportSpec::Udp {
            source_port,
            destination_port,
        });
        self
    }

    pub fn icmp_echo(mut self, identifier: u16, sequence: u16) -> Self {
        self.transport = Some(TransportSpec::IcmpEcho {
            identifier,
            sequence,
        });
        self
    }

    /// Terminal payload bytes for the innermost layer
    pub fn payload(mut self, data: Vec<u8>) -> Self {
        self.payload = data;
        self
    }

    /// Assemble the tree and return its root
    ///
    /// Lengths and checksums are recomputed before returning, so
    /// `build()?.bytes()` is a wire-ready frame.
    pub fn build(self) -> Result<AnyLayer> {
        let ethernet = self
            .ethernet
            .ok_or_else(|| Error::invariant("builder needs an ethernet layer"))?;

        let transport = match self.transport {
            Some(spec) => Some(Self::build_transport(spec, &self.payload)?),
            None => None,
        };

        let network = match self.network {
            Some(spec) => Some(Self::build_network(spec, transport, &self.payload)?),
            None => {
                if self.transport.is_some() {
                    return Err(Error::invariant(
                        "builder has a transport layer but no network layer",
                    ));
                }
                None
            }
        };

        let mut frame = EthernetFrame::new(
            ethernet.destination,
            ethernet.source,
            EtherType::Custom(0),
        );

        let inner = match (self.vlan, network) {
            (Some(vlan_id), network) => {
                let mut tag = Dot1qTag::new(vlan_id, EtherType::Custom(0))?;
                match network {
                    Some(network) => tag.set_payload(network)?,
                    None if !self.payload.is_empty() => {
                        // No typed layers below the tag; bytes terminate it
                        *tag.payload_mut() =
                            crate::layer::Payload::Bytes(lamina_core::ByteSlice::new(
                                self.payload.clone(),
                            ));
                    }
                    None => {}
                }
                Some(AnyLayer::Vlan(tag))
            }
            (None, network) => network,
        };

        match inner {
            Some(inner) => frame.set_payload(inner)?,
            None if !self.payload.is_empty() => frame.set_payload_bytes(self.payload),
            None => {}
        }

        let mut root = AnyLayer::Ethernet(frame);
        root.update_calculated_values()?;
        Ok(root)
    }

    fn build_transport(spec: TransportSpec, payload: &[u8]) -> Result<AnyLayer> {
        let layer = match spec {
            TransportSpec::Tcp {
                source_port,
                destination_port,
                sequence,
                acknowledgment,
                flags,
                window,
            } => {
                let mut tcp = TcpSegment::new(source_port, destination_port);
                tcp.set_sequence_number(sequence)?;
                tcp.set_acknowledgment_number(acknowledgment)?;
                tcp.set_flags(flags)?;
                tcp.set_window_size(window)?;
                if !payload.is_empty() {
                    tcp.set_payload_bytes(payload.to_vec());
                }
                AnyLayer::Tcp(tcp)
            }
            TransportSpec::Udp {
                source_port,
                destination_port,
            } => {
                let mut udp = UdpDatagram::new(source_port, destination_port);
                if !payload.is_empty() {
                    udp.set_payload_bytes(payload.to_vec());
                }
                AnyLayer::Udp(udp)
            }
            TransportSpec::IcmpEcho {
                identifier,
                sequence,
            } => {
                let mut icmp = Icmpv4Packet::echo_request(identifier, sequence);
                if !payload.is_empty() {
                    icmp.set_payload_bytes(payload.to_vec());
                }
                AnyLayer::Icmpv4(icmp)
            }
        };
        Ok(layer)
    }

    fn build_network(
        spec: NetworkSpec,
        transport: Option<AnyLayer>,
        payload: &[u8],
    ) -> Result<AnyLayer> {
        let layer = match spec {
            NetworkSpec::Ipv4 {
                source,
                destination,
                ttl,
                identification,
            } => {
                let mut ip = Ipv4Packet::new(source, destination, IpProtocol::Custom(0));
                ip.set_ttl(ttl)?;
                ip.set_identification(identification)?;
                match transport {
                    Some(transport) => ip.set_payload(transport)?,
                    None if !payload.is_empty() => ip.set_payload_bytes(payload.to_vec()),
                    None => {}
                }
                AnyLayer::Ipv4(ip)
            }
            NetworkSpec::Ipv6 {
                source,
                destination,
                hop_limit,
            } => {
                let mut ip = Ipv6Packet::new(source, destination, IpProtocol::Custom(59));
                ip.set_hop_limit(hop_limit)?;
                match transport {
                    Some(transport) => ip.set_payload(transport)?,
                    None if !payload.is_empty() => ip.set_payload_bytes(payload.to_vec()),
                    None => {}
                }
                AnyLayer::Ipv6(ip)
            }
            NetworkSpec::Arp {
                operation,
                sender_mac,
                sender_ip,
                target_mac,
                target_ip,
            } => AnyLayer::Arp(ArpPacket::new(
                operation,
                sender_mac,
                sender_ip,
                target_mac,
                target_ip,
            )),
        };
        Ok(layer)
    }
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}
