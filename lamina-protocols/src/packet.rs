//! Packet tree construction from captured bytes
//!
//! The entry point of the library: hand [`parse_link_layer`] a buffer and
//! the link type it was captured with, get back the typed layer tree. The
//! buffer is wrapped, not copied; every layer in the tree views it through
//! its own [`ByteSlice`] window.
//!
//! [`ByteSlice`]: lamina_core::ByteSlice

use lamina_core::{Error, Result};
use lamina_core::ByteSlice;

use crate::ethernet::EthernetFrame;
use crate::ieee80211::{Ieee80211Frame, PpiFrame, RadiotapFrame};
use crate::ipv4::Ipv4Packet;
use crate::ipv6::Ipv6Packet;
use crate::layer::AnyLayer;
use crate::ppp::PppFrame;
use crate::sll::SllFrame;

/// The link-layer framing a capture source delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    Ppp,
    LinuxSll,
    /// No link layer; the buffer starts at the IP version nibble
    Raw,
    Ieee80211,
    Ieee80211Radiotap,
    Ieee80211Ppi,
}

/// Parse a captured (or synthesized) frame into its layer tree
///
/// The returned root and all its children share the wrapped buffer.
/// Unknown encapsulations inside the tree degrade to raw-bytes payloads;
/// structurally broken headers fail here at construction.
pub fn parse_link_layer(kind: LinkKind, data: Vec<u8>) -> Result<AnyLayer> {
    let region = ByteSlice::new(data);
    tracing::trace!(?kind, len = region.len(), "parsing link layer");

    let layer = match kind {
        LinkKind::Ethernet => AnyLayer::Ethernet(EthernetFrame::parse(region)?),
        LinkKind::Ppp => AnyLayer::Ppp(PppFrame::parse(region)?),
        LinkKind::LinuxSll => AnyLayer::LinuxSll(SllFrame::parse(region)?),
        LinkKind::Raw => match region.byte_at(0)? >> 4 {
            4 => AnyLayer::Ipv4(Ipv4Packet::parse(region)?),
            6 => AnyLayer::Ipv6(Ipv6Packet::parse(region)?),
            version => {
                return Err(Error::invariant(format!(
                    "raw IP buffer starts with version nibble {}",
                    version
                )))
            }
        },
        LinkKind::Ieee80211 => AnyLayer::Ieee80211(Ieee80211Frame::parse(region)?),
        LinkKind::Ieee80211Radiotap => AnyLayer::Radiotap(RadiotapFrame::parse(region)?),
        LinkKind::Ieee80211Ppi => AnyLayer::Ppi(PpiFrame::parse(region)?),
    };

    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethernet::{EtherType, MacAddress};
    use crate::ipv4::IpProtocol;
    use crate::layer::{Layer, Payload};
    use std::net::{Ipv4Addr, Ipv6Addr};

    /// Ethernet / IPv4 / TCP SYN with both checksum fields zeroed
    fn syn_frame() -> Vec<u8> {
        hex::decode(concat!(
            "ffffffffffff",                     // dst
            "001122334455",                     // src
            "0800",                             // IPv4
            "45000028000100004006",             // ver/ihl .. protocol
            "0000",                             // IP checksum (zero)
            "0a000001",                         // 10.0.0.1
            "0a000002",                         // 10.0.0.2
            "04d2",                             // port 1234
            "162e",                             // port 5678
            "00000000",                         // seq
            "00000000",                         // ack
            "5002",                             // data offset 5, SYN
            "2000",                             // window
            "0000",                             // TCP checksum (zero)
            "0000",                             // urgent pointer
        ))
        .unwrap()
    }

    fn as_ipv4(root: &AnyLayer) -> &Ipv4Packet {
        match root.payload().as_layer() {
            Some(AnyLayer::Ipv4(ip)) => ip,
            other => panic!("expected IPv4 child, got {:?}", other),
        }
    }

    fn as_tcp(ip: &Ipv4Packet) -> &crate::tcp::TcpSegment {
        match ip.payload().as_layer() {
            Some(AnyLayer::Tcp(tcp)) => tcp,
            other => panic!("expected TCP child, got {:?}", other),
        }
    }

    #[test]
    fn test_ethernet_ipv4_tcp_syn() {
        let root = parse_link_layer(LinkKind::Ethernet, syn_frame()).unwrap();

        let AnyLayer::Ethernet(eth) = &root else {
            panic!("root is not Ethernet");
        };
        assert!(eth.destination().unwrap().is_broadcast());
        assert_eq!(
            eth.source().unwrap(),
            MacAddress([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
        );
        assert_eq!(eth.ethertype().unwrap(), EtherType::IPv4);

        let ip = as_ipv4(&root);
        assert_eq!(ip.source().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.destination().unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(ip.protocol().unwrap(), IpProtocol::TCP);
        assert_eq!(ip.ttl().unwrap(), 64);

        let tcp = as_tcp(ip);
        assert_eq!(tcp.source_port().unwrap(), 1234);
        assert_eq!(tcp.destination_port().unwrap(), 5678);
        assert_eq!(tcp.sequence_number().unwrap(), 0);
        let flags = tcp.flags().unwrap();
        assert!(flags.syn);
        assert!(!flags.ack && !flags.fin && !flags.rst && !flags.psh && !flags.urg);
    }

    #[test]
    fn test_no_mutation_round_trip() {
        let original = syn_frame();
        let root = parse_link_layer(LinkKind::Ethernet, original.clone()).unwrap();
        assert_eq!(root.bytes(), original);
    }

    #[test]
    fn test_layers_share_the_root_buffer() {
        let root = parse_link_layer(LinkKind::Ethernet, syn_frame()).unwrap();
        let root_header = root.header();
        let ip = as_ipv4(&root);
        let tcp = as_tcp(ip);

        for header in [ip.header(), tcp.header()] {
            assert!(header.same_buffer(root_header));
            assert!(header.offset() + header.len() <= root_header.buffer_len());
        }
        // Child headers begin exactly where the parent header ends
        assert_eq!(ip.header().offset(), 14);
        assert_eq!(tcp.header().offset(), 34);
    }

    #[test]
    fn test_checksum_compute_and_validate() {
        let mut root = parse_link_layer(LinkKind::Ethernet, syn_frame()).unwrap();

        {
            let ip = match root.payload().as_layer() {
                Some(AnyLayer::Ipv4(ip)) => ip,
                _ => unreachable!(),
            };
            assert!(!ip.valid_checksum());
            assert!(!as_tcp(ip).valid_checksum());
        }

        root.update_calculated_values().unwrap();

        let ip = as_ipv4(&root);
        assert!(ip.valid_checksum());
        assert!(as_tcp(ip).valid_checksum());
    }

    #[test]
    fn test_edit_then_recompute_stays_valid() {
        let mut root = parse_link_layer(LinkKind::Ethernet, syn_frame()).unwrap();
        root.update_calculated_values().unwrap();

        // Rewriting the IP source through the shared buffer invalidates the
        // TCP pseudo-header sum; recomputation repairs it
        let ip = match root.payload_mut().as_layer_mut() {
            Some(AnyLayer::Ipv4(ip)) => ip,
            _ => unreachable!(),
        };
        ip.set_source(Ipv4Addr::new(192, 168, 1, 77)).unwrap();
        assert!(!as_tcp(ip).valid_checksum());

        root.update_calculated_values().unwrap();
        let ip = as_ipv4(&root);
        assert!(ip.valid_checksum());
        assert!(as_tcp(ip).valid_checksum());
    }

    /// IPv6 / UDP with payload length 16
    fn ipv6_udp_frame() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        raw.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        raw.extend_from_slice(&0x86DDu16.to_be_bytes());

        raw.push(0x60);
        raw.extend_from_slice(&[0, 0, 0]);
        raw.extend_from_slice(&16u16.to_be_bytes()); // payload length
        raw.push(17); // UDP
        raw.push(64); // hop limit
        raw.extend_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
        raw.extend_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());

        raw.extend_from_slice(&4000u16.to_be_bytes());
        raw.extend_from_slice(&5000u16.to_be_bytes());
        raw.extend_from_slice(&16u16.to_be_bytes()); // UDP length
        raw.extend_from_slice(&0u16.to_be_bytes()); // checksum (zero)
        raw.extend_from_slice(b"datagram"); // 8 payload bytes
        raw
    }

    #[test]
    fn test_ipv6_udp_pseudo_header_checksum() {
        let mut root = parse_link_layer(LinkKind::Ethernet, ipv6_udp_frame()).unwrap();
        root.update_calculated_values().unwrap();

        let ip = match root.payload().as_layer() {
            Some(AnyLayer::Ipv6(ip)) => ip,
            other => panic!("expected IPv6 child, got {:?}", other),
        };
        assert_eq!(ip.hop_limit().unwrap(), 64);
        assert_eq!(ip.next_header().unwrap(), IpProtocol::UDP);
        assert_eq!(ip.payload_length().unwrap(), 16);

        let udp = match ip.payload().as_layer() {
            Some(AnyLayer::Udp(udp)) => udp,
            other => panic!("expected UDP child, got {:?}", other),
        };
        assert_eq!(udp.length().unwrap(), 16);
        assert!(udp.valid_checksum());
    }

    #[test]
    fn test_unknown_ethertype_is_not_an_error() {
        let mut raw = syn_frame();
        raw[12] = 0xBE;
        raw[13] = 0xEF;
        let root = parse_link_layer(LinkKind::Ethernet, raw.clone()).unwrap();
        match root.payload() {
            Payload::Bytes(bytes) => assert_eq!(bytes.actual(), raw[14..].to_vec()),
            other => panic!("expected raw bytes, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_link_kind_sniffs_version() {
        let v4 = syn_frame()[14..].to_vec();
        assert!(matches!(
            parse_link_layer(LinkKind::Raw, v4),
            Ok(AnyLayer::Ipv4(_))
        ));

        let v6 = ipv6_udp_frame()[14..].to_vec();
        assert!(matches!(
            parse_link_layer(LinkKind::Raw, v6),
            Ok(AnyLayer::Ipv6(_))
        ));

        assert!(parse_link_layer(LinkKind::Raw, vec![0x25, 0x00]).is_err());
    }

    #[test]
    fn test_random_payload_round_trips() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x1a31a);
        for _ in 0..32 {
            let len = rng.gen_range(0..512);
            let mut raw = vec![
                0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0xBE,
                0xEF,
            ];
            raw.extend((0..len).map(|_| rng.gen::<u8>()));

            let root = parse_link_layer(LinkKind::Ethernet, raw.clone()).unwrap();
            assert_eq!(root.bytes(), raw);
        }
    }
}
