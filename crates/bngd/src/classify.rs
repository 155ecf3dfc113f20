//! Special-path packet classification.
//!
//! The packet engine parses L3 headers; this module only decides, from the
//! parsed fields, whether a packet leaves the fast path for out-of-band
//! handling by the kernel.

/// IP protocol number of ICMP.
pub const IPPROTO_ICMP: u8 = 1;

/// IPv6 next-header value of ICMPv6.
pub const IPPROTO_ICMPV6: u8 = 58;

/// Already-parsed L3 header of a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3Header {
    Arp,
    Ipv4 { protocol: u8 },
    Ipv6 { next_header: u8 },
    /// Anything the packet engine could not parse as ARP or IP
    Other,
}

impl L3Header {
    /// Returns true for ARP and ICMP/ICMPv6 traffic.
    pub fn is_control(&self) -> bool {
        match *self {
            L3Header::Arp => true,
            L3Header::Ipv4 { protocol } => protocol == IPPROTO_ICMP,
            L3Header::Ipv6 { next_header } => next_header == IPPROTO_ICMPV6,
            L3Header::Other => false,
        }
    }
}

/// Decides which packets take the special path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classifier {
    /// When false every packet takes the special path; when true only
    /// control traffic does.
    pub control_only: bool,
}

impl Classifier {
    pub fn new(control_only: bool) -> Self {
        Self { control_only }
    }

    /// Returns true when the packet must be handed to the special path.
    pub fn classify(&self, header: &L3Header) -> bool {
        !self.control_only || header.is_control()
    }
}
