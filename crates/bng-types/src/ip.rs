//! IP address and prefix types with safe parsing.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Defines a newtype over a std address with the crate's parse error and a
/// host-order integer view used for prefix masking.
macro_rules! address_newtype {
    ($(#[$meta:meta])* $name:ident, $std:ty, $bits:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($std);

        impl $name {
            pub const UNSPECIFIED: Self = $name(<$std>::UNSPECIFIED);

            /// Returns the address as a host-order integer.
            pub fn to_bits(&self) -> $bits {
                <$bits>::from(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<$std>()
                    .map($name)
                    .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
            }
        }

        impl From<$std> for $name {
            fn from(addr: $std) -> Self {
                $name(addr)
            }
        }

        impl From<$bits> for $name {
            fn from(bits: $bits) -> Self {
                $name(<$std>::from(bits))
            }
        }
    };
}

address_newtype!(
    /// IPv4 address as carried in ACL rules and route attributes.
    Ipv4Address,
    Ipv4Addr,
    u32
);

address_newtype!(
    /// IPv6 address.
    Ipv6Address,
    Ipv6Addr,
    u128
);

impl Ipv4Address {
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }
}

/// An IP address that can be either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl IpAddress {
    /// Returns true if this is an IPv4 address.
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    /// Returns true if this is an IPv6 address.
    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Maximum prefix length for this address family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => fmt::Display::fmt(addr, f),
            IpAddress::V6(addr) => fmt::Display::fmt(addr, f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            s.parse::<Ipv6Address>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Address>().map(IpAddress::V4)
        }
    }
}

impl From<Ipv4Address> for IpAddress {
    fn from(addr: Ipv4Address) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Address> for IpAddress {
    fn from(addr: Ipv6Address) -> Self {
        IpAddress::V6(addr)
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(Ipv4Address(addr))
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(Ipv6Address(addr))
    }
}

impl From<IpAddr> for IpAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
///
/// The stored address is always the network address: host bits are cleared
/// on construction, so `10.0.0.7/24` and `10.0.0.0/24` are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// IPv4 default route, 0.0.0.0/0.
    pub const DEFAULT_V4: Self = IpPrefix {
        address: IpAddress::V4(Ipv4Address::UNSPECIFIED),
        prefix_len: 0,
    };

    /// IPv6 default route, ::/0.
    pub const DEFAULT_V6: Self = IpPrefix {
        address: IpAddress::V6(Ipv6Address::UNSPECIFIED),
        prefix_len: 0,
    };

    /// Creates a new IP prefix, clearing any host bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.max_prefix_len();

        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address: mask(address, prefix_len),
            prefix_len,
        })
    }

    /// Creates a host route (/32 or /128) for an address.
    pub fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.max_prefix_len(),
        }
    }

    /// Returns the default route of the same family as `address`.
    pub const fn default_for(address: &IpAddress) -> Self {
        match address {
            IpAddress::V4(_) => Self::DEFAULT_V4,
            IpAddress::V6(_) => Self::DEFAULT_V6,
        }
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if this is an IPv4 prefix.
    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Returns true if this is an IPv6 prefix.
    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Returns true if this is a host route (/32 for IPv4, /128 for IPv6).
    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.max_prefix_len()
    }

    /// Returns true if this is the default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    /// Returns true if `addr` falls inside this prefix.
    ///
    /// Addresses of the other family are never contained.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        match (self.address, addr) {
            (IpAddress::V4(_), IpAddress::V4(_)) | (IpAddress::V6(_), IpAddress::V6(_)) => {
                mask(*addr, self.prefix_len) == self.address
            }
            _ => false,
        }
    }
}

fn mask(address: IpAddress, prefix_len: u8) -> IpAddress {
    match address {
        IpAddress::V4(v4) => {
            let bits = v4.to_bits();
            let netmask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
            IpAddress::V4(Ipv4Address::from(bits & netmask))
        }
        IpAddress::V6(v6) => {
            let bits = v6.to_bits();
            let netmask = u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0);
            IpAddress::V6(Ipv6Address::from(bits & netmask))
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> Self {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_address_bits() {
        let v4: Ipv4Address = "192.168.1.1".parse().unwrap();
        assert_eq!(v4, Ipv4Address::new(192, 168, 1, 1));
        assert_eq!(v4.to_bits(), 0xc0a8_0101);

        let v6: Ipv6Address = "2001:db8::1".parse().unwrap();
        assert_eq!(v6.to_bits() >> 96, 0x2001_0db8);
        assert!("2001:db8::zz".parse::<Ipv6Address>().is_err());
    }

    #[test]
    fn test_ip_address_discrimination() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        assert!(v4.is_ipv4());
        assert!(!v4.is_ipv6());

        let v6: IpAddress = "::1".parse().unwrap();
        assert!(!v6.is_ipv4());
        assert!(v6.is_ipv6());
    }

    #[test]
    fn test_ip_prefix_parse() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(prefix.is_ipv4());
        assert_eq!(prefix.prefix_len(), 24);

        let v6_prefix: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6_prefix.is_ipv6());
        assert_eq!(v6_prefix.prefix_len(), 32);
    }

    #[test]
    fn test_ip_prefix_normalized() {
        let prefix: IpPrefix = "10.0.0.77/24".parse().unwrap();
        assert_eq!(prefix.to_string(), "10.0.0.0/24");
        assert_eq!(prefix, "10.0.0.0/24".parse::<IpPrefix>().unwrap());

        let v6: IpPrefix = "2001:db8::1/32".parse().unwrap();
        assert_eq!(v6.to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_ip_prefix_host_route() {
        let host_v4: IpPrefix = "10.0.0.1/32".parse().unwrap();
        assert!(host_v4.is_host_route());

        let network: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(!network.is_host_route());

        let host_v6 = IpPrefix::host("2001:db8::1".parse().unwrap());
        assert!(host_v6.is_host_route());
    }

    #[test]
    fn test_ip_prefix_default() {
        let default_v4: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default_v4.is_default());
        assert_eq!(default_v4, IpPrefix::DEFAULT_V4);

        let default_v6: IpPrefix = "::/0".parse().unwrap();
        assert!(default_v6.is_default());
        assert_eq!(default_v6, IpPrefix::DEFAULT_V6);
    }

    #[test]
    fn test_ip_prefix_contains() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(prefix.contains(&"10.0.0.1".parse().unwrap()));
        assert!(prefix.contains(&"10.0.0.255".parse().unwrap()));
        assert!(!prefix.contains(&"10.0.1.1".parse().unwrap()));

        assert!(IpPrefix::DEFAULT_V4.contains(&"8.8.8.8".parse().unwrap()));
        assert!(!IpPrefix::DEFAULT_V4.contains(&"2001:db8::1".parse().unwrap()));
        assert!(IpPrefix::DEFAULT_V6.contains(&"2001:db8::1".parse().unwrap()));

        let v6: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6.contains(&"2001:db8:ffff::1".parse().unwrap()));
        assert!(!v6.contains(&"2001:db9::1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
    }

    #[test]
    fn test_deserialize_goes_through_parser() {
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error as DeError, StrDeserializer};

        let de: StrDeserializer<'_, DeError> = "10.0.0.77/24".into_deserializer();
        let prefix = IpPrefix::deserialize(de).unwrap();
        assert_eq!(prefix.to_string(), "10.0.0.0/24");

        let de: StrDeserializer<'_, DeError> = "10.0.0.0/40".into_deserializer();
        assert!(IpPrefix::deserialize(de).is_err());
    }

    #[test]
    fn test_display() {
        let prefix: IpPrefix = "192.168.0.0/16".parse().unwrap();
        assert_eq!(prefix.to_string(), "192.168.0.0/16");
    }
}
