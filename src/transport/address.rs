use super::error::{Result, TransportError};
use socket2::Domain;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Literal that means "bind to every interface" in either family.
const ANY_LITERAL: &str = "0.0.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Family compiled into this build. Selected with the `ipv6` feature.
    pub const ACTIVE: AddressFamily = if cfg!(feature = "ipv6") {
        AddressFamily::V6
    } else {
        AddressFamily::V4
    };

    pub fn domain(self) -> Domain {
        match self {
            AddressFamily::V4 => Domain::IPV4,
            AddressFamily::V6 => Domain::IPV6,
        }
    }

    pub fn unspecified(self) -> IpAddr {
        match self {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Family, numeric address and port of a bind target or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointAddress {
    family: AddressFamily,
    ip: IpAddr,
    port: u16,
}

impl EndpointAddress {
    /// Convert a textual IP literal into an address of `family`.
    ///
    /// `"0.0.0.0"` skips parsing and yields the family's any-address, so it
    /// is accepted in an IPv6 build as well. Anything else must be a literal
    /// of exactly that family, with no surrounding whitespace.
    pub fn resolve(family: AddressFamily, literal: &str, port: u16) -> Result<Self> {
        let ip = if literal == ANY_LITERAL {
            family.unspecified()
        } else {
            let parsed = match family {
                AddressFamily::V4 => literal.parse::<Ipv4Addr>().map(IpAddr::V4).ok(),
                AddressFamily::V6 => literal.parse::<Ipv6Addr>().map(IpAddr::V6).ok(),
            };
            parsed.ok_or_else(|| TransportError::AddressParseFailed {
                literal: literal.to_string(),
                family,
            })?
        };
        Ok(EndpointAddress { family, ip, port })
    }

    /// Resolve a send destination.
    ///
    /// An IPv6 socket can still reach IPv4 groups: in that family an IPv4
    /// literal is accepted and mapped to `::ffff:a.b.c.d`.
    pub fn resolve_destination(family: AddressFamily, literal: &str, port: u16) -> Result<Self> {
        if family == AddressFamily::V6 {
            if let Ok(v4) = literal.parse::<Ipv4Addr>() {
                let ip = IpAddr::V6(v4.to_ipv6_mapped());
                return Ok(EndpointAddress { family, ip, port });
            }
        }
        Self::resolve(family, literal, port)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_wildcard(&self) -> bool {
        self.ip.is_unspecified()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<EndpointAddress> for SocketAddr {
    fn from(endpoint: EndpointAddress) -> Self {
        endpoint.socket_addr()
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_bypasses_parsing() {
        let v4 = EndpointAddress::resolve(AddressFamily::V4, "0.0.0.0", 3490).unwrap();
        assert!(v4.is_wildcard());
        assert_eq!(v4.socket_addr(), "0.0.0.0:3490".parse().unwrap());

        // "0.0.0.0" is not a valid IPv6 literal; it must still resolve.
        let v6 = EndpointAddress::resolve(AddressFamily::V6, "0.0.0.0", 3490).unwrap();
        assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        assert_eq!(v6.family(), AddressFamily::V6);
    }

    #[test]
    fn test_literal_per_family() {
        let v4 = EndpointAddress::resolve(AddressFamily::V4, "127.0.0.1", 80).unwrap();
        assert_eq!(v4.to_string(), "127.0.0.1:80");

        let v6 = EndpointAddress::resolve(AddressFamily::V6, "::1", 80).unwrap();
        assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_malformed_literal_is_rejected() {
        let err =
            EndpointAddress::resolve(AddressFamily::V4, "999.999.999.999", 3490).unwrap_err();
        assert!(matches!(err, TransportError::AddressParseFailed { .. }));
    }

    #[test]
    fn test_v6_any_literal_only_in_v6() {
        let v6 = EndpointAddress::resolve(AddressFamily::V6, "::", 1).unwrap();
        assert!(v6.is_wildcard());
        assert!(EndpointAddress::resolve(AddressFamily::V4, "::", 1).is_err());
    }

    #[test]
    fn test_whitespace_is_not_stripped() {
        assert!(EndpointAddress::resolve(AddressFamily::V4, " 127.0.0.1", 1).is_err());
        assert!(EndpointAddress::resolve(AddressFamily::V4, "0.0.0.0 ", 1).is_err());
    }

    #[test]
    fn test_v4_destination_is_mapped_for_v6() {
        let dest =
            EndpointAddress::resolve_destination(AddressFamily::V6, "225.0.0.37", 3490).unwrap();
        assert_eq!(dest.family(), AddressFamily::V6);
        assert_eq!(dest.socket_addr(), "[::ffff:225.0.0.37]:3490".parse().unwrap());

        let native =
            EndpointAddress::resolve_destination(AddressFamily::V6, "ff02::1", 3490).unwrap();
        assert_eq!(native.ip(), "ff02::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_v4_destination_unchanged_for_v4() {
        let dest =
            EndpointAddress::resolve_destination(AddressFamily::V4, "225.0.0.37", 3490).unwrap();
        assert_eq!(dest.socket_addr(), "225.0.0.37:3490".parse().unwrap());
        assert!(EndpointAddress::resolve_destination(AddressFamily::V4, "ff02::1", 1).is_err());
    }

    #[test]
    fn test_family_mismatch_is_rejected() {
        assert!(EndpointAddress::resolve(AddressFamily::V4, "::1", 1).is_err());
        assert!(EndpointAddress::resolve(AddressFamily::V6, "10.0.0.1", 1).is_err());
    }
}
