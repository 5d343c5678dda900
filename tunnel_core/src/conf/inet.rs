//! Network prefixes and peer endpoints as written in configuration files.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

/// Failure to parse an address, prefix or endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InetParseError(pub String);

impl fmt::Display for InetParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid network value: {}", self.0)
    }
}

impl std::error::Error for InetParseError {}

/// An address with a prefix length, e.g. `10.0.0.2/32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InetNetwork {
    address: IpAddr,
    prefix_len: u8,
}

impl InetNetwork {
    /// Prefix lengths outside the address family's range are clamped to the maximum.
    pub fn new(address: IpAddr, prefix_len: u8) -> Self {
        let max = max_prefix_len(&address);
        InetNetwork {
            address,
            prefix_len: prefix_len.min(max),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

fn max_prefix_len(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl FromStr for InetNetwork {
    type Err = InetParseError;

    /// A missing prefix length means a single host.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InetParseError(s.to_string());
        let (raw_address, raw_prefix) = match s.rsplit_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (s, None),
        };
        let address = IpAddr::from_str(raw_address).map_err(|_| invalid())?;
        let prefix_len = match raw_prefix {
            Some(prefix) => prefix.parse::<u8>().map_err(|_| invalid())?,
            None => max_prefix_len(&address),
        };
        Ok(InetNetwork::new(address, prefix_len))
    }
}

impl fmt::Display for InetNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// A peer endpoint: a host name or address and a UDP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InetEndpoint {
    host: String,
    port: u16,
}

impl InetEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        InetEndpoint {
            host: host.into(),
            port,
        }
    }

    /// Host without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for InetEndpoint {
    type Err = InetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InetParseError(s.to_string());
        if s.contains(['/', '?', '#']) {
            return Err(invalid());
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            Ipv6Addr::from_str(host).map_err(|_| invalid())?;
            let port = rest.strip_prefix(':').ok_or_else(invalid)?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
            // A bare IPv6 address must be bracketed.
            if host.contains(':') {
                return Err(invalid());
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(InetEndpoint::new(host, port))
    }
}

impl fmt::Display for InetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
