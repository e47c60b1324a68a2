use std::{fmt::Display, net::SocketAddr, str::FromStr};

use crate::error::AddrError;

/// An endpoint as handed to a proxy: either a literal socket address or a
/// host name the proxy resolves itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationAddress {
    Domain(String, u16),
    Ip(SocketAddr),
}

impl DestinationAddress {
    pub fn port(&self) -> u16 {
        match self {
            DestinationAddress::Domain(_, port) => *port,
            DestinationAddress::Ip(addr) => addr.port(),
        }
    }
}

impl Display for DestinationAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationAddress::Domain(domain, port) => write!(f, "{}:{}", domain, port),
            DestinationAddress::Ip(addr) => write!(f, "{}", addr),
        }
    }
}

impl FromStr for DestinationAddress {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.parse::<SocketAddr>() {
            return Ok(DestinationAddress::Ip(ip));
        }
        s.rsplit_once(':')
            .filter(|(domain, _)| !domain.is_empty() && !domain.contains(':'))
            .and_then(|(domain, port)| {
                port.parse::<u16>()
                    .ok()
                    .map(|port| DestinationAddress::Domain(domain.to_string(), port))
            })
            .ok_or(AddrError::InvalidAddress)
    }
}

impl Default for DestinationAddress {
    fn default() -> Self {
        DestinationAddress::Ip(SocketAddr::from(([0, 0, 0, 0], 0)))
    }
}

pub trait ToSocketDestination {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError>;
}

impl ToSocketDestination for DestinationAddress {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        Ok(self.clone())
    }
}

impl ToSocketDestination for SocketAddr {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        Ok(DestinationAddress::Ip(*self))
    }
}

impl ToSocketDestination for &str {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        self.parse()
    }
}

impl ToSocketDestination for String {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        self.parse()
    }
}

impl ToSocketDestination for (&str, u16) {
    fn to_destination_address(&self) -> Result<DestinationAddress, AddrError> {
        let (host, port) = *self;
        if host.is_empty() {
            return Err(AddrError::InvalidAddress);
        }
        match host.trim_matches(|c| c == '[' || c == ']').parse() {
            Ok(ip) => Ok(DestinationAddress::Ip(SocketAddr::new(ip, port))),
            Err(_) => Ok(DestinationAddress::Domain(host.to_string(), port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn parse_destination() {
        assert_eq!(
            "www.narrowlink.com:80".to_destination_address().unwrap(),
            DestinationAddress::Domain("www.narrowlink.com".into(), 80)
        );
        assert_eq!(
            "[::1]:443".to_destination_address().unwrap(),
            DestinationAddress::Ip(SocketAddr::from((Ipv6Addr::LOCALHOST, 443)))
        );
        assert_eq!(
            ("10.0.0.1", 8080).to_destination_address().unwrap(),
            DestinationAddress::Ip(SocketAddr::from((Ipv4Addr::new(10, 0, 0, 1), 8080)))
        );
        assert!("no-port".to_destination_address().is_err());
        assert!(":80".to_destination_address().is_err());
        assert!("host:99999".to_destination_address().is_err());
    }

    #[test]
    fn display_brackets_ipv6() {
        let addr = DestinationAddress::Ip(SocketAddr::from((Ipv6Addr::LOCALHOST, 8080)));
        assert_eq!(addr.to_string(), "[::1]:8080");
        let addr = DestinationAddress::Domain("example.com".into(), 443);
        assert_eq!(addr.to_string(), "example.com:443");
    }
}
