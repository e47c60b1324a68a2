use std::{fmt, str::FromStr};

use regex::Regex;

use crate::{
    address::DestinationAddress,
    connector::ProxyConnector,
    error::{AddrError, ProxyError},
    http::{HttpConfig, HttpConnect},
    socks5::{Socks5, SocksConfig},
    Handshake, ProxyType,
};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A proxy described as `[scheme://][username:password@]host:port`.
///
/// `scheme` is `socks5`, `socks5h` or `http`, and defaults to `http`. IPv6
/// hosts go in brackets, e.g. `socks5://[::1]:1080`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub proxy_type: ProxyType,
    pub addr: DestinationAddress,
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    pub fn connector(&self) -> Result<ProxyConnector<Handshake>, ProxyError> {
        let handshake = match self.proxy_type {
            ProxyType::SOCKS5 => Handshake::Socks5(Socks5::new(SocksConfig {
                credentials: self.credentials.clone(),
            })),
            ProxyType::HTTP => Handshake::Http(HttpConnect::new(HttpConfig {
                credentials: self.credentials.clone(),
            })),
        };
        ProxyConnector::new(self.addr.clone(), handshake)
    }
}

/// `[scheme://][username:password@]host:port[/]`, host either a name, an IPv4
/// literal or a bracketed IPv6 literal.
const PROXY_PATTERN: &str = concat!(
    r"^(?:(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://)?",
    r"(?:(?P<user>[^:@/]+):(?P<pass>[^@/]*)@)?",
    r"(?P<host>[\w.-]+|\[[^\]]+\]):(?P<port>\d+)/?$",
);

impl FromStr for ProxyConfig {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = Regex::new(PROXY_PATTERN).map_err(|_| AddrError::InvalidAddress)?;
        let caps = re.captures(s).ok_or(AddrError::InvalidAddress)?;

        let proxy_type = match caps.name("scheme") {
            None => ProxyType::HTTP,
            Some(scheme) => match scheme.as_str().to_ascii_lowercase().as_str() {
                "socks5" | "socks5h" => ProxyType::SOCKS5,
                "http" => ProxyType::HTTP,
                _ => return Err(AddrError::UnsupportedScheme(scheme.as_str().to_string())),
            },
        };
        let credentials = match (caps.name("user"), caps.name("pass")) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.as_str(), pass.as_str())),
            _ => None,
        };
        let (Some(host), Some(port)) = (caps.name("host"), caps.name("port")) else {
            return Err(AddrError::InvalidAddress);
        };

        Ok(ProxyConfig {
            proxy_type,
            addr: format!("{}:{}", host.as_str(), port.as_str()).parse()?,
            credentials,
        })
    }
}
