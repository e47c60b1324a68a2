//! SOCKS5 client handshake, <https://tools.ietf.org/html/rfc1928>, with
//! username/password authentication from RFC 1929.

mod config;
mod filter;
mod request;

use log::debug;

pub use config::Config as SocksConfig;
pub use filter::{Socks5Address, Socks5Pack, Socks5Phase};

use crate::{
    address::DestinationAddress,
    connection::Connection,
    connector::ProxyHandshake,
    error::{ProxyError, SocksError},
    AsyncSocket,
};
use filter::HandshakeDecoder;
use request::Socks5Request;

pub(crate) const VERSION: u8 = 0x05;
pub(crate) const ATYP_IPV4: u8 = 0x01;
pub(crate) const ATYP_DOMAIN: u8 = 0x03;
pub(crate) const ATYP_IPV6: u8 = 0x04;

#[derive(Default)]
pub struct Socks5 {
    config: SocksConfig,
}

impl Socks5 {
    pub fn new(config: SocksConfig) -> Self {
        Socks5 { config }
    }
}

impl ProxyHandshake for Socks5 {
    async fn negotiate<S: AsyncSocket>(
        &self,
        remote: &DestinationAddress,
        connection: &mut Connection<S>,
    ) -> Result<(), ProxyError> {
        let credentials = self.config.credentials();
        let mut request = Socks5Request::new(
            connection.package_stream(HandshakeDecoder::filter()),
            remote,
            credentials,
        );

        let response = request.send_handshake().await?;
        match AuthMethod::from(response.status) {
            AuthMethod::NoAuth => debug!("socks5 proxy accepted without authentication"),
            AuthMethod::UsernamePassword if credentials.is_some() => {
                let response = request.send_authenticate().await?;
                if response.status != 0x00 {
                    return Err(SocksError::AuthRejected.into());
                }
            }
            method => {
                return Err(SocksError::ProtocolViolation(format!(
                    "proxy selected method {:?}",
                    method
                ))
                .into())
            }
        }

        let response = request.send_endpoint().await?;
        match Reply::from(response.status) {
            Reply::Succeeded => {
                debug!(
                    "socks5 tunnel to {} established, bound {:?}:{:?}",
                    remote, response.dest_addr, response.dest_port
                );
                Ok(())
            }
            reply => Err(SocksError::Rejected(reply).into()),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default)]
pub enum AuthMethod {
    #[default]
    NoAuth,
    GssApi,
    UsernamePassword,
    NoAcceptableMethod,
    Other(u8),
}

impl From<&AuthMethod> for u8 {
    fn from(v: &AuthMethod) -> Self {
        match *v {
            AuthMethod::NoAuth => 0,
            AuthMethod::GssApi => 1,
            AuthMethod::UsernamePassword => 2,
            AuthMethod::NoAcceptableMethod => 0xff,
            AuthMethod::Other(v) => v,
        }
    }
}

impl From<u8> for AuthMethod {
    fn from(v: u8) -> Self {
        match v {
            0 => AuthMethod::NoAuth,
            1 => AuthMethod::GssApi,
            2 => AuthMethod::UsernamePassword,
            0xff => AuthMethod::NoAcceptableMethod,
            v => AuthMethod::Other(v),
        }
    }
}

/// Reply field of the proxy's answer to a CONNECT request.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Reply {
    Succeeded,
    GeneralSocksServerFailure,
    ConnectionNotAllowedByRuleset,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
    Other(u8),
}

impl Reply {
    pub fn reason(&self) -> &'static str {
        match self {
            Reply::Succeeded => "succeeded",
            Reply::ConnectionNotAllowedByRuleset => "connection not allowed by ruleset",
            Reply::NetworkUnreachable => "network unreachable",
            Reply::HostUnreachable => "host unreachable",
            Reply::ConnectionRefused => "connection refused by destination host",
            Reply::TtlExpired => "TTL expired",
            Reply::CommandNotSupported => "command not supported / protocol error",
            Reply::AddressTypeNotSupported => "address type not supported",
            Reply::GeneralSocksServerFailure | Reply::Other(_) => "general failure",
        }
    }
}

impl From<&Reply> for u8 {
    fn from(v: &Reply) -> Self {
        match *v {
            Reply::Succeeded => 0,
            Reply::GeneralSocksServerFailure => 1,
            Reply::ConnectionNotAllowedByRuleset => 2,
            Reply::NetworkUnreachable => 3,
            Reply::HostUnreachable => 4,
            Reply::ConnectionRefused => 5,
            Reply::TtlExpired => 6,
            Reply::CommandNotSupported => 7,
            Reply::AddressTypeNotSupported => 8,
            Reply::Other(v) => v,
        }
    }
}

impl From<u8> for Reply {
    fn from(v: u8) -> Self {
        match v {
            0 => Reply::Succeeded,
            1 => Reply::GeneralSocksServerFailure,
            2 => Reply::ConnectionNotAllowedByRuleset,
            3 => Reply::NetworkUnreachable,
            4 => Reply::HostUnreachable,
            5 => Reply::ConnectionRefused,
            6 => Reply::TtlExpired,
            7 => Reply::CommandNotSupported,
            8 => Reply::AddressTypeNotSupported,
            _ => Reply::Other(v),
        }
    }
}
