pub mod address;
pub mod codec;
mod config;
mod connection;
mod connector;
mod error;
pub mod filter;
mod http;
mod socks5;
mod transport;
mod writer;

pub use address::{DestinationAddress, ToSocketDestination};
pub use config::{Credentials, ProxyConfig};
pub use connection::{
    CloseReason, Connection, ConnectionOptions, DetachedStream, PackageStream,
};
pub use connector::{ConnectState, ProxyConnector, ProxyHandshake};
pub use error::{AddrError, CodecError, ErrorKind, HttpError, ProxyError, SocksError};
pub use http::{HttpConfig, HttpConnect};
pub use socks5::{
    AuthMethod, Reply, Socks5, Socks5Address, Socks5Pack, Socks5Phase, SocksConfig,
};
pub use transport::{ConnectOptions, TcpConnector, TransportConnector};
pub use writer::{MessageWriter, ProtocolWriter};

use tokio::io::{AsyncRead, AsyncWrite};

/// Handshake futures hold shared references to the connection across awaits,
/// so sockets must be `Sync` as well as `Send`.
pub trait AsyncSocket: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}
impl<T> AsyncSocket for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync + 'static {}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    SOCKS5,
    HTTP,
}

/// Either supported handshake, picked at runtime.
pub enum Handshake {
    Socks5(Socks5),
    Http(HttpConnect),
}

impl Handshake {
    pub fn proxy_type(&self) -> ProxyType {
        match self {
            Handshake::Socks5(_) => ProxyType::SOCKS5,
            Handshake::Http(_) => ProxyType::HTTP,
        }
    }
}

impl ProxyHandshake for Handshake {
    async fn negotiate<S: AsyncSocket>(
        &self,
        remote: &DestinationAddress,
        connection: &mut Connection<S>,
    ) -> Result<(), ProxyError> {
        match self {
            Handshake::Socks5(socks) => socks.negotiate(remote, connection).await,
            Handshake::Http(http) => http.negotiate(remote, connection).await,
        }
    }
}
