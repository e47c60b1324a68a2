use thiserror::Error;
pub(crate) mod address;
pub(crate) mod codec;
pub(crate) mod http;
pub(crate) mod socks;

pub use address::AddrError;
pub use codec::CodecError;
pub use http::HttpError;
pub use socks::SocksError;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unable to reach proxy: {0}")]
    Transport(#[source] std::io::Error),
    #[error("AddressError: {0}")]
    Address(#[from] AddrError),
    #[error("CodecError: {0}")]
    Codec(#[from] CodecError),
    #[error("HttpError: {0}")]
    Http(#[from] HttpError),
    #[error("SocksError: {0}")]
    Socks(#[from] SocksError),
    #[error("Connection closed by proxy")]
    Closed,
    #[error("Operation cancelled")]
    Cancelled,
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
}

/// Coarse classification of a [`ProxyError`], independent of the protocol
/// that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    ProtocolViolation,
    AuthRejected,
    ProxyRejected,
    InvalidResponse,
    ValueTooLarge,
    Cancelled,
    InvalidInput,
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::Transport(_) | ProxyError::Closed | ProxyError::IO(_) => {
                ErrorKind::Transport
            }
            ProxyError::Address(_) => ErrorKind::InvalidInput,
            ProxyError::Codec(CodecError::ValueTooLarge(_)) => ErrorKind::ValueTooLarge,
            ProxyError::Codec(_) => ErrorKind::ProtocolViolation,
            ProxyError::Http(HttpError::InvalidResponse(_)) => ErrorKind::InvalidResponse,
            ProxyError::Http(HttpError::Rejected(_)) => ErrorKind::ProxyRejected,
            ProxyError::Socks(SocksError::ProtocolViolation(_)) => ErrorKind::ProtocolViolation,
            ProxyError::Socks(SocksError::AuthRejected) => ErrorKind::AuthRejected,
            ProxyError::Socks(SocksError::Rejected(_)) => ErrorKind::ProxyRejected,
            ProxyError::Cancelled => ErrorKind::Cancelled,
        }
    }
}
