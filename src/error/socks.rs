use thiserror::Error;

use crate::socks5::Reply;
#[derive(Error, Debug)]
pub enum SocksError {
    #[error("failed to connect to proxy, protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("failed to connect to proxy, username/password combination rejected")]
    AuthRejected,
    #[error("failed to connect to proxy, {}", .0.reason())]
    Rejected(Reply),
}
