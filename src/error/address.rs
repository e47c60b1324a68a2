use thiserror::Error;
#[derive(Error, Debug)]
pub enum AddrError {
    #[error("InvalidAddress")]
    InvalidAddress,
    #[error("Unsupported proxy scheme: {0}")]
    UnsupportedScheme(String),
}
