use thiserror::Error;
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Value too large: {0} bytes encoded, at most 255 allowed")]
    ValueTooLarge(usize),
    #[error("Unsupported address type: {0}")]
    UnsupportedAddressType(u8),
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("Package exceeds {0} bytes")]
    PackageTooLarge(usize),
}
