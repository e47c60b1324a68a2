use thiserror::Error;
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid status code {0}")]
    Rejected(u16),
}
