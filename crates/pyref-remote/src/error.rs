use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote index unreachable: {0}")]
    NetworkUnavailable(#[from] TransportError),
    #[error("unexpected response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
    #[error("remote access is disabled")]
    Disabled,
}
