use super::address::AddressFamily;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Failures surfaced by the binder and the senders.
///
/// Variants wrapping an OS failure keep the original `io::Error` as their
/// source so callers can inspect the errno.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("socket() error: {source}")]
    SocketCreateFailed {
        #[source]
        source: io::Error,
    },

    #[error("cannot convert IP address {literal:?} for {family}")]
    AddressParseFailed {
        literal: String,
        family: AddressFamily,
    },

    #[error("bind() to {addr} failed: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listen() failed: {source}")]
    ListenFailed {
        #[source]
        source: io::Error,
    },

    #[error("socket send failed after {bytes_sent} bytes: {source}")]
    SendFailed {
        bytes_sent: usize,
        #[source]
        source: io::Error,
    },

    #[error("multicast destination is not valid")]
    InvalidDestination,

    #[error("invalid payload pair (first: {first_len} bytes, second: {second_len} bytes)")]
    InvalidPayload { first_len: usize, second_len: usize },

    #[error("multicast destination already set to {current}")]
    DestinationAlreadySet { current: SocketAddr },
}

impl TransportError {
    /// Raw OS error code of the underlying failure, if there is one.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            TransportError::SocketCreateFailed { source }
            | TransportError::BindFailed { source, .. }
            | TransportError::ListenFailed { source }
            | TransportError::SendFailed { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
