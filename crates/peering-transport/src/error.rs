use std::io;

use crate::Endpoint;

/// Errors returned by the peering transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("send on {endpoint} failed: {reason}")]
    Send { endpoint: Endpoint, reason: String },

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Socket read/write failure surfaced by the frame codec.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("transport is shut down")]
    Shutdown,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}
