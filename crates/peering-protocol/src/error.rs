/// Protocol-level errors for broker state exchange.
///
/// `InvalidConfiguration` stops a broker before it starts,
/// `MalformedEnvelope` is recovered inside the reactor, and
/// `Transport` is fatal.
#[derive(Debug, thiserror::Error)]
pub enum PeeringError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] peering_transport::TransportError),

    #[error("reactor task failed: {0}")]
    TaskFailed(String),
}

impl PeeringError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        PeeringError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        PeeringError::MalformedEnvelope {
            reason: reason.into(),
        }
    }
}
