//! State envelope codec.
//!
//! A state message travels as a three-part frame, address first:
//!
//! ```text
//! [ origin ][ "" ][ payload ]
//! ```
//!
//! The empty delimiter follows the addressed multi-part convention. On
//! decode it is optional, so `[origin][payload]` is accepted too.

use bytes::Bytes;
use peering_transport::Frame;

use crate::types::PeerId;
use crate::PeeringError;

/// Fewest parts a decodable frame can have (origin + payload).
pub const MIN_PARTS: usize = 2;

/// One broker's announced state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEnvelope {
    pub origin: PeerId,
    pub payload: Bytes,
}

impl StateEnvelope {
    pub fn new(origin: PeerId, payload: impl Into<Bytes>) -> Self {
        Self {
            origin,
            payload: payload.into(),
        }
    }

    /// Encode as a self-addressed frame.
    pub fn into_frame(self) -> Frame {
        wrap(&self.origin, self.payload)
    }

    /// Decode an inbound frame.
    pub fn from_frame(frame: Frame) -> Result<Self, PeeringError> {
        let (origin, payload) = unwrap(frame)?;
        Ok(Self { origin, payload })
    }
}

/// Put `origin` in front of `payload`, separated by an empty delimiter.
pub fn wrap(origin: &PeerId, payload: Bytes) -> Frame {
    let mut frame = Frame::new();
    frame.push(payload);
    frame.push_front(Bytes::new());
    frame.push_front(Bytes::copy_from_slice(origin.as_bytes()));
    frame
}

/// Split a frame back into its origin and payload.
pub fn unwrap(frame: Frame) -> Result<(PeerId, Bytes), PeeringError> {
    let parts = frame.into_parts();
    let (address, body) = match parts.as_slice() {
        [address, body] => (address, body),
        [address, delimiter, body] if delimiter.is_empty() => (address, body),
        [] | [_] => {
            return Err(PeeringError::malformed(format!(
                "expected at least {MIN_PARTS} parts, got {}",
                parts.len()
            )))
        }
        _ => {
            return Err(PeeringError::malformed(format!(
                "expected a single payload part, got {} parts",
                parts.len()
            )))
        }
    };

    let name = std::str::from_utf8(address)
        .map_err(|_| PeeringError::malformed("origin is not valid UTF-8"))?;
    let origin = PeerId::new(name)
        .map_err(|e| PeeringError::malformed(format!("bad origin: {e}")))?;

    Ok((origin, body.clone()))
}
