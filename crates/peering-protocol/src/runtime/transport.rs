use peering_transport::{Frame, StateSocket, TransportError};

/// Network abstraction the reactor runs on.
///
/// In production: implemented by `StateSocket` (Unix-socket pub/sub).
/// In tests: implemented by `MockTransport` (scripted inbound, recorded
/// broadcasts).
#[async_trait::async_trait]
pub trait StateTransport: Send {
    /// Next inbound frame from any peer.
    ///
    /// Must be cancel-safe: the reactor drops this future when its
    /// period runs out.
    async fn recv_frame(&mut self) -> Result<Frame, TransportError>;

    /// Broadcast a frame to all peers without waiting for them.
    fn publish_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Release the underlying handles. The reactor calls this exactly once.
    fn close(&mut self);
}

// ── Impl for StateSocket (production) ───────────────────────────────

#[async_trait::async_trait]
impl StateTransport for StateSocket {
    async fn recv_frame(&mut self) -> Result<Frame, TransportError> {
        StateSocket::recv(self).await
    }

    fn publish_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        StateSocket::publish(self, frame)
    }

    fn close(&mut self) {
        StateSocket::close(self)
    }
}

// ── MockTransport (tests) ───────────────────────────────────────────
