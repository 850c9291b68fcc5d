use crate::config::TransportConfig;
use crate::frame::Frame;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::{Endpoint, TransportError};

/// The transport context of one broker: its own publisher plus a
/// subscriber linked to every peer.
///
/// Acquired once with [`StateSocket::open`] and released once with
/// [`StateSocket::close`] (or on drop).
#[derive(Debug)]
pub struct StateSocket {
    publisher: Publisher,
    subscriber: Subscriber,
    closed: bool,
}

impl StateSocket {
    /// Bind `<ipc_dir>/<local>-state.ipc` and subscribe to every peer's
    /// endpoint in the same directory.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open<I, P>(local: &str, peers: I, config: &TransportConfig) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let endpoint = Endpoint::ipc(&config.ipc_dir, local)?;
        let publisher = Publisher::bind(endpoint, config)?;
        tracing::info!("state backend bound at {}", publisher.endpoint());

        let mut subscriber = Subscriber::new(config);
        for peer in peers {
            let peer = peer.as_ref();
            let endpoint = Endpoint::ipc(&config.ipc_dir, peer)?;
            tracing::info!("connecting to state backend at '{peer}'");
            subscriber.connect(endpoint)?;
        }

        Ok(Self {
            publisher,
            subscriber,
            closed: false,
        })
    }

    /// Assemble a socket from already-built halves.
    pub fn from_parts(publisher: Publisher, subscriber: Subscriber) -> Self {
        Self {
            publisher,
            subscriber,
            closed: false,
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    /// Broadcast a frame to every subscribed peer.
    pub fn publish(&self, frame: Frame) -> Result<(), TransportError> {
        self.publisher.publish(frame)
    }

    /// Next inbound frame from any peer. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Frame, TransportError> {
        self.subscriber.recv().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release both halves. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.subscriber.close();
        self.publisher.close();
        tracing::info!("state backend at {} released", self.publisher.endpoint());
    }
}

impl Drop for StateSocket {
    fn drop(&mut self) {
        self.close();
    }
}
