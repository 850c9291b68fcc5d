use std::io;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;

use crate::config::TransportConfig;
use crate::frame::{Frame, FrameCodec};
use crate::{Endpoint, TransportError, MAX_SOCKET_PATH};

/// Subscribe side of the state fabric: connected to any number of peer
/// publishers, merges everything they send into one inbound queue.
///
/// Connecting never waits for the peer. Each link dials in the
/// background and redials after `reconnect_interval` whenever the peer
/// is down or drops the connection, so brokers may start in any order.
pub struct Subscriber {
    inbound_tx: mpsc::Sender<Frame>,
    inbound_rx: mpsc::Receiver<Frame>,
    links: JoinSet<()>,
    endpoints: Vec<Endpoint>,
    codec: FrameCodec,
    reconnect_interval: Duration,
    closed: bool,
}

impl Subscriber {
    /// Must be called from within a Tokio runtime before `connect`.
    pub fn new(config: &TransportConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.recv_buffer);
        Self {
            inbound_tx,
            inbound_rx,
            links: JoinSet::new(),
            endpoints: Vec::new(),
            codec: FrameCodec::new(config.max_frame_size),
            reconnect_interval: config.reconnect_interval,
            closed: false,
        }
    }

    /// Start receiving everything published at `endpoint`.
    ///
    /// Fails only if the endpoint can never be reached: its directory
    /// does not exist or its path is too long for a Unix socket.
    /// Connecting twice to the same endpoint is a no-op.
    pub fn connect(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        if self.endpoints.contains(&endpoint) {
            return Ok(());
        }

        if !endpoint.fits_socket_path() {
            let len = endpoint.path().as_os_str().len();
            return Err(TransportError::Connect {
                endpoint,
                source: io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("socket path is {len} bytes, limit is {MAX_SOCKET_PATH}"),
                ),
            });
        }

        let reachable = endpoint
            .path()
            .parent()
            .map_or(true, |dir| dir.as_os_str().is_empty() || dir.is_dir());
        if !reachable {
            return Err(TransportError::Connect {
                endpoint,
                source: io::Error::new(io::ErrorKind::NotFound, "socket directory does not exist"),
            });
        }

        self.links.spawn(link_loop(
            endpoint.clone(),
            self.inbound_tx.clone(),
            self.codec.clone(),
            self.reconnect_interval,
        ));
        self.endpoints.push(endpoint);
        Ok(())
    }

    /// Next frame from any connected peer. Cancel-safe.
    pub async fn recv(&mut self) -> Result<Frame, TransportError> {
        self.inbound_rx.recv().await.ok_or(TransportError::Shutdown)
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Drop every link and stop the inbound queue. Idempotent.
    ///
    /// Frames already queued can still be drained with `recv`.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.links.abort_all();
        self.inbound_rx.close();
        tracing::debug!("subscriber closed ({} links)", self.endpoints.len());
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("endpoints", &self.endpoints)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Keep one peer link alive for as long as the subscriber wants it.
async fn link_loop(
    endpoint: Endpoint,
    inbound_tx: mpsc::Sender<Frame>,
    codec: FrameCodec,
    reconnect_interval: Duration,
) {
    let mut warned = false;
    loop {
        match UnixStream::connect(endpoint.path()).await {
            Ok(stream) => {
                tracing::debug!("linked to {endpoint}");
                warned = false;
                let mut frames = FramedRead::new(stream, codec.clone());
                while let Some(next) = frames.next().await {
                    match next {
                        Ok(frame) => {
                            if inbound_tx.send(frame).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("dropping link to {endpoint}: {e}");
                            break;
                        }
                    }
                }
                tracing::debug!("link to {endpoint} lost, redialing");
            }
            // Peer not started yet, or restarting.
            Err(e) if is_transient(&e) => tracing::trace!("{endpoint} not reachable yet: {e}"),
            Err(e) if !warned => {
                tracing::warn!("connect to {endpoint} failed, will keep retrying: {e}");
                warned = true;
            }
            Err(e) => tracing::trace!("connect to {endpoint} still failing: {e}"),
        }

        if inbound_tx.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_interval).await;
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
    )
}
