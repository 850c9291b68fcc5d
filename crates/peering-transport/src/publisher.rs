use futures_util::SinkExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::FramedWrite;

use crate::config::TransportConfig;
use crate::frame::{Frame, FrameCodec};
use crate::{Endpoint, TransportError};

/// Publish side of the state fabric: bound to one endpoint, fans every
/// frame out to whoever is subscribed at that moment.
///
/// Delivery is at-most-once. Frames published while nobody is connected
/// are dropped, and a subscriber that falls more than `publish_buffer`
/// frames behind skips the frames it missed.
pub struct Publisher {
    endpoint: Endpoint,
    frames_tx: broadcast::Sender<Frame>,
    acceptor: JoinHandle<()>,
    max_frame_size: usize,
    closed: bool,
}

impl Publisher {
    /// Bind a publisher at `endpoint`.
    ///
    /// A socket file left behind by a previous run is removed first.
    /// Must be called from within a Tokio runtime.
    pub fn bind(endpoint: Endpoint, config: &TransportConfig) -> Result<Self, TransportError> {
        match std::fs::remove_file(endpoint.path()) {
            Ok(()) => tracing::debug!("removed stale socket at {endpoint}"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(TransportError::Bind { endpoint, source }),
        }

        let listener = match UnixListener::bind(endpoint.path()) {
            Ok(listener) => listener,
            Err(source) => return Err(TransportError::Bind { endpoint, source }),
        };

        let (frames_tx, _) = broadcast::channel(config.publish_buffer);
        let codec = FrameCodec::new(config.max_frame_size);
        let acceptor = tokio::spawn(accept_loop(
            listener,
            frames_tx.clone(),
            codec,
            endpoint.clone(),
        ));

        Ok(Self {
            endpoint,
            frames_tx,
            acceptor,
            max_frame_size: config.max_frame_size,
            closed: false,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.frames_tx.receiver_count()
    }

    /// Broadcast a frame to all current subscribers.
    ///
    /// Never waits on subscribers. Fails only when the local side is
    /// unusable: closed, listener gone, or frame over the size limit.
    pub fn publish(&self, frame: Frame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        if self.acceptor.is_finished() {
            return Err(TransportError::Send {
                endpoint: self.endpoint.clone(),
                reason: "listener stopped".into(),
            });
        }

        let size = frame.encoded_len();
        if size > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }

        // Err here only means nobody is listening.
        let _ = self.frames_tx.send(frame);
        Ok(())
    }

    /// Stop accepting, disconnect subscribers, remove the socket file.
    ///
    /// Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.acceptor.abort();
        if let Err(e) = std::fs::remove_file(self.endpoint.path()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove {}: {e}", self.endpoint);
            }
        }
        tracing::debug!("publisher at {} closed", self.endpoint);
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("endpoint", &self.endpoint)
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Accept subscribers until the listener fails or the task is aborted.
///
/// Writer tasks live in the `JoinSet`, so aborting this task tears all
/// subscriber connections down with it.
async fn accept_loop(
    listener: UnixListener,
    frames_tx: broadcast::Sender<Frame>,
    codec: FrameCodec,
    endpoint: Endpoint,
) {
    let mut writers = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tracing::debug!("subscriber attached to {endpoint}");
                    writers.spawn(feed_subscriber(stream, frames_tx.subscribe(), codec.clone()));
                }
                Err(e) => {
                    tracing::error!("accept on {endpoint} failed: {e}");
                    return;
                }
            },
            Some(_) = writers.join_next(), if !writers.is_empty() => {}
        }
    }
}

async fn feed_subscriber(
    stream: UnixStream,
    mut frames_rx: broadcast::Receiver<Frame>,
    codec: FrameCodec,
) {
    let mut sink = FramedWrite::new(stream, codec);
    loop {
        match frames_rx.recv().await {
            Ok(frame) => {
                if let Err(e) = sink.send(frame).await {
                    tracing::debug!("subscriber detached: {e}");
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("slow subscriber skipped {skipped} frames");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
