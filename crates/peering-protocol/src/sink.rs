use bytes::Bytes;
use tokio::sync::mpsc;

use crate::types::PeerId;

/// Receives every peer state the reactor decodes successfully.
///
/// Called inline on the reactor's thread of control, so implementations
/// must not block.
pub trait StateSink: Send {
    fn report(&mut self, origin: &PeerId, payload: &Bytes);
}

/// Logs each report as `<origin> - <payload> workers free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StateSink for LogSink {
    fn report(&mut self, origin: &PeerId, payload: &Bytes) {
        tracing::info!("{origin} - {} workers free", String::from_utf8_lossy(payload));
    }
}

/// A peer's state as handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerState {
    pub origin: PeerId,
    pub payload: Bytes,
}

/// Forwards reports to the application over a bounded channel.
///
/// Never waits: when the consumer falls behind, reports are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<PeerState>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PeerState>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl StateSink for ChannelSink {
    fn report(&mut self, origin: &PeerId, payload: &Bytes) {
        let state = PeerState {
            origin: origin.clone(),
            payload: payload.clone(),
        };
        if let Err(e) = self.tx.try_send(state) {
            tracing::debug!("state report from {origin} dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_reports() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        let origin = PeerId::new("B").unwrap();
        sink.report(&origin, &Bytes::from("7"));

        let state = rx.try_recv().unwrap();
        assert_eq!(state.origin, origin);
        assert_eq!(state.payload, Bytes::from("7"));
    }

    #[test]
    fn channel_sink_drops_when_full() {
        let (mut sink, mut rx) = ChannelSink::new(1);
        let origin = PeerId::new("B").unwrap();
        sink.report(&origin, &Bytes::from("1"));
        sink.report(&origin, &Bytes::from("2"));

        assert_eq!(rx.try_recv().unwrap().payload, Bytes::from("1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn log_sink_accepts_binary_payloads() {
        LogSink.report(&PeerId::new("B").unwrap(), &Bytes::from_static(&[0xff, 0x00]));
    }
}
