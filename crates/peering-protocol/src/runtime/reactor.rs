//! The poll-dispatch-repeat loop.
//!
//! One suspension point per iteration: the bounded wait on the inbound
//! queue, raced against cancellation. Broadcasts are strictly serialized
//! because only this loop ever publishes.

use tokio_util::sync::CancellationToken;

use crate::envelope;
use crate::metric::MetricSource;
use crate::registry::PeerSet;
use crate::sink::StateSink;
use crate::types::PeerId;
use crate::PeeringError;

use super::transport::StateTransport;
use super::{ReactorConfig, ReactorHandle, ReactorStats, Tick};

/// Owns the transport for its whole life and releases it exactly once,
/// whichever way the loop ends.
pub struct StateReactor<T, M, S>
where
    T: StateTransport,
    M: MetricSource,
    S: StateSink,
{
    peers: PeerSet,
    transport: T,
    metric: M,
    sink: S,
    config: ReactorConfig,
    stats: ReactorStats,
    released: bool,
}

impl<T, M, S> StateReactor<T, M, S>
where
    T: StateTransport,
    M: MetricSource,
    S: StateSink,
{
    pub fn new(peers: PeerSet, transport: T, metric: M, sink: S, config: ReactorConfig) -> Self {
        Self {
            peers,
            transport,
            metric,
            sink,
            config,
            stats: ReactorStats::default(),
            released: false,
        }
    }

    pub fn local_id(&self) -> &PeerId {
        self.peers.local()
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Live totals; clones keep following the reactor.
    pub fn stats(&self) -> ReactorStats {
        self.stats.clone()
    }

    /// Run until `cancel` fires or the transport fails.
    ///
    /// Returns the final totals on cancellation. A transport failure is
    /// returned as-is; either way the transport is closed first.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<ReactorStats, PeeringError> {
        tracing::info!(
            "state reactor for {} running: {} peers, period {:?}",
            self.peers.local(),
            self.peers.len(),
            self.config.period
        );

        let outcome = loop {
            match self.poll_once(&cancel).await {
                Ok(Tick::Cancelled) => break Ok(()),
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("state reactor for {} stopped: {e}", self.peers.local());
                    break Err(e);
                }
            }
        };

        self.release();
        outcome.map(|()| self.stats.snapshot())
    }

    /// Run on a new task. Stop it through the returned handle.
    pub fn spawn(self, cancel: CancellationToken) -> ReactorHandle
    where
        T: 'static,
        M: 'static,
        S: 'static,
    {
        let local_id = self.peers.local().clone();
        let stats = self.stats.clone();
        let task = tokio::spawn(self.run(cancel.clone()));
        ReactorHandle {
            local_id,
            cancel,
            stats,
            task,
        }
    }

    /// One iteration: wait up to one period, then report or broadcast.
    ///
    /// Every call starts a fresh full period; time left over from an
    /// iteration that ended early is not carried forward.
    pub async fn poll_once(&mut self, cancel: &CancellationToken) -> Result<Tick, PeeringError> {
        if cancel.is_cancelled() {
            return Ok(Tick::Cancelled);
        }

        let period = self.config.period;
        let inbound = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Tick::Cancelled),
            waited = tokio::time::timeout(period, self.transport.recv_frame()) => waited,
        };

        match inbound {
            Ok(frame) => Ok(self.dispatch(frame?)),
            Err(_elapsed) => self.broadcast(),
        }
    }

    fn dispatch(&mut self, frame: peering_transport::Frame) -> Tick {
        match envelope::unwrap(frame) {
            Ok((origin, payload)) => {
                self.sink.report(&origin, &payload);
                self.stats.reports.inc();
                Tick::Reported { origin, payload }
            }
            Err(e) => {
                tracing::warn!("discarding peer state: {e}");
                self.stats.malformed.inc();
                Tick::Malformed
            }
        }
    }

    fn broadcast(&mut self) -> Result<Tick, PeeringError> {
        let payload = self.metric.sample();
        let frame = envelope::wrap(self.peers.local(), payload.clone());
        self.transport.publish_frame(frame)?;
        self.stats.broadcasts.inc();
        tracing::trace!("{} broadcast {:?}", self.peers.local(), payload);
        Ok(Tick::Broadcast { payload })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.transport.close();
    }
}

impl<T, M, S> Drop for StateReactor<T, M, S>
where
    T: StateTransport,
    M: MetricSource,
    S: StateSink,
{
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use peering_transport::{Frame, TransportError};
    use tokio::time::Instant;

    use super::*;
    use crate::registry::configure;
    use crate::runtime::transport::mock::{self, MockPeer, MockTransport};

    type Reports = Arc<Mutex<Vec<(PeerId, Bytes)>>>;

    #[derive(Clone, Default)]
    struct RecordingSink(Reports);

    impl StateSink for RecordingSink {
        fn report(&mut self, origin: &PeerId, payload: &Bytes) {
            self.0.lock().unwrap().push((origin.clone(), payload.clone()));
        }
    }

    type TestReactor = StateReactor<MockTransport, fn() -> Bytes, RecordingSink>;

    fn four() -> Bytes {
        Bytes::from_static(b"4")
    }

    fn reactor_a() -> (TestReactor, MockPeer, Reports) {
        let peers = configure("A", ["B", "C"]).unwrap();
        let (transport, peer) = mock::pair();
        let sink = RecordingSink::default();
        let reports = sink.0.clone();
        let reactor = StateReactor::new(
            peers,
            transport,
            four as fn() -> Bytes,
            sink,
            ReactorConfig::new().period(Duration::from_secs(1)),
        );
        (reactor, peer, reports)
    }

    fn origin_of(frame: &Frame) -> PeerId {
        envelope::unwrap(frame.clone()).unwrap().0
    }

    #[tokio::test(start_paused = true)]
    async fn silence_broadcasts_once_per_period() {
        let (mut reactor, peer, _) = reactor_a();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        for n in 1..=3u32 {
            let tick = reactor.poll_once(&cancel).await.unwrap();
            assert_eq!(tick, Tick::Broadcast { payload: four() });
            assert_eq!(start.elapsed(), Duration::from_secs(1) * n);
            assert_eq!(peer.published().len(), n as usize);
        }

        for frame in peer.published() {
            assert_eq!(origin_of(&frame).as_str(), "A");
            assert_eq!(envelope::unwrap(frame).unwrap().1, four());
        }
        assert_eq!(reactor.stats().broadcasts.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn three_silent_seconds_give_three_broadcasts() {
        let (reactor, peer, reports) = reactor_a();
        let handle = reactor.spawn(CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let stats = handle.shutdown().await.unwrap();

        assert_eq!(stats.broadcasts.get(), 3);
        assert_eq!(stats.reports.get(), 0);
        let published = peer.published();
        assert_eq!(published.len(), 3);
        assert!(published.iter().all(|f| origin_of(f).as_str() == "A"));
        assert!(reports.lock().unwrap().is_empty());
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn early_frame_is_reported_without_broadcast() {
        let (mut reactor, peer, reports) = reactor_a();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        let injector = peer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let b = PeerId::new("B").unwrap();
            injector.inject(envelope::wrap(&b, Bytes::from_static(b"7")));
        });

        let tick = reactor.poll_once(&cancel).await.unwrap();
        assert_eq!(
            tick,
            Tick::Reported {
                origin: PeerId::new("B").unwrap(),
                payload: Bytes::from("7"),
            }
        );
        assert_eq!(start.elapsed(), Duration::from_millis(200));
        assert!(peer.published().is_empty());
        assert_eq!(
            *reports.lock().unwrap(),
            vec![(PeerId::new("B").unwrap(), Bytes::from("7"))]
        );

        // The next wait is a fresh full period, not the 800 ms left over.
        let tick = reactor.poll_once(&cancel).await.unwrap();
        assert!(matches!(tick, Tick::Broadcast { .. }));
        assert_eq!(start.elapsed(), Duration::from_millis(1200));
        assert_eq!(peer.published().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_part_frame_is_dropped_and_loop_continues() {
        let (mut reactor, peer, reports) = reactor_a();
        let cancel = CancellationToken::new();
        let start = Instant::now();

        peer.inject(Frame::new());
        assert_eq!(reactor.poll_once(&cancel).await.unwrap(), Tick::Malformed);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(peer.published().is_empty());
        assert!(reports.lock().unwrap().is_empty());
        assert_eq!(reactor.stats().malformed.get(), 1);

        let tick = reactor.poll_once(&cancel).await.unwrap();
        assert!(matches!(tick, Tick::Broadcast { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_traffic_never_stops_run() {
        let (reactor, peer, reports) = reactor_a();
        peer.inject(Frame::new());
        peer.inject(Frame::from_parts(["B"]));
        peer.inject(envelope::wrap(&PeerId::new("C").unwrap(), Bytes::from("2")));

        let handle = reactor.spawn(CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let stats = handle.shutdown().await.unwrap();

        assert_eq!(stats.malformed.get(), 2);
        assert_eq!(stats.reports.get(), 1);
        assert_eq!(stats.broadcasts.get(), 1);
        assert_eq!(reports.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_does_nothing() {
        let (reactor, peer, _) = reactor_a();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = reactor.run(cancel).await.unwrap();
        assert_eq!(stats, ReactorStats::default());
        assert!(peer.published().is_empty());
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_the_wait() {
        let (reactor, peer, _) = reactor_a();
        let handle = reactor.spawn(CancellationToken::new());
        let start = Instant::now();

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel_token().cancel();
        let stats = handle.join().await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert_eq!(stats.broadcasts.get(), 0);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_publish_is_fatal_and_releases_transport() {
        let (reactor, peer, _) = reactor_a();
        peer.set_fail_publish(true);

        let err = reactor.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PeeringError::Transport(TransportError::Send { .. })
        ));
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_inbound_queue_is_fatal() {
        let (reactor, peer, _) = reactor_a();
        peer.hang_up();

        let handle = reactor.spawn(CancellationToken::new());
        let err = handle.join().await.unwrap_err();
        assert!(matches!(
            err,
            PeeringError::Transport(TransportError::Shutdown)
        ));
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_an_idle_reactor_releases_transport() {
        let (reactor, peer, _) = reactor_a();
        drop(reactor);
        assert_eq!(peer.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_stats_follow_the_loop() {
        let (reactor, _peer, _) = reactor_a();
        let handle = reactor.spawn(CancellationToken::new());
        assert_eq!(handle.local_id().as_str(), "A");

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(handle.stats().broadcasts.get(), 2);
        assert!(!handle.is_finished());

        handle.shutdown().await.unwrap();
    }
}
