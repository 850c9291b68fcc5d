//! State reactor: the broker's single event loop.
//!
//! Each iteration waits up to one period for a peer's state. If one
//! arrives it is reported; if the period runs out this broker broadcasts
//! its own state instead. Nothing else is scheduled.

mod reactor;
pub mod transport;

use std::time::Duration;

use bytes::Bytes;
use peering_metrics::Counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::types::PeerId;
use crate::PeeringError;

pub use reactor::StateReactor;

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for the state reactor.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// How long to wait for peer state before broadcasting our own.
    pub period: Duration,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

impl ReactorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heartbeat period (default: 1 s).
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}

// ── Iteration outcome ─────────────────────────────────────────────────

/// What one reactor iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A peer's state arrived and was handed to the sink.
    Reported { origin: PeerId, payload: Bytes },
    /// The period ran out; our own state went out.
    Broadcast { payload: Bytes },
    /// Something arrived but did not decode. Logged and dropped.
    Malformed,
    /// The cancellation token fired.
    Cancelled,
}

// ── Statistics ────────────────────────────────────────────────────────

/// Running totals, shared with any [`ReactorHandle`].
///
/// Purely observational: the loop never reads them back.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct ReactorStats {
    pub broadcasts: Counter,
    pub reports: Counter,
    pub malformed: Counter,
}

impl ReactorStats {
    /// Frozen copy of the current values.
    pub fn snapshot(&self) -> Self {
        Self {
            broadcasts: self.broadcasts.detach(),
            reports: self.reports.detach(),
            malformed: self.malformed.detach(),
        }
    }
}

// ── ReactorHandle ─────────────────────────────────────────────────────

/// Handle to a reactor running on its own task.
pub struct ReactorHandle {
    local_id: PeerId,
    cancel: CancellationToken,
    stats: ReactorStats,
    task: JoinHandle<Result<ReactorStats, PeeringError>>,
}

impl ReactorHandle {
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Current totals.
    pub fn stats(&self) -> ReactorStats {
        self.stats.snapshot()
    }

    /// The token that stops this reactor.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the reactor has stopped (cancelled or failed).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the reactor and wait for its final totals.
    pub async fn shutdown(self) -> Result<ReactorStats, PeeringError> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the reactor to stop on its own (fatal error or external cancel).
    pub async fn join(self) -> Result<ReactorStats, PeeringError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(PeeringError::TaskFailed(e.to_string())),
        }
    }
}

impl std::fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("local_id", &self.local_id)
            .field("stats", &self.stats)
            .finish()
    }
}
