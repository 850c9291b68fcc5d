//! Peering protocol layer.
//!
//! Brokers announce their free worker capacity to a fixed set of peers
//! and collect the peers' announcements, on top of `peering-transport`
//! (local pub/sub, at-most-once, no acknowledgements).
//!
//! Wire format: three-part frame `[origin][""][payload]`.

pub mod envelope;
pub mod error;
pub mod metric;
pub mod registry;
pub mod runtime;
pub mod sink;
pub mod types;

pub use envelope::{unwrap, wrap, StateEnvelope};
pub use error::PeeringError;
pub use metric::{MetricSource, RandomCapacity};
pub use registry::{configure, PeerSet};
pub use runtime::transport::StateTransport;
pub use runtime::{ReactorConfig, ReactorHandle, ReactorStats, StateReactor, Tick};
pub use sink::{ChannelSink, LogSink, PeerState, StateSink};
pub use types::PeerId;

// Re-exported so applications only need this crate for the common path.
pub use peering_transport::{Frame, StateSocket, TransportConfig, TransportError};
pub use tokio_util::sync::CancellationToken;
