use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the directory that holds `*-state.ipc` sockets.
pub const IPC_DIR_ENV: &str = "PEERING_IPC_DIR";

/// Configuration for a [`StateSocket`](crate::StateSocket).
///
/// All fields have sensible defaults. Use the builder pattern:
///
/// ```rust
/// use peering_transport::TransportConfig;
///
/// let config = TransportConfig::new()
///     .ipc_dir("/tmp/brokers")
///     .max_frame_size(64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Directory holding the per-broker socket files.
    pub(crate) ipc_dir: PathBuf,
    /// Maximum encoded frame size in bytes, enforced both ways.
    pub(crate) max_frame_size: usize,
    /// Inbound queue capacity (frames from all peers).
    pub(crate) recv_buffer: usize,
    /// Per-subscriber backlog before a slow subscriber starts losing frames.
    pub(crate) publish_buffer: usize,
    /// Delay between attempts to reach a peer that is down.
    pub(crate) reconnect_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    /// Create a new config with defaults.
    ///
    /// If `PEERING_IPC_DIR` is set, it is used as the socket directory.
    /// Otherwise sockets live in the current directory. This can be
    /// overridden with [`.ipc_dir()`](Self::ipc_dir).
    pub fn new() -> Self {
        let ipc_dir = std::env::var_os(IPC_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            ipc_dir,
            max_frame_size: 1024 * 1024, // 1 MB
            recv_buffer: 256,
            publish_buffer: 64,
            reconnect_interval: Duration::from_millis(100),
        }
    }

    /// Set the socket directory.
    pub fn ipc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ipc_dir = dir.into();
        self
    }

    /// Set maximum encoded frame size (default: 1 MB).
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Set the inbound queue capacity (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity.max(1);
        self
    }

    /// Set the per-subscriber publish backlog (default: 64).
    pub fn publish_buffer(mut self, capacity: usize) -> Self {
        self.publish_buffer = capacity.max(1);
        self
    }

    /// Set the reconnect delay for unreachable peers (default: 100 ms).
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// The configured socket directory.
    pub fn socket_dir(&self) -> &Path {
        &self.ipc_dir
    }

    /// The configured frame size limit.
    pub fn frame_limit(&self) -> usize {
        self.max_frame_size
    }
}
