//! Peering transport layer.
//!
//! Local publish/subscribe fabric for broker state exchange: every broker
//! binds one publish endpoint and subscribes to each peer's endpoint.
//! Delivery is at-most-once and unordered across peers; there are no
//! acknowledgements.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use peering_transport::{Frame, StateSocket, TransportConfig};
//!
//! # async fn example() -> Result<(), peering_transport::TransportError> {
//! let config = TransportConfig::new().ipc_dir("/tmp");
//! let mut socket = StateSocket::open("alpha", ["beta", "gamma"], &config)?;
//!
//! // Broadcast to whoever is subscribed
//! socket.publish(Frame::from_parts(["alpha", "", "7"]))?;
//!
//! // Receive from any peer
//! let frame = socket.recv().await?;
//! println!("{} parts", frame.len());
//!
//! socket.close();
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod publisher;
mod socket;
mod subscriber;

pub use config::{TransportConfig, IPC_DIR_ENV};
pub use error::TransportError;
pub use frame::{Frame, FrameCodec};
pub use publisher::Publisher;
pub use socket::StateSocket;
pub use subscriber::Subscriber;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Scheme prefix used when displaying and parsing endpoints.
pub const IPC_SCHEME: &str = "ipc://";

/// File name suffix of a broker's publish socket.
pub const STATE_SUFFIX: &str = "-state.ipc";

/// Longest Unix socket path the OS accepts (`sun_path` minus its NUL).
#[cfg(target_os = "linux")]
pub const MAX_SOCKET_PATH: usize = 107;
#[cfg(not(target_os = "linux"))]
pub const MAX_SOCKET_PATH: usize = 103;

/// Address of one broker's publish socket.
///
/// Displayed and parsed as `ipc://<path>`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(PathBuf);

impl Endpoint {
    /// The state endpoint of broker `name` inside `dir`.
    pub fn ipc(dir: impl AsRef<Path>, name: &str) -> Result<Self, TransportError> {
        if name.is_empty() || name.contains('/') || name.contains('\0') {
            return Err(TransportError::InvalidEndpoint(format!(
                "broker name {name:?} cannot form a socket file name"
            )));
        }
        Ok(Self(dir.as_ref().join(format!("{name}{STATE_SUFFIX}"))))
    }

    /// Wrap an explicit socket path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Whether the path is short enough to ever bind or connect.
    pub fn fits_socket_path(&self) -> bool {
        self.0.as_os_str().len() <= MAX_SOCKET_PATH
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IPC_SCHEME}{}", self.0.display())
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({self})")
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(IPC_SCHEME) {
            Some(path) if !path.is_empty() => Ok(Self::from_path(path)),
            _ => Err(TransportError::InvalidEndpoint(s.to_string())),
        }
    }
}
