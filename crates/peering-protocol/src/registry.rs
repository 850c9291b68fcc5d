//! Peer registry: the fixed set of brokers this process exchanges state with.
//!
//! Resolved once at startup, read-only afterwards. Cloning shares the
//! underlying list.

use std::collections::HashSet;
use std::sync::Arc;

use crate::types::PeerId;
use crate::PeeringError;

/// This broker's identity plus its ordered peer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSet {
    local: PeerId,
    peers: Arc<[PeerId]>,
}

impl PeerSet {
    /// This broker's own identity.
    pub fn local(&self) -> &PeerId {
        &self.local
    }

    /// Peers in configuration order.
    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    /// Number of subscribe links the reactor maintains.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PeerId> {
        self.peers.iter()
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains(id)
    }
}

impl<'a> IntoIterator for &'a PeerSet {
    type Item = &'a PeerId;
    type IntoIter = std::slice::Iter<'a, PeerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Validate the startup identity and peer list.
///
/// Rejects an empty or unusable local name, an empty peer list, unusable
/// peer names, duplicates, and listing ourselves as a peer.
pub fn configure<I, P>(local: &str, peers: I) -> Result<PeerSet, PeeringError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let local = PeerId::new(local)?;

    let mut seen = HashSet::new();
    let mut resolved = Vec::new();
    for name in peers {
        let id = PeerId::new(name.as_ref())?;
        if id == local {
            return Err(PeeringError::config(format!(
                "broker {local} cannot peer with itself"
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(PeeringError::config(format!("peer {id} listed twice")));
        }
        resolved.push(id);
    }

    if resolved.is_empty() {
        return Err(PeeringError::config(format!(
            "broker {local} needs at least one peer"
        )));
    }

    tracing::debug!("configured {local} with {} peers", resolved.len());
    Ok(PeerSet {
        local,
        peers: resolved.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_peer_order() {
        let set = configure("A", ["C", "B"]).unwrap();
        assert_eq!(set.local().as_str(), "A");
        let names: Vec<&str> = set.iter().map(PeerId::as_str).collect();
        assert_eq!(names, ["C", "B"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&PeerId::new("B").unwrap()));
        assert!(!set.contains(&PeerId::new("A").unwrap()));
    }

    #[test]
    fn empty_local_is_rejected() {
        let err = configure("", ["B"]).unwrap_err();
        assert!(matches!(err, PeeringError::InvalidConfiguration { .. }));
    }

    #[test]
    fn empty_peer_list_is_rejected() {
        let err = configure("A", Vec::<String>::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: broker A needs at least one peer"
        );
    }

    #[test]
    fn empty_peer_name_is_rejected() {
        assert!(configure("A", ["B", ""]).is_err());
    }

    #[test]
    fn duplicates_and_self_are_rejected() {
        assert!(configure("A", ["B", "B"]).is_err());
        assert!(configure("A", ["B", "A"]).is_err());
    }

    #[test]
    fn clones_share_the_list() {
        let set = configure("A", ["B"]).unwrap();
        let other = set.clone();
        assert!(std::ptr::eq(set.peers().as_ptr(), other.peers().as_ptr()));
    }
}
