//! The registry of other validators, swapped atomically on reconciliation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use phonelink_ledger::ValidatorEntry;
use phonelink_types::{Address, PeerInfo, PeerStatus};

/// One tracked validator. Identity and endpoint are fixed for the lifetime of
/// the value; health and version are updated in place by the gossip client.
#[derive(Debug)]
pub struct Peer {
    pub node_id: Address,
    pub index: u32,
    pub endpoint: String,
    status: AtomicU8,
    version: RwLock<String>,
}

impl Peer {
    pub fn new(node_id: Address, index: u32, endpoint: String) -> Self {
        Self {
            node_id,
            index,
            endpoint,
            status: AtomicU8::new(PeerStatus::Unknown as u8),
            version: RwLock::new(String::new()),
        }
    }

    /// A copy at a new position or endpoint, keeping the observed health.
    fn relocated(&self, index: u32, endpoint: String) -> Self {
        Self {
            node_id: self.node_id,
            index,
            endpoint,
            status: AtomicU8::new(self.status.load(Ordering::Acquire)),
            version: RwLock::new(self.version.read().clone()),
        }
    }

    pub fn status(&self) -> PeerStatus {
        PeerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: PeerStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn version(&self) -> String {
        self.version.read().clone()
    }

    pub fn set_version(&self, version: String) {
        *self.version.write() = version;
    }

    pub fn info(&self) -> PeerInfo {
        PeerInfo {
            node_id: self.node_id,
            index: self.index,
            endpoint: self.endpoint.clone(),
            version: self.version(),
            status: self.status(),
        }
    }
}

/// An immutable view of the validator set as seen from this node.
#[derive(Debug, Default)]
pub struct PeerSet {
    /// This node's position in the set, if it is a member.
    pub self_index: Option<u32>,
    pub validators: HashSet<Address>,
    pub peers: Vec<Arc<Peer>>,
}

impl PeerSet {
    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    pub fn get(&self, node_id: &Address) -> Option<&Arc<Peer>> {
        self.peers.iter().find(|p| p.node_id == *node_id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Arc<Peer>> {
        self.peers
            .iter()
            .filter(|p| p.status() == PeerStatus::Active)
    }
}

/// What changed for this node in a reconciliation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub self_index: Option<u32>,
    pub index_changed: bool,
}

pub struct PeerRegistry {
    own_id: Address,
    current: RwLock<Arc<PeerSet>>,
}

impl PeerRegistry {
    pub fn new(own_id: Address) -> Self {
        Self {
            own_id,
            current: RwLock::new(Arc::new(PeerSet::default())),
        }
    }

    pub fn own_id(&self) -> Address {
        self.own_id
    }

    /// The current snapshot. Holders keep a consistent view even if a
    /// reconciliation publishes a new one meanwhile.
    pub fn snapshot(&self) -> Arc<PeerSet> {
        Arc::clone(&self.current.read())
    }

    pub fn self_index(&self) -> Option<u32> {
        self.snapshot().self_index
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.snapshot().is_validator(address)
    }

    pub fn peer_infos(&self) -> Vec<PeerInfo> {
        self.snapshot().peers.iter().map(|p| p.info()).collect()
    }

    /// Rebuild the view from the ledger's validator list.
    ///
    /// Known peers are carried over (moved in place when their index or
    /// endpoint changed, keeping status and version); new ones start
    /// `Unknown`; peers missing from `entries` are dropped.
    pub fn reconcile(&self, entries: &[ValidatorEntry]) -> ReconcileOutcome {
        let previous = self.snapshot();
        let mut next = PeerSet::default();

        for entry in entries {
            next.validators.insert(entry.validator);
            if entry.validator == self.own_id {
                next.self_index = Some(entry.index);
                continue;
            }
            let peer = match previous.get(&entry.validator) {
                Some(old) if old.index == entry.index && old.endpoint == entry.endpoint => {
                    Arc::clone(old)
                }
                Some(old) => {
                    tracing::info!(
                        peer = %old.node_id,
                        index = entry.index,
                        endpoint = %entry.endpoint,
                        "peer moved"
                    );
                    Arc::new(old.relocated(entry.index, entry.endpoint.clone()))
                }
                None => {
                    tracing::info!(
                        peer = %entry.validator,
                        index = entry.index,
                        endpoint = %entry.endpoint,
                        "peer added"
                    );
                    Arc::new(Peer::new(entry.validator, entry.index, entry.endpoint.clone()))
                }
            };
            next.peers.push(peer);
        }

        for old in &previous.peers {
            if !next.validators.contains(&old.node_id) {
                tracing::info!(peer = %old.node_id, "peer removed");
            }
        }

        let outcome = ReconcileOutcome {
            self_index: next.self_index,
            index_changed: next.self_index != previous.self_index,
        };
        *self.current.write() = Arc::new(next);
        outcome
    }
}
