//! Peer health checks and fan-out of requests and submits.

use std::sync::Arc;

use futures_util::future::join_all;
use phonelink_types::{PeerStatus, SubmitData, Transaction};
use serde::Serialize;

use crate::registry::Peer;
use crate::{PeerClient, PeerRegistry};

/// Outcome of one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    pub sent: usize,
    pub failed: usize,
}

pub struct Gossip {
    registry: Arc<PeerRegistry>,
    client: PeerClient,
}

impl Gossip {
    pub fn new(registry: Arc<PeerRegistry>, client: PeerClient) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Ask every peer that is not `Abnormal` who it is.
    ///
    /// A peer answering with the expected identity becomes `Active`; a
    /// different identity makes it `Abnormal`; any failure makes it `Inactive`.
    /// Peers without an endpoint are left as they are.
    pub async fn health_check(&self) {
        let set = self.registry.snapshot();
        let checks = set
            .peers
            .iter()
            .filter(|p| p.status() != PeerStatus::Abnormal && !p.endpoint.is_empty())
            .map(|peer| self.check_peer(peer));
        join_all(checks).await;
    }

    async fn check_peer(&self, peer: &Peer) {
        match self.client.info(&peer.endpoint).await {
            Ok(info) if info.node_id == peer.node_id => {
                peer.set_version(info.version);
                peer.set_status(PeerStatus::Active);
            }
            Ok(info) => {
                tracing::warn!(
                    peer = %peer.node_id,
                    reported = %info.node_id,
                    endpoint = %peer.endpoint,
                    "peer endpoint answers with another identity"
                );
                peer.set_status(PeerStatus::Abnormal);
            }
            Err(e) => {
                tracing::warn!(peer = %peer.node_id, endpoint = %peer.endpoint, error = %e, "health check failed");
                peer.set_status(PeerStatus::Inactive);
            }
        }
    }

    /// Relay a request to all active peers.
    pub async fn broadcast(&self, tx: &Transaction) -> BroadcastResult {
        self.fan_out("broadcast", tx).await
    }

    /// Relay a code submission to all active peers.
    pub async fn broadcast_submit(&self, data: &SubmitData) -> BroadcastResult {
        self.fan_out("broadcastSubmit", data).await
    }

    async fn fan_out<B: Serialize + Sync>(&self, path: &str, body: &B) -> BroadcastResult {
        let set = self.registry.snapshot();
        let deliveries = set.active().map(|peer| async move {
            let delivered = self.client.post(&peer.endpoint, path, body).await;
            if let Err(e) = &delivered {
                tracing::warn!(peer = %peer.node_id, path, error = %e, "gossip delivery failed");
                peer.set_status(PeerStatus::Inactive);
            }
            delivered.is_ok()
        });

        let mut result = BroadcastResult::default();
        for delivered in join_all(deliveries).await {
            if delivered {
                result.sent += 1;
            } else {
                result.failed += 1;
            }
        }
        result
    }
}
