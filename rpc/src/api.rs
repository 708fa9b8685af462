use async_trait::async_trait;
use phonelink_types::{
    Address, NodeInfo, PeerInfo, RecoverableSignature, RequestId, SubmitData, Transaction,
};

use crate::RpcError;

/// The operations behind the HTTP surface, implemented by the validator engine.
#[async_trait]
pub trait ValidatorApi: Send + Sync {
    fn node_info(&self) -> NodeInfo;

    fn peers(&self) -> Vec<PeerInfo>;

    /// Prometheus text exposition of the node's metrics.
    fn metrics(&self) -> String;

    /// Accept a new verification request from a user.
    async fn request(
        &self,
        phone: String,
        address: Address,
        signature: RecoverableSignature,
    ) -> Result<RequestId, RpcError>;

    /// Accept a request relayed by the validator that received it.
    async fn broadcast(&self, tx: Transaction) -> Result<RequestId, RpcError>;

    /// Process a code submitted by the user, relaying it to peers first.
    async fn submit(&self, request_id: RequestId, code: String) -> Result<(), RpcError>;

    /// Process a code submission relayed by another validator.
    async fn broadcast_submit(&self, data: SubmitData) -> Result<(), RpcError>;
}
