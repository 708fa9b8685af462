//! The verification state machine.
//!
//! [`ValidatorEngine`] answers the HTTP API (through [`ValidatorApi`]) and
//! drives every stored record along its lifecycle, one step per call to
//! [`ValidatorEngine::advance`]:
//!
//! | step                | action                                              | next      |
//! |---------------------|-----------------------------------------------------|-----------|
//! | `ReceivedRegister`  | register on the ledger, relay to peers, send SMS    | `SentSms` |
//! | `ReceivedBroadcast` | send SMS                                            | `SentSms` |
//! | `ReceivedCode`      | vote on the ledger                                  | `Voted`   |
//! | `Voted`             | count the votes once the ledger allows it           | `Finished`|
//!
//! A step that fails (ledger unreachable, store error) leaves the record where
//! it was, and the next tick tries again.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::Instrument;

use phonelink_crypto::{
    phone_hash, request_id, request_message, submit_message, tx_message, verify_signature,
    ValidatorKey,
};
use phonelink_ledger::{Ledger, VoteCountStatus};
use phonelink_network::{Gossip, PeerClient, PeerRegistry};
use phonelink_rpc::error::codes;
use phonelink_rpc::{RpcError, ValidatorApi};
use phonelink_store::{RecordStore, StoreError};
use phonelink_types::{
    Address, AuthenticationMode, Clock, NodeInfo, PeerInfo, PhoneRequest, ProcessStep,
    RecoverableSignature, RequestId, SubmitData, Timestamp, Transaction, ValidationStatus,
    VerificationRecord,
};
use phonelink_verification::{evaluate_submit, normalize_phone, CodeGenerator, SubmitOutcome, VerificationError};

use crate::config::TimingConfig;
use crate::metrics::NodeMetrics;
use crate::sms::SmsSender;
use crate::tracing_spans::{api_span, reconcile_span, record_span, tick_span};
use crate::NodeError;

/// Attempts at drawing an unused request id before giving up.
pub const MAX_REQUEST_ID_ATTEMPTS: usize = 16;

/// Everything the engine needs from its surroundings.
pub struct EngineContext {
    pub key: ValidatorKey,
    pub mode: AuthenticationMode,
    pub timing: TimingConfig,
    /// The endpoint other validators reach this node at.
    pub endpoint: String,
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn RecordStore>,
    pub sms: SmsSender,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<NodeMetrics>,
}

/// Bookkeeping of the driver loop between ticks.
#[derive(Default)]
struct Progress {
    initialized: bool,
    last_tick: Option<Timestamp>,
}

pub struct ValidatorEngine {
    key: ValidatorKey,
    mode: AuthenticationMode,
    timing: TimingConfig,
    node_info: NodeInfo,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn RecordStore>,
    gossip: Gossip,
    codes: CodeGenerator,
    sms: SmsSender,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    started_at: Timestamp,
    progress: Mutex<Progress>,
}

impl ValidatorEngine {
    pub fn new(ctx: EngineContext) -> Self {
        let registry = Arc::new(PeerRegistry::new(ctx.key.address()));
        let gossip = Gossip::new(registry, PeerClient::new(ctx.timing.request_timeout()));
        // Known-code modes derive the code from the validator index, which is
        // only learned on the first reconciliation.
        let codes = if ctx.mode.uses_known_code() {
            CodeGenerator::fixed(0)
        } else {
            CodeGenerator::Random
        };
        let node_info = NodeInfo {
            node_id: ctx.key.address(),
            endpoint: ctx.endpoint,
            version: format!("v{}", env!("CARGO_PKG_VERSION")),
        };
        let started_at = ctx.clock.now();

        tracing::info!(
            node_id = %node_info.node_id,
            endpoint = %node_info.endpoint,
            mode = %ctx.mode,
            "verification engine created"
        );

        Self {
            key: ctx.key,
            mode: ctx.mode,
            timing: ctx.timing,
            node_info,
            ledger: ctx.ledger,
            store: ctx.store,
            gossip,
            codes,
            sms: ctx.sms,
            clock: ctx.clock,
            metrics: ctx.metrics,
            started_at,
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        self.gossip.registry()
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    fn period_of(&self, time: Timestamp) -> u64 {
        time.as_secs() / self.timing.reconcile_interval_secs.max(1)
    }

    // ── Driver loop ─────────────────────────────────────────────────────

    /// One driver tick.
    ///
    /// Nothing happens during the initial grace window. The first tick after
    /// it publishes this node's endpoint and builds the peer view; later ticks
    /// refresh the peer view whenever the reconcile period rolls over.
    pub async fn advance(&self) -> Result<(), NodeError> {
        let now = self.clock.now();
        if self.started_at.elapsed_since(now) < self.timing.init_waiting_secs {
            self.progress.lock().last_tick = Some(now);
            return Ok(());
        }

        let first = !self.progress.lock().initialized;
        if first {
            self.initialize().await;
            self.progress.lock().initialized = true;
        }

        let span = tick_span(self.registry().self_index());
        let processed = async {
            match self.registry().self_index() {
                Some(index) => self.process_records(index).await,
                None => {
                    tracing::warn!(node_id = %self.address(), "not in the validator set, records wait");
                    Ok(())
                }
            }
        }
        .instrument(span)
        .await;

        let previous = self.progress.lock().last_tick.replace(now);
        let period = self.period_of(now);
        let rolled_over = previous.is_some_and(|t| self.period_of(t) != period);
        if rolled_over && !first {
            self.maintain(now).instrument(reconcile_span(period)).await;
        }

        processed
    }

    async fn initialize(&self) {
        if let Err(e) = self.ledger.update_endpoint(&self.node_info.endpoint).await {
            tracing::error!(endpoint = %self.node_info.endpoint, error = %e, "failed to publish endpoint");
        }
        if let Err(e) = self.reconcile().await {
            tracing::error!(error = %e, "failed to load the validator set");
        }
        self.gossip.health_check().await;
    }

    async fn maintain(&self, now: Timestamp) {
        if let Err(e) = self.reconcile().await {
            tracing::warn!(error = %e, "failed to refresh the validator set");
        }
        self.gossip.health_check().await;
        match self.store.delete_expired(now) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "expired records deleted"),
            Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
        }
    }

    /// Rebuild the peer view from the ledger, reseeding known codes when this
    /// node's index moved.
    pub async fn reconcile(&self) -> Result<(), NodeError> {
        let entries = self.ledger.get_validators().await?;
        let outcome = self.registry().reconcile(&entries);
        if outcome.index_changed {
            if let Some(index) = outcome.self_index {
                self.codes.reseed(index);
                tracing::info!(validator_index = index, "validator index assigned");
            }
        }
        self.metrics
            .peer_count
            .set(self.registry().snapshot().peers.len() as i64);
        Ok(())
    }

    async fn process_records(&self, index: u32) -> Result<(), NodeError> {
        let records = self.store.list_unfinished()?;
        for record in records {
            let span = record_span(&record.request_id, &record.process_step.to_string());
            if let Err(e) = self.step(&record, index).instrument(span).await {
                tracing::warn!(
                    request_id = %record.request_id,
                    step = %record.process_step,
                    error = %e,
                    "record step failed, retrying next tick"
                );
            }
        }
        Ok(())
    }

    async fn step(&self, record: &VerificationRecord, index: u32) -> Result<(), NodeError> {
        let id = record.request_id;
        match record.process_step {
            ProcessStep::ReceivedRegister => {
                self.register_on_ledger(record).await?;
                let relayed = self.gossip.broadcast(&record.to_transaction()).await;
                tracing::debug!(sent = relayed.sent, failed = relayed.failed, "request relayed");
                self.issue_challenge(record, index).await?;
                self.store.update_process_step(&id, ProcessStep::SentSms)?;
                self.schedule_auto_confirm(id);
            }
            ProcessStep::ReceivedBroadcast => {
                self.issue_challenge(record, index).await?;
                self.store.update_process_step(&id, ProcessStep::SentSms)?;
                self.schedule_auto_confirm(id);
            }
            ProcessStep::ReceivedCode => {
                self.ledger.vote_request(&id).await?;
                self.store.update_process_step(&id, ProcessStep::Voted)?;
                tracing::info!(request_id = %id, "voted");
            }
            ProcessStep::Voted => match self.ledger.can_count_vote(&id).await? {
                VoteCountStatus::Possible => {
                    self.ledger.count_vote(&id).await?;
                    self.finish(&id)?;
                    tracing::info!(request_id = %id, "votes counted");
                }
                VoteCountStatus::NotYet => {
                    tracing::debug!(request_id = %id, "votes cannot be counted yet");
                }
                VoteCountStatus::AlreadyCounted => {
                    self.finish(&id)?;
                    tracing::info!(request_id = %id, "votes were counted by another validator");
                }
            },
            ProcessStep::None | ProcessStep::SentSms | ProcessStep::Finished => {}
        }
        Ok(())
    }

    async fn register_on_ledger(&self, record: &VerificationRecord) -> Result<(), NodeError> {
        let id = record.request_id;
        if !self.ledger.is_available(&id).await? {
            tracing::debug!(request_id = %id, "already registered on the ledger");
            return Ok(());
        }
        self.ledger
            .add_request(
                &id,
                &phone_hash(&record.phone),
                &record.address,
                &record.request_signature,
            )
            .await?;
        tracing::info!(request_id = %id, address = %record.address, "request registered on the ledger");
        Ok(())
    }

    /// Issue this validator's challenge fragment, once per record.
    async fn issue_challenge(&self, record: &VerificationRecord, index: u32) -> Result<(), NodeError> {
        if record.validation_status != ValidationStatus::None {
            return Ok(());
        }
        let code = self.codes.next_code();
        let total = self.registry().snapshot().validators.len();
        self.sms.send(index, total, &code, &record.phone).await;

        let expire_at = self.clock.now().plus_secs(self.timing.code_ttl_secs);
        self.store
            .update_send_code(&record.request_id, ValidationStatus::Sent, &code, expire_at)?;
        tracing::debug!(request_id = %record.request_id, %expire_at, "challenge issued");
        Ok(())
    }

    /// In `no_sms_no_code` mode nobody submits a code; move the record on
    /// after a short delay as if they had.
    fn schedule_auto_confirm(&self, id: RequestId) {
        if !self.mode.auto_confirms() {
            return;
        }
        let store = Arc::clone(&self.store);
        let delay = self.timing.no_code_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = store.update_process_step(&id, ProcessStep::ReceivedCode) {
                tracing::warn!(request_id = %id, error = %e, "automatic confirmation failed");
            }
        });
    }

    fn finish(&self, id: &RequestId) -> Result<(), NodeError> {
        self.store
            .update_validation_status(id, ValidationStatus::Confirmed)?;
        self.store.update_process_step(id, ProcessStep::Finished)?;
        Ok(())
    }

    // ── API ─────────────────────────────────────────────────────────────

    fn tally<T>(&self, result: &Result<T, RpcError>) {
        match result {
            Ok(_) => self.metrics.request_success.inc(),
            Err(e) if matches!(
                e.code(),
                codes::NO_SUCH_REQUEST | codes::INTERNAL | codes::STORAGE
            ) =>
            {
                self.metrics.request_failure.inc()
            }
            Err(_) => {}
        }
    }

    fn sign(&self, digest: &[u8; 32]) -> Result<RecoverableSignature, RpcError> {
        self.key
            .sign(digest)
            .map_err(|e| RpcError::Internal(e.to_string()))
    }

    /// A record entering the lifecycle now. It stays out of the expiry
    /// sweep for one challenge lifetime even before a challenge is issued.
    fn new_record(&self, tx: &Transaction, step: ProcessStep) -> VerificationRecord {
        let mut record = VerificationRecord::from_transaction(tx, step);
        record.expire_at = self.clock.now().plus_secs(self.timing.code_ttl_secs);
        record
    }

    /// A request id unknown both locally and on the ledger.
    async fn fresh_request_id(
        &self,
        phone_hash: &[u8; 32],
        address: &Address,
        nonce: u64,
    ) -> Result<RequestId, RpcError> {
        for _ in 0..MAX_REQUEST_ID_ATTEMPTS {
            let id = request_id(phone_hash, address, nonce, &mut rand::thread_rng());
            if self.store.get(&id)?.is_none() && self.ledger.is_available(&id).await? {
                return Ok(id);
            }
        }
        Err(RpcError::Internal(format!(
            "no unused request id after {MAX_REQUEST_ID_ATTEMPTS} attempts"
        )))
    }

    async fn accept_request(
        &self,
        phone: String,
        address: Address,
        signature: RecoverableSignature,
    ) -> Result<RequestId, RpcError> {
        let phone = normalize_phone(&phone)?;
        let nonce = self.ledger.nonce_of(&address).await?;
        let chain_id = self.ledger.chain_id().await?;
        let hash = phone_hash(&phone);
        if !verify_signature(&address, &request_message(&hash, &address, chain_id, nonce), &signature) {
            return Err(VerificationError::InvalidSignature.into());
        }

        let request_id = self.fresh_request_id(&hash, &address, nonce).await?;
        let mut tx = Transaction {
            request: PhoneRequest {
                phone,
                address,
                nonce,
                signature,
            },
            request_id,
            receiver: self.address(),
            signature: RecoverableSignature::default(),
        };
        tx.signature = self.sign(&tx_message(&tx, chain_id))?;

        self.store.create(&self.new_record(&tx, ProcessStep::ReceivedRegister))?;
        tracing::info!(request_id = %request_id, address = %address, "request accepted");
        Ok(request_id)
    }

    async fn accept_broadcast(&self, mut tx: Transaction) -> Result<RequestId, RpcError> {
        tx.request.phone = normalize_phone(&tx.request.phone)?;
        let chain_id = self.ledger.chain_id().await?;
        if !verify_signature(&tx.receiver, &tx_message(&tx, chain_id), &tx.signature) {
            return Err(VerificationError::InvalidSignature.into());
        }
        if !self.registry().is_validator(&tx.receiver) {
            return Err(VerificationError::UnknownValidator(tx.receiver.to_string()).into());
        }

        self.store.create(&self.new_record(&tx, ProcessStep::ReceivedBroadcast))?;
        tracing::info!(request_id = %tx.request_id, receiver = %tx.receiver, "relayed request accepted");
        Ok(tx.request_id)
    }

    async fn relay_submit(&self, request_id: RequestId, code: String) -> Result<(), RpcError> {
        let chain_id = self.ledger.chain_id().await?;
        let mut data = SubmitData {
            request_id,
            code,
            receiver: self.address(),
            signature: RecoverableSignature::default(),
        };
        data.signature = self.sign(&submit_message(&data, chain_id))?;

        let relayed = self.gossip.broadcast_submit(&data).await;
        tracing::debug!(request_id = %request_id, sent = relayed.sent, failed = relayed.failed, "submit relayed");
        self.process_submit(&data.request_id, &data.code)
    }

    async fn accept_relayed_submit(&self, data: SubmitData) -> Result<(), RpcError> {
        let chain_id = self.ledger.chain_id().await?;
        if !verify_signature(&data.receiver, &submit_message(&data, chain_id), &data.signature) {
            return Err(VerificationError::InvalidSignature.into());
        }
        if !self.registry().is_validator(&data.receiver) {
            return Err(VerificationError::UnknownValidator(data.receiver.to_string()).into());
        }
        self.process_submit(&data.request_id, &data.code)
    }

    /// Check this validator's fragment of `code` against the record.
    fn process_submit(&self, id: &RequestId, code: &str) -> Result<(), RpcError> {
        let record = self
            .store
            .get(id)?
            .ok_or_else(|| VerificationError::NoSuchRequest(id.to_string()))?;
        let index = self
            .registry()
            .self_index()
            .ok_or(VerificationError::NotAValidator)?;

        match evaluate_submit(&record, code, index, self.clock.now())? {
            SubmitOutcome::Accept { fragment } => {
                self.store.update_receive_code(id, &fragment)?;
                match self.store.update_process_step(id, ProcessStep::ReceivedCode) {
                    // The driver loop moved the record on meanwhile.
                    Ok(()) | Err(StoreError::InvalidTransition { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                tracing::info!(request_id = %id, "code accepted");
                Ok(())
            }
            SubmitOutcome::AlreadyAccepted => Ok(()),
            SubmitOutcome::Reject { fragment } => {
                self.store.update_receive_code(id, &fragment)?;
                Err(VerificationError::CodeMismatch.into())
            }
            SubmitOutcome::Expire => {
                self.store
                    .update_validation_status(id, ValidationStatus::Expired)?;
                Err(VerificationError::CodeExpired.into())
            }
        }
    }
}

#[async_trait]
impl ValidatorApi for ValidatorEngine {
    fn node_info(&self) -> NodeInfo {
        self.node_info.clone()
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.registry().peer_infos()
    }

    fn metrics(&self) -> String {
        self.metrics.status.inc();
        self.metrics.encode()
    }

    async fn request(
        &self,
        phone: String,
        address: Address,
        signature: RecoverableSignature,
    ) -> Result<RequestId, RpcError> {
        let result = self.accept_request(phone, address, signature)
            .instrument(api_span("request"))
            .await;
        self.tally(&result);
        result
    }

    async fn broadcast(&self, tx: Transaction) -> Result<RequestId, RpcError> {
        let result = self.accept_broadcast(tx)
            .instrument(api_span("broadcast"))
            .await;
        self.tally(&result);
        result
    }

    async fn submit(&self, request_id: RequestId, code: String) -> Result<(), RpcError> {
        let result = self.relay_submit(request_id, code)
            .instrument(api_span("submit"))
            .await;
        self.tally(&result);
        result
    }

    async fn broadcast_submit(&self, data: SubmitData) -> Result<(), RpcError> {
        let result = self.accept_relayed_submit(data)
            .instrument(api_span("broadcast_submit"))
            .await;
        self.tally(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonelink_nullables::{NullClock, NullRegistry, NullStore};

    const CHAIN_ID: u64 = 24680;
    const PHONE: &str = "+82 10-1234-1000";
    const START: u64 = 1_700_000_000;

    struct Harness {
        engine: ValidatorEngine,
        registry: NullRegistry,
        clock: Arc<NullClock>,
        store: Arc<NullStore>,
        user: ValidatorKey,
    }

    fn timing() -> TimingConfig {
        TimingConfig {
            init_waiting_secs: 2,
            no_code_delay_ms: 20,
            ..TimingConfig::default()
        }
    }

    /// An engine whose validator sits at position `others` in the set.
    fn harness(mode: AuthenticationMode, others: usize) -> Harness {
        let registry = NullRegistry::new(CHAIN_ID);
        for i in 0..others {
            registry.add_validator(Address::new([0x10 + i as u8; 20]), "");
        }
        let key = ValidatorKey::random();
        registry.add_validator(key.address(), "");

        let clock = Arc::new(NullClock::new(START));
        let store = Arc::new(NullStore::new());
        let engine = ValidatorEngine::new(EngineContext {
            ledger: Arc::new(registry.ledger_for(key.address())),
            key,
            mode,
            timing: timing(),
            endpoint: "http://127.0.0.1:7080".into(),
            store: store.clone(),
            sms: SmsSender::NoOp,
            clock: clock.clone(),
            metrics: Arc::new(NodeMetrics::new()),
        });
        Harness {
            engine,
            registry,
            clock,
            store,
            user: ValidatorKey::random(),
        }
    }

    impl Harness {
        fn user_signature(&self, nonce: u64) -> RecoverableSignature {
            let digest = request_message(&phone_hash(PHONE), &self.user.address(), CHAIN_ID, nonce);
            self.user.sign(&digest).unwrap()
        }

        async fn request(&self) -> Result<RequestId, RpcError> {
            self.engine
                .request(PHONE.into(), self.user.address(), self.user_signature(0))
                .await
        }

        /// Skip the grace window and run one tick.
        async fn tick(&self) {
            self.clock.advance(3);
            self.engine.advance().await.unwrap();
        }

        fn record(&self, id: &RequestId) -> VerificationRecord {
            self.store.get(id).unwrap().unwrap()
        }
    }

    #[tokio::test]
    async fn request_creates_a_registered_record() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();

        let record = h.record(&id);
        assert_eq!(record.process_step, ProcessStep::ReceivedRegister);
        assert_eq!(record.phone, PHONE);
        assert_eq!(record.receiver, h.engine.address());
        assert!(verify_signature(
            &h.engine.address(),
            &tx_message(&record.to_transaction(), CHAIN_ID),
            &record.receiver_signature
        ));
        assert_eq!(h.engine.metrics.request_success.get(), 1);
    }

    #[tokio::test]
    async fn request_phone_is_normalized() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h
            .engine
            .request("+82-10-1234-1000".into(), h.user.address(), h.user_signature(0))
            .await
            .unwrap();
        assert_eq!(h.record(&id).phone, PHONE);
    }

    #[tokio::test]
    async fn bad_signature_creates_nothing() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let err = h
            .engine
            .request(PHONE.into(), h.user.address(), h.user_signature(5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_CLAIM);
        assert_eq!(h.store.count().unwrap(), 0);
        assert_eq!(h.engine.metrics.request_failure.get(), 0);
    }

    #[tokio::test]
    async fn invalid_phone_is_rejected_before_the_ledger() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.registry.set_offline(true);
        let err = h
            .engine
            .request("12".into(), h.user.address(), h.user_signature(0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_CLAIM);
    }

    #[tokio::test]
    async fn unreachable_ledger_is_an_internal_error() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.registry.set_offline(true);
        let err = h.request().await.unwrap_err();
        assert_eq!(err.code(), codes::INTERNAL);
        assert_eq!(h.engine.metrics.request_failure.get(), 1);
    }

    #[tokio::test]
    async fn nothing_happens_during_the_grace_window() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.engine.advance().await.unwrap();

        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedRegister);
        assert!(h.registry.endpoint_of(&h.engine.address()).unwrap().is_empty());
        assert!(h.engine.registry().self_index().is_none());
    }

    #[tokio::test]
    async fn first_tick_publishes_endpoint_and_learns_index() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 2);
        h.tick().await;
        assert_eq!(
            h.registry.endpoint_of(&h.engine.address()).unwrap(),
            "http://127.0.0.1:7080"
        );
        assert_eq!(h.engine.registry().self_index(), Some(2));
        assert_eq!(h.engine.peers().len(), 2);
    }

    #[tokio::test]
    async fn single_validator_runs_the_whole_lifecycle() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();

        h.tick().await;
        let record = h.record(&id);
        assert_eq!(record.process_step, ProcessStep::SentSms);
        assert_eq!(record.validation_status, ValidationStatus::Sent);
        assert_eq!(record.send_code, "00");
        assert_eq!(record.expire_at, h.clock.now().plus_secs(300));
        assert!(h.registry.registered(&id).is_some());

        h.engine.submit(id, "00".into()).await.unwrap();
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedCode);
        assert_eq!(h.record(&id).receive_code, "00");

        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::Voted);
        assert_eq!(h.registry.votes(&id), 1);

        h.tick().await;
        let record = h.record(&id);
        assert_eq!(record.process_step, ProcessStep::Finished);
        assert_eq!(record.validation_status, ValidationStatus::Confirmed);
        assert!(h.registry.is_counted(&id));

        let err = h.engine.submit(id, "00".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::ALREADY_FINISHED);
    }

    #[tokio::test]
    async fn known_code_follows_the_validator_index() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 1);
        let id = h.request().await.unwrap();
        h.tick().await;
        assert_eq!(h.record(&id).send_code, "01");

        // Fragment at offset 2 belongs to this validator.
        let err = h.engine.submit(id, "0102".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::CODE_MISMATCH);
        assert_eq!(h.record(&id).receive_code, "02");
        assert_eq!(h.record(&id).validation_status, ValidationStatus::Sent);

        h.engine.submit(id, "0001".into()).await.unwrap();
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedCode);
    }

    #[tokio::test]
    async fn too_short_code_is_a_parameter_error() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 1);
        let id = h.request().await.unwrap();
        h.tick().await;
        let err = h.engine.submit(id, "00".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_PARAMETERS);
    }

    #[tokio::test]
    async fn submit_before_challenge_is_not_yet_sent() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.tick().await;
        // A second request stays un-challenged until the next tick.
        let second = h
            .engine
            .request(PHONE.into(), h.user.address(), h.user_signature(1))
            .await
            .unwrap();
        assert_ne!(second, id);
        let err = h.engine.submit(second, "00".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_YET_SENT);
    }

    #[tokio::test]
    async fn late_submit_expires_the_challenge() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.tick().await;

        h.clock.advance(301);
        let err = h.engine.submit(id, "00".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::CODE_EXPIRED);
        assert_eq!(h.record(&id).validation_status, ValidationStatus::Expired);

        let err = h.engine.submit(id, "00".into()).await.unwrap_err();
        assert_eq!(err.code(), codes::ALREADY_EXPIRED);
    }

    #[tokio::test]
    async fn unknown_request_counts_as_failure() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.tick().await;
        let err = h
            .engine
            .submit(RequestId::new([9; 32]), "00".into())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::NO_SUCH_REQUEST);
        assert_eq!(h.engine.metrics.request_failure.get(), 1);
    }

    fn relayed_tx(receiver: &ValidatorKey, user: &ValidatorKey) -> Transaction {
        let mut tx = Transaction {
            request: PhoneRequest {
                phone: PHONE.into(),
                address: user.address(),
                nonce: 0,
                signature: RecoverableSignature::new([1; 65]),
            },
            request_id: RequestId::new([7; 32]),
            receiver: receiver.address(),
            signature: RecoverableSignature::default(),
        };
        tx.signature = receiver.sign(&tx_message(&tx, CHAIN_ID)).unwrap();
        tx
    }

    #[tokio::test]
    async fn broadcast_from_a_validator_is_stored() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let peer = ValidatorKey::random();
        h.registry.add_validator(peer.address(), "");
        h.tick().await;

        let tx = relayed_tx(&peer, &h.user);
        assert_eq!(h.engine.broadcast(tx.clone()).await.unwrap(), tx.request_id);
        assert_eq!(
            h.record(&tx.request_id).process_step,
            ProcessStep::ReceivedBroadcast
        );

        let err = h.engine.broadcast(tx).await.unwrap_err();
        assert_eq!(err.code(), codes::STORAGE);
    }

    #[tokio::test]
    async fn broadcast_from_outsider_is_refused() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.tick().await;
        let outsider = ValidatorKey::random();
        let err = h
            .engine
            .broadcast(relayed_tx(&outsider, &h.user))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::NOT_A_VALIDATOR);
    }

    #[tokio::test]
    async fn forged_broadcast_is_refused() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let peer = ValidatorKey::random();
        h.registry.add_validator(peer.address(), "");
        h.tick().await;

        let mut tx = relayed_tx(&peer, &h.user);
        tx.request.nonce = 1;
        let err = h.engine.broadcast(tx).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_CLAIM);
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn relayed_submit_needs_a_validator_signature() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let peer = ValidatorKey::random();
        h.registry.add_validator(peer.address(), "");
        h.tick().await;
        let id = h.request().await.unwrap();
        h.tick().await;

        let mut data = SubmitData {
            request_id: id,
            code: "0001".into(),
            receiver: peer.address(),
            signature: RecoverableSignature::default(),
        };
        let err = h.engine.broadcast_submit(data.clone()).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_CLAIM);

        data.signature = peer.sign(&submit_message(&data, CHAIN_ID)).unwrap();
        h.engine.broadcast_submit(data).await.unwrap();
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedCode);
    }

    #[tokio::test]
    async fn records_wait_while_outside_the_validator_set() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.registry.remove_validator(&h.engine.address());
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedRegister);
    }

    #[tokio::test]
    async fn ledger_outage_leaves_records_in_place() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.tick().await;
        h.engine.submit(id, "00".into()).await.unwrap();

        h.registry.set_offline(true);
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedCode);

        h.registry.set_offline(false);
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::Voted);
    }

    #[tokio::test]
    async fn no_code_mode_confirms_on_its_own() {
        let h = harness(AuthenticationMode::NoSmsNoCode, 0);
        let id = h.request().await.unwrap();
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::SentSms);
        assert_eq!(h.record(&id).validation_status, ValidationStatus::Sent);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedCode);

        h.tick().await;
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::Finished);
    }

    #[tokio::test]
    async fn expired_records_are_swept_when_the_period_rolls_over() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        h.tick().await;
        assert!(h.store.get(&id).unwrap().is_some());

        h.clock.advance(300 + phonelink_store::EXPIRED_RECORD_GRACE_SECS + 1);
        h.engine.advance().await.unwrap();
        assert!(h.store.get(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn waiting_records_outlive_a_ledger_outage() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        let id = h.request().await.unwrap();
        assert_eq!(h.record(&id).expire_at, h.clock.now().plus_secs(300));

        h.registry.set_offline(true);
        h.tick().await;
        for _ in 0..3 {
            h.clock.advance(13);
            h.engine.advance().await.unwrap();
        }
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedRegister);

        h.registry.set_offline(false);
        h.engine.reconcile().await.unwrap();
        h.tick().await;
        assert_eq!(h.record(&id).process_step, ProcessStep::SentSms);
    }

    #[tokio::test]
    async fn records_outside_the_set_survive_period_rollovers() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 1);
        h.registry.remove_validator(&h.engine.address());
        let id = h.request().await.unwrap();

        h.tick().await;
        assert!(h.engine.registry().self_index().is_none());
        for _ in 0..3 {
            h.clock.advance(13);
            h.engine.advance().await.unwrap();
        }
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedRegister);
        assert_eq!(h.record(&id).validation_status, ValidationStatus::None);
    }

    #[tokio::test]
    async fn unissued_records_are_swept_after_one_lifetime_and_grace() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.registry.set_offline(true);
        h.tick().await;
        h.registry.set_offline(false);
        let id = h.request().await.unwrap();
        h.registry.set_offline(true);

        h.clock.advance(300 + phonelink_store::EXPIRED_RECORD_GRACE_SECS - 20);
        h.engine.advance().await.unwrap();
        assert!(h.store.get(&id).unwrap().is_some());

        h.clock.advance(40);
        h.engine.advance().await.unwrap();
        assert!(h.store.get(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn taken_request_ids_are_regenerated() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.registry.report_taken(3);
        let id = h.request().await.unwrap();

        assert_eq!(h.registry.availability_queries(), 4);
        assert_eq!(h.record(&id).process_step, ProcessStep::ReceivedRegister);
        let ledger = h.registry.ledger_for(h.engine.address());
        assert!(ledger.is_available(&id).await.unwrap());
    }

    #[tokio::test]
    async fn request_id_exhaustion_is_an_internal_error() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.registry.report_taken(MAX_REQUEST_ID_ATTEMPTS);
        let err = h.request().await.unwrap_err();

        assert_eq!(err.code(), codes::INTERNAL);
        assert_eq!(h.registry.availability_queries(), MAX_REQUEST_ID_ATTEMPTS);
        assert_eq!(h.store.count().unwrap(), 0);
    }

    #[test]
    fn metrics_scrape_bumps_status() {
        let h = harness(AuthenticationMode::NoSmsKnownCode, 0);
        h.engine.metrics();
        let text = h.engine.metrics();
        assert!(text.contains("phonelink_status 2"));
    }
}
