//! Nullable ledger: an in-memory registry contract shared by several validators.

use async_trait::async_trait;
use phonelink_ledger::{Ledger, LedgerError, ValidatorEntry, VoteCountStatus};
use phonelink_types::{Address, RecoverableSignature, RequestId};
use std::collections::{HashMap, HashSet};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct RegisteredRequest {
    phone_hash: [u8; 32],
    address: Address,
    votes: HashSet<Address>,
    counted: bool,
}

#[derive(Default)]
struct Contract {
    chain_id: u64,
    validators: Vec<ValidatorEntry>,
    nonces: HashMap<Address, u64>,
    requests: HashMap<RequestId, RegisteredRequest>,
    unavailable: HashSet<RequestId>,
    /// How many upcoming `is_available` queries answer "taken".
    taken_queries: usize,
    availability_queries: usize,
    offline: bool,
}

impl Contract {
    fn require_validator(&self, caller: &Address) -> Result<(), LedgerError> {
        if self.validators.iter().any(|v| v.validator == *caller) {
            Ok(())
        } else {
            Err(LedgerError::Rejected(format!("{caller} is not a validator")))
        }
    }

    fn quorum_reached(&self, request: &RegisteredRequest) -> bool {
        request.votes.len() * 2 > self.validators.len()
    }
}

/// The shared contract state. Hand out one [`NullLedger`] per validator.
#[derive(Clone)]
pub struct NullRegistry {
    contract: Arc<Mutex<Contract>>,
}

impl NullRegistry {
    pub fn new(chain_id: u64) -> Self {
        Self {
            contract: Arc::new(Mutex::new(Contract {
                chain_id,
                ..Contract::default()
            })),
        }
    }

    /// Register a validator; returns its index.
    pub fn add_validator(&self, address: Address, endpoint: &str) -> u32 {
        let mut contract = self.contract.lock();
        let index = contract.validators.len() as u32;
        contract.validators.push(ValidatorEntry {
            validator: address,
            index,
            endpoint: endpoint.to_string(),
            status: 1,
        });
        index
    }

    /// Drop a validator and renumber the rest.
    pub fn remove_validator(&self, address: &Address) {
        let mut contract = self.contract.lock();
        contract.validators.retain(|v| v.validator != *address);
        for (i, v) in contract.validators.iter_mut().enumerate() {
            v.index = i as u32;
        }
    }

    /// The ledger as seen from `caller`'s account.
    pub fn ledger_for(&self, caller: Address) -> NullLedger {
        NullLedger {
            contract: Arc::clone(&self.contract),
            caller,
        }
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.contract.lock().nonces.insert(address, nonce);
    }

    /// Make `is_available` report `id` as taken.
    pub fn mark_unavailable(&self, id: RequestId) {
        self.contract.lock().unavailable.insert(id);
    }

    /// Answer "taken" to the next `n` `is_available` queries, whatever the id.
    pub fn report_taken(&self, n: usize) {
        self.contract.lock().taken_queries = n;
    }

    /// How many `is_available` queries the contract has answered.
    pub fn availability_queries(&self) -> usize {
        self.contract.lock().availability_queries
    }

    /// Make every call fail as if the ledger were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.contract.lock().offline = offline;
    }

    /// The phone hash and account a request was registered with.
    pub fn registered(&self, id: &RequestId) -> Option<([u8; 32], Address)> {
        self.contract
            .lock()
            .requests
            .get(id)
            .map(|r| (r.phone_hash, r.address))
    }

    pub fn votes(&self, id: &RequestId) -> usize {
        self.contract
            .lock()
            .requests
            .get(id)
            .map_or(0, |r| r.votes.len())
    }

    pub fn is_counted(&self, id: &RequestId) -> bool {
        self.contract
            .lock()
            .requests
            .get(id)
            .is_some_and(|r| r.counted)
    }

    pub fn endpoint_of(&self, address: &Address) -> Option<String> {
        self.contract
            .lock()
            .validators
            .iter()
            .find(|v| v.validator == *address)
            .map(|v| v.endpoint.clone())
    }
}

/// One validator's handle on a [`NullRegistry`].
pub struct NullLedger {
    contract: Arc<Mutex<Contract>>,
    caller: Address,
}

impl NullLedger {
    fn with_contract<T>(
        &self,
        f: impl FnOnce(&mut Contract) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut contract = self.contract.lock();
        if contract.offline {
            return Err(LedgerError::Unreachable("null ledger is offline".into()));
        }
        f(&mut contract)
    }
}

#[async_trait]
impl Ledger for NullLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.with_contract(|c| Ok(c.chain_id))
    }

    async fn nonce_of(&self, address: &Address) -> Result<u64, LedgerError> {
        self.with_contract(|c| Ok(c.nonces.get(address).copied().unwrap_or(0)))
    }

    async fn is_available(&self, id: &RequestId) -> Result<bool, LedgerError> {
        self.with_contract(|c| {
            c.availability_queries += 1;
            if c.taken_queries > 0 {
                c.taken_queries -= 1;
                return Ok(false);
            }
            Ok(!c.requests.contains_key(id) && !c.unavailable.contains(id))
        })
    }

    async fn get_validators(&self) -> Result<Vec<ValidatorEntry>, LedgerError> {
        self.with_contract(|c| Ok(c.validators.clone()))
    }

    async fn add_request(
        &self,
        id: &RequestId,
        phone_hash: &[u8; 32],
        address: &Address,
        _signature: &RecoverableSignature,
    ) -> Result<(), LedgerError> {
        let caller = self.caller;
        self.with_contract(|c| {
            c.require_validator(&caller)?;
            if c.requests.contains_key(id) {
                return Err(LedgerError::Rejected(format!("request {id} exists")));
            }
            c.requests.insert(
                *id,
                RegisteredRequest {
                    phone_hash: *phone_hash,
                    address: *address,
                    votes: HashSet::new(),
                    counted: false,
                },
            );
            *c.nonces.entry(*address).or_insert(0) += 1;
            Ok(())
        })
    }

    async fn vote_request(&self, id: &RequestId) -> Result<(), LedgerError> {
        let caller = self.caller;
        self.with_contract(|c| {
            c.require_validator(&caller)?;
            let request = c
                .requests
                .get_mut(id)
                .ok_or_else(|| LedgerError::Rejected(format!("unknown request {id}")))?;
            request.votes.insert(caller);
            Ok(())
        })
    }

    async fn count_vote(&self, id: &RequestId) -> Result<(), LedgerError> {
        let caller = self.caller;
        self.with_contract(|c| {
            c.require_validator(&caller)?;
            let request = c
                .requests
                .get(id)
                .cloned()
                .ok_or_else(|| LedgerError::Rejected(format!("unknown request {id}")))?;
            if request.counted {
                return Err(LedgerError::Rejected(format!("request {id} already counted")));
            }
            if !c.quorum_reached(&request) {
                return Err(LedgerError::Rejected(format!("request {id} lacks votes")));
            }
            if let Some(r) = c.requests.get_mut(id) {
                r.counted = true;
            }
            Ok(())
        })
    }

    async fn can_count_vote(&self, id: &RequestId) -> Result<VoteCountStatus, LedgerError> {
        self.with_contract(|c| {
            Ok(match c.requests.get(id) {
                Some(r) if r.counted => VoteCountStatus::AlreadyCounted,
                Some(r) if c.quorum_reached(r) => VoteCountStatus::Possible,
                _ => VoteCountStatus::NotYet,
            })
        })
    }

    async fn update_endpoint(&self, endpoint: &str) -> Result<(), LedgerError> {
        let caller = self.caller;
        self.with_contract(|c| {
            let entry = c
                .validators
                .iter_mut()
                .find(|v| v.validator == caller)
                .ok_or_else(|| LedgerError::Rejected(format!("{caller} is not a validator")))?;
            entry.endpoint = endpoint.to_string();
            Ok(())
        })
    }
}
