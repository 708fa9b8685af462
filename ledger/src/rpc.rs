//! Ethereum JSON-RPC implementation of [`Ledger`].
//!
//! Views go through `eth_call`. State-changing calls are signed locally as
//! EIP-155 legacy transactions and submitted with `eth_sendRawTransaction`
//! without waiting for a receipt. Sends are serialized so account nonces are
//! taken one at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use phonelink_crypto::ValidatorKey;
use phonelink_types::{Address, RecoverableSignature, RequestId};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{Mutex, OnceCell};

use crate::contract;
use crate::{Ledger, LedgerError, LegacyTransaction, ValidatorEntry, VoteCountStatus};

/// Default timeout for ledger requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_HEADROOM_PERCENT: u64 = 20;

/// Connection settings for [`RpcLedger`].
#[derive(Clone, Debug)]
pub struct RpcLedgerConfig {
    pub rpc_url: String,
    /// The registry contract.
    pub contract: Address,
    /// Known chain id; queried with `eth_chainId` when `None`.
    pub chain_id: Option<u64>,
    pub timeout: Duration,
}

impl RpcLedgerConfig {
    pub fn new(rpc_url: impl Into<String>, contract: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract,
            chain_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Registry contract client over Ethereum JSON-RPC.
pub struct RpcLedger {
    http_client: reqwest::Client,
    config: RpcLedgerConfig,
    key: ValidatorKey,
    next_id: AtomicU64,
    chain_id: OnceCell<u64>,
    send_lock: Mutex<()>,
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u128, LedgerError> {
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::InvalidResponse(format!("quantity without 0x: {s}")))?;
    if body.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(body, 16)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad quantity {s}: {e}")))
}

fn parse_data(s: &str) -> Result<Vec<u8>, LedgerError> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(body).map_err(|e| LedgerError::InvalidResponse(format!("bad data: {e}")))
}

fn to_u64(value: u128, what: &str) -> Result<u64, LedgerError> {
    u64::try_from(value)
        .map_err(|_| LedgerError::InvalidResponse(format!("{what} {value} does not fit in u64")))
}

impl RpcLedger {
    pub fn new(config: RpcLedgerConfig, key: ValidatorKey) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(config.timeout))
            .build()
            .unwrap_or_default();
        let chain_id = match config.chain_id {
            Some(id) => OnceCell::new_with(Some(id)),
            None => OnceCell::new(),
        };
        Self {
            http_client,
            config,
            key,
            next_id: AtomicU64::new(1),
            chain_id,
            send_lock: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Address {
        self.key.address()
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self
            .http_client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Unreachable(format!("{method} timed out: {e}"))
                } else if e.is_connect() {
                    LedgerError::Unreachable(format!("connection failed: {e}"))
                } else {
                    LedgerError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LedgerError::RequestFailed(format!(
                "{method}: HTTP status {}",
                response.status()
            )));
        }

        let reply: JsonRpcResponse<T> = response.json().await.map_err(|e| {
            LedgerError::InvalidResponse(format!("failed to parse {method} response: {e}"))
        })?;

        if let Some(err) = reply.error {
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        reply
            .result
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{method}: missing result")))
    }

    async fn view(&self, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let call = json!({
            "to": self.config.contract.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result: String = self.request("eth_call", json!([call, "latest"])).await?;
        parse_data(&result)
    }

    async fn quantity(&self, method: &str, params: Value) -> Result<u128, LedgerError> {
        let result: String = self.request(method, params).await?;
        parse_quantity(&result)
    }

    /// Sign and submit a contract call from this validator's account.
    async fn send(&self, data: Vec<u8>) -> Result<String, LedgerError> {
        let _guard = self.send_lock.lock().await;

        let chain_id = self.chain_id().await?;
        let from = self.key.address().to_string();
        let to = self.config.contract.to_string();
        let data_hex = format!("0x{}", hex::encode(&data));

        let nonce = self
            .quantity("eth_getTransactionCount", json!([from, "pending"]))
            .await?;
        let gas_price = self.quantity("eth_gasPrice", json!([])).await?;
        let estimate = self
            .quantity(
                "eth_estimateGas",
                json!([{ "from": from, "to": to, "data": data_hex }]),
            )
            .await?;
        let estimate = to_u64(estimate, "gas estimate")?;

        let tx = LegacyTransaction {
            nonce: to_u64(nonce, "nonce")?,
            gas_price,
            gas_limit: estimate.saturating_add(estimate * GAS_HEADROOM_PERCENT / 100),
            to: self.config.contract,
            value: 0,
            data,
            chain_id,
        };
        let raw = tx.sign(&self.key)?;
        let hash: String = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        tracing::debug!(tx_hash = %hash, nonce = tx.nonce, "submitted ledger transaction");
        Ok(hash)
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.chain_id
            .get_or_try_init(|| async {
                let id = self.quantity("eth_chainId", json!([])).await?;
                to_u64(id, "chain id")
            })
            .await
            .copied()
    }

    async fn nonce_of(&self, address: &Address) -> Result<u64, LedgerError> {
        contract::decode_u64(&self.view(contract::nonce_of(address)).await?)
    }

    async fn is_available(&self, id: &RequestId) -> Result<bool, LedgerError> {
        contract::decode_bool(&self.view(contract::is_available(id)).await?)
    }

    async fn get_validators(&self) -> Result<Vec<ValidatorEntry>, LedgerError> {
        contract::decode_validators(&self.view(contract::get_validators()).await?)
    }

    async fn add_request(
        &self,
        id: &RequestId,
        phone_hash: &[u8; 32],
        address: &Address,
        signature: &RecoverableSignature,
    ) -> Result<(), LedgerError> {
        self.send(contract::add_request(id, phone_hash, address, signature))
            .await
            .map(drop)
    }

    async fn vote_request(&self, id: &RequestId) -> Result<(), LedgerError> {
        self.send(contract::vote_request(id)).await.map(drop)
    }

    async fn count_vote(&self, id: &RequestId) -> Result<(), LedgerError> {
        self.send(contract::count_vote(id)).await.map(drop)
    }

    async fn can_count_vote(&self, id: &RequestId) -> Result<VoteCountStatus, LedgerError> {
        contract::decode_vote_count_status(&self.view(contract::can_count_vote(id)).await?)
    }

    async fn update_endpoint(&self, endpoint: &str) -> Result<(), LedgerError> {
        self.send(contract::update_endpoint(endpoint)).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::encode_validators;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use phonelink_crypto::abi::{encode, selector, Token};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockChain {
        raw_transactions: std::sync::Mutex<Vec<String>>,
    }

    fn result(id: &Value, result: Value) -> Json<Value> {
        Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    fn hex_data(data: Vec<u8>) -> Value {
        Value::String(format!("0x{}", hex::encode(data)))
    }

    async fn handle(State(chain): State<Arc<MockChain>>, Json(body): Json<Value>) -> Json<Value> {
        let id = body["id"].clone();
        let params = &body["params"];
        match body["method"].as_str().unwrap_or_default() {
            "eth_chainId" => result(&id, json!("0x7a69")),
            "eth_getTransactionCount" => result(&id, json!("0x3")),
            "eth_gasPrice" => result(&id, json!("0x3b9aca00")),
            "eth_estimateGas" => result(&id, json!("0x5208")),
            "eth_sendRawTransaction" => {
                let raw = params[0].as_str().unwrap_or_default().to_string();
                chain.raw_transactions.lock().unwrap().push(raw);
                result(&id, json!(format!("0x{}", "ab".repeat(32))))
            }
            "eth_call" => {
                let data = parse_data(params[0]["data"].as_str().unwrap_or_default()).unwrap();
                let sel = &data[..4];
                if sel == selector(contract::NONCE_OF) {
                    result(&id, hex_data(encode(&[Token::Uint(5)])))
                } else if sel == selector(contract::IS_AVAILABLE) {
                    result(&id, hex_data(encode(&[Token::Bool(true)])))
                } else if sel == selector(contract::CAN_COUNT_VOTE) {
                    result(&id, hex_data(encode(&[Token::Uint(1)])))
                } else if sel == selector(contract::GET_VALIDATORS) {
                    let entries = vec![ValidatorEntry {
                        validator: Address::new([1; 20]),
                        index: 0,
                        endpoint: "http://127.0.0.1:7080".into(),
                        status: 1,
                    }];
                    result(&id, hex_data(encode_validators(&entries)))
                } else {
                    Json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": { "code": -32000, "message": "execution reverted" }
                    }))
                }
            }
            _ => Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "method not found" }
            })),
        }
    }

    async fn spawn_mock() -> (String, Arc<MockChain>) {
        let chain = Arc::new(MockChain::default());
        let app = Router::new()
            .route("/", post(handle))
            .with_state(Arc::clone(&chain));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), chain)
    }

    fn ledger(url: String) -> RpcLedger {
        RpcLedger::new(
            RpcLedgerConfig::new(url, Address::new([0xcc; 20])),
            ValidatorKey::random(),
        )
    }

    #[tokio::test]
    async fn views_decode_contract_results() {
        let (url, _chain) = spawn_mock().await;
        let ledger = ledger(url);
        assert_eq!(ledger.chain_id().await.unwrap(), 31337);
        assert_eq!(ledger.nonce_of(&Address::ZERO).await.unwrap(), 5);
        assert!(ledger.is_available(&RequestId::ZERO).await.unwrap());
        assert_eq!(
            ledger.can_count_vote(&RequestId::ZERO).await.unwrap(),
            VoteCountStatus::Possible
        );
        let validators = ledger.get_validators().await.unwrap();
        assert_eq!(validators.len(), 1);
        assert_eq!(validators[0].endpoint, "http://127.0.0.1:7080");
    }

    #[tokio::test]
    async fn writes_are_signed_raw_transactions() {
        let (url, chain) = spawn_mock().await;
        let ledger = ledger(url);
        ledger.vote_request(&RequestId::new([4; 32])).await.unwrap();
        ledger.update_endpoint("http://127.0.0.1:7081").await.unwrap();

        let raws = chain.raw_transactions.lock().unwrap().clone();
        assert_eq!(raws.len(), 2);
        assert!(raws.iter().all(|r| r.starts_with("0xf8")));
    }

    #[tokio::test]
    async fn configured_chain_id_skips_query() {
        let mut config = RpcLedgerConfig::new("http://127.0.0.1:1", Address::ZERO);
        config.chain_id = Some(7);
        let ledger = RpcLedger::new(config, ValidatorKey::random());
        assert_eq!(ledger.chain_id().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn unreachable_ledger_is_an_error() {
        let mut config = RpcLedgerConfig::new("http://127.0.0.1:1", Address::ZERO);
        config.timeout = Duration::from_millis(500);
        let ledger = RpcLedger::new(config, ValidatorKey::random());
        let err = ledger.nonce_of(&Address::ZERO).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Unreachable(_) | LedgerError::RequestFailed(_)
        ));
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x7a69").unwrap(), 31337);
        assert!(parse_quantity("7a69").is_err());
    }
}
