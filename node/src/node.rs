//! Wiring of one validator: storage, ledger, HTTP API and driver loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use phonelink_crypto::ValidatorKey;
use phonelink_ledger::{Ledger, RpcLedger, RpcLedgerConfig};
use phonelink_rpc::{RpcServer, ValidatorApi};
use phonelink_store::RecordStore;
use phonelink_store_lmdb::environment::MAX_DBS;
use phonelink_store_lmdb::LmdbEnvironment;
use phonelink_types::{Address, Clock, SystemClock};

use crate::config::NodeConfig;
use crate::engine::{EngineContext, ValidatorEngine};
use crate::metrics::NodeMetrics;
use crate::shutdown::ShutdownController;
use crate::sms::SmsSender;
use crate::worker::Worker;
use crate::NodeError;

/// The external services a node runs against.
pub struct NodeParts {
    pub key: ValidatorKey,
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
}

/// A phone-link validator node.
///
/// [`bind`](Self::bind) claims the listening socket so the advertised
/// endpoint is known before anything runs; [`start`](Self::start) launches
/// the HTTP API and the driver loop; [`stop`](Self::stop) shuts them down in
/// that order.
pub struct ValidatorNode {
    config: NodeConfig,
    engine: Arc<ValidatorEngine>,
    worker: Worker,
    shutdown: ShutdownController,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    server: Option<JoinHandle<()>>,
}

impl ValidatorNode {
    /// Open LMDB storage and the JSON-RPC ledger described by `config`, then bind.
    pub async fn bind(config: NodeConfig) -> Result<Self, NodeError> {
        let key = ValidatorKey::from_hex(&config.validator.key)
            .map_err(|e| NodeError::Config(format!("invalid validator key: {e}")))?;
        let contract: Address = config
            .ledger
            .contract_address
            .parse()
            .map_err(|e| NodeError::Config(format!("invalid contract address: {e}")))?;

        let env = LmdbEnvironment::open(
            &config.database.path,
            MAX_DBS,
            config.database.map_size_mb * 1024 * 1024,
        )?;
        let store: Arc<dyn RecordStore> = Arc::new(env.record_store());

        let mut ledger_config = RpcLedgerConfig::new(config.ledger.rpc_url.clone(), contract);
        ledger_config.chain_id = config.ledger.chain_id;
        ledger_config.timeout = Duration::from_millis(config.ledger.timeout_ms);
        let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(ledger_config, key.clone()));

        let parts = NodeParts {
            key,
            ledger,
            store,
            clock: Arc::new(SystemClock),
        };
        Self::bind_with(config, parts).await
    }

    /// Bind a node over explicitly supplied services.
    pub async fn bind_with(config: NodeConfig, parts: NodeParts) -> Result<Self, NodeError> {
        if config.node.delay_loading_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.node.delay_loading_ms)).await;
        }

        let listener = TcpListener::bind((config.node.host.as_str(), config.node.port)).await?;
        let local_addr = listener.local_addr()?;
        let endpoint = config.node.endpoint(local_addr.port());

        let mode = config.validator.authentication_mode;
        let sms = if mode.sends_sms() {
            SmsSender::live(&config.sms, config.timing.request_timeout())
        } else {
            SmsSender::NoOp
        };

        let metrics = Arc::new(NodeMetrics::new());
        let engine = Arc::new(ValidatorEngine::new(EngineContext {
            key: parts.key,
            mode,
            timing: config.timing.clone(),
            endpoint,
            ledger: parts.ledger,
            store: parts.store,
            sms,
            clock: parts.clock,
            metrics: Arc::clone(&metrics),
        }));
        let worker = Worker::new(config.timing.tick_interval(), metrics);

        Ok(Self {
            config,
            engine,
            worker,
            shutdown: ShutdownController::new(),
            listener: Some(listener),
            local_addr,
            server: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The endpoint this node publishes on the ledger.
    pub fn endpoint(&self) -> String {
        self.engine.node_info().endpoint
    }

    pub fn engine(&self) -> &Arc<ValidatorEngine> {
        &self.engine
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Serve the HTTP API and start the driver loop.
    pub fn start(&mut self) -> Result<(), NodeError> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| NodeError::Other("node already started".into()))?;

        let server = RpcServer::new(Arc::clone(&self.engine) as Arc<dyn ValidatorApi>);
        let stopped = self.shutdown.signalled();
        self.server = Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, stopped).await {
                tracing::error!("HTTP server error: {e}");
            }
        }));

        self.worker.start(Arc::clone(&self.engine) as _);
        tracing::info!(
            node_id = %self.engine.address(),
            endpoint = %self.endpoint(),
            mode = %self.config.validator.authentication_mode,
            "validator node started"
        );
        Ok(())
    }

    /// Run until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(&mut self) -> Result<(), NodeError> {
        self.start()?;
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    /// Stop accepting requests, let the current tick finish, then return.
    ///
    /// Storage is released when the node is dropped, after both the server
    /// and the driver loop are gone.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("validator node stopping");
        let timeout = self.config.timing.stop_timeout();

        self.shutdown.shutdown();
        if let Some(server) = self.server.take() {
            if tokio::time::timeout(timeout, server).await.is_err() {
                tracing::warn!("HTTP server did not drain in time");
            }
        }

        self.worker.stop();
        if !self.worker.wait_for_stop(timeout).await {
            return Err(NodeError::ShutdownTimeout);
        }

        tracing::info!("validator node stopped");
        Ok(())
    }
}
