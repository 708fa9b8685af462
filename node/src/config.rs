//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use phonelink_types::AuthenticationMode;

use crate::NodeError;

/// Configuration for a validator node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). Every field has a default, so an empty
/// file is a valid configuration apart from the validator key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

/// The HTTP listener and how this node advertises itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// `0` binds an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host advertised to other validators instead of `host`.
    #[serde(default)]
    pub external: String,
    /// Pause before the node starts, in milliseconds.
    #[serde(default)]
    pub delay_loading_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// "trace", "debug", "info", "warn" or "error", or a full filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "human" or "json".
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Hex secret of the validator account.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub authentication_mode: AuthenticationMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Address of the phone-link registry contract.
    #[serde(default)]
    pub contract_address: String,
    /// Queried from the ledger when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_ledger_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
}

/// Intervals and durations of the verification workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Driver-loop period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Grace window after start during which the driver loop does nothing.
    #[serde(default = "default_init_waiting_secs")]
    pub init_waiting_secs: u64,
    /// Period of peer reconciliation, health checks and the expiry sweep.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Lifetime of an issued challenge.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,
    /// Delay before a record auto-advances in `no_sms_no_code` mode.
    #[serde(default = "default_no_code_delay_ms")]
    pub no_code_delay_ms: u64,
    /// Bounded wait for the driver loop to stop.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Timeout of calls to other validators and the SMS gateway.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_protocol() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./db/validation")
}

fn default_map_size_mb() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_ledger_timeout_ms() -> u64 {
    10_000
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_init_waiting_secs() -> u64 {
    2
}

fn default_reconcile_interval_secs() -> u64 {
    12
}

fn default_code_ttl_secs() -> u64 {
    300
}

fn default_no_code_delay_ms() -> u64 {
    3_000
}

fn default_stop_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(format!("{path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}

impl ServerConfig {
    /// The host other validators should use to reach this node.
    pub fn advertised_host(&self) -> &str {
        if !self.external.is_empty() {
            &self.external
        } else if self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            &self.host
        }
    }

    /// The endpoint published on the ledger, given the actually bound port.
    pub fn endpoint(&self, bound_port: u16) -> String {
        format!("{}://{}:{bound_port}", self.protocol, self.advertised_host())
    }
}

impl TimingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn no_code_delay(&self) -> Duration {
        Duration::from_millis(self.no_code_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: default_host(),
            port: default_port(),
            external: String::new(),
            delay_loading_ms: 0,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            map_size_mb: default_map_size_mb(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: String::new(),
            chain_id: None,
            timeout_ms: default_ledger_timeout_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            init_waiting_secs: default_init_waiting_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            code_ttl_secs: default_code_ttl_secs(),
            no_code_delay_ms: default_no_code_delay_ms(),
            stop_timeout_secs: default_stop_timeout_secs(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
