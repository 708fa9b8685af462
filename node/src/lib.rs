//! Phone-link validator node.
//!
//! The node is the central coordinator that:
//! - Accepts verification requests and code submissions over HTTP
//! - Registers requests on the ledger and relays them to peer validators
//! - Issues one challenge fragment per validator and delivers it by SMS
//! - Votes on the ledger once the user proves possession of the phone
//! - Keeps its view of the validator set in step with the ledger

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;
pub mod sms;
pub mod tracing_spans;
pub mod worker;

pub use config::NodeConfig;
pub use engine::{EngineContext, ValidatorEngine};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{NodeParts, ValidatorNode};
pub use shutdown::ShutdownController;
pub use sms::SmsSender;
pub use worker::{PeriodicTask, Worker, WorkerState};
