//! Phone-link daemon: entry point for running a validator node.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use phonelink_node::{init_logging, LogFormat, NodeConfig, ValidatorNode};
use phonelink_types::AuthenticationMode;

#[derive(Parser)]
#[command(name = "phonelink-daemon", about = "Phone-link verification validator daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hex-encoded secp256k1 secret key of this validator.
    #[arg(long, env = "VALIDATOR_KEY", hide_env_values = true)]
    validator_key: Option<String>,

    /// Address of the phone-link registry contract.
    #[arg(long, env = "PHONE_LINKER_CONTRACT_ADDRESS")]
    contract_address: Option<String>,

    /// Ethereum JSON-RPC endpoint.
    #[arg(long, env = "PHONELINK_RPC_URL")]
    rpc_url: Option<String>,

    /// SMS gateway endpoint.
    #[arg(long, env = "SMS_ENDPOINT")]
    sms_endpoint: Option<String>,

    /// SMS gateway access key.
    #[arg(long, env = "SMS_ACCESSKEY", hide_env_values = true)]
    sms_access_key: Option<String>,

    /// Authentication mode: "no_sms_no_code", "no_sms_known_code",
    /// "yes_sms_known_code" or "yes_sms_unknown_code".
    #[arg(long, env = "PHONELINK_AUTH_MODE")]
    mode: Option<AuthenticationMode>,

    /// Interface the HTTP API binds to.
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port the HTTP API binds to.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Host advertised to peers, when different from the bound one.
    #[arg(long, env = "EXTERNAL")]
    external: Option<String>,

    /// Data directory for the record store.
    #[arg(long, env = "PHONELINK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "PHONELINK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "PHONELINK_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Node operations.
    #[command(name = "node")]
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Print the effective configuration as TOML and exit.
    #[command(name = "config")]
    Config,
}

#[derive(clap::Subcommand)]
enum NodeAction {
    /// Run the node until SIGINT/SIGTERM.
    Run,
}

impl Cli {
    /// Lay flags and env vars over the file configuration.
    fn overlay(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(key) = self.validator_key {
            config.validator.key = key;
        }
        if let Some(mode) = self.mode {
            config.validator.authentication_mode = mode;
        }
        if let Some(contract) = self.contract_address {
            config.ledger.contract_address = contract;
        }
        if let Some(url) = self.rpc_url {
            config.ledger.rpc_url = url;
        }
        if let Some(endpoint) = self.sms_endpoint {
            config.sms.endpoint = endpoint;
        }
        if let Some(key) = self.sms_access_key {
            config.sms.access_key = key;
        }
        if let Some(host) = self.host {
            config.node.host = host;
        }
        if let Some(port) = self.port {
            config.node.port = port;
        }
        if let Some(external) = self.external {
            config.node.external = external;
        }
        if let Some(dir) = self.data_dir {
            config.database.path = dir;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let base = match cli.config.take() {
        Some(path) => NodeConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    let command = std::mem::replace(&mut cli.command, Command::Config);
    let config = cli.overlay(base);

    let format: LogFormat = config.logging.format.parse()?;
    init_logging(format, &config.logging.level);

    match command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Node { action } => match action {
            NodeAction::Run => {
                tracing::info!(
                    host = %config.node.host,
                    port = config.node.port,
                    mode = %config.validator.authentication_mode,
                    rpc_url = %config.ledger.rpc_url,
                    "starting phone-link validator"
                );

                let mut node = ValidatorNode::bind(config)
                    .await
                    .context("failed to start the validator node")?;
                node.run_until_signal().await?;

                tracing::info!("phone-link daemon exited cleanly");
            }
        },
    }

    Ok(())
}
