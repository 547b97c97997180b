use std::path::PathBuf;

/// Network names understood by the payment node
pub const NETWORK_NAMES: [&'static str; 4] = ["testnet", "mainnet", "regtest", "simnet"];

pub const DEFAULT_DIR: &str = ".lnstream";

/// Control API defaults
pub const RPC_SERVER_PORT: u16 = 8021;
pub const RPC_SERVER_ENDPOINT: &'static str = "http://127.0.0.1:8021";

/// Default listening ports of the supervised node
pub const NODE_RPC_PORT: u16 = 10009;
pub const NODE_PEER_PORT: u16 = 9735;
pub const NODE_REST_PORT: u16 = 8080;

/// The data directory used when none is configured, `~/.lnstream`
pub fn default_datadir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DEFAULT_DIR)
}
