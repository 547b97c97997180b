use clap::{error::ErrorKind, Parser};
use std::ffi::OsStr;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process::exit;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use std::{env, fs};
use toml::value::{Table, Value};
use url::Url;

pub use lnstream_util::config::{
    default_datadir, DEFAULT_DIR, NETWORK_NAMES, NODE_PEER_PORT, NODE_REST_PORT, NODE_RPC_PORT,
    RPC_SERVER_ENDPOINT, RPC_SERVER_PORT,
};

use crate::gateway::process::NodeOptions;
use crate::prettify::Denomination;
use crate::stream::EngineSettings;

pub const RPC_SERVER_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_RELAY_URL: &str = "wss://relay.lnstream.net/ws";

// only used for usage display
#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
pub struct InitialArgs {
    #[clap(
        short = 'f',
        long,
        value_parser,
        help = "configuration file - MUST be the first argument",
        value_name = "FILE"
    )]
    config: Option<String>,
}

#[derive(Parser, Debug)]
#[clap(about, long_about = None, args_override_self = true)]
pub struct DaemonArgs {
    #[clap(flatten)]
    initial_args: InitialArgs,

    #[clap(long, help = "print git desc version and exit")]
    pub git_desc: bool,

    #[clap(
        long,
        help = "set the logging level",
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"],
    )]
    pub log_level: String,

    #[clap(short, long, value_parser, help = "data directory", value_name = "DIR")]
    pub datadir: Option<PathBuf>,

    #[clap(
        short,
        long,
        value_name = "NETWORK",
        default_value = NETWORK_NAMES[0],
        value_parser = NETWORK_NAMES,
    )]
    pub network: String,

    #[clap(long, help = "path of the payment node binary", value_name = "PATH", value_parser)]
    pub node_binary: PathBuf,

    #[clap(long, help = "node instance name", default_value = "default", value_parser)]
    pub instance: String,

    #[clap(long, default_value_t = NODE_RPC_PORT, value_parser)]
    pub node_rpc_port: u16,

    #[clap(long, default_value_t = NODE_PEER_PORT, value_parser)]
    pub node_peer_port: u16,

    #[clap(long, default_value_t = NODE_REST_PORT, value_parser)]
    pub node_rest_port: u16,

    #[clap(long, help = "extra argument passed to the node, may be repeated", value_parser)]
    pub node_arg: Vec<String>,

    #[clap(long, help = "remove the node's data directory when it is stopped")]
    pub clear_data_on_stop: bool,

    #[clap(long, help = "file holding the wallet password", value_name = "FILE", value_parser)]
    pub wallet_password_file: Option<PathBuf>,

    #[clap(long, help = "create a new wallet with a fresh seed instead of unlocking")]
    pub create_wallet: bool,

    #[clap(long, help = "invoice relay endpoint", default_value = DEFAULT_RELAY_URL, value_parser)]
    pub relay_url: Url,

    #[clap(long, help = "unit for amounts in messages", default_value = "sat", value_parser)]
    pub denomination: Denomination,

    #[clap(
        long,
        help = "rpc server's bind address",
        default_value_t = RPC_SERVER_ADDRESS,
        value_parser
    )]
    pub rpc_server_address: IpAddr,

    #[clap(
        long,
        help = "rpc server's port",
        default_value_t = RPC_SERVER_PORT,
        value_parser
    )]
    pub rpc_server_port: u16,

    #[clap(long, help = "rpc server admin username", value_parser)]
    pub rpc_user: Option<String>,

    #[clap(long, help = "rpc server admin password", value_parser)]
    pub rpc_pass: Option<String>,

    #[clap(long, help = "rpc server admin cookie file path", value_parser)]
    pub rpc_cookie: Option<PathBuf>,

    #[clap(
        long,
        help = "delay before a started stream pays its first part",
        default_value_t = 1000
    )]
    pub warmup_ms: u64,

    #[clap(long, help = "seconds a stream payment may stay unresolved", default_value_t = 10)]
    pub error_timeout_secs: u64,

    #[clap(long, help = "default deadline of node calls", default_value_t = 30)]
    pub rpc_deadline_secs: u64,
}

impl DaemonArgs {
    pub fn datadir(&self) -> PathBuf {
        self.datadir.clone().unwrap_or_else(default_datadir)
    }

    pub fn node_options(&self) -> NodeOptions {
        NodeOptions {
            binary: self.node_binary.clone(),
            datadir: self.datadir().join("node"),
            network: self.network.clone(),
            rpc_port: self.node_rpc_port,
            peer_port: self.node_peer_port,
            rest_port: self.node_rest_port,
            extra_args: self.node_arg.clone(),
            clear_data_on_stop: self.clear_data_on_stop,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            warmup: Duration::from_millis(self.warmup_ms),
            error_timeout: Duration::from_secs(self.error_timeout_secs),
        }
    }

    pub fn rpc_deadline(&self) -> Duration {
        Duration::from_secs(self.rpc_deadline_secs)
    }
}

pub fn parse_args_and_config(bin_name: &str) -> DaemonArgs {
    let env_args = env::args().collect::<Vec<_>>();
    parse_args_and_config_from(bin_name, &env_args).unwrap_or_else(|e| match e.kind() {
        ErrorKind::DisplayVersion => exit(0), // exit directly because no Command
        _ => e.exit(),
    })
}

#[derive(Clone)]
struct ConfigIterator {
    args_stack: Arc<Mutex<Vec<Vec<String>>>>,
    // first config file that could not be read
    error: Arc<Mutex<Option<String>>>,
}

impl ConfigIterator {
    fn new(args: &[String]) -> Self {
        ConfigIterator {
            args_stack: Arc::new(Mutex::new(vec![args.to_vec()])),
            error: Arc::new(Mutex::new(None)),
        }
    }

    fn do_next(args_stack: &mut MutexGuard<Vec<Vec<String>>>) -> Option<String> {
        loop {
            if args_stack.is_empty() {
                return None;
            }
            let args = &mut args_stack[0];
            if !args.is_empty() {
                let arg = args.remove(0);
                return Some(arg);
            }
            args_stack.remove(0);
        }
    }

    fn expand(&self, args_stack: &mut MutexGuard<Vec<Vec<String>>>, path: &str) -> Option<String> {
        match toml_to_configs(path.as_ref()) {
            Ok(configs) => args_stack.insert(0, configs),
            Err(e) => {
                let mut error = self.error.lock().unwrap_or_else(|e| e.into_inner());
                error.get_or_insert_with(|| format!("config file {}: {}", path, e));
            }
        }
        Self::do_next(args_stack)
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Iterator for ConfigIterator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let stack = Arc::clone(&self.args_stack);
        let mut args_stack = stack.lock().unwrap_or_else(|e| e.into_inner());
        let arg = Self::do_next(&mut args_stack)?;
        if let Some(path) = arg.strip_prefix("--config=") {
            let path = path.to_string();
            return self.expand(&mut args_stack, &path);
        } else if arg == "--config" || arg == "-f" {
            match Self::do_next(&mut args_stack) {
                Some(path) => return self.expand(&mut args_stack, &path),
                None => {
                    // let clap report the missing value
                    return Some(arg);
                }
            }
        }
        Some(arg)
    }
}

pub fn parse_args_and_config_from(
    bin_name: &str,
    env_args: &[String],
) -> Result<DaemonArgs, clap::Error> {
    let args_iter = ConfigIterator::new(env_args);
    let parsed = DaemonArgs::try_parse_from(args_iter.clone());
    if let Some(e) = args_iter.take_error() {
        return Err(clap::Error::raw(ErrorKind::Io, format!("{}\n", e)));
    }
    let args = parsed?;

    // short-circuit if we're just printing the git desc
    if args.git_desc {
        println!("{} git_desc={}", bin_name, lnstream_util::GIT_DESC);
        // Don't exit here because this is called by unit tests
        return Err(clap::Error::raw(ErrorKind::DisplayVersion, ""));
    }

    Ok(args)
}

fn toml_to_configs(path: &OsStr) -> Result<Vec<String>, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    let config: Table = toml::from_str(contents.as_str()).map_err(|e| e.to_string())?;
    let configs = config
        .into_iter()
        .flat_map(|(k, value)| convert_toml_value(k, value).into_iter())
        .map(|(k, v)| format!("--{}={}", k, v))
        .collect();
    Ok(configs)
}

fn convert_toml_value(key: String, value: Value) -> Vec<(String, String)> {
    match value {
        Value::String(s) => vec![(key, s)],
        Value::Integer(v) => vec![(key, v.to_string())],
        Value::Float(v) => vec![(key, v.to_string())],
        Value::Boolean(v) => vec![(key, v.to_string())],
        Value::Datetime(v) => vec![(key, v.to_string())],
        Value::Array(a) =>
            a.into_iter().flat_map(|v| convert_toml_value(key.clone(), v)).collect::<Vec<_>>(),
        Value::Table(_) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn git_desc_test() {
        let env_args = args(&["lnstreamd", "--node-binary=/usr/bin/lnd", "--git-desc"]);
        let args_res = parse_args_and_config_from("", &env_args);
        assert_eq!(args_res.unwrap_err().kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn clap_test() {
        let env_args = args(&["lnstreamd", "--node-binary", "/usr/bin/lnd"]);
        let args = parse_args_and_config_from("", &env_args).unwrap();
        assert_eq!(args.network, "testnet");
        assert_eq!(args.instance, "default");
        assert_eq!(args.node_rpc_port, NODE_RPC_PORT);
        assert_eq!(args.denomination, Denomination::Sat);
        assert_eq!(args.engine_settings(), EngineSettings::default());
        assert_eq!(args.rpc_deadline(), Duration::from_secs(30));
        assert!(args.datadir().ends_with(DEFAULT_DIR));

        let env_args = args_full();
        let args = parse_args_and_config_from("", &env_args).unwrap();
        assert_eq!(args.datadir(), PathBuf::from("/tmp/lnstream"));
        assert_eq!(args.network, "regtest");
        assert_eq!(args.node_arg, vec!["--debuglevel=debug", "--norest"]);
        assert_eq!(args.denomination, Denomination::MBtc);
        assert_eq!(args.rpc_server_port, 9021);
        let options = args.node_options();
        assert_eq!(options.datadir, PathBuf::from("/tmp/lnstream/node"));
        assert_eq!(options.rpc_port, 10010);
        assert!(options.clear_data_on_stop);
    }

    fn args_full() -> Vec<String> {
        args(&[
            "lnstreamd",
            "--datadir=/tmp/lnstream",
            "--network=regtest",
            "--node-binary=/usr/bin/lnd",
            "--node-rpc-port=10010",
            "--node-arg=--debuglevel=debug",
            "--node-arg=--norest",
            "--clear-data-on-stop",
            "--denomination=mBTC",
            "--rpc-server-port",
            "9021",
        ])
    }

    #[test]
    fn bad_network_test() {
        let env_args = args(&["lnstreamd", "--node-binary=/usr/bin/lnd", "--network=bitcoin"]);
        assert!(parse_args_and_config_from("", &env_args).is_err());
    }

    #[test]
    fn clap_with_config_file_test() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "datadir = \"/tmp/lnstream\"\n
            node-binary = \"/opt/lnd\"\n
            node-arg = [\"--a\", \"--b\"]\n
            network = \"regtest\"\n"
        )
        .unwrap();
        let env_args =
            args(&["lnstreamd", "--config", file.path().to_str().unwrap(), "--network=mainnet"]);
        let args = parse_args_and_config_from("", &env_args).unwrap();
        assert_eq!(args.datadir(), PathBuf::from("/tmp/lnstream"));
        assert_eq!(args.node_binary, PathBuf::from("/opt/lnd"));
        assert_eq!(args.node_arg, vec!["--a", "--b"]);
        // later arguments override the config file
        assert_eq!(args.network, "mainnet");
    }

    #[test]
    fn missing_config_file_test() {
        let env_args = args(&["lnstreamd", "--config=/nonexistent/lnstreamd.toml"]);
        let err = parse_args_and_config_from("", &env_args).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
