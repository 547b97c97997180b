use std::fs;
use std::process::exit;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::task::JoinHandle;
use tracing::*;

use lnstream_util::observability::{init_tracing_subscriber, parse_level};
use lnstreamd::config::{parse_args_and_config, DaemonArgs};
use lnstreamd::gateway::client::LndConnector;
use lnstreamd::gateway::RpcGateway;
use lnstreamd::notify::Notifier;
use lnstreamd::persist::{JsonStreamStore, StreamPersister, StreamStore};
use lnstreamd::relay::transport::WebSocketConnector;
use lnstreamd::relay::RelayClient;
use lnstreamd::rpc_server::{start_rpc_server, RpcServer};
use lnstreamd::stream::StreamEngine;
use lnstreamd::util::{abort_on_panic, get_rpc_credentials, read_secret_file, wallet_password};
use lnstreamd::GIT_DESC;

fn main() {
    abort_on_panic();
    let bin_name = "lnstreamd";
    let args = parse_args_and_config(bin_name);

    let datadir = args.datadir();
    if let Err(e) = fs::create_dir_all(&datadir) {
        eprintln!("cannot create {}: {}", datadir.display(), e);
        exit(1);
    }
    let _log_guard = match init_tracing_subscriber(&datadir, bin_name, parse_level(&args.log_level))
    {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("cannot initialize logging: {}", e);
            exit(1);
        }
    };
    info!("{} git_desc={} starting on {}", bin_name, GIT_DESC, args.network);

    if let Err(e) = run(args) {
        error!("{:#}", e);
        exit(1);
    }
    info!("{} stopped", bin_name);
}

#[tokio::main(worker_threads = 2)]
async fn run(args: DaemonArgs) -> anyhow::Result<()> {
    let (shutdown_trigger, shutdown_signal) = triggered::trigger();
    ctrlc::set_handler(move || {
        shutdown_trigger.trigger();
    })
    .context("setting Ctrl-C handler")?;

    let notifier = Notifier::new();
    let gateway = Arc::new(RpcGateway::new(
        args.node_options(),
        args.rpc_deadline(),
        args.denomination,
        Arc::new(LndConnector::new(args.rpc_deadline())),
        notifier.clone(),
    ));

    let result = serve(&args, &gateway, &notifier, shutdown_signal).await;
    if let Err(e) = gateway.stop().await {
        warn!("stopping node: {}", e);
    }
    result
}

async fn serve(
    args: &DaemonArgs,
    gateway: &Arc<RpcGateway>,
    notifier: &Notifier,
    shutdown_signal: triggered::Listener,
) -> anyhow::Result<()> {
    gateway.start(&args.instance).await?;
    let password = match &args.wallet_password_file {
        Some(path) => read_secret_file(path)
            .with_context(|| format!("reading wallet password from {}", path.display()))?,
        None => wallet_password().ok_or_else(|| {
            anyhow!("no --wallet-password-file given and LNSTREAM_WALLET_PASSWORD is unset")
        })?,
    };
    let seed = if args.create_wallet {
        let mnemonic = gateway.generate_seed().await?;
        eprintln!("new wallet seed: {}", mnemonic.join(" "));
        Some(mnemonic)
    } else {
        None
    };
    let node = gateway.unlock_or_create_wallet(&password, seed, None).await?;
    info!("wallet unlocked, node {}", node.identity_pubkey);

    let relay = Arc::new(RelayClient::new(
        Arc::clone(gateway),
        Arc::new(WebSocketConnector::new(args.relay_url.clone())),
        notifier.clone(),
    ));
    relay.open_connection();

    let store: Arc<dyn StreamStore> = Arc::new(JsonStreamStore::new(args.datadir()));
    let (persister_stop, persister_stop_signal) = triggered::trigger();
    let persister = StreamPersister::spawn(Arc::clone(&store), notifier, persister_stop_signal);

    let engine = Arc::new(StreamEngine::new(
        relay.clone(),
        gateway.clone(),
        notifier.clone(),
        args.engine_settings(),
    ));
    engine.restore(store.as_ref()).await?;

    let context = RpcServer::new(
        Arc::clone(gateway),
        Arc::clone(&engine),
        Arc::clone(&relay),
        Arc::clone(&store),
    );
    let rpc_server = start_rpc_server_with_auth(context, args, shutdown_signal.clone()).await?;

    shutdown_signal.await;
    info!("shutting down");

    engine.shutdown().await;
    relay.close_connection().await;
    if let Some(handle) = rpc_server {
        if let Err(e) = handle.await {
            warn!("rpc server task: {}", e);
        }
    }
    // after the engine, so the last progress of every stream is written
    persister_stop.trigger();
    if let Err(e) = persister.await {
        warn!("persister task: {}", e);
    }
    Ok(())
}

async fn start_rpc_server_with_auth(
    context: RpcServer,
    args: &DaemonArgs,
    shutdown_signal: triggered::Listener,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    let (username, password) = match get_rpc_credentials(
        args.rpc_user.clone(),
        args.rpc_pass.clone(),
        args.rpc_cookie.clone(),
    ) {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!("rpc server not started as no password provided: {}", e);
            return Ok(None);
        }
    };

    let (addr, join_rpc_server) = start_rpc_server(
        context,
        args.rpc_server_address,
        args.rpc_server_port,
        username.as_str(),
        password.as_str(),
        shutdown_signal,
    )
    .await?;
    info!("rpc server running on {}", addr);
    Ok(Some(join_rpc_server))
}
