use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::client::{NodeConnector, NodeRpc, WalletUnlocker};
use crate::gateway::process::{NodeOptions, NodeProcessHandle};
use crate::gateway::{RpcGateway, DEFAULT_DEADLINE};
use crate::notify::Notifier;
use crate::prettify::Denomination;

/// A connector for gateways whose node never comes up, clients are attached directly instead
pub struct NoConnector;

#[async_trait]
impl NodeConnector for NoConnector {
    async fn unlocker(&self, _: &NodeProcessHandle) -> anyhow::Result<Box<dyn WalletUnlocker>> {
        Err(anyhow::anyhow!("no node"))
    }

    async fn authenticated(
        &self,
        _: &NodeProcessHandle,
        _: &[u8],
    ) -> anyhow::Result<Box<dyn NodeRpc>> {
        Err(anyhow::anyhow!("no node"))
    }
}

/// Options pointing at a node binary that does not exist under `dir`
pub fn test_node_options(dir: &Path) -> NodeOptions {
    NodeOptions {
        binary: dir.join("missing-lnd"),
        datadir: dir.to_path_buf(),
        network: "regtest".to_string(),
        rpc_port: 0,
        peer_port: 0,
        rest_port: 0,
        extra_args: vec![],
        clear_data_on_stop: false,
    }
}

pub fn test_gateway(dir: &Path, notifier: Notifier) -> RpcGateway {
    RpcGateway::new(
        test_node_options(dir),
        DEFAULT_DEADLINE,
        Denomination::Sat,
        Arc::new(NoConnector),
        notifier,
    )
}
