#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tonic::Status;

use lnstreamd::gateway::client::{NodeConnector, NodeRpc, PaymentStream, WalletUnlocker};
use lnstreamd::gateway::model::{AddedInvoice, DecodedInvoice, InvoiceSpec, NodeInfo, PaymentUpdate};
use lnstreamd::gateway::process::{self, NodeProcessHandle, StartError};
use lnstreamd::gateway::{GatewayError, NodeState, RpcGateway, DEFAULT_DEADLINE};
use lnstreamd::notify::{Event, Notifier};
use lnstreamd::prettify::Denomination;
use lnstreamd::util::testing::test_node_options;

const MACAROON: &[u8] = b"admin macaroon";

/// Records its pid, writes the TLS certificate it is pointed at, then idles until signalled
const FAKE_NODE: &str = r#"#!/bin/sh
echo $$ >> "$(dirname "$0")/spawned"
for arg in "$@"; do
  case "$arg" in
    --tlscertpath=*) echo cert > "${arg#--tlscertpath=}" ;;
  esac
done
exec sleep 600
"#;

fn install_fake_node(dir: &Path) -> PathBuf {
    let path = dir.join("fake-lnd");
    fs::write(&path, FAKE_NODE).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Unlocker {
    macaroon_path: PathBuf,
}

impl Unlocker {
    fn write_macaroon(&self) -> Result<(), Status> {
        let parent = self.macaroon_path.parent().unwrap();
        fs::create_dir_all(parent)
            .and_then(|_| fs::write(&self.macaroon_path, MACAROON))
            .map_err(|e| Status::internal(e.to_string()))
    }
}

#[async_trait]
impl WalletUnlocker for Unlocker {
    async fn gen_seed(&self) -> Result<Vec<String>, Status> {
        Ok(vec!["abandon".to_string(); 24])
    }

    async fn init_wallet(
        &self,
        password: &str,
        mnemonic: &[String],
        _recovery_window: i32,
    ) -> Result<(), Status> {
        assert_eq!(password, "hunter2");
        assert_eq!(mnemonic.len(), 24);
        self.write_macaroon()
    }

    async fn unlock_wallet(&self, password: &str, _recovery_window: i32) -> Result<(), Status> {
        if password != "hunter2" {
            return Err(Status::unknown("invalid passphrase for master public key"));
        }
        self.write_macaroon()
    }
}

struct ReadyNode;

#[async_trait]
impl NodeRpc for ReadyNode {
    async fn get_info(&self) -> Result<NodeInfo, Status> {
        Ok(NodeInfo { identity_pubkey: "02node".to_string(), ..Default::default() })
    }

    async fn sign_message(&self, _message: &[u8]) -> Result<String, Status> {
        Err(Status::unimplemented("sign_message"))
    }

    async fn add_invoice(&self, _spec: &InvoiceSpec) -> Result<AddedInvoice, Status> {
        Err(Status::unimplemented("add_invoice"))
    }

    async fn decode_payment_request(&self, _pay_req: &str) -> Result<DecodedInvoice, Status> {
        Err(Status::unimplemented("decode_payment_request"))
    }

    async fn send_payment_sync(
        &self,
        _pay_req: &str,
        _amount: Option<u64>,
    ) -> Result<PaymentUpdate, Status> {
        Err(Status::unimplemented("send_payment_sync"))
    }

    async fn send_payment_stream(&self) -> Result<PaymentStream, Status> {
        Err(Status::unimplemented("send_payment_stream"))
    }
}

struct FakeConnector;

#[async_trait]
impl NodeConnector for FakeConnector {
    async fn unlocker(
        &self,
        handle: &NodeProcessHandle,
    ) -> anyhow::Result<Box<dyn WalletUnlocker>> {
        assert!(handle.tls_cert_path.exists());
        Ok(Box::new(Unlocker { macaroon_path: handle.macaroon_path.clone() }))
    }

    async fn authenticated(
        &self,
        _handle: &NodeProcessHandle,
        macaroon: &[u8],
    ) -> anyhow::Result<Box<dyn NodeRpc>> {
        assert_eq!(macaroon, MACAROON);
        Ok(Box::new(ReadyNode))
    }
}

fn spawned_pids(dir: &Path) -> Vec<u32> {
    fs::read_to_string(dir.join("spawned"))
        .unwrap_or_default()
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect()
}

async fn node_down(events: &mut broadcast::Receiver<Event>) -> String {
    let wait = async {
        loop {
            if let Event::NodeDown { reason } = events.recv().await.expect("event bus closed") {
                return reason;
            }
        }
    };
    timeout(Duration::from_secs(30), wait).await.expect("node did not go down")
}

// one test for the whole lifecycle, so no other test forks while the script is being written
#[tokio::test]
async fn node_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut options = test_node_options(dir.path());
    options.binary = install_fake_node(dir.path());
    let notifier = Notifier::new();
    let mut events = notifier.subscribe();
    let gateway = RpcGateway::new(
        options.clone(),
        DEFAULT_DEADLINE,
        Denomination::Sat,
        Arc::new(FakeConnector),
        notifier,
    );

    // a node whose pid can't be recorded is not left running
    let pid_path = options.pid_path("alice");
    fs::create_dir_all(&pid_path).unwrap();
    let err = gateway.start("alice").await.unwrap_err();
    assert!(matches!(err, GatewayError::Start(StartError::Io(_))), "{:?}", err);
    assert_eq!(gateway.state(), NodeState::Stopped);
    assert!(gateway.node_handle().is_none());
    for pid in spawned_pids(dir.path()) {
        assert!(!process::is_alive(pid), "node {} left running", pid);
    }
    fs::remove_dir(&pid_path).unwrap();

    let handle = gateway.start("alice").await.unwrap();
    assert_eq!(gateway.state(), NodeState::Unlocking);
    assert_eq!(gateway.node_handle(), Some(handle.clone()));
    assert_eq!(process::read_pid(&options.pid_path("alice")), Some(handle.pid));
    assert!(process::is_alive(handle.pid));

    let seed = gateway.generate_seed().await.unwrap();
    let info = gateway.unlock_or_create_wallet("hunter2", Some(seed), None).await.unwrap();
    assert_eq!(info.identity_pubkey, "02node");
    assert_eq!(gateway.state(), NodeState::Ready);
    assert_eq!(events.recv().await.unwrap(), Event::NodeUp);
    assert_eq!(gateway.get_info().await.unwrap().identity_pubkey, "02node");

    // an exit nobody asked for stops the gateway and is not followed by a restart
    assert!(process::terminate(handle.pid));
    node_down(&mut events).await;
    assert_eq!(gateway.state(), NodeState::Stopped);
    assert!(gateway.node_handle().is_none());
    assert_eq!(process::read_pid(&options.pid_path("alice")), None);

    let restarted = gateway.restart("alice").await.unwrap();
    assert_ne!(restarted.pid, handle.pid);
    assert_eq!(gateway.state(), NodeState::Unlocking);
    let err = gateway.unlock_or_create_wallet("wrong", None, None).await.unwrap_err();
    assert!(err.to_string().to_lowercase().contains("invalid passphrase"));
    gateway.unlock_or_create_wallet("hunter2", None, None).await.unwrap();
    assert_eq!(gateway.state(), NodeState::Ready);

    gateway.stop().await.unwrap();
    assert_eq!(gateway.state(), NodeState::Stopped);
    node_down(&mut events).await;
    assert!(process::wait_for_exit(restarted.pid, Duration::from_millis(100), 50).await);
    assert_eq!(process::read_pid(&options.pid_path("alice")), None);
}
