//! The node supervisor and RPC gateway.
//!
//! [`RpcGateway`] owns the node process and is the only path to the node's RPC surface. It is
//! constructed once and shared (behind an `Arc`) with the relay client and the stream engine.

pub mod client;
pub mod lnrpc;
pub mod model;
pub mod process;

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tonic::{Code, Status};
use tracing::*;

use crate::notify::{Event, Notifier};
use crate::prettify::{prettify, Denomination};
use client::{NodeConnector, NodeRpc, PaymentStream, WalletUnlocker};
use model::{
    AddedInvoice, DecodedInvoice, InvoiceSpec, NodeInfo, PaymentSpec, PaymentUpdate, UnlockArgs,
};
use process::{NodeOptions, NodeProcessHandle, StartError};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

const TLS_POLL_INTERVAL: Duration = Duration::from_millis(500);
const TLS_POLL_ATTEMPTS: u32 = 120;
const MACAROON_POLL_INTERVAL: Duration = Duration::from_millis(500);
const MACAROON_POLL_ATTEMPTS: u32 = 60;
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);
const LIVENESS_POLL_ATTEMPTS: u32 = 30;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const EXIT_POLL_ATTEMPTS: u32 = 50;

const SENSITIVE_FIELDS: [&str; 6] = [
    "password",
    "wallet_password",
    "seed",
    "cipher_seed_mnemonic",
    "aezeed_passphrase",
    "macaroon",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("node is not running")]
    NotRunning,
    #[error("node is not unlocked")]
    NotAuthenticated,
    #[error("{method} timed out")]
    DeadlineExceeded { method: &'static str },
    #[error("{message}")]
    Rpc { method: &'static str, code: Code, message: String },
    #[error("{0}")]
    PaymentFailed(String),
    #[error(transparent)]
    Start(#[from] StartError),
    #[error("credential error: {0}")]
    Credential(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Lifecycle of the supervised node
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Stopped,
    Starting,
    AwaitingTls,
    Unlocking,
    Ready,
}

/// Opens `SendPayment` calls, the seam the stream engine uses
#[async_trait]
pub trait PaymentStreamer: Send + Sync {
    async fn open_payment_stream(&self) -> GatewayResult<PaymentStream>;
    /// Display message for a failure of an open call, raising a force logout when the node is
    /// gone
    fn pretty_error(&self, status: &Status) -> String;
    /// Display message for a payment the node reported as failed
    fn pretty_payment_error(&self, message: &str) -> String;
}

struct Inner {
    state: NodeState,
    handle: Option<NodeProcessHandle>,
    unlocker: Option<Arc<dyn WalletUnlocker>>,
    rpc: Option<Arc<dyn NodeRpc>>,
    // bumped on every spawn so that a late exit of an old process is ignored
    generation: u64,
    stopping: bool,
}

pub struct RpcGateway {
    options: NodeOptions,
    default_deadline: Duration,
    denomination: RwLock<Denomination>,
    connector: Arc<dyn NodeConnector>,
    notifier: Notifier,
    inner: Arc<Mutex<Inner>>,
    // serializes start, unlock and stop
    lifecycle: tokio::sync::Mutex<()>,
}

impl RpcGateway {
    pub fn new(
        options: NodeOptions,
        default_deadline: Duration,
        denomination: Denomination,
        connector: Arc<dyn NodeConnector>,
        notifier: Notifier,
    ) -> Self {
        RpcGateway {
            options,
            default_deadline,
            denomination: RwLock::new(denomination),
            connector,
            notifier,
            inner: Arc::new(Mutex::new(Inner {
                state: NodeState::Stopped,
                handle: None,
                unlocker: None,
                rpc: None,
                generation: 0,
                stopping: false,
            })),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn state(&self) -> NodeState {
        self.lock().state
    }

    pub fn node_handle(&self) -> Option<NodeProcessHandle> {
        self.lock().handle.clone()
    }

    pub fn denomination(&self) -> Denomination {
        self.denomination.read().map(|d| *d).unwrap_or_default()
    }

    pub fn set_denomination(&self, denomination: Denomination) {
        if let Ok(mut d) = self.denomination.write() {
            *d = denomination;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // state stays consistent even if a holder panicked, every update is a single assignment
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: NodeState) {
        debug!("node state {:?}", state);
        self.lock().state = state;
    }

    /// Use an already authenticated client, for nodes not spawned by this gateway
    pub fn attach_client(&self, rpc: Arc<dyn NodeRpc>) {
        let mut inner = self.lock();
        inner.rpc = Some(rpc);
        inner.state = NodeState::Ready;
        drop(inner);
        self.notifier.notify(Event::NodeUp);
    }

    fn client(&self) -> GatewayResult<Arc<dyn NodeRpc>> {
        let inner = self.lock();
        match (&inner.rpc, inner.state) {
            (Some(rpc), NodeState::Ready) => Ok(Arc::clone(rpc)),
            (_, NodeState::Stopped) => Err(GatewayError::NotRunning),
            _ => Err(GatewayError::NotAuthenticated),
        }
    }

    /// Spawn the node for `instance` and connect the unlocker
    pub async fn start(&self, instance: &str) -> GatewayResult<NodeProcessHandle> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await;
        self.terminate_stale(instance).await;

        self.set_state(NodeState::Starting);
        let handle = match self.spawn(instance).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("node start failed: {}", e);
                self.set_state(NodeState::Stopped);
                return Err(e.into());
            }
        };

        if !process::wait_for_file(&handle.tls_cert_path, TLS_POLL_INTERVAL, TLS_POLL_ATTEMPTS)
            .await
        {
            error!("no TLS certificate at {}", handle.tls_cert_path.display());
            self.stop_locked().await;
            return Err(StartError::TlsTimeout(handle.tls_cert_path).into());
        }

        let unlocker = match self.connector.unlocker(&handle).await {
            Ok(unlocker) => unlocker,
            Err(e) => {
                self.stop_locked().await;
                return Err(GatewayError::Credential(e.to_string()));
            }
        };
        let mut inner = self.lock();
        inner.unlocker = Some(Arc::from(unlocker));
        inner.state = NodeState::Unlocking;
        info!("node {} started with pid {}", instance, handle.pid);
        Ok(handle)
    }

    /// Stop and start again, there is no automatic restart after an exit
    pub async fn restart(&self, instance: &str) -> GatewayResult<NodeProcessHandle> {
        info!("restarting node {}", instance);
        self.stop().await?;
        self.start(instance).await
    }

    async fn spawn(&self, instance: &str) -> Result<NodeProcessHandle, StartError> {
        process::check_binary(&self.options.binary)?;
        process::check_ports(&self.options.ports())?;
        let (handle, mut child) = process::spawn(&self.options, instance)?;
        if let Err(e) = process::write_pid(&self.options.pid_path(instance), handle.pid) {
            // nothing would watch or find this process
            if let Err(kill) = child.kill().await {
                warn!("could not kill node {}: {}", handle.pid, kill);
            }
            return Err(e);
        }

        let generation = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.stopping = false;
            inner.handle = Some(handle.clone());
            inner.state = NodeState::AwaitingTls;
            inner.generation
        };

        let shared = Arc::clone(&self.inner);
        let notifier = self.notifier.clone();
        let pid_path = self.options.pid_path(instance);
        process::watch_exit(child, move |status| {
            on_exit(shared, notifier, pid_path, generation, status);
        });
        Ok(handle)
    }

    async fn terminate_stale(&self, instance: &str) {
        let pid_path = self.options.pid_path(instance);
        if let Some(pid) = process::read_pid(&pid_path) {
            if process::is_alive(pid) {
                warn!("terminating stale node process {}", pid);
                process::terminate(pid);
                if !process::wait_for_exit(pid, EXIT_POLL_INTERVAL, EXIT_POLL_ATTEMPTS).await {
                    warn!("stale node process {} is still running", pid);
                }
            }
            process::remove_pid(&pid_path);
        }
    }

    /// Unlock the wallet, or create it when `seed` is given, then wait for the node to serve
    /// authenticated calls
    pub async fn unlock_or_create_wallet(
        &self,
        password: &str,
        seed: Option<Vec<String>>,
        recovery_window: Option<i32>,
    ) -> GatewayResult<NodeInfo> {
        let _guard = self.lifecycle.lock().await;
        let (unlocker, handle) = {
            let inner = self.lock();
            match (&inner.unlocker, &inner.handle, inner.state) {
                (Some(unlocker), Some(handle), NodeState::Unlocking) =>
                    (Arc::clone(unlocker), handle.clone()),
                (_, _, NodeState::Stopped) => return Err(GatewayError::NotRunning),
                _ => return Err(GatewayError::NotAuthenticated),
            }
        };
        let recovery_window = recovery_window.unwrap_or_default();
        let args = UnlockArgs {
            wallet_password: password.to_string(),
            cipher_seed_mnemonic: seed.clone(),
            recovery_window,
        };
        let method = if seed.is_some() { "init_wallet" } else { "unlock_wallet" };
        info!("{} {}", method, redacted(&args));

        let unlock = async {
            match &seed {
                Some(mnemonic) => unlocker.init_wallet(password, mnemonic, recovery_window).await,
                None => unlocker.unlock_wallet(password, recovery_window).await,
            }
        };
        match timeout(self.default_deadline, unlock).await {
            Ok(Ok(())) => {}
            Ok(Err(status)) => return Err(self.rpc_error(method, status)),
            Err(_) => return Err(GatewayError::DeadlineExceeded { method }),
        }

        if !process::wait_for_file(
            &handle.macaroon_path,
            MACAROON_POLL_INTERVAL,
            MACAROON_POLL_ATTEMPTS,
        )
        .await
        {
            return Err(GatewayError::Credential(format!(
                "macaroon not written to {}",
                handle.macaroon_path.display()
            )));
        }
        let macaroon = tokio::fs::read(&handle.macaroon_path)
            .await
            .map_err(|e| GatewayError::Credential(e.to_string()))?;
        let rpc: Arc<dyn NodeRpc> = Arc::from(
            self.connector
                .authenticated(&handle, &macaroon)
                .await
                .map_err(|e| GatewayError::Credential(e.to_string()))?,
        );

        // the authenticated service can come up before the node is ready to serve it
        for attempt in 1..=LIVENESS_POLL_ATTEMPTS {
            match timeout(self.default_deadline, rpc.get_info()).await {
                Ok(Ok(info)) => {
                    {
                        let mut inner = self.lock();
                        inner.rpc = Some(rpc);
                        inner.unlocker = None;
                        inner.state = NodeState::Ready;
                    }
                    info!("node {} ready at height {}", info.identity_pubkey, info.block_height);
                    self.notifier.notify(Event::NodeUp);
                    return Ok(info);
                }
                Ok(Err(status)) => debug!("node not ready ({}): {}", attempt, status.message()),
                Err(_) => debug!("node not ready ({}): timeout", attempt),
            }
            sleep(LIVENESS_POLL_INTERVAL).await;
        }
        Err(GatewayError::DeadlineExceeded { method: "get_info" })
    }

    /// A fresh mnemonic for [`Self::unlock_or_create_wallet`]
    pub async fn generate_seed(&self) -> GatewayResult<Vec<String>> {
        let unlocker = {
            let inner = self.lock();
            match (&inner.unlocker, inner.state) {
                (Some(unlocker), NodeState::Unlocking) => Arc::clone(unlocker),
                (_, NodeState::Stopped) => return Err(GatewayError::NotRunning),
                _ => return Err(GatewayError::NotAuthenticated),
            }
        };
        match timeout(self.default_deadline, unlocker.gen_seed()).await {
            Ok(Ok(mnemonic)) => Ok(mnemonic),
            Ok(Err(status)) => Err(self.rpc_error("gen_seed", status)),
            Err(_) => Err(GatewayError::DeadlineExceeded { method: "gen_seed" }),
        }
    }

    /// Terminate the node, a no-op when nothing is running
    pub async fn stop(&self) -> GatewayResult<()> {
        let _guard = self.lifecycle.lock().await;
        self.stop_locked().await;
        Ok(())
    }

    async fn stop_locked(&self) {
        let handle = {
            let mut inner = self.lock();
            inner.stopping = true;
            inner.rpc = None;
            inner.unlocker = None;
            inner.state = NodeState::Stopped;
            inner.handle.take()
        };
        let handle = match handle {
            Some(handle) => handle,
            None => return,
        };
        info!("stopping node {} (pid {})", handle.instance, handle.pid);
        process::terminate(handle.pid);
        process::remove_pid(&self.options.pid_path(&handle.instance));
        if self.options.clear_data_on_stop {
            if !process::wait_for_exit(handle.pid, EXIT_POLL_INTERVAL, EXIT_POLL_ATTEMPTS).await {
                warn!("node {} did not exit, not clearing its data", handle.pid);
                return;
            }
            clear_dir(&handle.node_dir);
        }
    }

    /// Issue a unary call with a deadline.
    ///
    /// `args` are logged with sensitive fields redacted. Errors come back prettified, and
    /// errors that mean the node is gone raise [`Event::ForceLogout`].
    pub async fn call<A, T, F, Fut>(
        &self,
        method: &'static str,
        args: A,
        deadline: Option<Duration>,
        f: F,
    ) -> GatewayResult<T>
    where
        A: Serialize + Send,
        F: FnOnce(Arc<dyn NodeRpc>, A) -> Fut + Send,
        Fut: Future<Output = Result<T, Status>> + Send,
    {
        debug!("call {} {}", method, redacted(&args));
        let rpc = self.client()?;
        let deadline = deadline.unwrap_or(self.default_deadline);
        match timeout(deadline, f(rpc, args)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(status)) => Err(self.rpc_error(method, status)),
            Err(_) => {
                // the call may still take effect on the node, callers must read back state
                warn!("{} exceeded deadline of {:?}", method, deadline);
                Err(GatewayError::DeadlineExceeded { method })
            }
        }
    }

    fn rpc_error(&self, method: &'static str, status: Status) -> GatewayError {
        let message = self.pretty_status(method, &status);
        GatewayError::Rpc { method, code: status.code(), message }
    }

    fn pretty_status(&self, method: &'static str, status: &Status) -> String {
        let raw = if status.message().is_empty() {
            status.code().description().to_string()
        } else {
            status.message().to_string()
        };
        let pretty = prettify(&raw, self.denomination());
        warn!("{} failed: {:?} {}", method, status.code(), raw);
        if pretty.force_logout || status.code() == Code::Unavailable {
            error!("node unreachable, forcing logout");
            self.notifier.notify(Event::ForceLogout { reason: pretty.message.clone() });
        }
        pretty.message
    }

    pub async fn get_info(&self) -> GatewayResult<NodeInfo> {
        self.call("get_info", (), None, |rpc, _| async move { rpc.get_info().await }).await
    }

    pub async fn sign_message(&self, message: &str) -> GatewayResult<String> {
        self.call("sign_message", message.to_string(), None, |rpc, msg| async move {
            rpc.sign_message(msg.as_bytes()).await
        })
        .await
    }

    pub async fn add_invoice(&self, spec: InvoiceSpec) -> GatewayResult<AddedInvoice> {
        self.call("add_invoice", spec, None, |rpc, spec| async move {
            rpc.add_invoice(&spec).await
        })
        .await
    }

    pub async fn decode_payment_request(
        &self,
        payment_request: &str,
    ) -> GatewayResult<DecodedInvoice> {
        self.call(
            "decode_payment_request",
            payment_request.to_string(),
            None,
            |rpc, pay_req| async move { rpc.decode_payment_request(&pay_req).await },
        )
        .await
    }

    /// Decode a payment request ahead of a one-shot payment
    pub async fn prepare_payment(&self, payment_request: &str) -> GatewayResult<DecodedInvoice> {
        self.decode_payment_request(payment_request).await
    }

    /// One-shot payment, outside of any stream
    pub async fn send_payment(&self, spec: PaymentSpec) -> GatewayResult<PaymentUpdate> {
        let update = self
            .call("send_payment", spec, None, |rpc, spec| async move {
                rpc.send_payment_sync(&spec.payment_request, spec.amount).await
            })
            .await?;
        match &update.payment_error {
            Some(e) => Err(GatewayError::PaymentFailed(prettify(e, self.denomination()).message)),
            None => Ok(update),
        }
    }
}

#[async_trait]
impl PaymentStreamer for RpcGateway {
    // no deadline, the call lives as long as the stream
    async fn open_payment_stream(&self) -> GatewayResult<PaymentStream> {
        debug!("call send_payment_stream");
        let rpc = self.client()?;
        rpc.send_payment_stream().await.map_err(|s| self.rpc_error("send_payment_stream", s))
    }

    fn pretty_error(&self, status: &Status) -> String {
        self.pretty_status("send_payment_stream", status)
    }

    fn pretty_payment_error(&self, message: &str) -> String {
        prettify(message, self.denomination()).message
    }
}

fn on_exit(
    shared: Arc<Mutex<Inner>>,
    notifier: Notifier,
    pid_path: PathBuf,
    generation: u64,
    status: io::Result<ExitStatus>,
) {
    let reason = match &status {
        Ok(status) => format!("node exited with {}", status),
        Err(e) => format!("node wait failed: {}", e),
    };
    let mut inner = shared.lock().unwrap_or_else(|e| e.into_inner());
    if inner.generation != generation {
        return;
    }
    if inner.stopping {
        info!("{}", reason);
    } else {
        error!("{}, not restarting", reason);
        process::remove_pid(&pid_path);
    }
    inner.state = NodeState::Stopped;
    inner.handle = None;
    inner.rpc = None;
    inner.unlocker = None;
    drop(inner);
    notifier.notify(Event::NodeDown { reason });
}

fn clear_dir(dir: &std::path::Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => info!("cleared node data at {}", dir.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not clear node data at {}: {}", dir.display(), e),
    }
}

fn redact(value: &mut Value) {
    match value {
        Value::Object(map) =>
            for (key, v) in map.iter_mut() {
                if SENSITIVE_FIELDS.contains(&key.as_str()) {
                    *v = Value::String("***".to_string());
                } else {
                    redact(v);
                }
            },
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// JSON rendering of call arguments with secrets masked
pub fn redacted<A: Serialize>(args: &A) -> String {
    match serde_json::to_value(args) {
        Ok(mut value) => {
            redact(&mut value);
            value.to_string()
        }
        Err(_) => "<unserializable>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::test_gateway;
    use client::PaymentEvents;
    use futures::stream;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct FailingRpc(Status);

    #[async_trait]
    impl NodeRpc for FailingRpc {
        async fn get_info(&self) -> Result<NodeInfo, Status> {
            Err(self.0.clone())
        }
        async fn sign_message(&self, _message: &[u8]) -> Result<String, Status> {
            Err(self.0.clone())
        }
        async fn add_invoice(&self, _spec: &InvoiceSpec) -> Result<AddedInvoice, Status> {
            Err(self.0.clone())
        }
        async fn decode_payment_request(&self, _pay_req: &str) -> Result<DecodedInvoice, Status> {
            Err(self.0.clone())
        }
        async fn send_payment_sync(
            &self,
            _pay_req: &str,
            _amount: Option<u64>,
        ) -> Result<PaymentUpdate, Status> {
            Ok(PaymentUpdate {
                payment_error: Some("insufficient local balance for 5000 sat".to_string()),
                ..Default::default()
            })
        }
        async fn send_payment_stream(&self) -> Result<PaymentStream, Status> {
            let (sender, _) = mpsc::channel(1);
            let events: PaymentEvents = Box::pin(stream::empty());
            Ok(PaymentStream::new(sender, events))
        }
    }

    fn gateway(dir: &TempDir) -> RpcGateway {
        test_gateway(dir.path(), Notifier::new())
    }

    #[test]
    fn redacted_test() {
        let args = UnlockArgs {
            wallet_password: "hunter2".to_string(),
            cipher_seed_mnemonic: Some(vec!["abandon".to_string()]),
            recovery_window: 250,
        };
        let logged = redacted(&args);
        assert!(!logged.contains("hunter2"));
        assert!(!logged.contains("abandon"));
        assert!(logged.contains("\"recovery_window\":250"));
        assert_eq!(redacted(&"plain"), "\"plain\"");
    }

    #[tokio::test]
    async fn not_running_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        assert_eq!(gateway.state(), NodeState::Stopped);
        assert_eq!(gateway.get_info().await, Err(GatewayError::NotRunning));
        assert!(matches!(gateway.open_payment_stream().await, Err(GatewayError::NotRunning)));
        // stopping twice is fine
        gateway.stop().await.unwrap();
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_binary_missing_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let err = gateway.start("alice").await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Start(StartError::BinaryMissing(dir.path().join("missing-lnd")))
        );
        assert_eq!(gateway.state(), NodeState::Stopped);
        assert!(gateway.node_handle().is_none());
    }

    #[tokio::test]
    async fn force_logout_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        let mut events = gateway.notifier().subscribe();
        gateway.attach_client(Arc::new(FailingRpc(Status::unavailable("connection refused"))));
        assert_eq!(events.recv().await.unwrap(), Event::NodeUp);

        let err = gateway.sign_message("nonce").await.unwrap_err();
        match err {
            GatewayError::Rpc { method, code, message } => {
                assert_eq!(method, "sign_message");
                assert_eq!(code, Code::Unavailable);
                assert_eq!(message, "Connection refused");
            }
            e => panic!("unexpected {:?}", e),
        }
        assert!(matches!(events.recv().await.unwrap(), Event::ForceLogout { .. }));
    }

    #[tokio::test]
    async fn prettified_error_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        gateway.attach_client(Arc::new(FailingRpc(Status::unknown(
            "rpc error: code = Unknown desc = invoice expired",
        ))));
        let mut events = gateway.notifier().subscribe();
        let err = gateway.decode_payment_request("lnbc1").await.unwrap_err();
        assert_eq!(err.to_string(), "Invoice expired");
        // not a connectivity problem
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_payment_error_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        gateway.set_denomination(Denomination::MBtc);
        gateway.attach_client(Arc::new(FailingRpc(Status::internal("unused"))));
        let spec = PaymentSpec { payment_request: "lnbc1".to_string(), amount: None };
        let err = gateway.send_payment(spec).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::PaymentFailed("Insufficient local balance for 0.05 mBTC".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_test() {
        let dir = TempDir::new().unwrap();
        let gateway = gateway(&dir);
        gateway.attach_client(Arc::new(FailingRpc(Status::internal("unused"))));
        let result: GatewayResult<()> = gateway
            .call("slow", (), Some(Duration::from_secs(1)), |_, _| async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert_eq!(result, Err(GatewayError::DeadlineExceeded { method: "slow" }));
    }
}
