//! Clients for the node's RPC surface.
//!
//! The gateway talks to the node through the [`NodeRpc`] and [`WalletUnlocker`] traits, which
//! are produced by a [`NodeConnector`]. [`LndConnector`] builds them on top of tonic channels
//! with the node's self-signed TLS certificate and the admin macaroon.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::*;

use super::lnrpc::{
    self, lightning_client::LightningClient, wallet_unlocker_client::WalletUnlockerClient,
};
use super::model::{AddedInvoice, DecodedInvoice, InvoiceSpec, NodeInfo, PaymentUpdate};
use super::process::NodeProcessHandle;

const PAYMENT_STREAM_BUFFER: usize = 16;

pub type PaymentEvents = Pin<Box<dyn Stream<Item = Result<PaymentUpdate, Status>> + Send>>;

/// An open `SendPayment` call: payment requests go in, one settlement or error event comes out
/// per request written.
pub struct PaymentStream {
    requests: mpsc::Sender<String>,
    events: PaymentEvents,
}

impl PaymentStream {
    pub fn new(requests: mpsc::Sender<String>, events: PaymentEvents) -> Self {
        PaymentStream { requests, events }
    }

    /// Write a payment request into the call
    pub fn try_send(&self, payment_request: String) -> Result<(), Status> {
        self.requests.try_send(payment_request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Status::resource_exhausted("payment stream full"),
            mpsc::error::TrySendError::Closed(_) => Status::cancelled("payment stream closed"),
        })
    }

    /// Next event from the node, `None` once the call is finished
    pub async fn next_event(&mut self) -> Option<Result<PaymentUpdate, Status>> {
        self.events.next().await
    }

    /// Close the request side and drop the response side of the call
    pub fn cancel(self) {
        debug!("cancelling payment stream");
    }
}

/// Run a `SendPayment` call in the background and hand out its [`PaymentStream`] right away.
///
/// The node sends the response headers of a streaming call together with its first response,
/// which only follows a written payment request, so `open` can't be awaited before the first
/// write. A failure to open comes out as the first event.
pub fn spawn_payment_call<F, S>(requests: mpsc::Sender<String>, open: F) -> PaymentStream
where
    F: Future<Output = Result<S, Status>> + Send + 'static,
    S: Stream<Item = Result<PaymentUpdate, Status>> + Send + 'static,
{
    let (events_tx, events_rx) = mpsc::channel(PAYMENT_STREAM_BUFFER);
    let forward_tx = events_tx.clone();
    let forward = async move {
        match open.await {
            Ok(events) => {
                let mut events = Box::pin(events);
                while let Some(event) = events.next().await {
                    if forward_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            Err(status) => {
                warn!("payment call failed to open: {}", status.message());
                let _ = forward_tx.send(Err(status)).await;
            }
        }
    };
    tokio::spawn(async move {
        tokio::select! {
            _ = forward => {}
            // the receiving side was cancelled, dropping the call ends it
            _ = events_tx.closed() => debug!("payment call dropped"),
        }
    });
    PaymentStream::new(requests, Box::pin(ReceiverStream::new(events_rx)))
}

/// Authenticated node calls
#[async_trait]
pub trait NodeRpc: Send + Sync {
    async fn get_info(&self) -> Result<NodeInfo, Status>;
    /// Sign with the node identity key, returns the zbase32 signature
    async fn sign_message(&self, message: &[u8]) -> Result<String, Status>;
    async fn add_invoice(&self, spec: &InvoiceSpec) -> Result<AddedInvoice, Status>;
    async fn decode_payment_request(&self, payment_request: &str) -> Result<DecodedInvoice, Status>;
    async fn send_payment_sync(
        &self,
        payment_request: &str,
        amount: Option<u64>,
    ) -> Result<PaymentUpdate, Status>;
    async fn send_payment_stream(&self) -> Result<PaymentStream, Status>;
}

/// Calls available before the wallet is unlocked
#[async_trait]
pub trait WalletUnlocker: Send + Sync {
    async fn gen_seed(&self) -> Result<Vec<String>, Status>;
    async fn init_wallet(
        &self,
        password: &str,
        mnemonic: &[String],
        recovery_window: i32,
    ) -> Result<(), Status>;
    async fn unlock_wallet(&self, password: &str, recovery_window: i32) -> Result<(), Status>;
}

#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn unlocker(&self, handle: &NodeProcessHandle) -> anyhow::Result<Box<dyn WalletUnlocker>>;
    async fn authenticated(
        &self,
        handle: &NodeProcessHandle,
        macaroon: &[u8],
    ) -> anyhow::Result<Box<dyn NodeRpc>>;
}

/// Adds the hex encoded macaroon to every request
#[derive(Clone)]
pub struct MacaroonInterceptor {
    macaroon: MetadataValue<Ascii>,
}

impl MacaroonInterceptor {
    pub fn new(macaroon: &[u8]) -> anyhow::Result<Self> {
        let macaroon = MetadataValue::try_from(hex::encode(macaroon))?;
        Ok(MacaroonInterceptor { macaroon })
    }
}

impl Interceptor for MacaroonInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request.metadata_mut().insert("macaroon", self.macaroon.clone());
        Ok(request)
    }
}

type AuthenticatedChannel = InterceptedService<Channel, MacaroonInterceptor>;

pub struct LndConnector {
    deadline: Duration,
}

impl LndConnector {
    pub fn new(deadline: Duration) -> Self {
        LndConnector { deadline }
    }

    async fn channel(handle: &NodeProcessHandle) -> anyhow::Result<Channel> {
        let pem = tokio::fs::read(&handle.tls_cert_path).await?;
        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(pem))
            .domain_name("localhost");
        let channel = Endpoint::from_shared(handle.rpc_endpoint())?.tls_config(tls)?.connect_lazy();
        Ok(channel)
    }
}

#[async_trait]
impl NodeConnector for LndConnector {
    async fn unlocker(
        &self,
        handle: &NodeProcessHandle,
    ) -> anyhow::Result<Box<dyn WalletUnlocker>> {
        let channel = Self::channel(handle).await?;
        info!("connected unlocker to {}", handle.rpc_endpoint());
        let client = WalletUnlockerClient::new(channel);
        Ok(Box::new(LndUnlocker { client, deadline: self.deadline }))
    }

    async fn authenticated(
        &self,
        handle: &NodeProcessHandle,
        macaroon: &[u8],
    ) -> anyhow::Result<Box<dyn NodeRpc>> {
        let channel = Self::channel(handle).await?;
        let interceptor = MacaroonInterceptor::new(macaroon)?;
        let client = LightningClient::new(InterceptedService::new(channel, interceptor));
        info!("connected authenticated client to {}", handle.rpc_endpoint());
        Ok(Box::new(LndRpc { client, deadline: self.deadline }))
    }
}

pub struct LndUnlocker {
    client: WalletUnlockerClient<Channel>,
    deadline: Duration,
}

impl LndUnlocker {
    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.deadline);
        request
    }
}

#[async_trait]
impl WalletUnlocker for LndUnlocker {
    async fn gen_seed(&self) -> Result<Vec<String>, Status> {
        let mut client = self.client.clone();
        let response = client.gen_seed(self.request(lnrpc::GenSeedRequest::default())).await?;
        Ok(response.into_inner().cipher_seed_mnemonic)
    }

    async fn init_wallet(
        &self,
        password: &str,
        mnemonic: &[String],
        recovery_window: i32,
    ) -> Result<(), Status> {
        let mut client = self.client.clone();
        let request = lnrpc::InitWalletRequest {
            wallet_password: password.as_bytes().to_vec(),
            cipher_seed_mnemonic: mnemonic.to_vec(),
            aezeed_passphrase: vec![],
            recovery_window,
        };
        client.init_wallet(self.request(request)).await?;
        Ok(())
    }

    async fn unlock_wallet(&self, password: &str, recovery_window: i32) -> Result<(), Status> {
        let mut client = self.client.clone();
        let request = lnrpc::UnlockWalletRequest {
            wallet_password: password.as_bytes().to_vec(),
            recovery_window,
        };
        client.unlock_wallet(self.request(request)).await?;
        Ok(())
    }
}

pub struct LndRpc {
    client: LightningClient<AuthenticatedChannel>,
    deadline: Duration,
}

impl LndRpc {
    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        request.set_timeout(self.deadline);
        request
    }
}

#[async_trait]
impl NodeRpc for LndRpc {
    async fn get_info(&self) -> Result<NodeInfo, Status> {
        let mut client = self.client.clone();
        let response = client.get_info(self.request(lnrpc::GetInfoRequest {})).await?;
        Ok(response.into_inner().into())
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String, Status> {
        let mut client = self.client.clone();
        let request = lnrpc::SignMessageRequest { msg: message.to_vec() };
        let response = client.sign_message(self.request(request)).await?;
        Ok(response.into_inner().signature)
    }

    async fn add_invoice(&self, spec: &InvoiceSpec) -> Result<AddedInvoice, Status> {
        let mut client = self.client.clone();
        let value = i64::try_from(spec.value)
            .map_err(|_| Status::invalid_argument("invoice amount out of range"))?;
        let request = lnrpc::Invoice {
            memo: spec.memo.clone().unwrap_or_default(),
            value,
            expiry: spec.expiry.map(|e| e as i64).unwrap_or_default(),
            ..Default::default()
        };
        let response = client.add_invoice(self.request(request)).await?;
        Ok(response.into_inner().into())
    }

    async fn decode_payment_request(
        &self,
        payment_request: &str,
    ) -> Result<DecodedInvoice, Status> {
        let mut client = self.client.clone();
        let request = lnrpc::PayReqString { pay_req: payment_request.to_string() };
        let response = client.decode_pay_req(self.request(request)).await?;
        Ok(response.into_inner().into())
    }

    async fn send_payment_sync(
        &self,
        payment_request: &str,
        amount: Option<u64>,
    ) -> Result<PaymentUpdate, Status> {
        let mut client = self.client.clone();
        let request = lnrpc::SendRequest {
            payment_request: payment_request.to_string(),
            amt: amount.map(|a| a as i64).unwrap_or_default(),
            ..Default::default()
        };
        let response = client.send_payment_sync(self.request(request)).await?;
        Ok(response.into_inner().into())
    }

    async fn send_payment_stream(&self) -> Result<PaymentStream, Status> {
        let mut client = self.client.clone();
        let (sender, receiver) = mpsc::channel::<String>(PAYMENT_STREAM_BUFFER);
        let outbound = ReceiverStream::new(receiver).map(|payment_request| lnrpc::SendRequest {
            payment_request,
            ..Default::default()
        });
        // no deadline, the call lives as long as the stream payment
        let open = async move {
            let response = client.send_payment(Request::new(outbound)).await?;
            Ok::<_, Status>(response.into_inner().map(|r| r.map(PaymentUpdate::from)))
        };
        Ok(spawn_payment_call(sender, open))
    }
}
