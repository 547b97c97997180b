use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use backoff::backoff::Backoff;
use log::*;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use super::messages::RelayMessage;
use super::transport::{RelayConnection, RelayConnector};
use super::{InvoiceSource, RelayError, RemoteInvoice};
use crate::gateway::model::InvoiceSpec;
use crate::gateway::RpcGateway;
use crate::notify::{Event, Notifier};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const POLL_ATTEMPTS: u32 = 40;
/// consecutive failed invoice requests before the relay is reported down
pub const UNHEALTHY_AFTER: u32 = 3;

fn backoff() -> backoff::ExponentialBackoff {
    backoff::ExponentialBackoffBuilder::default()
        .with_initial_interval(Duration::from_secs(1))
        .with_max_interval(Duration::from_secs(30))
        .with_max_elapsed_time(None)
        .build()
}

#[derive(Debug, Clone, PartialEq)]
struct InvoiceResponse {
    invoice: String,
    amount: u64,
}

type PendingMap = HashMap<String, Option<InvoiceResponse>>;

struct Inner {
    gateway: Arc<RpcGateway>,
    connector: Arc<dyn RelayConnector>,
    notifier: Notifier,
    outbound: Mutex<Option<mpsc::UnboundedSender<RelayMessage>>>,
    pending: Mutex<PendingMap>,
    authenticated: AtomicBool,
    // whether RelayUp was the last announcement
    announced_up: AtomicBool,
    healthy: AtomicBool,
    failures: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Removes its correlation entry when dropped, whichever way the request ends
struct PendingSlot<'a> {
    pending: &'a Mutex<PendingMap>,
    key: String,
}

impl<'a> PendingSlot<'a> {
    fn register(pending: &'a Mutex<PendingMap>) -> Self {
        let mut map = lock(pending);
        let mut key = correlation_key();
        while map.contains_key(&key) {
            key = correlation_key();
        }
        map.insert(key.clone(), None);
        PendingSlot { pending, key }
    }

    fn take(&self) -> Option<InvoiceResponse> {
        lock(self.pending).get_mut(&self.key).and_then(Option::take)
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.key);
    }
}

fn correlation_key() -> String {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    format!("{}-{:08x}", millis, rand::random::<u32>())
}

impl Inner {
    fn send(&self, msg: RelayMessage) -> Result<(), RelayError> {
        let outbound = lock(&self.outbound);
        let sender = outbound.as_ref().ok_or(RelayError::NotConnected)?;
        sender.send(msg).map_err(|_| RelayError::NotConnected)
    }

    fn announce_up(&self) {
        if !self.announced_up.swap(true, Ordering::AcqRel) {
            info!("relay up");
            self.notifier.notify(Event::RelayUp);
        }
    }

    fn announce_down(&self) {
        if self.announced_up.swap(false, Ordering::AcqRel) {
            warn!("relay down");
            self.notifier.notify(Event::RelayDown);
        }
    }

    fn record_outcome(&self, ok: bool) {
        if ok {
            self.failures.store(0, Ordering::Release);
            let recovered = !self.healthy.swap(true, Ordering::AcqRel);
            if recovered && self.authenticated.load(Ordering::Acquire) {
                self.announce_up();
            }
        } else {
            let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
            if failures >= UNHEALTHY_AFTER && self.healthy.swap(false, Ordering::AcqRel) {
                warn!("{} consecutive invoice requests failed", failures);
                self.announce_down();
            }
        }
    }

    async fn handle(self: &Arc<Self>, msg: RelayMessage) -> Result<(), RelayError> {
        match msg {
            RelayMessage::UnauthorizedConnection => {
                let info = self.gateway.get_info().await?;
                debug!("relay challenge, identifying as {}", info.identity_pubkey);
                self.send(RelayMessage::ConnectRequest { identity: info.identity_pubkey })?;
            }
            RelayMessage::SignMessageRequest { nonce } => {
                let signature = self.gateway.sign_message(&nonce).await?;
                self.send(RelayMessage::SignMessageResponse { signature })?;
            }
            RelayMessage::SignMessageSuccess => {
                self.authenticated.store(true, Ordering::Release);
                self.announce_up();
            }
            RelayMessage::AddInvoiceRemoteRequest { key, amount, memo, sender, .. } => {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = inner.serve_invoice(key, amount, memo, sender).await {
                        error!("could not serve remote invoice request: {}", e);
                    }
                });
            }
            RelayMessage::AddInvoiceRemoteResponse { key, invoice, amount, .. } => {
                let mut pending = lock(&self.pending);
                match pending.get_mut(&key) {
                    Some(slot) if slot.is_none() =>
                        *slot = Some(InvoiceResponse { invoice, amount }),
                    Some(_) => warn!("duplicate invoice response for {}", key),
                    None => debug!("invoice response for unknown or expired key {}", key),
                }
            }
            RelayMessage::Error { message } => warn!("relay error: {}", message),
            msg => warn!("unexpected relay message {:?}", msg),
        }
        Ok(())
    }

    async fn serve_invoice(
        &self,
        key: String,
        amount: u64,
        memo: Option<String>,
        sender: Option<String>,
    ) -> Result<(), RelayError> {
        info!("creating invoice of {} sat for remote request {}", amount, key);
        let spec = InvoiceSpec { value: amount, memo, expiry: None };
        let added = self.gateway.add_invoice(spec).await?;
        self.send(RelayMessage::AddInvoiceRemoteResponse {
            key,
            invoice: added.payment_request,
            amount,
            destination: sender,
        })
    }

    async fn serve(
        self: &Arc<Self>,
        mut conn: RelayConnection,
        shutdown: &triggered::Listener,
    ) -> Result<(), RelayError> {
        *lock(&self.outbound) = Some(conn.outbound.clone());
        loop {
            let msg = tokio::select! {
                _ = shutdown.clone() => return Ok(()),
                msg = conn.inbound.recv() => msg,
            };
            match msg {
                Some(Ok(msg)) => {
                    trace!("relay recv {:?}", msg);
                    self.handle(msg).await?;
                }
                Some(Err(e)) => return Err(e),
                None => return Err(RelayError::Transport("connection closed".to_string())),
            }
        }
    }

    fn disconnected(&self) {
        lock(&self.outbound).take();
        self.authenticated.store(false, Ordering::Release);
        self.announce_down();
    }

    async fn run(self: Arc<Self>, shutdown: triggered::Listener) {
        let mut backoff = backoff();
        loop {
            let connect = tokio::select! {
                _ = shutdown.clone() => break,
                connect = self.connector.connect() => connect,
            };
            match connect {
                Ok(conn) => {
                    backoff.reset();
                    let result = self.serve(conn, &shutdown).await;
                    self.disconnected();
                    match result {
                        Ok(()) => break,
                        Err(e) => warn!("relay connection lost: {}", e),
                    }
                }
                Err(e) => warn!("relay connect failed: {}", e),
            }
            let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(30));
            debug!("reconnecting to relay in {:?}", delay);
            tokio::select! {
                _ = shutdown.clone() => break,
                _ = sleep(delay) => {}
            }
        }
        info!("relay connection loop done");
    }
}

/// Persistent, auto-reconnecting connection to the invoice relay
pub struct RelayClient {
    inner: Arc<Inner>,
    task: Mutex<Option<(triggered::Trigger, JoinHandle<()>)>>,
}

impl RelayClient {
    pub fn new(
        gateway: Arc<RpcGateway>,
        connector: Arc<dyn RelayConnector>,
        notifier: Notifier,
    ) -> Self {
        let inner = Inner {
            gateway,
            connector,
            notifier,
            outbound: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            authenticated: AtomicBool::new(false),
            announced_up: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        };
        RelayClient { inner: Arc::new(inner), task: Mutex::new(None) }
    }

    /// Start the connection loop, a no-op if it is already running
    pub fn open_connection(&self) {
        let mut task = lock(&self.task);
        if task.is_some() {
            return;
        }
        let (trigger, listener) = triggered::trigger();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(listener));
        *task = Some((trigger, handle));
    }

    /// Stop reconnecting and close the socket, safe to call when already closed
    pub async fn close_connection(&self) {
        let task = lock(&self.task).take();
        if let Some((trigger, handle)) = task {
            trigger.trigger();
            if let Err(e) = handle.await {
                error!("relay task failed: {:?}", e);
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Acquire)
    }

    /// Number of invoice requests waiting for a response
    pub fn pending_requests(&self) -> usize {
        lock(&self.inner.pending).len()
    }

    pub async fn request_invoice(
        &self,
        amount: u64,
        destination: &str,
        memo: Option<String>,
    ) -> Result<RemoteInvoice, RelayError> {
        let result = self.do_request_invoice(amount, destination, memo).await;
        if let Err(e) = &result {
            warn!("invoice request to {} failed: {}", destination, e);
        }
        self.inner.record_outcome(result.is_ok());
        result
    }

    async fn do_request_invoice(
        &self,
        amount: u64,
        destination: &str,
        memo: Option<String>,
    ) -> Result<RemoteInvoice, RelayError> {
        if !self.is_authenticated() {
            return Err(RelayError::NotConnected);
        }
        let slot = PendingSlot::register(&self.inner.pending);
        debug!("requesting invoice {} of {} sat from {}", slot.key, amount, destination);
        self.inner.send(RelayMessage::AddInvoiceRemoteRequest {
            key: slot.key.clone(),
            destination: destination.to_string(),
            amount,
            memo,
            sender: None,
        })?;

        let mut ticker = interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        for _ in 0..POLL_ATTEMPTS {
            ticker.tick().await;
            if let Some(response) = slot.take() {
                return self.verify(response, amount, destination).await;
            }
        }
        Err(RelayError::ClientOffline)
    }

    async fn verify(
        &self,
        response: InvoiceResponse,
        amount: u64,
        destination: &str,
    ) -> Result<RemoteInvoice, RelayError> {
        let decoded = self.inner.gateway.decode_payment_request(&response.invoice).await?;
        if decoded.destination != destination {
            return Err(RelayError::MalformedInvoice(format!(
                "invoice is payable to {}, expected {}",
                decoded.destination, destination
            )));
        }
        if decoded.num_satoshis != amount as i64 || response.amount != amount {
            return Err(RelayError::MalformedInvoice(format!(
                "invoice is for {} sat, expected {}",
                decoded.num_satoshis, amount
            )));
        }
        Ok(RemoteInvoice { payment_request: response.invoice, decoded })
    }
}

#[async_trait]
impl InvoiceSource for RelayClient {
    async fn request_invoice(
        &self,
        amount: u64,
        destination: &str,
        memo: Option<String>,
    ) -> Result<RemoteInvoice, RelayError> {
        RelayClient::request_invoice(self, amount, destination, memo).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn correlation_key_test() {
        let a = correlation_key();
        let b = correlation_key();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn pending_slot_test() {
        let pending = Mutex::new(PendingMap::new());
        {
            let slot = PendingSlot::register(&pending);
            assert_eq!(slot.take(), None);
            lock(&pending).insert(
                slot.key.clone(),
                Some(InvoiceResponse { invoice: "lnbc1".to_string(), amount: 5 }),
            );
            assert_eq!(slot.take().unwrap().invoice, "lnbc1");
            // taken, still registered
            assert_eq!(lock(&pending).len(), 1);
        }
        assert!(lock(&pending).is_empty());
    }
}
