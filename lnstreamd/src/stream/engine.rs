use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::*;

use super::actor::{Command, Op, StreamActor};
use super::model::{StartDefaults, StreamParams, StreamSnapshot};
use super::StreamError;
use crate::gateway::PaymentStreamer;
use crate::notify::Notifier;
use crate::persist::{RecordStatus, StreamStore};
use crate::relay::InvoiceSource;

const COMMAND_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// delay between a start request and the first tick
    pub warmup: Duration,
    /// how long a written part may go without a payment outcome
    pub error_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings { warmup: Duration::from_secs(1), error_timeout: Duration::from_secs(10) }
    }
}

struct StreamHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<StreamSnapshot>,
    task: JoinHandle<()>,
}

/// Control surface for stream payments
pub struct StreamEngine {
    invoices: Arc<dyn InvoiceSource>,
    payments: Arc<dyn PaymentStreamer>,
    notifier: Notifier,
    settings: EngineSettings,
    streams: Mutex<HashMap<String, StreamHandle>>,
}

impl StreamEngine {
    pub fn new(
        invoices: Arc<dyn InvoiceSource>,
        payments: Arc<dyn PaymentStreamer>,
        notifier: Notifier,
        settings: EngineSettings,
    ) -> Self {
        StreamEngine { invoices, payments, notifier, settings, streams: Mutex::new(HashMap::new()) }
    }

    /// Register a paused stream and open its payment call.
    ///
    /// Adding an id that is already registered does nothing. If the payment call can't be
    /// opened the stream is still registered, and [`Self::start`] opens it again.
    pub async fn add(&self, id: &str, params: StreamParams) -> Result<StreamSnapshot, StreamError> {
        params.validate().map_err(StreamError::InvalidParams)?;
        let mut streams = self.streams.lock().await;
        if let Some(handle) = streams.get(id) {
            if !handle.task.is_finished() {
                debug!("stream {} already registered", id);
                return Ok(*handle.snapshot.borrow());
            }
        }

        let payment_stream = match self.payments.open_payment_stream().await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("could not open payment call for stream {}: {}", id, e);
                None
            }
        };
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (actor, snapshot) = StreamActor::new(
            id.to_string(),
            params,
            self.settings,
            Arc::clone(&self.invoices),
            Arc::clone(&self.payments),
            self.notifier.clone(),
            payment_stream,
            commands_rx,
        );
        let task = tokio::spawn(actor.run());
        let current = *snapshot.borrow();
        streams.insert(id.to_string(), StreamHandle { commands, snapshot, task });
        info!("stream {} added", id);
        Ok(current)
    }

    /// Start or resume a stream.
    ///
    /// An unregistered stream is added first when `defaults` carries complete parameters.
    /// Starting a running stream does nothing.
    pub async fn start(
        &self,
        id: &str,
        defaults: StartDefaults,
    ) -> Result<StreamSnapshot, StreamError> {
        if !self.is_registered(id).await {
            if let Some(params) = defaults.to_params() {
                self.add(id, params).await?;
            }
        }
        self.command(id, Op::Start(defaults)).await
    }

    pub async fn pause(&self, id: &str) -> Result<StreamSnapshot, StreamError> {
        self.command(id, Op::Pause).await
    }

    /// Mark a stream ended, it takes no further ticks
    pub async fn end(&self, id: &str) -> Result<StreamSnapshot, StreamError> {
        self.command(id, Op::End).await
    }

    pub async fn status(&self, id: &str) -> Option<StreamSnapshot> {
        let streams = self.streams.lock().await;
        streams.get(id).map(|handle| *handle.snapshot.borrow())
    }

    pub async fn ids(&self) -> Vec<String> {
        let streams = self.streams.lock().await;
        let mut ids: Vec<String> = streams.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn is_registered(&self, id: &str) -> bool {
        let streams = self.streams.lock().await;
        streams.get(id).map(|handle| !handle.task.is_finished()).unwrap_or(false)
    }

    async fn command(&self, id: &str, op: Op) -> Result<StreamSnapshot, StreamError> {
        let commands = {
            let streams = self.streams.lock().await;
            let handle = streams.get(id).ok_or_else(|| StreamError::NotFound(id.to_string()))?;
            handle.commands.clone()
        };
        let (ack, ack_rx) = oneshot::channel();
        commands
            .send(Command { op, ack })
            .await
            .map_err(|_| StreamError::Stopped(id.to_string()))?;
        ack_rx.await.map_err(|_| StreamError::Stopped(id.to_string()))
    }

    /// Register every active stream of `store` and start it, returns how many were resumed
    pub async fn restore(&self, store: &dyn StreamStore) -> Result<usize, StreamError> {
        let records = store.load()?;
        let mut resumed = 0;
        for record in records.into_iter().filter(|r| r.status == RecordStatus::Active) {
            let params = record.params();
            if let Err(e) = self.add(&record.id, params.clone()).await {
                warn!("not restoring stream {}: {}", record.id, e);
                continue;
            }
            match self.start(&record.id, params.into()).await {
                Ok(_) => resumed += 1,
                Err(e) => warn!("could not resume stream {}: {}", record.id, e),
            }
        }
        info!("restored {} streams", resumed);
        Ok(resumed)
    }

    /// Close every payment call and drop all streams
    pub async fn shutdown(&self) {
        let handles: Vec<(String, StreamHandle)> = self.streams.lock().await.drain().collect();
        for (id, handle) in handles {
            let (ack, ack_rx) = oneshot::channel();
            if handle.commands.send(Command { op: Op::Shutdown, ack }).await.is_ok() {
                let _ = ack_rx.await;
            }
            if let Err(e) = handle.task.await {
                error!("stream {} task failed: {:?}", id, e);
            }
        }
        info!("stream engine shut down");
    }
}
