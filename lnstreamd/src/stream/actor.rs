//! The task driving a single stream.
//!
//! At most one timer or invoice request is outstanding per stream: they all live in
//! [`Phase`], and replacing the phase drops whatever was pending.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, Sleep};
use tonic::Status;
use tracing::*;

use super::engine::EngineSettings;
use super::model::{StartDefaults, StreamParams, StreamSnapshot, StreamStatus};
use crate::gateway::client::PaymentStream;
use crate::gateway::model::PaymentUpdate;
use crate::gateway::PaymentStreamer;
use crate::notify::{Event, Notifier};
use crate::relay::{InvoiceSource, RelayError, RemoteInvoice};

pub(crate) enum Op {
    Start(StartDefaults),
    Pause,
    End,
    Shutdown,
}

pub(crate) struct Command {
    pub op: Op,
    pub ack: oneshot::Sender<StreamSnapshot>,
}

enum Phase {
    Idle,
    WarmingUp(Pin<Box<Sleep>>),
    RequestingInvoice(BoxFuture<'static, Result<RemoteInvoice, RelayError>>),
    /// a part was written to the payment call and its outcome is pending
    AwaitingSettlement(Pin<Box<Sleep>>),
    /// delay before the next part
    Waiting(Pin<Box<Sleep>>),
}

enum PhaseEvent {
    WarmedUp,
    Invoice(Result<RemoteInvoice, RelayError>),
    SettlementTimeout,
    DelayElapsed,
}

async fn poll_phase(phase: &mut Phase) -> PhaseEvent {
    match phase {
        Phase::Idle => pending().await,
        Phase::WarmingUp(timer) => {
            timer.as_mut().await;
            PhaseEvent::WarmedUp
        }
        Phase::RequestingInvoice(request) => PhaseEvent::Invoice(request.await),
        Phase::AwaitingSettlement(timer) => {
            timer.as_mut().await;
            PhaseEvent::SettlementTimeout
        }
        Phase::Waiting(timer) => {
            timer.as_mut().await;
            PhaseEvent::DelayElapsed
        }
    }
}

async fn next_payment_event(
    stream: &mut Option<PaymentStream>,
) -> Option<Result<PaymentUpdate, Status>> {
    match stream {
        Some(stream) => stream.next_event().await,
        None => pending().await,
    }
}

pub(crate) struct StreamActor {
    id: String,
    params: StreamParams,
    status: StreamStatus,
    settings: EngineSettings,
    invoices: Arc<dyn InvoiceSource>,
    payments: Arc<dyn PaymentStreamer>,
    notifier: Notifier,
    payment_stream: Option<PaymentStream>,
    // payment hash of the part written to the payment call
    in_flight: Option<String>,
    phase: Phase,
    snapshot: watch::Sender<StreamSnapshot>,
    commands: mpsc::Receiver<Command>,
}

impl StreamActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        params: StreamParams,
        settings: EngineSettings,
        invoices: Arc<dyn InvoiceSource>,
        payments: Arc<dyn PaymentStreamer>,
        notifier: Notifier,
        payment_stream: Option<PaymentStream>,
        commands: mpsc::Receiver<Command>,
    ) -> (Self, watch::Receiver<StreamSnapshot>) {
        let (snapshot, snapshot_rx) = watch::channel(StreamSnapshot {
            status: StreamStatus::Pause,
            current_part: params.current_part,
        });
        let actor = StreamActor {
            id,
            params,
            status: StreamStatus::Pause,
            settings,
            invoices,
            payments,
            notifier,
            payment_stream,
            in_flight: None,
            phase: Phase::Idle,
            snapshot,
            commands,
        };
        (actor, snapshot_rx)
    }

    fn current(&self) -> StreamSnapshot {
        StreamSnapshot { status: self.status, current_part: self.params.current_part }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.current());
    }

    fn set_status(&mut self, status: StreamStatus) {
        if self.status != status {
            debug!("stream {} {:?} -> {:?}", self.id, self.status, status);
            self.status = status;
            self.notifier.notify(Event::StatusChanged { id: self.id.clone(), status });
        }
    }

    fn is_done(&self) -> bool {
        self.status == StreamStatus::End && self.in_flight.is_none()
    }

    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command { op: Op::Shutdown, ack }) => {
                        let _ = ack.send(self.current());
                        break;
                    }
                    Some(Command { op, ack }) => {
                        self.on_command(op).await;
                        let _ = ack.send(self.current());
                    }
                    None => break,
                },
                event = next_payment_event(&mut self.payment_stream) =>
                    self.on_payment_event(event),
                event = poll_phase(&mut self.phase) => self.on_phase(event),
            }
            self.publish();
            if self.is_done() {
                break;
            }
        }
        self.close_payment_stream();
        self.publish();
        debug!("stream task done");
    }

    async fn on_command(&mut self, op: Op) {
        match op {
            Op::Start(defaults) => self.start(defaults).await,
            Op::Pause => {
                self.phase = Phase::Idle;
                if self.status != StreamStatus::End {
                    self.set_status(StreamStatus::Pause);
                }
            }
            Op::End => {
                self.phase = Phase::Idle;
                self.set_status(StreamStatus::End);
            }
            Op::Shutdown => {}
        }
    }

    async fn start(&mut self, defaults: StartDefaults) {
        if self.status != StreamStatus::Pause || matches!(self.phase, Phase::WarmingUp(_)) {
            debug!("start ignored while {:?}", self.status);
            return;
        }
        defaults.fill(&mut self.params);
        if self.payment_stream.is_none() {
            match self.payments.open_payment_stream().await {
                Ok(stream) => self.payment_stream = Some(stream),
                Err(e) => {
                    self.fail(e.to_string());
                    return;
                }
            }
        }
        self.phase = Phase::WarmingUp(Box::pin(sleep(self.settings.warmup)));
    }

    fn on_phase(&mut self, event: PhaseEvent) {
        match event {
            PhaseEvent::WarmedUp => {
                self.set_status(StreamStatus::Run);
                if self.in_flight.is_some() {
                    // the part written before the pause has not resolved yet
                    self.phase = Phase::AwaitingSettlement(self.error_timer());
                } else {
                    self.tick();
                }
            }
            PhaseEvent::Invoice(Ok(invoice)) => self.pay(invoice),
            PhaseEvent::Invoice(Err(e)) => self.fail(e.to_string()),
            PhaseEvent::SettlementTimeout => {
                warn!("no payment outcome within {:?}", self.settings.error_timeout);
                self.in_flight = None;
                self.fail("payment timed out".to_string());
            }
            PhaseEvent::DelayElapsed => self.tick(),
        }
    }

    fn tick(&mut self) {
        self.phase = Phase::Idle;
        if self.status != StreamStatus::Run {
            return;
        }
        if self.params.total_parts.is_complete(self.params.current_part) {
            self.finish();
            return;
        }
        let invoices = Arc::clone(&self.invoices);
        let price = self.params.price;
        let destination = self.params.destination.clone();
        let memo = self.params.memo.clone();
        debug!("requesting part {}", self.params.current_part + 1);
        self.phase = Phase::RequestingInvoice(Box::pin(async move {
            invoices.request_invoice(price, &destination, memo).await
        }));
    }

    fn pay(&mut self, invoice: RemoteInvoice) {
        self.phase = Phase::Idle;
        if self.status != StreamStatus::Run {
            return;
        }
        let sent = match &self.payment_stream {
            Some(stream) => stream.try_send(invoice.payment_request.clone()),
            None => Err(Status::cancelled("payment stream closed")),
        };
        if let Err(status) = sent {
            self.payment_stream = None;
            self.fail(self.payments.pretty_error(&status));
            return;
        }
        let part = self.params.current_part + 1;
        info!("part {} initiated, payment hash {}", part, invoice.decoded.payment_hash);
        self.in_flight = Some(invoice.decoded.payment_hash.clone());
        self.phase = Phase::AwaitingSettlement(self.error_timer());
        self.notifier.notify(Event::PartInitiated {
            id: self.id.clone(),
            part,
            payment_request: invoice.payment_request,
            payment_hash: invoice.decoded.payment_hash,
        });
    }

    fn on_payment_event(&mut self, event: Option<Result<PaymentUpdate, Status>>) {
        match event {
            Some(Ok(update)) if update.is_settled() => self.settled(update),
            Some(Ok(update)) => self.payment_failed(update),
            Some(Err(status)) => {
                self.payment_stream = None;
                self.in_flight = None;
                self.fail(self.payments.pretty_error(&status));
            }
            None => {
                self.payment_stream = None;
                if self.status == StreamStatus::Run || self.in_flight.is_some() {
                    self.in_flight = None;
                    let closed = Status::cancelled("payment stream closed");
                    self.fail(self.payments.pretty_error(&closed));
                }
            }
        }
    }

    fn is_in_flight(&self, payment_hash: &str) -> bool {
        self.in_flight.as_deref() == Some(payment_hash)
    }

    fn payment_failed(&mut self, update: PaymentUpdate) {
        let message = self.payments.pretty_payment_error(&update.payment_error.unwrap_or_default());
        let foreign = !update.payment_hash.is_empty() && !self.is_in_flight(&update.payment_hash);
        if self.in_flight.is_some() && foreign {
            // an earlier part, the one in flight is still pending
            warn!("payment {} failed late: {}", update.payment_hash, message);
            self.notifier.notify(Event::StreamError { id: self.id.clone(), message });
            return;
        }
        self.in_flight = None;
        self.fail(message);
    }

    fn settled(&mut self, update: PaymentUpdate) {
        let resolves_in_flight = self.is_in_flight(&update.payment_hash);
        if resolves_in_flight {
            self.in_flight = None;
        }
        if self.params.total_parts.is_complete(self.params.current_part) {
            warn!("ignoring settlement {} past the last part", update.payment_hash);
            return;
        }
        self.params.current_part += 1;
        info!("part {} settled", self.params.current_part);
        self.notifier.notify(Event::Progress {
            id: self.id.clone(),
            current_part: self.params.current_part,
        });
        // late settlements are counted but never schedule the next part
        if resolves_in_flight
            && self.status == StreamStatus::Run
            && matches!(self.phase, Phase::AwaitingSettlement(_))
        {
            let delay = Duration::from_millis(self.params.delay_ms);
            self.phase = Phase::Waiting(Box::pin(sleep(delay)));
        }
    }

    fn finish(&mut self) {
        info!("stream finished after {} parts", self.params.current_part);
        self.phase = Phase::Idle;
        self.set_status(StreamStatus::End);
        self.close_payment_stream();
        self.notifier.notify(Event::Finished {
            id: self.id.clone(),
            current_part: self.params.current_part,
        });
    }

    /// Pause the stream and report, streams never end on an error
    fn fail(&mut self, message: String) {
        error!("stream error: {}", message);
        self.phase = Phase::Idle;
        if self.status == StreamStatus::Run {
            self.set_status(StreamStatus::Pause);
        }
        self.notifier.notify(Event::StreamError { id: self.id.clone(), message });
    }

    fn error_timer(&self) -> Pin<Box<Sleep>> {
        Box::pin(sleep(self.settings.error_timeout))
    }

    fn close_payment_stream(&mut self) {
        if let Some(stream) = self.payment_stream.take() {
            stream.cancel();
        }
    }
}
