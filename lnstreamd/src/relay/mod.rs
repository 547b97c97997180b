//! Client for the invoice relay.
//!
//! The relay lets this wallet ask a remote node for an invoice without a direct connection to
//! it. Both sides keep a socket open to the relay and authenticate by signing a nonce with
//! their node identity key.

pub mod client;
pub mod messages;
pub mod transport;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::gateway::model::DecodedInvoice;
use crate::gateway::GatewayError;

pub use client::RelayClient;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelayError {
    #[error("not connected to the invoice relay")]
    NotConnected,
    #[error("no invoice received, the recipient is likely offline")]
    ClientOffline,
    #[error("malformed invoice: {0}")]
    MalformedInvoice(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("relay transport: {0}")]
    Transport(String),
}

/// An invoice obtained from a remote node, checked against what was asked for
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RemoteInvoice {
    pub payment_request: String,
    pub decoded: DecodedInvoice,
}

/// Source of invoices for stream payments
#[async_trait]
pub trait InvoiceSource: Send + Sync {
    /// Ask `destination` for an invoice of `amount` satoshi
    async fn request_invoice(
        &self,
        amount: u64,
        destination: &str,
        memo: Option<String>,
    ) -> Result<RemoteInvoice, RelayError>;
}
