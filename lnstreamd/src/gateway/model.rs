use serde::{Deserialize, Serialize};

use super::lnrpc;

/// Summary of the node returned by `GetInfo`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NodeInfo {
    pub identity_pubkey: String,
    pub alias: String,
    pub version: String,
    pub block_height: u32,
    pub num_active_channels: u32,
    pub num_peers: u32,
    pub synced_to_chain: bool,
}

impl From<lnrpc::GetInfoResponse> for NodeInfo {
    fn from(r: lnrpc::GetInfoResponse) -> Self {
        NodeInfo {
            identity_pubkey: r.identity_pubkey,
            alias: r.alias,
            version: r.version,
            block_height: r.block_height,
            num_active_channels: r.num_active_channels,
            num_peers: r.num_peers,
            synced_to_chain: r.synced_to_chain,
        }
    }
}

/// Parameters for creating a local invoice
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvoiceSpec {
    /// amount in satoshi
    pub value: u64,
    pub memo: Option<String>,
    /// seconds until the invoice expires, node default if unset
    pub expiry: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddedInvoice {
    pub payment_request: String,
    pub payment_hash: String,
}

impl From<lnrpc::AddInvoiceResponse> for AddedInvoice {
    fn from(r: lnrpc::AddInvoiceResponse) -> Self {
        AddedInvoice { payment_request: r.payment_request, payment_hash: hex::encode(r.r_hash) }
    }
}

/// A decoded BOLT11 payment request
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DecodedInvoice {
    pub destination: String,
    pub payment_hash: String,
    /// amount in satoshi, zero for "any amount" invoices
    pub num_satoshis: i64,
    pub timestamp: i64,
    pub expiry: i64,
    pub description: String,
}

impl From<lnrpc::PayReq> for DecodedInvoice {
    fn from(r: lnrpc::PayReq) -> Self {
        DecodedInvoice {
            destination: r.destination,
            payment_hash: r.payment_hash,
            num_satoshis: r.num_satoshis,
            timestamp: r.timestamp,
            expiry: r.expiry,
            description: r.description,
        }
    }
}

/// Outcome of a single payment, either from the payment stream or a one-shot payment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PaymentUpdate {
    pub payment_hash: String,
    pub payment_preimage: String,
    /// set by the node when the payment failed
    pub payment_error: Option<String>,
}

impl PaymentUpdate {
    pub fn is_settled(&self) -> bool {
        self.payment_error.is_none()
    }
}

impl From<lnrpc::SendResponse> for PaymentUpdate {
    fn from(r: lnrpc::SendResponse) -> Self {
        let payment_error = if r.payment_error.is_empty() { None } else { Some(r.payment_error) };
        PaymentUpdate {
            payment_hash: hex::encode(r.payment_hash),
            payment_preimage: hex::encode(r.payment_preimage),
            payment_error,
        }
    }
}

/// Arguments of the wallet unlock / init call, only ever logged redacted
#[derive(Serialize, Debug, Clone)]
pub struct UnlockArgs {
    pub wallet_password: String,
    pub cipher_seed_mnemonic: Option<Vec<String>>,
    pub recovery_window: i32,
}

/// Arguments of a one-shot payment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentSpec {
    pub payment_request: String,
    /// amount in satoshi, required only for zero-amount invoices
    pub amount: Option<u64>,
}
