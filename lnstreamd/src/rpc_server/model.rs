use jsonrpsee::core::traits::ToRpcParams;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::gateway::model::{NodeInfo, PaymentSpec};
use crate::gateway::NodeState;
use crate::stream::{StartDefaults, StreamParams, StreamSnapshot};

fn to_raw_params<T: Serialize>(value: &T) -> Result<Option<Box<RawValue>>, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    RawValue::from_string(json).map(Some)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InfoModel {
    pub version: String,
    pub deployment_env: String,
    pub node_state: NodeState,
    /// present once the node serves authenticated calls
    pub node: Option<NodeInfo>,
    pub relay_authenticated: bool,
    pub relay_healthy: bool,
    pub streams: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StreamAddRequest {
    pub id: String,
    /// display name of the stored record
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub params: StreamParams,
}

impl ToRpcParams for StreamAddRequest {
    fn to_rpc_params(self) -> Result<Option<Box<RawValue>>, serde_json::Error> {
        to_raw_params(&self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StreamStartRequest {
    pub id: String,
    #[serde(flatten)]
    pub defaults: StartDefaults,
}

impl ToRpcParams for StreamStartRequest {
    fn to_rpc_params(self) -> Result<Option<Box<RawValue>>, serde_json::Error> {
        to_raw_params(&self)
    }
}

/// Parameters of `stream_pause`, `stream_end` and `stream_status`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StreamIdRequest {
    pub id: String,
}

impl ToRpcParams for StreamIdRequest {
    fn to_rpc_params(self) -> Result<Option<Box<RawValue>>, serde_json::Error> {
        to_raw_params(&self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamStatusResponse {
    pub id: String,
    #[serde(flatten)]
    pub snapshot: StreamSnapshot,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentPrepareRequest {
    pub payment_request: String,
}

impl ToRpcParams for PaymentPrepareRequest {
    fn to_rpc_params(self) -> Result<Option<Box<RawValue>>, serde_json::Error> {
        to_raw_params(&self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentSendRequest {
    pub payment_request: String,
    /// satoshi, only for invoices without an amount
    pub amount: Option<u64>,
}

impl ToRpcParams for PaymentSendRequest {
    fn to_rpc_params(self) -> Result<Option<Box<RawValue>>, serde_json::Error> {
        to_raw_params(&self)
    }
}

impl From<PaymentSendRequest> for PaymentSpec {
    fn from(r: PaymentSendRequest) -> Self {
        PaymentSpec { payment_request: r.payment_request, amount: r.amount }
    }
}
