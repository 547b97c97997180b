pub mod auth;
pub mod model;
pub mod server;

pub use model::{
    InfoModel, PaymentPrepareRequest, PaymentSendRequest, StreamAddRequest, StreamIdRequest,
    StreamStartRequest, StreamStatusResponse,
};
pub use server::start_rpc_server;
pub use server::{RpcMethods, RpcServer};
