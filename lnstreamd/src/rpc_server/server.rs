use anyhow::Result;
use jsonrpsee::{
    server::{RpcModule, Server},
    types::{error::ErrorCode, ErrorObject, ErrorObjectOwned},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use log::*;

use super::auth::BasicAuth;
use super::model::{
    InfoModel, PaymentPrepareRequest, PaymentSendRequest, StreamAddRequest, StreamIdRequest,
    StreamStartRequest, StreamStatusResponse,
};
use crate::gateway::model::{DecodedInvoice, PaymentUpdate};
use crate::gateway::{GatewayError, NodeState, RpcGateway};
use crate::persist::{StreamRecord, StreamStore};
use crate::relay::RelayClient;
use crate::stream::{StreamEngine, StreamError};
use crate::util::deployment_environment;
use lnstream_util::GIT_DESC;

// application error codes, outside the range reserved by JSON-RPC
pub const NODE_ERROR: i32 = -32000;
pub const NODE_UNAVAILABLE: i32 = -32001;
pub const NODE_DEADLINE: i32 = -32002;
pub const PAYMENT_FAILED: i32 = -32003;
pub const STREAM_NOT_FOUND: i32 = -32010;
pub const STREAM_STOPPED: i32 = -32011;

fn gateway_error(e: GatewayError) -> ErrorObjectOwned {
    let code = match e {
        GatewayError::NotRunning | GatewayError::NotAuthenticated => NODE_UNAVAILABLE,
        GatewayError::DeadlineExceeded { .. } => NODE_DEADLINE,
        GatewayError::PaymentFailed(_) => PAYMENT_FAILED,
        GatewayError::Rpc { .. } | GatewayError::Start(_) | GatewayError::Credential(_) =>
            NODE_ERROR,
    };
    ErrorObject::owned(code, e.to_string(), None::<bool>)
}

fn stream_error(e: StreamError) -> ErrorObjectOwned {
    let code = match e {
        StreamError::NotFound(_) => STREAM_NOT_FOUND,
        StreamError::InvalidParams(_) => ErrorCode::InvalidParams.code(),
        StreamError::Stopped(_) => STREAM_STOPPED,
        StreamError::Persist(_) => ErrorCode::InternalError.code(),
    };
    ErrorObject::owned(code, e.to_string(), None::<bool>)
}

/// The `RpcServer` dispatches control requests to the gateway and the stream engine.
pub struct RpcServer {
    pub gateway: Arc<RpcGateway>,
    pub engine: Arc<StreamEngine>,
    pub relay: Arc<RelayClient>,
    pub store: Arc<dyn StreamStore>,
}

impl RpcServer {
    pub fn new(
        gateway: Arc<RpcGateway>,
        engine: Arc<StreamEngine>,
        relay: Arc<RelayClient>,
        store: Arc<dyn StreamStore>,
    ) -> Self {
        Self { gateway, engine, relay, store }
    }

    // records are written here, the engine only reports progress through events
    fn record_if_missing(&self, record: StreamRecord) -> Result<(), StreamError> {
        if self.store.get(&record.id)?.is_none() {
            self.store.put(&record)?;
        }
        Ok(())
    }

    pub async fn handle_info(&self) -> InfoModel {
        let node_state = self.gateway.state();
        let node = if node_state == NodeState::Ready {
            match self.gateway.get_info().await {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!("info: node did not answer: {}", e);
                    None
                }
            }
        } else {
            None
        };
        InfoModel {
            version: GIT_DESC.to_string(),
            deployment_env: deployment_environment(),
            node_state,
            node,
            relay_authenticated: self.relay.is_authenticated(),
            relay_healthy: self.relay.is_healthy(),
            streams: self.engine.ids().await.len(),
        }
    }

    pub async fn handle_stream_add(
        &self,
        request: StreamAddRequest,
    ) -> Result<StreamStatusResponse, StreamError> {
        info!("Handling stream_add request for {}", request.id);
        let record = StreamRecord::new(&request.id, request.name, &request.params);
        let snapshot = self.engine.add(&request.id, request.params).await?;
        self.record_if_missing(record)?;
        Ok(StreamStatusResponse { id: request.id, snapshot })
    }

    pub async fn handle_stream_start(
        &self,
        request: StreamStartRequest,
    ) -> Result<StreamStatusResponse, StreamError> {
        info!("Handling stream_start request for {}", request.id);
        if let Some(params) = request.defaults.to_params() {
            if params.validate().is_ok() {
                self.record_if_missing(StreamRecord::new(&request.id, None, &params))?;
            }
        }
        let snapshot = self.engine.start(&request.id, request.defaults).await?;
        Ok(StreamStatusResponse { id: request.id, snapshot })
    }

    pub async fn handle_stream_pause(
        &self,
        request: StreamIdRequest,
    ) -> Result<StreamStatusResponse, StreamError> {
        let snapshot = self.engine.pause(&request.id).await?;
        Ok(StreamStatusResponse { id: request.id, snapshot })
    }

    pub async fn handle_stream_end(
        &self,
        request: StreamIdRequest,
    ) -> Result<StreamStatusResponse, StreamError> {
        let snapshot = self.engine.end(&request.id).await?;
        Ok(StreamStatusResponse { id: request.id, snapshot })
    }

    pub async fn handle_stream_status(
        &self,
        request: StreamIdRequest,
    ) -> Result<StreamStatusResponse, StreamError> {
        match self.engine.status(&request.id).await {
            Some(snapshot) => Ok(StreamStatusResponse { id: request.id, snapshot }),
            None => Err(StreamError::NotFound(request.id)),
        }
    }

    pub async fn handle_payment_prepare(
        &self,
        request: PaymentPrepareRequest,
    ) -> Result<DecodedInvoice, GatewayError> {
        self.gateway.prepare_payment(&request.payment_request).await
    }

    pub async fn handle_payment_send(
        &self,
        request: PaymentSendRequest,
    ) -> Result<PaymentUpdate, GatewayError> {
        self.gateway.send_payment(request.into()).await
    }
}

#[derive(Debug)]
pub enum RpcMethods {
    Info,
    Version,
    StreamAdd,
    StreamStart,
    StreamPause,
    StreamEnd,
    StreamStatus,
    StreamList,
    PaymentPrepare,
    PaymentSend,
}

impl RpcMethods {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Version => "version",
            Self::StreamAdd => "stream_add",
            Self::StreamStart => "stream_start",
            Self::StreamPause => "stream_pause",
            Self::StreamEnd => "stream_end",
            Self::StreamStatus => "stream_status",
            Self::StreamList => "stream_list",
            Self::PaymentPrepare => "payment_prepare",
            Self::PaymentSend => "payment_send",
        }
    }
}

fn build_module(context: RpcServer) -> Result<RpcModule<RpcServer>> {
    let mut module = RpcModule::new(context);

    module.register_async_method(RpcMethods::Info.as_str(), |_, context, _| async move {
        info!("rpc_server: info");
        Ok::<_, ErrorObjectOwned>(context.handle_info().await)
    })?;

    module.register_method(RpcMethods::Version.as_str(), |_, _, _| {
        Ok::<_, ErrorObject>(GIT_DESC.to_string())
    })?;

    module.register_async_method(RpcMethods::StreamAdd.as_str(), |params, context, _| async move {
        let request: StreamAddRequest = params.parse().map_err(|_| ErrorCode::InvalidParams)?;
        context.handle_stream_add(request).await.map_err(stream_error)
    })?;

    module.register_async_method(
        RpcMethods::StreamStart.as_str(),
        |params, context, _| async move {
            let request: StreamStartRequest =
                params.parse().map_err(|_| ErrorCode::InvalidParams)?;
            context.handle_stream_start(request).await.map_err(stream_error)
        },
    )?;

    module.register_async_method(
        RpcMethods::StreamPause.as_str(),
        |params, context, _| async move {
            info!("rpc_server: stream_pause, params {:?}", params);
            let request: StreamIdRequest = params.parse().map_err(|_| ErrorCode::InvalidParams)?;
            context.handle_stream_pause(request).await.map_err(stream_error)
        },
    )?;

    module.register_async_method(RpcMethods::StreamEnd.as_str(), |params, context, _| async move {
        info!("rpc_server: stream_end, params {:?}", params);
        let request: StreamIdRequest = params.parse().map_err(|_| ErrorCode::InvalidParams)?;
        context.handle_stream_end(request).await.map_err(stream_error)
    })?;

    module.register_async_method(
        RpcMethods::StreamStatus.as_str(),
        |params, context, _| async move {
            let request: StreamIdRequest = params.parse().map_err(|_| ErrorCode::InvalidParams)?;
            context.handle_stream_status(request).await.map_err(stream_error)
        },
    )?;

    module.register_async_method(RpcMethods::StreamList.as_str(), |_, context, _| async move {
        Ok::<_, ErrorObjectOwned>(context.engine.ids().await)
    })?;

    module.register_async_method(
        RpcMethods::PaymentPrepare.as_str(),
        |params, context, _| async move {
            let request: PaymentPrepareRequest =
                params.parse().map_err(|_| ErrorCode::InvalidParams)?;
            context.handle_payment_prepare(request).await.map_err(gateway_error)
        },
    )?;

    module.register_async_method(
        RpcMethods::PaymentSend.as_str(),
        |params, context, _| async move {
            let request: PaymentSendRequest =
                params.parse().map_err(|_| ErrorCode::InvalidParams)?;
            context.handle_payment_send(request).await.map_err(gateway_error)
        },
    )?;

    Ok(module)
}

pub async fn start_rpc_server(
    context: RpcServer,
    ip: IpAddr,
    port: u16,
    username: &str,
    password: &str,
    shutdown_signal: triggered::Listener,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let module = build_module(context)?;

    let auth_middleware = ServiceBuilder::new()
        .layer(ValidateRequestHeaderLayer::custom(BasicAuth::new(username, password)));

    let server = Server::builder()
        .set_http_middleware(auth_middleware)
        .http_only()
        .build(SocketAddr::new(ip, port))
        .await?;

    let addr = server.local_addr()?;
    let handle = server.start(module);
    info!("rpc_server: listening on {} on port {}", addr, port);

    let join_handle = tokio::spawn(async move {
        shutdown_signal.await;
        if let Err(e) = handle.stop() {
            warn!("rpc_server: {}", e);
        }
        handle.stopped().await;
    });

    Ok((addr, join_handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::persist::{JsonStreamStore, RecordStatus};
    use crate::relay::transport::MemoryConnector;
    use crate::stream::{EngineSettings, StreamStatus, TotalParts};
    use crate::util::testing::test_gateway;
    use jsonrpsee::types::Params;
    use tempfile::TempDir;

    fn server(dir: &TempDir) -> RpcServer {
        let notifier = Notifier::new();
        let gateway = Arc::new(test_gateway(dir.path(), notifier.clone()));
        let (connector, _peers) = MemoryConnector::new();
        let relay =
            Arc::new(RelayClient::new(gateway.clone(), Arc::new(connector), notifier.clone()));
        let engine = Arc::new(StreamEngine::new(
            relay.clone(),
            gateway.clone(),
            notifier,
            EngineSettings::default(),
        ));
        let store = Arc::new(JsonStreamStore::new(dir.path()));
        RpcServer::new(gateway, engine, relay, store)
    }

    fn add_request(id: &str) -> StreamAddRequest {
        let params = Params::new(Some(
            r#"{"id":"s1","price":10,"total_parts":{"finite":3},"current_part":0,
                "delay_ms":1000,"destination":"02abc","memo":null}"#,
        ));
        let mut request: StreamAddRequest = params.parse().unwrap();
        request.id = id.to_string();
        request
    }

    #[test_log::test(tokio::test)]
    async fn test_info_without_node() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);
        let info = server.handle_info().await;
        assert_eq!(info.node_state, NodeState::Stopped);
        assert!(info.node.is_none());
        assert!(!info.relay_authenticated);
        assert_eq!(info.streams, 0);
        assert_eq!(info.version, GIT_DESC);
    }

    #[test_log::test(tokio::test)]
    async fn test_stream_lifecycle() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);

        let added = server.handle_stream_add(add_request("s1")).await.unwrap();
        assert_eq!(added.id, "s1");
        assert_eq!(added.snapshot.status, StreamStatus::Pause);
        assert_eq!(added.snapshot.current_part, 0);
        assert_eq!(server.handle_info().await.streams, 1);
        let record = server.store.get("s1").unwrap().unwrap();
        assert_eq!(record.name, "s1");
        assert_eq!(record.status, RecordStatus::Paused);
        assert_eq!(record.total_parts, TotalParts::Finite(3));

        let request = StreamIdRequest { id: "s1".to_string() };
        let status = server.handle_stream_status(request.clone()).await.unwrap();
        assert_eq!(status.snapshot, added.snapshot);

        let ended = server.handle_stream_end(request).await.unwrap();
        assert_eq!(ended.snapshot.status, StreamStatus::End);
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_stream() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);
        let err = server
            .handle_stream_pause(StreamIdRequest { id: "nope".to_string() })
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::NotFound("nope".to_string()));
        assert_eq!(stream_error(err).code(), STREAM_NOT_FOUND);

        let err = server
            .handle_stream_status(StreamIdRequest { id: "nope".to_string() })
            .await
            .unwrap_err();
        assert_eq!(stream_error(err).code(), STREAM_NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_stream_params() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);
        let mut request = add_request("s2");
        request.params.price = 0;
        let err = server.handle_stream_add(request).await.unwrap_err();
        assert!(server.store.get("s2").unwrap().is_none());
        let object = stream_error(err);
        assert_eq!(object.code(), ErrorCode::InvalidParams.code());
        assert!(object.message().starts_with("invalid stream parameters"));
    }

    #[test_log::test(tokio::test)]
    async fn test_payment_without_node() {
        let dir = TempDir::new().unwrap();
        let server = server(&dir);
        let request = PaymentPrepareRequest { payment_request: "lnbc1".to_string() };
        let err = server.handle_payment_prepare(request).await.unwrap_err();
        assert_eq!(err, GatewayError::NotRunning);
        assert_eq!(gateway_error(err).code(), NODE_UNAVAILABLE);
    }

    #[test]
    fn test_request_parsing() {
        let params = Params::new(Some(r#"{"id":"s1","price":7,"total_parts":"infinite"}"#));
        let request: StreamStartRequest = params.parse().unwrap();
        assert_eq!(request.id, "s1");
        assert_eq!(request.defaults.price, Some(7));
        assert_eq!(request.defaults.total_parts, Some(TotalParts::Infinite));
        assert!(request.defaults.destination.is_none());

        let params = Params::new(Some(r#"{"payment_request":"lnbc1"}"#));
        let request: PaymentSendRequest = params.parse().unwrap();
        assert!(request.amount.is_none());

        let params = Params::new(Some(r#"{"price":7}"#));
        assert!(params.parse::<StreamIdRequest>().is_err());
    }

    #[test]
    fn test_build_module() {
        let dir = TempDir::new().unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let module = build_module(server(&dir)).unwrap();
        let names: Vec<&str> = module.method_names().collect();
        assert!(names.contains(&RpcMethods::StreamAdd.as_str()));
        assert!(names.contains(&RpcMethods::PaymentSend.as_str()));
        assert_eq!(names.len(), 10);
    }
}
