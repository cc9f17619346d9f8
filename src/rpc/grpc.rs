//! gRPC transport over `tonic`.
//!
//! # Responsibilities
//! - Dial backend addresses with the pool's keep-alive and timeout options
//! - Run unary calls for descriptor-resolved methods
//! - Track connectivity state for the pool's staleness check
//!
//! # Design Decisions
//! - No generated stubs: a codec encodes/decodes `DynamicMessage` by descriptor
//! - State is tracked passively from call outcomes

use std::sync::Arc;

use async_trait::async_trait;
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

use crate::config::PoolConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pool::{ConnectivityState, Connector, RpcConnection, StateCell};
use crate::schema::ResolvedMethod;

/// Dials plaintext HTTP/2 gRPC channels.
#[derive(Debug, Default, Clone)]
pub struct GrpcConnector;

impl GrpcConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    async fn connect(&self, address: &str, config: &PoolConfig) -> GatewayResult<Arc<dyn RpcConnection>> {
        let dial_error = |reason: String| GatewayError::Dial {
            address: address.to_string(),
            reason,
        };

        let endpoint = Endpoint::from_shared(format!("http://{}", address))
            .map_err(|e| dial_error(e.to_string()))?
            .connect_timeout(config.connect_timeout())
            .tcp_keepalive(Some(config.keepalive()))
            .http2_keep_alive_interval(config.keepalive())
            .keep_alive_timeout(config.keepalive_timeout())
            .keep_alive_while_idle(true);

        let channel = endpoint.connect().await.map_err(|e| dial_error(e.to_string()))?;

        tracing::debug!(address = %address, "gRPC channel established");
        Ok(Arc::new(GrpcConnection {
            channel,
            state: StateCell::new(ConnectivityState::Ready),
            max_message_bytes: config.max_message_bytes,
        }))
    }
}

/// One HTTP/2 channel to a backend instance.
pub struct GrpcConnection {
    channel: Channel,
    state: StateCell,
    max_message_bytes: usize,
}

#[async_trait]
impl RpcConnection for GrpcConnection {
    fn state(&self) -> ConnectivityState {
        self.state.get()
    }

    async fn invoke(&self, method: &ResolvedMethod, request: DynamicMessage) -> Result<DynamicMessage, Status> {
        let mut client = tonic::client::Grpc::new(self.channel.clone())
            .max_decoding_message_size(self.max_message_bytes)
            .max_encoding_message_size(self.max_message_bytes);

        if let Err(e) = client.ready().await {
            self.state.set(ConnectivityState::TransientFailure);
            return Err(Status::unavailable(format!("channel not ready: {}", e)));
        }

        let path = PathAndQuery::from_maybe_shared(method.path())
            .map_err(|e| Status::internal(format!("invalid method path: {}", e)))?;

        match client.unary(Request::new(request), path, DynamicCodec::new(method.output())).await {
            Ok(response) => {
                self.state.set(ConnectivityState::Ready);
                Ok(response.into_inner())
            }
            Err(status) => {
                if status.code() == Code::Unavailable {
                    self.state.set(ConnectivityState::TransientFailure);
                }
                Err(status)
            }
        }
    }

    fn close(&self) {
        // The channel's background connection task ends when the last clone drops.
        self.state.set(ConnectivityState::Shutdown);
    }
}

/// Codec for `DynamicMessage` requests and responses.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    response: MessageDescriptor,
}

impl DynamicCodec {
    pub fn new(response: MessageDescriptor) -> Self {
        Self { response }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;
    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.response.clone())
    }
}

#[derive(Debug)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("encode failed: {}", e)))
    }
}

#[derive(Debug)]
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        DynamicMessage::decode(self.0.clone(), src)
            .map(Some)
            .map_err(|e| Status::internal(format!("decode failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dial_refused() {
        let config = PoolConfig {
            connect_timeout_secs: 1,
            ..PoolConfig::default()
        };
        // Port 1 on loopback is reserved and closed.
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            GrpcConnector::new().connect("127.0.0.1:1", &config),
        )
        .await
        .expect("dial resolves within the connect timeout");

        match result {
            Err(GatewayError::Dial { address, .. }) => assert_eq!(address, "127.0.0.1:1"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("dial to a closed port succeeded"),
        }
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = GrpcConnector::new().connect("not a host", &PoolConfig::default()).await;
        assert!(matches!(result, Err(GatewayError::Dial { .. })));
    }
}
