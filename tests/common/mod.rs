//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost_reflect::{DescriptorPool, DynamicMessage, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use game_gateway::config::{GatewayConfig, PoolConfig};
use game_gateway::pool::{ConnectivityState, Connector, RpcConnection, StateCell};
use game_gateway::registry::{MemoryRegistry, ServiceInstance};
use game_gateway::schema::{ResolvedMethod, SchemaRegistry};
use game_gateway::{Gateway, GatewayError, GatewayResult, HttpServer, WebSocketServer};

fn field(name: &str, json: &str, number: i32, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        json_name: Some(json.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(Into::into),
        ..Default::default()
    }
}

/// `game.leaderboard` with `LeaderboardService.GetTop(GetTopRequest) → GetTopResponse`.
pub fn leaderboard_pool() -> DescriptorPool {
    let mut entries = field("entries", "entries", 1, Type::Message, Some(".game.leaderboard.Entry"));
    entries.label = Some(Label::Repeated as i32);

    let file = FileDescriptorProto {
        name: Some("game/leaderboard.proto".into()),
        package: Some("game.leaderboard".into()),
        syntax: Some("proto3".into()),
        message_type: vec![
            DescriptorProto {
                name: Some("Entry".into()),
                field: vec![
                    field("user_id", "userId", 1, Type::Int64, None),
                    field("name", "name", 2, Type::String, None),
                    field("score", "score", 3, Type::Int64, None),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("GetTopRequest".into()),
                field: vec![field("count", "count", 1, Type::Int32, None)],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("GetTopResponse".into()),
                field: vec![entries],
                ..Default::default()
            },
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("LeaderboardService".into()),
            method: vec![MethodDescriptorProto {
                name: Some("GetTop".into()),
                input_type: Some(".game.leaderboard.GetTopRequest".into()),
                output_type: Some(".game.leaderboard.GetTopResponse".into()),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    };

    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
}

/// Backend behavior: returns `count` entries named `player-{i}` with
/// descending scores, or fails every call when `failing` is set.
pub struct LeaderboardConnection {
    state: StateCell,
    calls: AtomicUsize,
    failing: bool,
}

impl LeaderboardConnection {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcConnection for LeaderboardConnection {
    fn state(&self) -> ConnectivityState {
        self.state.get()
    }

    async fn invoke(&self, method: &ResolvedMethod, request: DynamicMessage) -> Result<DynamicMessage, tonic::Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(tonic::Status::unavailable("leaderboard shard offline"));
        }

        let count = request
            .get_field_by_name("count")
            .and_then(|v| v.as_i32())
            .unwrap_or(0);
        let entry_type = method
            .output()
            .get_field_by_name("entries")
            .and_then(|f| f.kind().as_message().cloned())
            .unwrap();

        let entries = (0..count)
            .map(|i| {
                let mut entry = DynamicMessage::new(entry_type.clone());
                entry.set_field_by_name("user_id", Value::I64(i as i64 + 1));
                entry.set_field_by_name("name", Value::String(format!("player-{}", i + 1)));
                entry.set_field_by_name("score", Value::I64(1000 - i as i64 * 10));
                Value::Message(entry)
            })
            .collect();

        let mut response = method.new_response();
        response.set_field_by_name("entries", Value::List(entries));
        Ok(response)
    }

    fn close(&self) {
        self.state.set(ConnectivityState::Shutdown);
    }
}

/// Connector that records every dial.
#[derive(Default)]
pub struct RecordingConnector {
    dials: Mutex<HashMap<String, Vec<Arc<LeaderboardConnection>>>>,
    refused: Mutex<Vec<String>>,
    failing_backend: bool,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dialed connection answers with an error status.
    pub fn failing_backend() -> Self {
        Self {
            failing_backend: true,
            ..Self::default()
        }
    }

    pub fn refuse(&self, address: &str) {
        self.refused.lock().unwrap().push(address.to_string());
    }

    pub fn dials(&self, address: &str) -> usize {
        self.dials.lock().unwrap().get(address).map_or(0, Vec::len)
    }

    pub fn total_dials(&self) -> usize {
        self.dials.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn total_calls(&self) -> usize {
        self.dials
            .lock()
            .unwrap()
            .values()
            .flatten()
            .map(|c| c.calls())
            .sum()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, address: &str, _config: &PoolConfig) -> GatewayResult<Arc<dyn RpcConnection>> {
        if self.refused.lock().unwrap().iter().any(|a| a == address) {
            return Err(GatewayError::Dial {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }

        let conn = Arc::new(LeaderboardConnection {
            state: StateCell::new(ConnectivityState::Ready),
            calls: AtomicUsize::new(0),
            failing: self.failing_backend,
        });
        self.dials
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(conn.clone());
        Ok(conn)
    }
}

pub fn leaderboard_instance() -> ServiceInstance {
    ServiceInstance::new("leaderboard-0", "leaderboard", "10.0.0.5", 9000)
}

/// Both servers running on ephemeral loopback ports.
pub struct TestGateway {
    pub gateway: Arc<Gateway>,
    pub registry: Arc<MemoryRegistry>,
    pub connector: Arc<RecordingConnector>,
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    listeners: CancellationToken,
}

impl TestGateway {
    pub async fn start(instances: Vec<ServiceInstance>) -> Self {
        Self::start_with(instances, GatewayConfig::default(), RecordingConnector::new()).await
    }

    pub async fn start_with(
        instances: Vec<ServiceInstance>,
        config: GatewayConfig,
        connector: RecordingConnector,
    ) -> Self {
        let registry = Arc::new(MemoryRegistry::with_instances(instances));
        let connector = Arc::new(connector);
        let schemas = SchemaRegistry::new(leaderboard_pool(), &HashMap::new());
        let gateway = Arc::new(Gateway::new(config, registry.clone(), Arc::new(schemas), connector.clone()));

        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_addr = http_listener.local_addr().unwrap();
        let ws_addr = ws_listener.local_addr().unwrap();

        let listeners = CancellationToken::new();
        tokio::spawn(HttpServer::new(gateway.clone()).run(http_listener, listeners.clone()));
        tokio::spawn(WebSocketServer::new(gateway.clone()).run(ws_listener, listeners.clone()));

        Self {
            gateway,
            registry,
            connector,
            http_addr,
            ws_addr,
            listeners,
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("http://{}/api/{}", self.http_addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.ws_addr)
    }

    pub async fn stop(&self) {
        self.listeners.cancel();
        self.gateway.shutdown().await;
    }
}

/// Serialized `GetTopRequest { count }`.
pub fn get_top_payload(count: i32) -> Vec<u8> {
    use prost::Message;

    let descriptor = leaderboard_pool()
        .get_message_by_name("game.leaderboard.GetTopRequest")
        .unwrap();
    let mut request = DynamicMessage::new(descriptor);
    request.set_field_by_name("count", Value::I32(count));
    request.encode_to_vec()
}

/// Names in a serialized `GetTopResponse`.
pub fn entry_names(payload: &[u8]) -> Vec<String> {
    let descriptor = leaderboard_pool()
        .get_message_by_name("game.leaderboard.GetTopResponse")
        .unwrap();
    let response = DynamicMessage::decode(descriptor, payload).unwrap();
    response
        .get_field_by_name("entries")
        .unwrap()
        .as_list()
        .unwrap()
        .iter()
        .map(|entry| {
            entry
                .as_message()
                .unwrap()
                .get_field_by_name("name")
                .unwrap()
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect()
}
