//! Failure injection: refused dials, failing backends, open circuits.

use game_gateway::config::GatewayConfig;
use game_gateway::registry::{Registry, ServiceInstance};
use game_gateway::websocket::WsMessage;

mod common;

use common::{get_top_payload, leaderboard_instance, RecordingConnector, TestGateway};

#[tokio::test]
async fn test_refused_dial_is_not_cached() {
    let connector = RecordingConnector::new();
    connector.refuse("10.0.0.5:9000");
    let gw = TestGateway::start_with(vec![leaderboard_instance()], GatewayConfig::default(), connector).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client
            .post(gw.api_url("leaderboard/GetTop"))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 500);
        assert!(res.text().await.unwrap().contains("10.0.0.5:9000"));
    }

    assert_eq!(gw.connector.total_dials(), 0);
    assert_eq!(gw.gateway.pools().pool_for("leaderboard").len().await, 0);
    gw.stop().await;
}

#[tokio::test]
async fn test_backend_status_surfaces_verbatim() {
    let gw = TestGateway::start_with(
        vec![leaderboard_instance()],
        GatewayConfig::default(),
        RecordingConnector::failing_backend(),
    )
    .await;

    let res = reqwest::Client::new()
        .post(gw.api_url("leaderboard/GetTop"))
        .body(r#"{"count": 1}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    assert!(res.text().await.unwrap().contains("leaderboard shard offline"));
    gw.stop().await;
}

#[tokio::test]
async fn test_instance_removed_at_runtime() {
    let gw = TestGateway::start(vec![leaderboard_instance()]).await;
    let client = reqwest::Client::new();
    let url = gw.api_url("leaderboard/GetTop");

    let res = client.post(&url).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 200);

    gw.registry.deregister(&leaderboard_instance()).await.unwrap();

    let res = client.post(&url).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 503);

    gw.registry
        .register(ServiceInstance::new("leaderboard-2", "leaderboard", "10.0.0.7", 9000))
        .await
        .unwrap();

    let res = client.post(&url).body("{}").send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(gw.connector.dials("10.0.0.7:9000"), 1);
    gw.stop().await;
}

#[tokio::test]
async fn test_circuit_opens_on_websocket_path() {
    let mut config = GatewayConfig::default();
    config.circuit_breaker.enabled = true;
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.recovery_timeout_secs = 60;
    let gw = TestGateway::start_with(
        vec![leaderboard_instance()],
        config,
        RecordingConnector::failing_backend(),
    )
    .await;
    let cancel = gw.gateway.shutdown_token();
    let envelope = WsMessage::new("leaderboard", "GetTop", get_top_payload(1));

    for _ in 0..2 {
        assert!(gw.gateway.call_envelope(&cancel, &envelope).await.is_err());
    }
    assert_eq!(gw.connector.total_calls(), 2);

    let err = gw.gateway.call_envelope(&cancel, &envelope).await.unwrap_err();
    assert!(err.to_string().contains("circuit"), "error: {}", err);
    assert_eq!(gw.connector.total_calls(), 2);

    gw.stop().await;
}
