mod utils;
#[allow(unused)]
use utils::*;

use futures_util::{SinkExt, StreamExt};
use mock_store::{Behavior, MockConnector};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, msg: Value) {
    ws.send(Message::Text(msg.to_string())).await.unwrap();
}

async fn next_json(ws: &mut Client) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// Read until an `event` named `name` arrives; returns everything read.
async fn until(ws: &mut Client, name: &str) -> Vec<Value> {
    let mut seen = vec![];
    loop {
        let msg = next_json(ws).await;
        let done = msg["event"] == name;
        seen.push(msg);
        if done {
            return seen;
        }
    }
}

async fn get_json(addr: SocketAddr, path: &str) -> Value {
    reqwest::get(format!("http://{addr}{path}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn health_reports_no_sessions() {
    init();
    let addr = spawn_relay(MockConnector::default()).await;

    let health = get_json(addr, "/api/health").await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["activeSessions"], 0);
    assert!(health["timestamp"].is_string());

    assert_eq!(get_json(addr, "/api/sessions").await, json!([]));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn full_session_over_websocket() {
    init();
    let addr = spawn_relay(MockConnector::default()).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        json!({
            "type": "startTest",
            "config": {"testDuration": 1, "testTypes": ["set"], "password": "hunter2"}
        }),
    )
    .await;

    let seen = until(&mut ws, "completed").await;
    assert_eq!(seen[0]["event"], "started");
    assert!(seen[0]["data"]["sessionId"].is_string());
    assert!(seen[0]["data"]["config"].get("password").is_none());

    let result = seen.iter().find(|m| m["event"] == "result").unwrap();
    assert_eq!(result["data"]["operation"], "SET");
    assert_eq!(result["data"]["iterations"], 1000);

    let completed = seen.last().unwrap();
    assert_eq!(completed["data"]["summary"]["totalOperations"], 1000);
    assert_eq!(completed["data"]["details"]["SET"]["successes"], 1000);

    send(&mut ws, json!({"type": "getTestStatus"})).await;
    let status = next_json(&mut ws).await;
    assert_eq!(status["event"], "status");
    assert_eq!(status["data"]["status"], "completed");

    let sessions = get_json(addr, "/api/sessions").await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["status"], "completed");
    assert_eq!(sessions[0]["id"], seen[0]["data"]["sessionId"]);
    assert!(sessions[0]["config"].get("password").is_none());
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn invalid_config_is_reported() {
    init();
    let addr = spawn_relay(MockConnector::default()).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        json!({"type": "startTest", "config": {"port": 0, "testTypes": ["scan"]}}),
    )
    .await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["event"], "invalid");
    assert_eq!(reply["data"]["errors"].as_array().unwrap().len(), 2);

    send(&mut ws, json!({"type": "getTestStatus"})).await;
    let status = next_json(&mut ws).await;
    assert_eq!(status, json!({"event": "status", "data": {"status": "idle"}}));

    send(
        &mut ws,
        json!({"type": "startTest", "config": {"port": true, "testTypes": ["set"]}}),
    )
    .await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["event"], "invalid");
    assert_eq!(reply["data"]["errors"], json!(["port must be a number"]));

    ws.send(Message::Text("not json".into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["event"], "invalid");
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn second_start_is_rejected_and_stop_is_honored() {
    init();
    let addr = spawn_relay(MockConnector::new(Behavior {
        latency: Duration::from_millis(1),
        ..Default::default()
    }))
    .await;
    let mut ws = connect(addr).await;

    let start = json!({
        "type": "startTest",
        "config": {"testDuration": 1, "testTypes": ["set", "get"]}
    });
    send(&mut ws, start.clone()).await;
    send(&mut ws, start).await;

    let seen = until(&mut ws, "rejected").await;
    assert!(seen.iter().all(|m| m["event"] != "completed"));

    send(&mut ws, json!({"type": "stopTest"})).await;
    let seen = until(&mut ws, "stopped").await;
    assert!(seen.iter().all(|m| m["event"] != "completed"));

    send(&mut ws, json!({"type": "getTestStatus"})).await;
    let status = next_json(&mut ws).await;
    assert_eq!(status["data"]["status"], "stopped");
}

#[tokio::test]
#[ntest::timeout(30_000)]
async fn disconnect_removes_session() {
    init();
    let connector = MockConnector::new(Behavior {
        latency: Duration::from_millis(1),
        ..Default::default()
    });
    let addr = spawn_relay(connector.clone()).await;
    let mut ws = connect(addr).await;

    send(
        &mut ws,
        json!({"type": "startTest", "config": {"testDuration": 2}}),
    )
    .await;
    until(&mut ws, "started").await;
    assert_eq!(get_json(addr, "/api/health").await["activeSessions"], 1);

    ws.close(None).await.unwrap();
    drop(ws);

    loop {
        let health = get_json(addr, "/api/health").await;
        if health["activeSessions"] == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(get_json(addr, "/api/sessions").await, json!([]));

    // The abandoned session winds down at the next operation boundary.
    loop {
        if connector.state().lock().unwrap().closed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
