use logrelay::config::{TransportConfig, TransportMode};
use logrelay::delivery::{DeliveryEngine, ErrorKind};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;

fn loopback_config(port: u16, mode: TransportMode) -> TransportConfig {
    TransportConfig {
        host: "127.0.0.1".to_string(),
        port,
        mode,
        connect_timeout: Duration::from_secs(2),
        max_retry_attempts: 2,
        retry_delay: Duration::ZERO,
        batch_size: 2,
    }
}

/// Accepts connections and forwards every received line, in arrival order.
async fn line_collector() -> (u16, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stream).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
    });

    (port, rx)
}

async fn next_record(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a line")
        .expect("collector stopped");
    serde_json::from_str(&line).expect("each line is one JSON object")
}

/// A port nothing listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_reliable_delivery_preserves_order_and_framing() {
    let (port, mut rx) = line_collector().await;
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    let records: Vec<Value> = (0..5)
        .map(|i| json!({ "message": format!("record {}", i) }))
        .collect();
    let result = engine.send_in_batches(&records, None).await;

    assert_eq!(result.sent, 5);
    assert_eq!(result.failed, 0);
    assert_eq!(result.chunks, 3);

    for i in 0..5 {
        let record = next_record(&mut rx).await;
        assert_eq!(record["message"], format!("record {}", i));
        assert_eq!(record["level"], "INFO");
        assert!(record["@timestamp"].is_string());
    }

    let stats = engine.stats().snapshot();
    assert_eq!(stats.total_sent, 5);
    assert_eq!(stats.total_retries, 0);
    assert!(stats.last_success_at.is_some());
    assert!(engine.is_connected().await);
}

#[tokio::test]
async fn test_existing_fields_are_not_overwritten() {
    let (port, mut rx) = line_collector().await;
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    let record = json!({
        "message": "disk full",
        "level": "ERROR",
        "@timestamp": "2024-01-15T10:30:00.000Z",
    });
    let outcome = engine.send_one(&record).await;
    assert!(outcome.accepted);
    assert_eq!(outcome.attempts_made, 1);

    let received = next_record(&mut rx).await;
    assert_eq!(received["level"], "ERROR");
    assert_eq!(received["@timestamp"], "2024-01-15T10:30:00.000Z");
}

#[tokio::test]
async fn test_unreachable_aggregator_exhausts_retry_budget() {
    let port = closed_port().await;
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    let outcome = engine.send_one(&json!({ "message": "lost" })).await;

    assert!(!outcome.accepted);
    assert_eq!(outcome.attempts_made, 3);
    assert_eq!(outcome.error.map(|e| e.kind()), Some(ErrorKind::Connect));

    let stats = engine.stats().snapshot();
    assert_eq!(stats.total_sent, 0);
    assert_eq!(stats.total_failed, 1);
    assert_eq!(stats.total_retries, 2);
    assert!(stats.last_error.is_some());
    assert!(!engine.is_connected().await);
}

#[tokio::test]
async fn test_reconnects_after_aggregator_comes_back() {
    let port = closed_port().await;
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    let first = engine.send_one(&json!({ "message": "early" })).await;
    assert!(!first.accepted);

    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    let accept = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        lines.next_line().await.unwrap()
    });

    let second = engine.send_one(&json!({ "message": "late" })).await;
    assert!(second.accepted);

    let line = accept.await.unwrap().expect("one line received");
    let record: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(record["message"], "late");
}

#[tokio::test]
async fn test_health_check_reports_unreachable_aggregator() {
    let port = closed_port().await;
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    let health = engine.health_check().await;

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["status"], "unhealthy");
    assert_eq!(json["connected"], false);
    assert_eq!(json["host"], "127.0.0.1");
    assert_eq!(json["mode"], "reliable");
    assert!(json["error"].is_string());
    assert!(engine.stats().snapshot().last_error.is_some());
}

#[tokio::test]
async fn test_best_effort_sends_one_datagram_per_record() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();
    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::BestEffort)).unwrap();

    let records = vec![json!({ "message": "one" }), json!({ "message": "two" })];
    let result = engine.send_many(&records).await;
    assert_eq!(result.sent, 2);

    let mut buf = vec![0u8; 65_536];
    for expected in ["one", "two"] {
        let n = tokio::time::timeout(Duration::from_secs(5), socket.recv(&mut buf))
            .await
            .expect("timed out waiting for a datagram")
            .unwrap();
        assert_eq!(buf[n - 1], b'\n');
        let record: Value = serde_json::from_slice(&buf[..n - 1]).unwrap();
        assert_eq!(record["message"], expected);
    }
}

#[tokio::test]
async fn test_record_after_aggregator_hangup_is_redelivered() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (hung_up_tx, hung_up_rx) = tokio::sync::oneshot::channel();
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, String)>();

    tokio::spawn(async move {
        // First connection: take one line, then hang up
        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        tx.send((1, first)).unwrap();
        drop(lines);
        let _ = hung_up_tx.send(());

        let (stream, _) = listener.accept().await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send((2, line)).is_err() {
                break;
            }
        }
    });

    let engine = DeliveryEngine::new(loopback_config(port, TransportMode::Reliable)).unwrap();

    assert!(engine.send_one(&json!({ "message": "a" })).await.accepted);
    hung_up_rx.await.unwrap();
    // Let the FIN reach the sender before the next write
    tokio::time::sleep(Duration::from_millis(100)).await;

    let outcome = engine.send_one(&json!({ "message": "b" })).await;
    assert!(outcome.accepted);
    assert!(outcome.attempts_made >= 2);

    let mut received = Vec::new();
    for _ in 0..2 {
        let (connection, line) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        let record: Value = serde_json::from_str(&line).unwrap();
        received.push((connection, record["message"].as_str().unwrap().to_string()));
    }
    assert_eq!(
        received,
        vec![(1, "a".to_string()), (2, "b".to_string())]
    );

    let stats = engine.stats().snapshot();
    assert_eq!(stats.total_sent, 2);
    assert_eq!(stats.total_failed, 0);
    assert!(stats.total_retries >= 1);
}
