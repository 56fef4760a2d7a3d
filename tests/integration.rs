//! Integration tests for zabbix-sender.
//!
//! These tests run both senders against scripted trapper servers on
//! loopback TCP.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use zabbix_sender::outcome::{ConnectionErrorKind, ProtocolErrorKind};
use zabbix_sender::protocol::{decode_length, encode_frame, HEADER_SIZE, MAGIC, MAGIC_SIZE};
use zabbix_sender::{BlockingSender, DataPoint, SendOutcome, Sender, SenderConfig, SenderError};

/// Route the crate's logs to the test output; `RUST_LOG=zabbix_sender=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ok_reply(processed: u64, failed: u64) -> Vec<u8> {
    let body = json!({
        "response": "success",
        "info": format!(
            "processed: {}; failed: {}; total: {}; seconds spent: 0.000042",
            processed,
            failed,
            processed + failed
        ),
    });
    encode_frame(body.to_string().as_bytes())
}

fn config(port: u16) -> SenderConfig {
    init_tracing();
    SenderConfig {
        port,
        timeout: Duration::from_secs(2),
        ..SenderConfig::default()
    }
}

/// Port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn parse_request(header: &[u8; HEADER_SIZE], payload: &[u8]) -> Value {
    assert_eq!(&header[..MAGIC_SIZE], &MAGIC);
    let length = decode_length(&header[MAGIC_SIZE..]).unwrap();
    assert_eq!(payload.len(), length as usize);
    serde_json::from_slice(payload).unwrap()
}

/// Blocking trapper server: one reply per accepted connection, in order.
/// Returns the decoded requests.
fn spawn_server(replies: Vec<Vec<u8>>) -> (u16, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = std::thread::spawn(move || {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().unwrap();

            let mut header = [0u8; HEADER_SIZE];
            stream.read_exact(&mut header).unwrap();
            let length = decode_length(&header[MAGIC_SIZE..]).unwrap();
            let mut payload = vec![0u8; length as usize];
            stream.read_exact(&mut payload).unwrap();
            requests.push(parse_request(&header, &payload));

            stream.write_all(&reply).unwrap();
            // The client closes first.
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest);
        }
        requests
    });

    (port, handle)
}

/// Async trapper server writing each reply in `piece`-byte writes.
async fn spawn_async_server(
    replies: Vec<Vec<u8>>,
    piece: usize,
) -> (u16, tokio::task::JoinHandle<Vec<Value>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.set_nodelay(true).unwrap();

            let mut header = [0u8; HEADER_SIZE];
            stream.read_exact(&mut header).await.unwrap();
            let length = decode_length(&header[MAGIC_SIZE..]).unwrap();
            let mut payload = vec![0u8; length as usize];
            stream.read_exact(&mut payload).await.unwrap();
            requests.push(parse_request(&header, &payload));

            for part in reply.chunks(piece) {
                stream.write_all(part).await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            let mut rest = Vec::new();
            let _ = stream.read_to_end(&mut rest).await;
        }
        requests
    });

    (port, handle)
}

#[test]
fn test_blocking_one_by_one() {
    let (port, server) = spawn_server(vec![ok_reply(1, 0), ok_reply(0, 1), ok_reply(1, 0)]);
    let mut sender = BlockingSender::new(config(port));
    sender.add_data("web01", "cpu.load", 0.5, Some(1_700_000_000));
    sender.add_data("web01", "status", "up", None);
    sender.add_data("web02", "proc.count", 211, None);

    let outcomes = sender.send_one_by_one();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(SendOutcome::is_success));
    assert_eq!(outcomes[1].reply().unwrap().info.failed, 1);

    let requests = server.join().unwrap();
    assert_eq!(
        requests[0],
        json!({
            "request": "sender data",
            "data": [{"host": "web01", "key": "cpu.load", "value": 0.5, "clock": 1_700_000_000}]
        })
    );
    assert_eq!(requests[1]["data"][0]["value"], "up");
    assert_eq!(requests[2]["data"][0]["host"], "web02");

    // Sending leaves the buffer alone.
    assert_eq!(sender.data().len(), 3);
}

#[test]
fn test_blocking_strict_policy() {
    let (port, server) = spawn_server(vec![ok_reply(2, 1)]);
    let mut config = config(port);
    config.failure_policy = zabbix_sender::FailurePolicy::Strict;
    let sender = BlockingSender::new(config);

    let result = sender
        .send_single(DataPoint::new("web01", "bad.key", 1))
        .into_result();

    match result {
        Err(SenderError::DataRejected { info, .. }) => {
            assert_eq!((info.processed, info.failed), (2, 1));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    server.join().unwrap();
}

#[test]
fn test_blocking_bad_magic() {
    let (port, server) = spawn_server(vec![b"HTTP/1.1 400 Bad Request\r\n\r\n".to_vec()]);
    let sender = BlockingSender::new(config(port));

    let outcome = sender.send_single(DataPoint::new("h", "k", 1));

    assert!(matches!(
        outcome,
        SendOutcome::ProtocolError {
            kind: ProtocolErrorKind::MalformedFrame,
            ..
        }
    ));
    server.join().unwrap();
}

#[test]
fn test_blocking_unparseable_reply() {
    let reply = encode_frame(br#"{"response":"failed","info":"Unknown request"}"#);
    let (port, server) = spawn_server(vec![reply]);
    let sender = BlockingSender::new(config(port));

    let outcome = sender.send_single(DataPoint::new("h", "k", 1));

    match &outcome {
        SendOutcome::ProtocolError {
            kind: ProtocolErrorKind::UnparseableResponse,
            response: Some(response),
            ..
        } => assert_eq!(response["response"], "failed"),
        other => panic!("unexpected outcome: {}", other),
    }
    server.join().unwrap();
}

#[test]
fn test_blocking_connection_refused() {
    let mut sender = BlockingSender::new(config(closed_port()));
    sender.add_data("h", "k", 1, None);
    sender.add_data("h", "k", 2, None);

    let outcomes = sender.send_one_by_one();

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(matches!(
            outcome,
            SendOutcome::ConnectionError {
                kind: ConnectionErrorKind::Connect,
                ..
            }
        ));
    }
}

#[test]
fn test_blocking_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // Read the request, never answer.
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest);
    });

    let sender = BlockingSender::new(SenderConfig {
        timeout: Duration::from_millis(200),
        ..config(port)
    });

    let outcome = sender.send_single(DataPoint::new("h", "k", 1));

    assert!(matches!(
        outcome,
        SendOutcome::ConnectionError {
            kind: ConnectionErrorKind::Timeout,
            ..
        }
    ));
    drop(sender);
    server.join().unwrap();
}

#[tokio::test]
async fn test_async_chunks_and_fragmented_replies() {
    let (port, server) = spawn_async_server(vec![ok_reply(2, 0); 3], 5).await;
    let mut sender = Sender::new(config(port));
    for i in 0..6 {
        sender.add_data("web01", format!("item[{}]", i), i, None);
    }

    let outcomes = sender.send_data(Some(1_365_787_627), Some(2)).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(SendOutcome::is_success));
    assert_eq!(outcomes[0].reply().unwrap().info.seconds_spent, Some(0.000042));

    let mut requests = server.await.unwrap();
    requests.sort_by_key(|r| r["data"][0]["value"].as_i64().unwrap());
    for (i, request) in requests.iter().enumerate() {
        assert_eq!(request["clock"], 1_365_787_627);
        assert_eq!(request["data"].as_array().unwrap().len(), 2);
        assert_eq!(request["data"][0]["value"], (i * 2) as i64);
    }
}

#[tokio::test]
async fn test_async_send_as_proxy() {
    let (port, server) = spawn_async_server(vec![ok_reply(1, 0)], 64).await;
    let sender = Sender::new(config(port));

    let point = DataPoint::new("h1", "k1", 5).with_clock(1000);
    let reply = sender
        .send_as_proxy(point, Some("proxyA"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(reply.info.processed, 1);
    assert_eq!(
        server.await.unwrap(),
        vec![json!({
            "request": "history data",
            "host": "proxyA",
            "data": [{"host": "h1", "key": "k1", "value": 5, "clock": 1000}]
        })]
    );
}

#[tokio::test]
async fn test_async_connection_refused() {
    let sender = Sender::new(config(closed_port()));

    let outcome = sender.send_single(DataPoint::new("h", "k", 1)).await;

    assert!(matches!(
        outcome,
        SendOutcome::ConnectionError {
            kind: ConnectionErrorKind::Connect,
            ..
        }
    ));
}

#[tokio::test]
async fn test_async_timeout() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let sender = Sender::builder()
        .port(port)
        .timeout(Duration::from_millis(200))
        .build();

    let outcome = sender.send_single(DataPoint::new("h", "k", 1)).await;

    assert!(matches!(
        outcome,
        SendOutcome::ConnectionError {
            kind: ConnectionErrorKind::Timeout,
            ..
        }
    ));
    server.await.unwrap();
}
