//! Seed scenario 5 (§8): a backend that always fails is marked not-alive after the failure
//! threshold, excluded from dispatch while dead, and tried again once the revival timer fires.

use std::time::Duration;

use actix_web::test::TestRequest;
use actix_web::web;
use golb_core::config::grammar::parse;
use golb_core::services::factory::Golb;
use golb_core::services::proxy::ProxyEngine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A minimal HTTP/1.1 server that answers every request with `200 OK` and closes the connection.
async fn spawn_ok_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok").await;
            });
        }
    });
    port
}

#[tokio::test]
async fn failing_backend_is_excluded_then_revived() {
    let ok_port_2 = spawn_ok_server().await;
    let ok_port_3 = spawn_ok_server().await;

    // Port 1 is privileged and unbound in any sandbox this test runs in, so connecting to it
    // fails immediately with connection-refused, standing in for a backend that is down.
    let config = parse(&format!(
        r#"
        upstream backend {{
            server http://127.0.0.1:1 weight=1
            server http://127.0.0.1:{} weight=1
            server http://127.0.0.1:{} weight=1
        }}
        method round_robin
        "#,
        ok_port_2, ok_port_3
    ))
    .unwrap();

    let mut golb = Golb::from_config(&config, None, None).unwrap();
    golb.revival_delay = Duration::from_millis(80);
    let proxy = ProxyEngine::new();
    let req = TestRequest::default().to_http_request();

    // Round robin visits backend index 0 on every third dispatch, so three full cycles
    // guarantee at least `failure_threshold` failed attempts against it.
    for _ in 0..golb.failure_threshold * 3 {
        let _ = proxy.forward(&golb, "backend", &req, web::Bytes::new()).await;
    }
    assert!(!golb.pool("backend").unwrap().backends[0].is_alive());
    let requests_while_dead = golb.pool("backend").unwrap().backends[0].request_count();

    for _ in 0..20 {
        let response = proxy.forward(&golb, "backend", &req, web::Bytes::new()).await.unwrap();
        assert!(response.status().is_success());
    }
    assert_eq!(golb.pool("backend").unwrap().backends[0].request_count(), requests_while_dead);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(golb.pool("backend").unwrap().backends[0].is_alive());
}

#[tokio::test]
async fn active_connections_return_to_zero_after_each_dispatch() {
    let ok_port = spawn_ok_server().await;
    let config = parse(&format!(
        "upstream backend {{\n  server http://127.0.0.1:{}\n}}\nmethod round_robin\n",
        ok_port
    ))
    .unwrap();
    let golb = Golb::from_config(&config, None, None).unwrap();
    let proxy = ProxyEngine::new();
    let req = TestRequest::default().to_http_request();

    for _ in 0..5 {
        proxy.forward(&golb, "backend", &req, web::Bytes::new()).await.unwrap();
        assert_eq!(golb.pool("backend").unwrap().backends[0].active_connections(), 0);
    }
}
