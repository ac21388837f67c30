//! Seed scenario 6 (§8): a client WebSocket upgrade is proxied end to end through a real
//! listening gateway to a real backend socket, with echo and close both propagating.

use std::time::Duration;

use actix_web::{web, App, HttpServer};
use futures_util::{SinkExt, StreamExt};
use golb_core::config::grammar::parse;
use golb_core::routes::http::configure_dispatch;
use golb_core::services::factory::Golb;
use golb_core::services::proxy::ProxyEngine;
use golb_core::services::websocket::WebSocketRegistry;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// A backend WebSocket server that echoes every text/binary frame and closes when asked to.
async fn spawn_echo_backend() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(socket).await else { return };
                let (mut write, mut read) = ws.split();
                while let Some(Ok(msg)) = read.next().await {
                    match msg {
                        Message::Close(_) => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                        other => {
                            if write.send(other).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    port
}

#[actix_web::test]
async fn client_websocket_is_proxied_with_echo_and_close() {
    let backend_port = spawn_echo_backend().await;

    let config = parse(&format!(
        "upstream backend {{\n  server http://127.0.0.1:{}\n}}\nmethod round_robin\n",
        backend_port
    ))
    .unwrap();
    let golb = web::Data::new(Golb::from_config(&config, None, None).unwrap());
    let proxy = web::Data::new(ProxyEngine::new());
    let registry = web::Data::new(WebSocketRegistry::new());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(golb.clone())
            .app_data(proxy.clone())
            .app_data(registry.clone())
            .configure(configure_dispatch)
    })
    .bind(("127.0.0.1", 0))
    .unwrap();
    let gateway_port = server.addrs()[0].port();
    let running = server.run();
    let handle = running.handle();
    actix_web::rt::spawn(running);

    let url = format!("ws://127.0.0.1:{}/socket", gateway_port);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.expect("client handshake failed");
    let (mut write, mut read) = ws_stream.split();

    write.send(Message::Text("ping".to_string())).await.unwrap();
    let echoed = tokio::time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("timed out waiting for echo")
        .expect("stream closed before echo")
        .unwrap();
    assert_eq!(echoed, Message::Text("ping".to_string()));

    write.send(Message::Close(None)).await.unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(5), read.next())
        .await
        .expect("timed out waiting for close propagation");
    match closed {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected close propagation, got {:?}", other),
    }

    handle.stop(true).await;
}
