//! Serves over a real socket

use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use trellis_core::*;

struct PingController;

impl Component for PingController {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.controller("/ping");
        meta.route("ping")
            .get("/")
            .handler(|_this: Arc<Self>, _args| async { Ok(json!({"pong": true})) });
        meta.route("echo")
            .post("/")
            .bind(0, Binding::body())
            .handler(|_this: Arc<Self>, args: Args| async move {
                Ok(args.value(0).cloned().unwrap_or_default())
            });
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(PingController)
    }
}

async fn start(config: AppConfig) -> std::net::SocketAddr {
    let server = Application::new(config)
        .register::<PingController>()
        .unwrap()
        .bootstrap()
        .await
        .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8_lossy(&out).into_owned()
}

#[tokio::test]
async fn test_get_over_http() {
    let addr = start(AppConfig::default().static_files(false)).await;
    let response = roundtrip(
        addr,
        "GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.to_ascii_lowercase().contains("x-request-id:"));
    assert!(response.ends_with(r#"{"pong":true}"#));
}

#[tokio::test]
async fn test_json_post_and_unknown_route() {
    let addr = start(AppConfig::default().static_files(false)).await;

    let body = r#"{"n":1}"#;
    let request = format!(
        "POST /ping HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let response = roundtrip(addr, &request).await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with(body));

    let response = roundtrip(
        addr,
        "GET /nowhere HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(response.ends_with("404"));
}
