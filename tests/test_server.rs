mod common;

use std::sync::Arc;

use common::{Client, config_for, connect, sample_root, server_for};
use lantern::channel::{ChannelSwitch, TcpSwitch};
use lantern::handler::{Handled, Handler, HandlerFuture};
use lantern::http::response::{Response, StatusCode};
use lantern::http::session::{BodyFraming, Session};
use lantern::server::Server;

/// Claims requests for one path and answers with a fixed body.
struct Fixed {
    path: &'static str,
    body: &'static str,
}

impl Handler for Fixed {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !session.request().path.starts_with(self.path) {
                return Ok(Handled::No);
            }
            session.send_response(Response::ok(self.body)).await?;
            Ok(Handled::Yes)
        })
    }
}

/// Echoes the request body back, like an RPC endpoint.
struct Echo;

impl Handler for Echo {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if session.request().path != "/RPC2" {
                return Ok(Handled::No);
            }
            let body = session.read_body(1024).await?;
            session.add_header("Content-Type", "text/xml");
            session.write_head(BodyFraming::Length(body.len() as u64)).await?;
            session.write_body(&body).await?;
            session.end_body().await?;
            Ok(Handled::Yes)
        })
    }
}

/// Streams a body in several chunks.
struct Streamer;

impl Handler for Streamer {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if session.request().path != "/stream" {
                return Ok(Handled::No);
            }
            session.write_head(BodyFraming::Chunked).await?;
            for part in ["one ", "two ", "three"] {
                session.write_body(part.as_bytes()).await?;
            }
            session.end_body().await?;
            Ok(Handled::Yes)
        })
    }
}

struct Failing;

impl Handler for Failing {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if session.request().path != "/fail" {
                return Ok(Handled::No);
            }
            anyhow::bail!("backend unavailable")
        })
    }
}

/// Claims the request but leaves the response to the engine.
struct StatusOnly;

impl Handler for StatusOnly {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            if session.request().path != "/created" {
                return Ok(Handled::No);
            }
            session.set_status(StatusCode::Created);
            Ok(Handled::Yes)
        })
    }
}

struct NeverHandles;

impl Handler for NeverHandles {
    fn handle<'a>(&'a self, _session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move { Ok(Handled::No) })
    }
}

fn server_with(handlers: Vec<Box<dyn Handler>>) -> (tempfile::TempDir, Arc<Server>) {
    let root = sample_root();
    let mut server = Server::new(config_for(root.path())).unwrap();
    for handler in handlers {
        server.add_handler(handler);
    }
    (root, Arc::new(server))
}

#[tokio::test]
async fn test_latest_handler_wins() {
    let (_root, server) = server_with(vec![
        Box::new(Fixed { path: "/api", body: "older" }),
        Box::new(Fixed { path: "/api", body: "newer" }),
    ]);
    let mut client = connect(&server);

    let resp = client.request("GET /api/x HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.text(), "newer");
}

#[tokio::test]
async fn test_unclaimed_requests_reach_default_handler() {
    let (_root, server) = server_with(vec![Box::new(Fixed { path: "/api", body: "api" })]);
    let mut client = connect(&server);

    let resp = client.request("GET /docs/a.txt HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.text(), "aaaaaaaaaa");
}

#[tokio::test]
async fn test_no_handler_claims_request() {
    let root = sample_root();
    let mut server = Server::new(config_for(root.path())).unwrap();
    server.set_default_handler(Box::new(NeverHandles));
    let server = Arc::new(server);
    let mut client = connect(&server);

    let resp = client.request("GET /docs/a.txt HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.status, 404);
}

#[tokio::test]
async fn test_request_body_echo() {
    let (_root, server) = server_with(vec![Box::new(Echo)]);
    let mut client = connect(&server);

    let call = "<methodCall><methodName>ping</methodName></methodCall>";
    let resp = client
        .request(&format!(
            "POST /RPC2 HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{}",
            call.len(),
            call
        ))
        .await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Content-Type"), Some("text/xml"));
    assert_eq!(resp.text(), call);

    let resp = client
        .request("POST /RPC2 HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nping\r\n0\r\n\r\n")
        .await;
    assert_eq!(resp.text(), "ping");
}

#[tokio::test]
async fn test_request_body_over_limit() {
    let (_root, server) = server_with(vec![Box::new(Echo)]);
    let mut client = connect(&server);

    let body = "x".repeat(2048);
    let resp = client
        .request(&format!(
            "POST /RPC2 HTTP/1.1\r\nHost: test\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        ))
        .await;

    assert_eq!(resp.status, 413);
    assert_eq!(resp.header("Connection"), Some("close"));
}

#[tokio::test]
async fn test_chunked_handler_output() {
    let (_root, server) = server_with(vec![Box::new(Streamer)]);
    let mut client = connect(&server);

    let resp = client.request("GET /stream HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.header("Transfer-Encoding"), Some("chunked"));
    assert_eq!(resp.text(), "one two three");
}

#[tokio::test]
async fn test_handler_error_becomes_500() {
    let (_root, server) = server_with(vec![Box::new(Failing)]);
    let mut client = connect(&server);

    let resp = client.request("GET /fail HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(resp.status, 500);

    let resp = client.request("GET /docs/a.txt HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_status_only_response() {
    let (_root, server) = server_with(vec![Box::new(StatusOnly)]);
    let mut client = connect(&server);

    let resp = client.request("GET /created HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.status, 201);
    assert_eq!(resp.header("Content-Length"), Some("0"));
}

#[tokio::test]
async fn test_options_is_answered_generically() {
    let (_root, server) = server_with(vec![Box::new(Fixed { path: "/", body: "claimed" })]);
    let mut client = connect(&server);

    let resp = client.request("OPTIONS * HTTP/1.1\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("Allow"), Some("GET, HEAD"));
    assert!(resp.body.is_empty());
}

#[tokio::test]
async fn test_http2_request_gets_505() {
    let root = sample_root();
    let server = server_for(root.path());
    let mut client = connect(&server);

    let resp = client.request("GET / HTTP/2.0\r\nHost: test\r\n\r\n").await;

    assert_eq!(resp.status, 505);
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_http09_gets_bare_body() {
    let root = sample_root();
    let server = server_for(root.path());
    let mut client = connect(&server);

    client.send(b"GET /docs/a.txt\r\n").await;

    assert_eq!(client.read_to_close().await, b"aaaaaaaaaa");
}

#[tokio::test]
async fn test_access_log_lines() {
    let root = sample_root();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("access.log");
    let mut cfg = config_for(root.path());
    cfg.log.access_log = Some(log_path.clone());
    let server = Arc::new(Server::new(cfg).unwrap());
    let mut client = connect(&server);

    client.request("GET /docs/a.txt HTTP/1.1\r\nHost: test\r\n\r\n").await;
    client
        .request("GET /missing HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
        .await;
    assert!(client.is_closed().await);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("127.0.0.1:40000 - - ["));
    assert!(lines[0].ends_with("\"GET /docs/a.txt HTTP/1.1\" 200 10"));
    assert!(lines[1].contains("\"GET /missing HTTP/1.1\" 404 "));
}

#[tokio::test]
async fn test_serve_over_tcp() {
    let root = sample_root();
    let mut cfg = config_for(root.path());
    cfg.server.listen_addr = "127.0.0.1:0".to_string();
    let switch = TcpSwitch::bind(&cfg.server.listen_addr).await.unwrap();
    let addr = switch.local_addr().unwrap();
    let server = Arc::new(Server::new(cfg).unwrap());
    let accept_loop = tokio::spawn(Arc::clone(&server).serve(switch));

    let mut first = Client::new(tokio::net::TcpStream::connect(addr).await.unwrap());
    let mut second = Client::new(tokio::net::TcpStream::connect(addr).await.unwrap());

    let resp = first
        .request("GET /file.bin HTTP/1.1\r\nHost: test\r\nRange: bytes=5-14\r\n\r\n")
        .await;
    assert_eq!(resp.status, 206);
    assert_eq!(resp.header("Content-Range"), Some("bytes 5-14/100"));
    assert_eq!(resp.body.len(), 10);

    let resp = second.request("GET /missing HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(resp.status, 404);
    let resp = second.request("GET /docs/b.txt HTTP/1.1\r\nHost: test\r\n\r\n").await;
    assert_eq!(resp.status, 200);

    accept_loop.abort();
}
