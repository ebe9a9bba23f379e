#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use filetime::FileTime;
use lantern::channel::Channel;
use lantern::config::Config;
use lantern::server::Server;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream};

pub const PEER: &str = "127.0.0.1:40000";

pub fn config_for(root: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.static_files.document_root = root.to_path_buf();
    cfg.server.timeout_secs = 2;
    cfg.server.keepalive_timeout_secs = 2;
    cfg
}

pub fn server_for(root: &Path) -> Arc<Server> {
    Arc::new(Server::new(config_for(root)).unwrap())
}

pub fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn set_mtime(root: &Path, rel: &str, unix_secs: i64) {
    filetime::set_file_mtime(root.join(rel), FileTime::from_unix_time(unix_secs, 0)).unwrap();
}

/// Document root with `docs/a.txt` (10 bytes), `docs/b.txt` (20 bytes,
/// newer) and `file.bin` (bytes 0..100).
pub fn sample_root() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "docs/a.txt", b"aaaaaaaaaa");
    write_file(dir.path(), "docs/b.txt", b"bbbbbbbbbbbbbbbbbbbb");
    set_mtime(dir.path(), "docs/a.txt", 1_600_000_000);
    set_mtime(dir.path(), "docs/b.txt", 1_700_000_000);
    let bin: Vec<u8> = (0..100u8).collect();
    write_file(dir.path(), "file.bin", &bin);
    dir
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Raw HTTP client over any byte stream.
pub struct Client<S> {
    io: BufReader<S>,
}

/// Starts a connection task for `server` over an in-memory pipe.
pub fn connect(server: &Arc<Server>) -> Client<DuplexStream> {
    let (client, engine) = tokio::io::duplex(256 * 1024);
    let server = Arc::clone(server);
    tokio::spawn(async move {
        let _ = server.serve_channel(Channel::new(engine, PEER)).await;
    });
    Client::new(client)
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    pub fn new(stream: S) -> Self {
        Self {
            io: BufReader::new(stream),
        }
    }

    pub async fn send(&mut self, raw: &[u8]) {
        self.io.get_mut().write_all(raw).await.unwrap();
        self.io.get_mut().flush().await.unwrap();
    }

    pub async fn request(&mut self, raw: &str) -> TestResponse {
        self.send(raw.as_bytes()).await;
        self.response(raw.starts_with("HEAD ")).await
    }

    async fn line(&mut self) -> String {
        let mut line = String::new();
        self.io.read_line(&mut line).await.unwrap();
        line.trim_end_matches(['\r', '\n']).to_string()
    }

    pub async fn response(&mut self, head_only: bool) -> TestResponse {
        let status_line = self.line().await;
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("bad status line {:?}", status_line));

        let mut headers = Vec::new();
        loop {
            let line = self.line().await;
            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(':').unwrap();
            headers.push((k.trim().to_string(), v.trim().to_string()));
        }

        let mut response = TestResponse {
            status,
            headers,
            body: Vec::new(),
        };

        if head_only || status == 304 || status == 204 {
            return response;
        }

        if response
            .header("Transfer-Encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
        {
            loop {
                let size_line = self.line().await;
                let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
                if size == 0 {
                    assert_eq!(self.line().await, "");
                    break;
                }
                let mut chunk = vec![0u8; size];
                self.io.read_exact(&mut chunk).await.unwrap();
                response.body.extend_from_slice(&chunk);
                assert_eq!(self.line().await, "");
            }
        } else if let Some(len) = response.header("Content-Length") {
            let mut body = vec![0u8; len.parse().unwrap()];
            self.io.read_exact(&mut body).await.unwrap();
            response.body = body;
        } else {
            self.io.read_to_end(&mut response.body).await.unwrap();
        }

        response
    }

    /// Everything until the server closes the stream.
    pub async fn read_to_close(&mut self) -> Vec<u8> {
        let mut rest = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), self.io.read_to_end(&mut rest))
            .await
            .expect("server did not close the connection")
            .unwrap();
        rest
    }

    /// Whether the server has closed its end.
    pub async fn is_closed(&mut self) -> bool {
        let mut byte = [0u8; 1];
        match tokio::time::timeout(Duration::from_secs(5), self.io.read(&mut byte)).await {
            Ok(Ok(0)) => true,
            Ok(Ok(_)) => false,
            Ok(Err(_)) => true,
            Err(_) => false,
        }
    }
}
