use std::io;
use std::time::{Duration, SystemTime};

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::channel::{Channel, Readiness};
use crate::http::parser::{ParseError, parse_request_head};
use crate::http::request::RequestHead;
use crate::http::response::{Response, StatusCode};
use crate::http::session::{Session, SessionError};
use crate::http::writer::{self, ResponseWriter, SERVER_SOFTWARE};
use crate::server::Server;
use crate::server::access_log::AccessRecord;

const READ_CHUNK: usize = 4096;

/// One accepted channel and the keep-alive loop running on it.
pub struct Connection {
    channel: Channel,
    /// Bytes read from the channel but not yet consumed.
    buffer: BytesMut,
    state: ConnectionState,
    bytes_in: u64,
    bytes_out: u64,
    requests: u32,
}

pub enum ConnectionState {
    AwaitRequest,
    Dispatch(RequestHead),
    Close,
}

impl Connection {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            state: ConnectionState::AwaitRequest,
            bytes_in: 0,
            bytes_out: 0,
            requests: 0,
        }
    }

    pub fn peer(&self) -> &str {
        self.channel.peer()
    }

    /// Requests dispatched so far, including the one in progress.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Serves requests until the peer leaves, a timeout expires or keep-alive
    /// ends. The channel is always closed on return.
    pub async fn run(&mut self, server: &Server) -> anyhow::Result<()> {
        // a peer that stops reading must not pin the task and its slot
        self.channel.set_write_timeout(server.config().server.timeout());
        let result = self.run_loop(server).await;
        if let Err(e) = self.channel.close().await {
            debug!(peer = self.peer(), error = %e, "Error closing channel");
        }
        debug!(
            peer = self.peer(),
            requests = self.requests,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            "Connection closed"
        );
        result
    }

    async fn run_loop(&mut self, server: &Server) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Close) {
                ConnectionState::AwaitRequest => {
                    self.state = match self.read_request(server).await? {
                        Some(head) => ConnectionState::Dispatch(head),
                        None => ConnectionState::Close,
                    };
                }

                ConnectionState::Dispatch(head) => {
                    self.requests += 1;
                    let mut session = Session::new(self, server, head);

                    let outcome = match server.dispatch(&mut session).await {
                        Ok(()) => session.finish().await.map_err(anyhow::Error::from),
                        Err(e) => Err(e),
                    };
                    server.log_access(&session.access_record()).await;
                    drop(session);

                    self.state = if outcome? {
                        ConnectionState::AwaitRequest
                    } else {
                        ConnectionState::Close
                    };
                }

                ConnectionState::Close => break,
            }
        }

        Ok(())
    }

    /// Waits for and parses the next request head.
    ///
    /// `None` means the connection should close: the peer left, the wait
    /// timed out, or the request was malformed (and already answered).
    async fn read_request(&mut self, server: &Server) -> anyhow::Result<Option<RequestHead>> {
        let cfg = &server.config().server;
        let wait = if self.requests == 0 {
            cfg.timeout()
        } else {
            cfg.keepalive_timeout()
        };

        if self.buffer.is_empty() {
            match self.channel.wait_readable(wait).await? {
                Readiness::Ready => {}
                Readiness::TimedOut => {
                    debug!(peer = self.peer(), "Timed out waiting for request");
                    return Ok(None);
                }
            }
        }

        loop {
            if !self.buffer.is_empty() {
                match parse_request_head(&self.buffer, cfg.max_request_head) {
                    Ok((head, consumed)) => {
                        self.buffer.advance(consumed);
                        if head.header("Content-Length").is_some()
                            && head.content_length().is_none()
                            && !head.is_chunked()
                        {
                            self.reject(server, StatusCode::BadRequest, &head.request_line).await;
                            return Ok(None);
                        }
                        return Ok(Some(head));
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(e) => {
                        warn!(peer = self.peer(), error = %e, "Malformed request");
                        let status = e.status().unwrap_or(StatusCode::BadRequest);
                        self.reject(server, status, "-").await;
                        return Ok(None);
                    }
                }
            }

            match self.fill(wait).await {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!(peer = self.peer(), "Timed out reading request head");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort error reply for a request that never became a session.
    async fn reject(&mut self, server: &Server, status: StatusCode, request_line: &str) {
        let mut response = Response::error_page(status);
        response.headers.insert("Date", &writer::http_date(SystemTime::now()));
        response.headers.insert("Server", SERVER_SOFTWARE);
        response.headers.insert("Connection", "close");

        let mut sent = 0;
        match ResponseWriter::new(&response) {
            Ok(w) => match w.write_to_channel(&mut self.channel).await {
                Ok(()) => {
                    self.bytes_out += w.len() as u64;
                    sent = response.body.len() as u64;
                }
                Err(e) => debug!(peer = self.peer(), error = %e, "Could not send error reply"),
            },
            Err(e) => debug!(peer = self.peer(), error = %e, "Could not build error reply"),
        }

        server.log_access(&AccessRecord {
            peer: self.peer().to_string(),
            time: SystemTime::now(),
            request_line: request_line.to_string(),
            status: status.as_u16(),
            bytes_sent: sent,
        })
        .await;
    }

    /// Reads more bytes into the buffer. `Ok(0)` is end-of-stream.
    pub(crate) async fn fill(&mut self, timeout: Duration) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = match tokio::time::timeout(timeout, self.channel.read(&mut chunk)).await {
            Ok(result) => result?,
            Err(_) => return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        };
        self.buffer.extend_from_slice(&chunk[..n]);
        self.bytes_in += n as u64;
        Ok(n)
    }

    /// Up to `max` buffered bytes, reading first if nothing is buffered.
    pub(crate) async fn take_buffered(&mut self, max: u64, timeout: Duration) -> Result<Bytes, SessionError> {
        if self.buffer.is_empty() && self.fill(timeout).await? == 0 {
            return Err(SessionError::UnexpectedEof);
        }
        let take = self.buffer.len().min(usize::try_from(max).unwrap_or(usize::MAX));
        Ok(self.buffer.split_to(take).freeze())
    }

    /// One line without its line ending.
    pub(crate) async fn read_line(&mut self, timeout: Duration, max: usize) -> Result<String, SessionError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line = self.buffer.split_to(pos + 1);
                let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                return String::from_utf8(line.to_vec()).map_err(|_| SessionError::MalformedBody);
            }
            if self.buffer.len() > max {
                return Err(SessionError::MalformedBody);
            }
            if self.fill(timeout).await? == 0 {
                return Err(SessionError::UnexpectedEof);
            }
        }
    }

    pub(crate) async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.channel.write(data).await?;
        self.bytes_out += data.len() as u64;
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        self.channel.flush().await
    }
}
