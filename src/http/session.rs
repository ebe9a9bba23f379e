//! One request/response cycle on a connection.
//!
//! A [`Session`] is created for every request read off a [`Connection`] and
//! dropped once the response is complete. Handlers see it as the whole
//! request API: the parsed head, the request body, and the write side.
//!
//! # Framing
//!
//! The response body is framed exactly one way, chosen when the head is
//! written:
//!
//! - [`BodyFraming::Length`]: `Content-Length`, body must match it exactly
//! - [`BodyFraming::Chunked`]: chunked transfer coding for HTTP/1.1 peers;
//!   older peers get a close-delimited body instead
//! - [`BodyFraming::None`]: no body
//!
//! Writing a second head, overrunning a declared length or finishing short
//! of it is a [`SessionError::Framing`].

use std::io;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};

use crate::container::{AllocError, Arena, NameValueTable};
use crate::http::connection::Connection;
use crate::http::request::{Method, RequestHead, Version};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{self, CRLF, LAST_CHUNK, SERVER_SOFTWARE};
use crate::server::Server;
use crate::server::access_log::AccessRecord;

/// Longest request body that is silently drained to keep a connection alive.
const MAX_DRAIN: u64 = 1024 * 1024;
/// Longest chunk-size or trailer line accepted in a chunked request body.
const MAX_CHUNK_LINE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("framing error: {0}")]
    Framing(&'static str),
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("malformed request body")]
    MalformedBody,
    #[error("peer closed the connection mid-body")]
    UnexpectedEof,
    #[error("timed out reading from peer")]
    TimedOut,
    #[error(transparent)]
    Io(io::Error),
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => SessionError::TimedOut,
            io::ErrorKind::UnexpectedEof => SessionError::UnexpectedEof,
            _ => SessionError::Io(err),
        }
    }
}

/// Body framing requested by a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    Length(u64),
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Unset,
    Empty,
    Length { remaining: u64 },
    Chunked,
    CloseDelimited,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestBody {
    Length(u64),
    ChunkSize,
    ChunkData(u64),
    Done,
}

pub struct Session<'c> {
    conn: &'c mut Connection,
    server: &'c Server,
    request: RequestHead,
    arena: Arena,
    request_time: SystemTime,
    status: StatusCode,
    headers: NameValueTable,
    framing: Framing,
    keep_alive: bool,
    requests_left: u32,
    body: RequestBody,
    bytes_sent: u64,
}

impl<'c> Session<'c> {
    pub(crate) fn new(conn: &'c mut Connection, server: &'c Server, request: RequestHead) -> Self {
        let max_requests = server.config().server.keepalive_max_requests;
        let requests_left = max_requests.saturating_sub(conn.requests());

        // The last permitted request already announces the close.
        let keep_alive = requests_left > 0 && request.version.major == 1 && request.keep_alive();

        let body = if request.is_chunked() {
            RequestBody::ChunkSize
        } else {
            match request.content_length() {
                Some(n) if n > 0 => RequestBody::Length(n),
                _ => RequestBody::Done,
            }
        };

        Self {
            conn,
            server,
            request,
            arena: Arena::new(),
            request_time: SystemTime::now(),
            status: StatusCode::Ok,
            headers: NameValueTable::new(),
            framing: Framing::Unset,
            keep_alive,
            requests_left,
            body,
            bytes_sent: 0,
        }
    }

    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    pub fn server(&self) -> &'c Server {
        self.server
    }

    pub fn peer(&self) -> &str {
        self.conn.peer()
    }

    /// Scratch memory released with the session.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Time the request was read; used as "now" for freshness checks.
    pub fn request_time(&self) -> SystemTime {
        self.request_time
    }

    pub fn is_head(&self) -> bool {
        self.request.method == Method::HEAD
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Adds (or replaces) a response header. Ignored once the head is out.
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name, value);
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Closes the connection after this response.
    pub fn force_close(&mut self) {
        self.keep_alive = false;
    }

    pub fn response_started(&self) -> bool {
        self.framing != Framing::Unset
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Writes the status line and headers.
    pub async fn write_head(&mut self, requested: BodyFraming) -> Result<(), SessionError> {
        if self.framing != Framing::Unset {
            return Err(SessionError::Framing("response head already written"));
        }

        if self.request.version == Version::HTTP_09 {
            // No head at all; the body runs until the connection closes.
            self.keep_alive = false;
            self.framing = match requested {
                BodyFraming::None => Framing::Empty,
                _ => Framing::CloseDelimited,
            };
            return Ok(());
        }

        let framing = if self.status.is_bodiless() {
            Framing::Empty
        } else {
            match requested {
                BodyFraming::None => Framing::Empty,
                BodyFraming::Length(n) => Framing::Length { remaining: n },
                BodyFraming::Chunked if self.request.version >= Version::HTTP_11 => Framing::Chunked,
                BodyFraming::Chunked => {
                    self.keep_alive = false;
                    Framing::CloseDelimited
                }
            }
        };

        let mut headers = NameValueTable::new();
        headers.insert("Date", &writer::http_date(SystemTime::now()));
        headers.insert("Server", SERVER_SOFTWARE);
        for (name, value) in self.headers.iter() {
            headers.insert(name, value);
        }

        match framing {
            Framing::Length { remaining } => {
                headers.insert("Content-Length", &remaining.to_string());
            }
            Framing::Chunked => {
                headers.insert("Transfer-Encoding", "chunked");
            }
            Framing::Empty if !self.status.is_bodiless() => {
                headers.insert("Content-Length", "0");
            }
            _ => {}
        }

        if self.keep_alive {
            let cfg = &self.server.config().server;
            headers.insert("Connection", "Keep-Alive");
            headers.insert(
                "Keep-Alive",
                &format!("timeout={}, max={}", cfg.keepalive_timeout_secs, self.requests_left),
            );
        } else {
            headers.insert("Connection", "close");
        }

        let head = writer::serialize_head(self.status, &headers)?;
        self.framing = framing;
        self.conn.write(head.as_bytes()).await?;
        Ok(())
    }

    /// Writes body bytes according to the chosen framing.
    ///
    /// For HEAD requests the bytes are accounted for but not sent.
    pub async fn write_body(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let head_only = self.is_head();
        match self.framing {
            Framing::Unset => return Err(SessionError::Framing("body written before head")),
            Framing::Empty | Framing::Finished => {
                if data.is_empty() {
                    return Ok(());
                }
                return Err(SessionError::Framing("response does not take a body"));
            }
            Framing::Length { remaining } => {
                let len = data.len() as u64;
                if len > remaining {
                    return Err(SessionError::Framing("body exceeds declared length"));
                }
                self.framing = Framing::Length { remaining: remaining - len };
                if !head_only {
                    self.conn.write(data).await?;
                }
            }
            Framing::Chunked => {
                if data.is_empty() || head_only {
                    return Ok(());
                }
                self.conn.write(writer::chunk_prefix(data.len()).as_bytes()).await?;
                self.conn.write(data).await?;
                self.conn.write(CRLF).await?;
            }
            Framing::CloseDelimited => {
                if !head_only {
                    self.conn.write(data).await?;
                }
            }
        }

        if !head_only {
            self.bytes_sent += data.len() as u64;
        }
        Ok(())
    }

    /// Completes the body.
    pub async fn end_body(&mut self) -> Result<(), SessionError> {
        match self.framing {
            Framing::Unset => return Err(SessionError::Framing("body ended before head")),
            Framing::Length { remaining } if remaining > 0 && !self.is_head() => {
                self.keep_alive = false;
                self.framing = Framing::Finished;
                return Err(SessionError::Framing("body shorter than declared length"));
            }
            Framing::Chunked if !self.is_head() => {
                self.conn.write(LAST_CHUNK).await?;
            }
            _ => {}
        }
        self.framing = Framing::Finished;
        self.conn.flush().await?;
        Ok(())
    }

    /// Sends a complete in-memory response.
    pub async fn send_response(&mut self, response: Response) -> Result<(), SessionError> {
        self.status = response.status;
        for (name, value) in response.headers.iter() {
            self.headers.insert(name, value);
        }
        self.write_head(BodyFraming::Length(response.body.len() as u64))
            .await?;
        self.write_body(&response.body).await?;
        self.end_body().await
    }

    /// Sends the standard error page for `status`.
    pub async fn send_error(&mut self, status: StatusCode) -> Result<(), SessionError> {
        self.send_response(Response::error_page(status)).await
    }

    /// Sends whatever status was set, with an error page for error codes
    /// and an empty body otherwise.
    pub(crate) async fn send_status_only(&mut self) -> Result<(), SessionError> {
        if self.status.is_error() {
            return self.send_error(self.status).await;
        }
        self.write_head(BodyFraming::None).await?;
        self.end_body().await
    }

    /// Gives up on the response: nothing more is written and the connection
    /// closes once the handler returns.
    pub(crate) fn abort(&mut self) {
        self.framing = Framing::Finished;
        self.keep_alive = false;
    }

    /// Next piece of the request body, `None` at its end.
    pub async fn read_body_chunk(&mut self) -> Result<Option<Bytes>, SessionError> {
        let timeout = self.server.config().server.timeout();
        loop {
            match self.body {
                RequestBody::Done => return Ok(None),
                RequestBody::Length(0) => {
                    self.body = RequestBody::Done;
                    return Ok(None);
                }
                RequestBody::Length(remaining) => {
                    let bytes = self.conn.take_buffered(remaining, timeout).await?;
                    self.body = RequestBody::Length(remaining - bytes.len() as u64);
                    return Ok(Some(bytes));
                }
                RequestBody::ChunkSize => {
                    let line = self.conn.read_line(timeout, MAX_CHUNK_LINE).await?;
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    let size = u64::from_str_radix(size_str, 16).map_err(|_| SessionError::MalformedBody)?;
                    if size == 0 {
                        // trailers are read and dropped
                        while !self.conn.read_line(timeout, MAX_CHUNK_LINE).await?.is_empty() {}
                        self.body = RequestBody::Done;
                        return Ok(None);
                    }
                    self.body = RequestBody::ChunkData(size);
                }
                RequestBody::ChunkData(0) => {
                    if !self.conn.read_line(timeout, MAX_CHUNK_LINE).await?.is_empty() {
                        return Err(SessionError::MalformedBody);
                    }
                    self.body = RequestBody::ChunkSize;
                }
                RequestBody::ChunkData(remaining) => {
                    let bytes = self.conn.take_buffered(remaining, timeout).await?;
                    self.body = RequestBody::ChunkData(remaining - bytes.len() as u64);
                    return Ok(Some(bytes));
                }
            }
        }
    }

    /// Reads the whole request body, failing once it grows past `limit`.
    pub async fn read_body(&mut self, limit: usize) -> Result<Bytes, SessionError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.read_body_chunk().await? {
            if body.len() + chunk.len() > limit {
                self.keep_alive = false;
                return Err(SessionError::BodyTooLarge(limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }

    /// Reads and drops what is left of the request body.
    async fn discard_body(&mut self) -> Result<(), SessionError> {
        let mut drained = 0u64;
        while let Some(chunk) = self.read_body_chunk().await? {
            drained += chunk.len() as u64;
            if drained > MAX_DRAIN {
                return Err(SessionError::BodyTooLarge(MAX_DRAIN as usize));
            }
        }
        Ok(())
    }

    /// Completes the exchange and reports whether the connection stays open.
    ///
    /// Transport failures are returned as errors; framing mistakes by the
    /// handler only cost the connection its keep-alive.
    pub(crate) async fn finish(&mut self) -> Result<bool, SessionError> {
        if self.framing == Framing::Unset {
            self.send_status_only().await?;
        }

        if self.framing != Framing::Finished {
            match self.end_body().await {
                Ok(()) => {}
                Err(SessionError::Framing(msg)) => {
                    tracing::warn!(peer = self.peer(), error = msg, "Response framing violated");
                    self.keep_alive = false;
                }
                Err(e) => return Err(e),
            }
        }

        if self.keep_alive {
            if let Err(e) = self.discard_body().await {
                tracing::debug!(peer = self.peer(), error = %e, "Request body not drained");
                self.keep_alive = false;
            }
        }

        self.conn.flush().await?;
        Ok(self.keep_alive)
    }

    pub(crate) fn access_record(&self) -> AccessRecord {
        AccessRecord {
            peer: self.peer().to_string(),
            time: self.request_time,
            request_line: self.request.request_line.clone(),
            status: self.status.as_u16(),
            bytes_sent: self.bytes_sent,
        }
    }
}
