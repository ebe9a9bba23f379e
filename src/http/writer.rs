//! Wire serialization of response heads and body framing.

use std::fmt::Write;
use std::time::SystemTime;

use bytes::Bytes;

use crate::channel::Channel;
use crate::container::{AllocError, GrowableString, NameValueTable};
use crate::http::request::Version;
use crate::http::response::{Response, StatusCode};

/// Terminates a chunked body (no trailers).
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";
pub const CRLF: &[u8] = b"\r\n";

/// Value of the `Server` header.
pub const SERVER_SOFTWARE: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// RFC 7231 IMF-fixdate.
pub fn http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Status line plus header block, ending with the blank line.
///
/// HTTP/1.x responses are always labelled `HTTP/1.1`, the highest version
/// the server speaks.
pub fn serialize_head(status: StatusCode, headers: &NameValueTable) -> Result<GrowableString, AllocError> {
    let mut head = GrowableString::with_capacity(256)?;
    let status_line = format!(
        "{} {} {}\r\n",
        Version::HTTP_11,
        status.as_u16(),
        status.reason_phrase()
    );
    head.push_str(&status_line)?;

    for (k, v) in headers.iter() {
        head.push_str(k)?;
        head.push_str(": ")?;
        head.push_str(v)?;
        head.push_str("\r\n")?;
    }

    head.push_str("\r\n")?;
    Ok(head)
}

/// `<hex length>\r\n` preceding a chunk of `len` bytes.
pub fn chunk_prefix(len: usize) -> String {
    let mut s = String::with_capacity(10);
    let _ = write!(s, "{:x}\r\n", len);
    s
}

/// Whole response with a declared length, for replies built in memory.
pub fn serialize_response(resp: &Response) -> Result<Bytes, AllocError> {
    let mut headers = resp.headers.clone();
    if !resp.status.is_bodiless() && !headers.contains_key("Content-Length") {
        headers.insert("Content-Length", &resp.body.len().to_string());
    }

    let head = serialize_head(resp.status, &headers)?;
    let mut buf = crate::container::GrowableBuffer::with_capacity(head.len() + resp.body.len())?;
    buf.append(head.as_bytes())?;
    if !resp.status.is_bodiless() {
        buf.append(&resp.body)?;
    }
    Ok(buf.freeze())
}

pub struct ResponseWriter {
    buffer: Bytes,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Result<Self, AllocError> {
        Ok(Self {
            buffer: serialize_response(response)?,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub async fn write_to_channel(&self, channel: &mut Channel) -> std::io::Result<()> {
        channel.write(&self.buffer).await?;
        channel.flush().await
    }
}
