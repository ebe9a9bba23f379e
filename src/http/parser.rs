use crate::container::NameValueTable;
use crate::http::request::{Method, RequestHead, Version};
use crate::http::response::StatusCode;

/// Longest request line kept on the session for logging; the rest is cut.
pub const MAX_LOGGED_REQUEST_LINE: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("invalid method token")]
    InvalidMethod,
    #[error("malformed header field")]
    InvalidHeader,
    #[error("invalid request target")]
    InvalidUri,
    #[error("malformed protocol version")]
    InvalidVersion,
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("request head exceeds {0} bytes")]
    TooLarge(usize),
    #[error("incomplete request head")]
    Incomplete,
}

impl ParseError {
    /// Status to answer with, `None` when more input is needed instead.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ParseError::Incomplete => None,
            ParseError::UnsupportedVersion => Some(StatusCode::HttpVersionNotSupported),
            _ => Some(StatusCode::BadRequest),
        }
    }
}

/// Parses a request line and header block from the front of `buf`.
///
/// Returns the head and the number of bytes it occupied; the body (if any)
/// starts right after. `Incomplete` means more bytes are needed; once
/// `max_head` bytes arrive without a complete head the result is `TooLarge`.
pub fn parse_request_head(buf: &[u8], max_head: usize) -> Result<(RequestHead, usize), ParseError> {
    // Stray CRLFs between pipelined requests are ignored.
    let start = buf
        .iter()
        .position(|&b| b != b'\r' && b != b'\n')
        .ok_or_else(|| incomplete_or_too_large(buf, max_head))?;

    let first_end = find_line_end(buf, start).ok_or_else(|| incomplete_or_too_large(buf, max_head))?;
    let request_line = line_str(&buf[start..first_end])?;

    let mut parts = request_line.split_whitespace();
    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version_str = parts.next();
    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_token(method_str).ok_or(ParseError::InvalidMethod)?;

    // HTTP/0.9: a bare "GET /path" with no headers
    let Some(version_str) = version_str else {
        if method != Method::GET {
            return Err(ParseError::InvalidRequest);
        }
        let head = build_head(method, target, Version::HTTP_09, NameValueTable::new(), request_line)?;
        return Ok((head, first_end + 1));
    };

    let version = Version::parse(version_str).ok_or(ParseError::InvalidVersion)?;
    if version.major == 0 {
        return Err(ParseError::InvalidVersion);
    }
    if version.major > 1 {
        return Err(ParseError::UnsupportedVersion);
    }

    // Headers
    let mut headers = NameValueTable::new();
    let mut last_name: Option<String> = None;
    let mut pos = first_end + 1;

    let head_end = loop {
        let line_end = find_line_end(buf, pos).ok_or_else(|| incomplete_or_too_large(buf, max_head))?;
        let line = line_str(&buf[pos..line_end])?;
        pos = line_end + 1;

        if line.is_empty() {
            break pos;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // obsolete line folding: continue the previous value
            let name = last_name.as_deref().ok_or(ParseError::InvalidHeader)?;
            let joined = format!("{} {}", headers.get(name).unwrap_or_default(), line.trim());
            headers.insert(name, &joined);
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        if key.is_empty() || key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(ParseError::InvalidHeader);
        }

        let name = key.to_ascii_lowercase();
        let value = value.trim();
        let merged = match headers.get(&name) {
            Some(existing) => format!("{}, {}", existing, value),
            None => value.to_string(),
        };
        headers.insert(&name, &merged);
        last_name = Some(name);
    };

    if head_end > max_head {
        return Err(ParseError::TooLarge(max_head));
    }

    let head = build_head(method, target, version, headers, request_line)?;
    Ok((head, head_end))
}

fn incomplete_or_too_large(buf: &[u8], max_head: usize) -> ParseError {
    if buf.len() > max_head {
        ParseError::TooLarge(max_head)
    } else {
        ParseError::Incomplete
    }
}

/// Index of the `\n` ending the line that starts at `from`.
fn find_line_end(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
}

fn line_str(line: &[u8]) -> Result<&str, ParseError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequest)
}

fn build_head(
    method: Method,
    target: &str,
    version: Version,
    headers: NameValueTable,
    request_line: &str,
) -> Result<RequestHead, ParseError> {
    let (path, query, uri_host) = parse_target(target)?;
    let host = uri_host.or_else(|| headers.get("host").map(str::to_string));

    Ok(RequestHead {
        method,
        uri: target.to_string(),
        path,
        query,
        version,
        host,
        headers,
        request_line: truncate_on_char_boundary(request_line, MAX_LOGGED_REQUEST_LINE).to_string(),
    })
}

/// Splits a request target into decoded path, raw query and host.
pub fn parse_target(target: &str) -> Result<(String, Option<String>, Option<String>), ParseError> {
    if target == "*" {
        return Ok(("*".to_string(), None, None));
    }

    if target.starts_with('/') {
        let (raw_path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        let path = normalize_path(raw_path).ok_or(ParseError::InvalidUri)?;
        return Ok((path, query, None));
    }

    // absolute-form, e.g. "http://host:8080/path?q"
    let url = url::Url::parse(target).map_err(|_| ParseError::InvalidUri)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ParseError::InvalidUri);
    }
    let host = url.host_str().map(|h| match url.port() {
        Some(port) => format!("{}:{}", h, port),
        None => h.to_string(),
    });
    let path = normalize_path(url.path()).ok_or(ParseError::InvalidUri)?;
    Ok((path, url.query().map(str::to_string), host))
}

/// Percent-decodes `raw` and resolves `.` and `..` segments.
///
/// Returns `None` for bad escapes, invalid UTF-8, NUL bytes, or a `..` that
/// would climb above the root.
pub fn normalize_path(raw: &str) -> Option<String> {
    let decoded = percent_decode(raw)?;
    if decoded.contains('\0') {
        return None;
    }

    let trailing_slash =
        decoded.ends_with('/') || decoded.ends_with("/.") || decoded.ends_with("/..");

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }

    let mut path = String::with_capacity(decoded.len() + 1);
    path.push('/');
    path.push_str(&segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        path.push('/');
    }
    Some(path)
}

fn percent_decode(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

pub(crate) fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_request_head(req, 8192).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.header("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn normalize_resolves_dot_segments() {
        assert_eq!(normalize_path("/a/./b/../c").as_deref(), Some("/a/c"));
        assert_eq!(normalize_path("/docs/").as_deref(), Some("/docs/"));
        assert_eq!(normalize_path("/a/..").as_deref(), Some("/"));
        assert_eq!(normalize_path("/%41%20b").as_deref(), Some("/A b"));
        assert_eq!(normalize_path("/../etc/passwd"), None);
        assert_eq!(normalize_path("/%zz"), None);
    }
}
