use std::fmt;

use crate::container::NameValueTable;

/// HTTP request methods.
///
/// The default handler serves GET and HEAD and answers OPTIONS; every other
/// method is passed to the handler chain untouched, including extension
/// methods the server has never heard of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other syntactically valid method token
    Extension(String),
}

impl Method {
    /// Parses one of the well-known methods (case-sensitive).
    ///
    /// ```
    /// # use lantern::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "HEAD" => Some(Method::HEAD),
            "OPTIONS" => Some(Method::OPTIONS),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// Parses any method token, falling back to [`Method::Extension`].
    pub fn from_token(s: &str) -> Option<Self> {
        if let Some(m) = Self::from_str(s) {
            return Some(m);
        }
        let valid = !s.is_empty() && s.bytes().all(is_token_byte);
        valid.then(|| Method::Extension(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const HTTP_09: Version = Version { major: 0, minor: 9 };
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    /// Parses `HTTP/<major>.<minor>`.
    pub fn parse(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("HTTP/")?;
        let (major, minor) = digits.split_once('.')?;
        Some(Version {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// Parsed request line and headers.
///
/// Header names are stored lower-cased; [`RequestHead::header`] accepts any
/// casing.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// The request target exactly as sent.
    pub uri: String,
    /// Percent-decoded, normalised path. Always starts with `/` (or is `*`).
    pub path: String,
    pub query: Option<String>,
    pub version: Version,
    /// Host from an absolute-form target or the Host header.
    pub host: Option<String>,
    pub headers: NameValueTable,
    /// First line of the request, truncated for logging.
    pub request_line: String,
}

impl RequestHead {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Declared body length. `None` when absent or not a number.
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .map(|v| {
                v.split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false)
    }

    fn connection_has(&self, token: &str) -> bool {
        self.header("Connection")
            .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
            .unwrap_or(false)
    }

    /// Whether the client asked to keep the connection open.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent;
    /// HTTP/1.0 only keeps alive on an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        if self.version >= Version::HTTP_11 {
            !self.connection_has("close")
        } else if self.version == Version::HTTP_10 {
            self.connection_has("keep-alive")
        } else {
            false
        }
    }
}

/// Builder for constructing [`RequestHead`] values outside the parser.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Version,
    headers: NameValueTable,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: Version::HTTP_11,
            headers: NameValueTable::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Request target; a `?query` suffix is split off.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(&key.to_ascii_lowercase(), value);
        self
    }

    pub fn build(self) -> Result<RequestHead, &'static str> {
        let method = self.method.ok_or("method missing")?;
        let uri = self.path.ok_or("path missing")?;
        let (path, query) = match uri.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (uri.clone(), None),
        };
        let request_line = format!("{} {} {}", method, uri, self.version);
        let host = self.headers.get("host").map(str::to_string);

        Ok(RequestHead {
            method,
            uri,
            path,
            query,
            version: self.version,
            host,
            headers: self.headers,
            request_line,
        })
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
