use std::io;

use crate::container::NameValueTable;
use crate::http::escape::html_escape;

/// HTTP status codes produced by the server.
///
/// Handlers may use any of these; the engine itself only produces the
/// 2xx/3xx codes used by static content plus the error codes in
/// [`StatusCode::from_io_error`] and the protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 206 Partial Content
    PartialContent,
    /// 302 Found
    Found,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 408 Request Timeout
    RequestTimeout,
    /// 411 Length Required
    LengthRequired,
    /// 413 Payload Too Large
    PayloadTooLarge,
    /// 500 Internal Server Error
    InternalServerError,
    /// 501 Not Implemented
    NotImplemented,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// 505 HTTP Version Not Supported
    HttpVersionNotSupported,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use lantern::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::PartialContent => 206,
            StatusCode::Found => 302,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::RequestTimeout => 408,
            StatusCode::LengthRequired => 411,
            StatusCode::PayloadTooLarge => 413,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::HttpVersionNotSupported => 505,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::PartialContent => "Partial Content",
            StatusCode::Found => "Found",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::RequestTimeout => "Request Timeout",
            StatusCode::LengthRequired => "Length Required",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::HttpVersionNotSupported => "HTTP Version Not Supported",
        }
    }

    /// Nearest status for a filesystem error.
    pub fn from_io_error(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StatusCode::NotFound,
            io::ErrorKind::PermissionDenied => StatusCode::Forbidden,
            _ => StatusCode::InternalServerError,
        }
    }

    /// Responses that never carry a body.
    pub fn is_bodiless(&self) -> bool {
        matches!(self, StatusCode::NoContent | StatusCode::NotModified)
    }

    pub fn is_error(&self) -> bool {
        self.as_u16() >= 400
    }
}

/// A complete response with a body known up front.
///
/// Used for engine-generated replies (errors, redirects, OPTIONS) and by
/// handlers that build the whole body in memory.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Header fields in insertion order
    pub headers: NameValueTable,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: NameValueTable,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: NameValueTable::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response.
    ///
    /// Content-Length is not part of the header table; the session derives
    /// it from the body when the response is written.
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn builder(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    /// Small HTML page describing an error status.
    pub fn error_page(status: StatusCode) -> Self {
        let code = status.as_u16();
        let body = format!(
            "<HTML><HEAD><TITLE>Error {code}</TITLE></HEAD><BODY>\
             <H1>Error {code}</H1><P>{}</P></BODY></HTML>\n",
            status.reason_phrase()
        );
        ResponseBuilder::new(status)
            .header("Content-Type", "text/html")
            .body(body)
            .build()
    }

    pub fn not_found() -> Self {
        Self::error_page(StatusCode::NotFound)
    }

    pub fn internal_error() -> Self {
        Self::error_page(StatusCode::InternalServerError)
    }

    /// 302 pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        let body = format!(
            "<HTML><HEAD><TITLE>302 Found</TITLE></HEAD><BODY>\
             Moved to <A HREF=\"{0}\">{0}</A></BODY></HTML>\n",
            html_escape(location)
        );
        ResponseBuilder::new(StatusCode::Found)
            .header("Location", location)
            .header("Content-Type", "text/html")
            .body(body)
            .build()
    }
}
