use std::io;

use lantern::container::NameValueTable;
use lantern::http::response::{Response, ResponseBuilder, StatusCode};
use lantern::http::writer::{serialize_head, serialize_response};

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::PartialContent.as_u16(), 206);
    assert_eq!(StatusCode::Found.as_u16(), 302);
    assert_eq!(StatusCode::NotModified.as_u16(), 304);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
    assert_eq!(StatusCode::HttpVersionNotSupported.as_u16(), 505);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::PartialContent.reason_phrase(), "Partial Content");
    assert_eq!(StatusCode::NotModified.reason_phrase(), "Not Modified");
    assert_eq!(
        StatusCode::MethodNotAllowed.reason_phrase(),
        "Method Not Allowed"
    );
    assert_eq!(
        StatusCode::HttpVersionNotSupported.reason_phrase(),
        "HTTP Version Not Supported"
    );
}

#[test]
fn test_status_from_io_error() {
    let not_found = io::Error::from(io::ErrorKind::NotFound);
    let denied = io::Error::from(io::ErrorKind::PermissionDenied);
    let other = io::Error::other("disk on fire");

    assert_eq!(StatusCode::from_io_error(&not_found), StatusCode::NotFound);
    assert_eq!(StatusCode::from_io_error(&denied), StatusCode::Forbidden);
    assert_eq!(StatusCode::from_io_error(&other), StatusCode::InternalServerError);
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .body(b"Hello, World!".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.headers.get("Content-Type"), Some("text/plain"));
    assert_eq!(response.body, b"Hello, World!".to_vec());
}

#[test]
fn test_response_error_page() {
    let response = Response::error_page(StatusCode::NotFound);

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.headers.get("Content-Type"), Some("text/html"));
    let body = String::from_utf8(response.body).unwrap();
    assert!(body.starts_with("<HTML><HEAD><TITLE>Error 404</TITLE>"));
    assert!(body.contains("Not Found"));
}

#[test]
fn test_response_redirect_escapes_body() {
    let response = Response::redirect("/a<b>/");

    assert_eq!(response.status, StatusCode::Found);
    assert_eq!(response.headers.get("Location"), Some("/a<b>/"));
    let body = String::from_utf8(response.body).unwrap();
    assert!(body.contains("/a&lt;b&gt;/"));
}

#[test]
fn test_serialize_response_adds_content_length() {
    let response = Response::ok("hello");
    let bytes = serialize_response(&response).unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains("Content-Length: 5\r\n"));
    assert!(text.ends_with("\r\n\r\nhello"));
}

#[test]
fn test_serialize_not_modified_has_no_body() {
    let response = ResponseBuilder::new(StatusCode::NotModified).body("ignored").build();
    let bytes = serialize_response(&response).unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();

    assert_eq!(text, "HTTP/1.1 304 Not Modified\r\n\r\n");
}

#[test]
fn test_serialize_head_keeps_header_order() {
    let mut headers = NameValueTable::new();
    headers.insert("Date", "Thu, 01 Jan 1970 00:00:00 GMT");
    headers.insert("Content-Type", "text/plain");

    let head = serialize_head(StatusCode::PartialContent, &headers).unwrap();
    assert_eq!(
        head.as_str(),
        "HTTP/1.1 206 Partial Content\r\n\
         Date: Thu, 01 Jan 1970 00:00:00 GMT\r\n\
         Content-Type: text/plain\r\n\r\n"
    );
}
