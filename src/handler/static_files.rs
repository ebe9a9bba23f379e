//! Static file serving under the document root.
//!
//! Handles GET and HEAD; every other method gets a 405. Directories are
//! redirected to their slash-terminated form, then served through a default
//! document or a generated listing (see [`super::listing`]).
//!
//! Files support conditional GET (`If-Modified-Since`) and byte ranges. One
//! satisfiable range is a plain 206; several become a `multipart/byteranges`
//! body sent with chunked framing.

use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::bail;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::container::DynamicList;
use crate::handler::{Handled, Handler, HandlerFuture, listing};
use crate::http::range::{self, ByteRange, RangeError};
use crate::http::request::Method;
use crate::http::response::{Response, StatusCode};
use crate::http::session::{BodyFraming, Session};
use crate::http::writer;

/// Read size when streaming a file body.
pub const BLOCK_SIZE: usize = 16 * 1024;

/// The default handler: files, default documents and directory listings.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileHandler;

impl Handler for FileHandler {
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
        Box::pin(async move {
            serve(session).await?;
            Ok(Handled::Yes)
        })
    }
}

async fn serve(session: &mut Session<'_>) -> anyhow::Result<()> {
    if !matches!(session.request().method, Method::GET | Method::HEAD) {
        session.add_header("Allow", "GET, HEAD");
        session.send_error(StatusCode::MethodNotAllowed).await?;
        return Ok(());
    }

    let server = session.server();
    let request_path = session.request().path.clone();
    let Some(fs_path) = resolve(server.document_root(), &request_path) else {
        session.send_error(StatusCode::BadRequest).await?;
        return Ok(());
    };

    let meta = match tokio::fs::metadata(&fs_path).await {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %fs_path.display(), error = %e, "Cannot stat request target");
            session.send_error(StatusCode::from_io_error(&e)).await?;
            return Ok(());
        }
    };

    if meta.is_dir() {
        if !request_path.ends_with('/') {
            let location = slash_redirect(&session.request().uri);
            session.send_response(Response::redirect(&location)).await?;
            return Ok(());
        }
        serve_directory(session, &fs_path, &meta).await
    } else if meta.is_file() {
        serve_file(session, &fs_path, &meta).await
    } else {
        session.send_error(StatusCode::Forbidden).await?;
        Ok(())
    }
}

/// Maps a normalised request path onto the document root. `None` if the
/// path would leave the root.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

/// The request target with a slash appended to its path part.
fn slash_redirect(uri: &str) -> String {
    match uri.split_once('?') {
        Some((path, query)) => format!("{}/?{}", path, query),
        None => format!("{}/", uri),
    }
}

async fn serve_directory(session: &mut Session<'_>, dir: &Path, meta: &Metadata) -> anyhow::Result<()> {
    let server = session.server();

    for name in &server.config().static_files.default_documents {
        let candidate = dir.join(name);
        if let Ok(doc_meta) = tokio::fs::metadata(&candidate).await {
            if doc_meta.is_file() {
                return serve_file(session, &candidate, &doc_meta).await;
            }
        }
    }

    if !server.config().static_files.listing {
        session.send_error(StatusCode::Forbidden).await?;
        return Ok(());
    }

    listing::serve_listing(session, dir, meta).await
}

/// Last modification time as advertised: never later than the request
/// time, and at whole-second precision like the HTTP date format.
pub fn last_modified(meta: &Metadata, now: SystemTime) -> SystemTime {
    let mtime = meta.modified().unwrap_or(now).min(now);
    let secs = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Whether `If-Modified-Since` allows a 304 for this resource.
pub fn is_not_modified(session: &Session<'_>, last_modified: SystemTime) -> bool {
    session
        .request()
        .header("If-Modified-Since")
        .and_then(|value| httpdate::parse_http_date(value.trim()).ok())
        .is_some_and(|since| last_modified <= since)
}

pub async fn send_not_modified(session: &mut Session<'_>) -> anyhow::Result<()> {
    session.set_status(StatusCode::NotModified);
    session.write_head(BodyFraming::None).await?;
    session.end_body().await?;
    Ok(())
}

fn requested_ranges(session: &Session<'_>, total: u64) -> anyhow::Result<DynamicList<ByteRange>> {
    let Some(header) = session.request().header("Range") else {
        return Ok(DynamicList::new());
    };
    match range::parse_range_header(header, total) {
        Ok(ranges) => Ok(ranges),
        Err(RangeError::Alloc(e)) => Err(e.into()),
        Err(e) => {
            debug!(range = header, error = %e, "Ignoring Range header");
            Ok(DynamicList::new())
        }
    }
}

async fn serve_file(session: &mut Session<'_>, path: &Path, meta: &Metadata) -> anyhow::Result<()> {
    let server = session.server();
    let content_type = server.mime().lookup(path).to_string();
    let total = meta.len();

    let modified = last_modified(meta, session.request_time());
    if is_not_modified(session, modified) {
        return send_not_modified(session).await;
    }

    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot open file");
            session.send_error(StatusCode::from_io_error(&e)).await?;
            return Ok(());
        }
    };

    let ranges = requested_ranges(session, total)?;

    session.add_header("Accept-Ranges", "bytes");
    session.add_header("Last-Modified", &writer::http_date(modified));

    match ranges.as_slice() {
        [] => {
            session.add_header("Content-Type", &content_type);
            session.write_head(BodyFraming::Length(total)).await?;
            send_range(session, &mut file, 0, total).await?;
        }
        [single] => {
            session.set_status(StatusCode::PartialContent);
            session.add_header("Content-Type", &content_type);
            session.add_header("Content-Range", &single.content_range(total));
            session.write_head(BodyFraming::Length(single.len())).await?;
            send_range(session, &mut file, single.start, single.len()).await?;
        }
        parts => {
            session.set_status(StatusCode::PartialContent);
            session.add_header("Content-Type", &range::multipart_content_type());
            session.write_head(BodyFraming::Chunked).await?;
            for part in parts {
                let header = range::multipart_part_header(&content_type, part, total);
                session.write_body(header.as_bytes()).await?;
                send_range(session, &mut file, part.start, part.len()).await?;
            }
            session.write_body(range::multipart_trailer().as_bytes()).await?;
        }
    }

    session.end_body().await?;
    Ok(())
}

/// Streams `len` bytes starting at `start`. HEAD requests read nothing.
async fn send_range(session: &mut Session<'_>, file: &mut File, start: u64, len: u64) -> anyhow::Result<()> {
    if session.is_head() || len == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::Start(start)).await?;
    let mut block = vec![0u8; BLOCK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(BLOCK_SIZE, |r| r.min(BLOCK_SIZE));
        let n = file.read(&mut block[..want]).await?;
        if n == 0 {
            bail!("file shrank while it was being sent");
        }
        session.write_body(&block[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}
