//! Generated directory listings.
//!
//! Entries are collected into a [`DynamicList`] whose names live in the
//! session arena, sorted with subdirectories first, and streamed as chunks
//! of HTML or plain text.
//!
//! The query string picks the presentation: `plain` for text/plain,
//! `name-up`, `name-down`, `date-up` or `date-down` for the order (also
//! accepted as `sort=<mode>`). Tokens may be combined with `&`; anything
//! else is a 400.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::container::{Arena, ArenaStr, DynamicList, GrowableString};
use crate::handler::static_files::{is_not_modified, last_modified, send_not_modified};
use crate::http::escape::{html_escape, url_encode};
use crate::http::mime::MimeTable;
use crate::http::response::StatusCode;
use crate::http::session::{BodyFraming, Session};
use crate::http::writer::{self, SERVER_SOFTWARE};

/// Rendered output is sent once this much has accumulated.
const FLUSH_THRESHOLD: usize = 4096;
/// Display width for file names; longer names are shortened.
pub const NAME_COLUMNS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingOptions {
    pub plain: bool,
    pub sort: SortKey,
    pub ascending: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            plain: false,
            sort: SortKey::Name,
            ascending: true,
        }
    }
}

impl ListingOptions {
    /// Parses the listing query string. `None` for an unknown token.
    pub fn from_query(query: Option<&str>) -> Option<Self> {
        let mut options = Self::default();
        let Some(query) = query else {
            return Some(options);
        };

        for token in query.split('&').filter(|t| !t.is_empty()) {
            let mode = token.strip_prefix("sort=").unwrap_or(token);
            match mode {
                "plain" if mode == token => options.plain = true,
                "name-up" => (options.sort, options.ascending) = (SortKey::Name, true),
                "name-down" => (options.sort, options.ascending) = (SortKey::Name, false),
                "date-up" => (options.sort, options.ascending) = (SortKey::Date, true),
                "date-down" => (options.sort, options.ascending) = (SortKey::Date, false),
                _ => return None,
            }
        }
        Some(options)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ListingEntry {
    pub name: ArenaStr,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// Reads `dir`, skipping dotfiles. `include_parent` adds a `..` entry.
pub async fn collect_entries(
    arena: &mut Arena,
    dir: &Path,
    include_parent: bool,
) -> anyhow::Result<DynamicList<ListingEntry>> {
    let mut entries = DynamicList::new();

    if include_parent {
        let parent = tokio::fs::metadata(dir.join("..")).await;
        entries.append(ListingEntry {
            name: arena.alloc_str("..")?,
            is_dir: true,
            size: 0,
            modified: parent.and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH),
        })?;
    }

    let mut reader = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot list {}", dir.display()))?;

    while let Some(entry) = reader.next_entry().await? {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        // follows symlinks, unlike DirEntry::metadata
        let meta = match tokio::fs::metadata(entry.path()).await {
            Ok(meta) => meta,
            Err(e) => {
                debug!(entry = %name, error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        entries.append(ListingEntry {
            name: arena.alloc_str(&name)?,
            is_dir: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        })?;
    }

    Ok(entries)
}

/// Directories before files; within each group by the chosen key.
pub fn sort_entries(arena: &Arena, entries: &mut DynamicList<ListingEntry>, options: ListingOptions) {
    entries.sort_by(|a, b| {
        b.is_dir.cmp(&a.is_dir).then_with(|| {
            let order = match options.sort {
                SortKey::Name => {
                    let a_name = arena.str(a.name).unwrap_or_default();
                    let b_name = arena.str(b.name).unwrap_or_default();
                    a_name.cmp(b_name)
                }
                SortKey::Date => a.modified.cmp(&b.modified),
            };
            if options.ascending { order } else { order.reverse() }
        })
    });
}

/// Shortens long names to the first 10 characters, `...` and the last 11.
pub fn truncate_name(name: &str) -> Cow<'_, str> {
    let count = name.chars().count();
    if count <= NAME_COLUMNS {
        return Cow::Borrowed(name);
    }
    let head: String = name.chars().take(10).collect();
    let tail: String = name.chars().skip(count - 11).collect();
    Cow::Owned(format!("{}...{}", head, tail))
}

/// Size with a unit suffix, stepping up whenever the value exceeds 9999.
pub fn human_size(size: u64) -> String {
    let mut value = size;
    let mut unit = 'b';
    for next in ['K', 'M', 'G'] {
        if value > 9999 {
            value /= 1024;
            unit = next;
        }
    }
    format!("{}{}", value, unit)
}

pub fn format_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%d/%m/%Y %H:%M:%S").to_string()
}

fn write_header(out: &mut GrowableString, title: &str, plain: bool) -> std::fmt::Result {
    if plain {
        writeln!(out, "Index of {}", title)?;
        writeln!(out)?;
        writeln!(out, "{:<25} {:>6}  {:<19}  {}", "Name", "Size", "Date-Time", "Type")?;
        writeln!(out, "{}", "-".repeat(72))
    } else {
        let title = html_escape(title);
        writeln!(out, "<HTML><HEAD><TITLE>Index of {}</TITLE></HEAD>", title)?;
        writeln!(out, "<BODY><H1>Index of {}</H1>", title)?;
        writeln!(out, "<PRE>{:<25} {:>6}  {:<19}  {}", "Name", "Size", "Date-Time", "Type")?;
        writeln!(out, "<HR WIDTH=100%>")
    }
}

fn write_entry(
    out: &mut GrowableString,
    name: &str,
    entry: &ListingEntry,
    mime: &MimeTable,
    plain: bool,
) -> std::fmt::Result {
    let shown = truncate_name(name);
    let slash = if entry.is_dir { "/" } else { "" };
    // pad on display characters, not bytes
    let padding = " ".repeat((NAME_COLUMNS + 1).saturating_sub(shown.chars().count() + slash.len()));
    let (size, kind) = if entry.is_dir {
        (String::from("-"), "Directory")
    } else {
        (human_size(entry.size), mime.lookup(name))
    };
    let date = format_date(entry.modified);

    if plain {
        writeln!(out, "{}{}{} {:>6}  {}  {}", shown, slash, padding, size, date, kind)
    } else {
        writeln!(
            out,
            "<A HREF=\"{}{}\">{}{}</A>{} {:>6}  {}  {}",
            url_encode(name),
            slash,
            html_escape(&shown),
            slash,
            padding,
            size,
            date,
            kind
        )
    }
}

fn write_footer(out: &mut GrowableString, plain: bool) -> std::fmt::Result {
    if plain {
        writeln!(out, "{}", "-".repeat(72))?;
        writeln!(out, "{}", SERVER_SOFTWARE)
    } else {
        writeln!(out, "</PRE><HR WIDTH=100%>")?;
        writeln!(out, "<I>{}</I>", SERVER_SOFTWARE)?;
        writeln!(out, "</BODY></HTML>")
    }
}

async fn flush(session: &mut Session<'_>, out: &mut GrowableString, force: bool) -> anyhow::Result<()> {
    if force || out.len() >= FLUSH_THRESHOLD {
        session.write_body(out.as_bytes()).await?;
        out.clear();
    }
    Ok(())
}

/// Answers a request for a directory that has no default document.
pub async fn serve_listing(session: &mut Session<'_>, dir: &Path, meta: &Metadata) -> anyhow::Result<()> {
    let Some(options) = ListingOptions::from_query(session.request().query.as_deref()) else {
        session.send_error(StatusCode::BadRequest).await?;
        return Ok(());
    };

    let modified = last_modified(meta, session.request_time());
    if is_not_modified(session, modified) {
        return send_not_modified(session).await;
    }

    let title = session.request().path.clone();
    let include_parent = title != "/";
    let mut entries = collect_entries(session.arena_mut(), dir, include_parent).await?;
    sort_entries(session.arena(), &mut entries, options);
    debug!(path = %title, entries = entries.len(), "Rendering directory listing");

    let content_type = if options.plain { "text/plain" } else { "text/html" };
    session.add_header("Content-Type", content_type);
    session.add_header("Last-Modified", &writer::http_date(modified));
    session.write_head(BodyFraming::Chunked).await?;

    if session.is_head() {
        session.end_body().await?;
        return Ok(());
    }

    let mime = session.server().mime();
    let mut out = GrowableString::with_capacity(FLUSH_THRESHOLD * 2)?;
    write_header(&mut out, &title, options.plain).context("listing render failed")?;

    for entry in entries.iter() {
        let name = session.arena().str(entry.name).unwrap_or_default();
        write_entry(&mut out, name, entry, mime, options.plain).context("listing render failed")?;
        flush(session, &mut out, false).await?;
    }

    write_footer(&mut out, options.plain).context("listing render failed")?;
    flush(session, &mut out, true).await?;
    session.end_body().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_are_shortened() {
        assert_eq!(truncate_name("short.txt"), "short.txt");
        let long = "abcdefghijklmnopqrstuvwxyz.txt";
        let shown = truncate_name(long);
        assert_eq!(shown, "abcdefghij...tuvwxyz.txt");
        assert_eq!(shown.chars().count(), NAME_COLUMNS);
    }

    #[test]
    fn sizes_step_past_9999() {
        assert_eq!(human_size(0), "0b");
        assert_eq!(human_size(9999), "9999b");
        assert_eq!(human_size(10_000), "9K");
        assert_eq!(human_size(20 * 1024 * 1024), "20M");
    }
}
