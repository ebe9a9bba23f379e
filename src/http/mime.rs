//! MIME type detection based on file extensions.

use std::collections::HashMap;
use std::path::Path;

/// Served for files whose extension is not in the table.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("xml", "text/xml"),
    ("rss", "application/rss+xml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tgz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("mp3", "audio/mpeg"),
    ("ogg", "audio/ogg"),
    ("wav", "audio/x-wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
];

/// Extension to media type lookup.
#[derive(Debug, Clone)]
pub struct MimeTable {
    types: HashMap<String, String>,
}

impl MimeTable {
    pub fn new() -> Self {
        let types = BUILTIN_TYPES
            .iter()
            .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
            .collect();
        Self { types }
    }

    /// Adds or overrides entries; extensions are matched case-insensitively.
    pub fn with_extra<'a, I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (ext, mime) in extra {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            self.types.insert(ext, mime.clone());
        }
        self
    }

    /// Media type for a file name, [`DEFAULT_MIME_TYPE`] when unknown.
    pub fn lookup(&self, path: impl AsRef<Path>) -> &str {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.types.get(&ext.to_ascii_lowercase()))
            .map(String::as_str)
            .unwrap_or(DEFAULT_MIME_TYPE)
    }
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::new()
    }
}
