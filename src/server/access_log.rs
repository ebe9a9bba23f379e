//! Common Log Format access log.
//!
//! One line per finished request, appended to a file shared by every
//! connection task. Each line goes out in a single `write_all` under the
//! mutex so lines from different connections never interleave. The write
//! runs on tokio's blocking pool, off the connection's worker thread.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::http::parser::truncate_on_char_boundary;

/// Longest line written, newline included.
pub const MAX_LOG_LINE: usize = 4096;

/// What is kept of a session after it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub peer: String,
    pub time: SystemTime,
    pub request_line: String,
    pub status: u16,
    pub bytes_sent: u64,
}

impl AccessRecord {
    /// `peer - - [dd/Mon/yyyy:HH:MM:SS +0000] "request line" status bytes`,
    /// without the newline and truncated to fit [`MAX_LOG_LINE`].
    pub fn to_clf(&self) -> String {
        let time = DateTime::<Utc>::from(self.time).format("%d/%b/%Y:%H:%M:%S +0000");
        let line = format!(
            "{} - - [{}] \"{}\" {} {}",
            self.peer, time, self.request_line, self.status, self.bytes_sent
        );
        truncate_on_char_boundary(&line, MAX_LOG_LINE - 1).to_string()
    }
}

pub struct AccessLog {
    file: Arc<Mutex<File>>,
}

impl AccessLog {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("cannot open access log {}", path.display()))?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Appends one line; returns once it has been written.
    pub async fn record(&self, record: &AccessRecord) {
        let mut line = record.to_clf();
        line.push('\n');

        let file = Arc::clone(&self.file);
        let written = tokio::task::spawn_blocking(move || {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            file.write_all(line.as_bytes())
        })
        .await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to write access log"),
            Err(e) => warn!(error = %e, "Access log writer task failed"),
        }
    }
}
