//! Server lifecycle and request dispatch.
//!
//! A [`Server`] is built once from a [`Config`], given its handlers, and then
//! shared read-only (behind an `Arc`) by every connection task.

pub mod access_log;
pub mod listener;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use crate::channel::{Channel, ChannelSwitch};
use crate::config::Config;
use crate::handler::{FileHandler, Handled, Handler};
use crate::http::connection::Connection;
use crate::http::mime::MimeTable;
use crate::http::request::Method;
use crate::http::response::StatusCode;
use crate::http::session::{BodyFraming, Session, SessionError};

use self::access_log::{AccessLog, AccessRecord};

pub struct Server {
    config: Config,
    document_root: PathBuf,
    mime: MimeTable,
    handlers: Vec<Box<dyn Handler>>,
    default_handler: Box<dyn Handler>,
    access_log: Option<AccessLog>,
}

impl Server {
    /// Fails if the document root does not exist or the access log cannot
    /// be opened.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let root = &config.static_files.document_root;
        let document_root = root
            .canonicalize()
            .with_context(|| format!("invalid document root {}", root.display()))?;

        let mime = MimeTable::new().with_extra(&config.static_files.mime_types);
        let access_log = config
            .log
            .access_log
            .as_deref()
            .map(AccessLog::open)
            .transpose()?;

        Ok(Self {
            config,
            document_root,
            mime,
            handlers: Vec::new(),
            default_handler: Box::new(FileHandler),
            access_log,
        })
    }

    /// Adds a handler; later handlers are tried first.
    pub fn add_handler(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// Replaces the handler run when no chained handler claims a request.
    pub fn set_default_handler(&mut self, handler: Box<dyn Handler>) {
        self.default_handler = handler;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mime(&self) -> &MimeTable {
        &self.mime
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Runs the accept loop until the switch fails permanently.
    pub async fn serve<S: ChannelSwitch>(self: Arc<Self>, switch: S) -> anyhow::Result<()> {
        listener::run(self, switch).await
    }

    /// Serves one already-accepted channel until it closes.
    pub async fn serve_channel(&self, channel: Channel) -> anyhow::Result<()> {
        Connection::new(channel).run(self).await
    }

    pub(crate) async fn dispatch(&self, session: &mut Session<'_>) -> anyhow::Result<()> {
        debug!(peer = session.peer(), request = %session.request().request_line, "Dispatching");

        if session.request().method == Method::OPTIONS {
            session.add_header("Allow", "GET, HEAD");
            session.write_head(BodyFraming::None).await?;
            session.end_body().await?;
            return Ok(());
        }

        let mut outcome = Ok(Handled::No);
        for handler in self.handlers.iter().rev() {
            outcome = handler.handle(session).await;
            if !matches!(outcome, Ok(Handled::No)) {
                break;
            }
        }
        if matches!(outcome, Ok(Handled::No)) {
            outcome = self.default_handler.handle(session).await;
        }

        match outcome {
            Ok(Handled::Yes) => {}
            Ok(Handled::No) => {
                if !session.response_started() {
                    session.send_error(StatusCode::NotFound).await?;
                }
            }
            Err(e) => {
                warn!(peer = session.peer(), error = %e, "Handler failed");
                if session.response_started() {
                    session.abort();
                } else {
                    session.send_error(error_status(&e)).await?;
                }
            }
        }

        Ok(())
    }

    pub(crate) async fn log_access(&self, record: &AccessRecord) {
        debug!(
            peer = %record.peer,
            status = record.status,
            bytes = record.bytes_sent,
            "{}",
            record.request_line
        );
        if let Some(log) = &self.access_log {
            log.record(record).await;
        }
    }
}

/// The status reported for a failed handler.
fn error_status(err: &anyhow::Error) -> StatusCode {
    if let Some(e) = err.downcast_ref::<io::Error>() {
        return StatusCode::from_io_error(e);
    }
    if let Some(SessionError::BodyTooLarge(_)) = err.downcast_ref::<SessionError>() {
        return StatusCode::PayloadTooLarge;
    }
    StatusCode::InternalServerError
}
