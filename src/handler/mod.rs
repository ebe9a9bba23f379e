//! Request handlers.
//!
//! The server keeps an ordered chain of [`Handler`]s and tries them from the
//! most recently added to the oldest. The first one returning
//! [`Handled::Yes`] owns the response; if none does, the default handler
//! (normally [`FileHandler`]) runs.
//!
//! ```ignore
//! struct Rpc;
//!
//! impl Handler for Rpc {
//!     fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a> {
//!         Box::pin(async move {
//!             if session.request().path != "/RPC2" {
//!                 return Ok(Handled::No);
//!             }
//!             let call = session.read_body(1 << 20).await?;
//!             let reply = execute(&call);
//!             session.send_response(Response::ok(reply)).await?;
//!             Ok(Handled::Yes)
//!         })
//!     }
//! }
//! ```

pub mod listing;
pub mod static_files;

pub use static_files::FileHandler;

use std::future::Future;
use std::pin::Pin;

use crate::http::session::Session;

/// Whether a handler took responsibility for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Yes,
    No,
}

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Handled>> + Send + 'a>>;

pub trait Handler: Send + Sync {
    /// Inspects the request and, when claiming it, writes the response.
    ///
    /// An error is turned into a 500 if nothing was written yet; otherwise
    /// the connection is closed.
    fn handle<'a>(&'a self, session: &'a mut Session<'_>) -> HandlerFuture<'a>;
}
