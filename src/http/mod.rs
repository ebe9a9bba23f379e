//! HTTP protocol implementation.
//!
//! This module implements the HTTP/1.x side of the engine: request head
//! parsing, the per-connection keep-alive loop and the session write API that
//! frames response bodies onto a channel.
//!
//! # Architecture
//!
//! - **`connection`**: owns one channel and runs the keep-alive loop
//! - **`session`**: one request/response cycle, the API handlers see
//! - **`parser`**: parses request heads out of the connection buffer
//! - **`request`**: request head representation
//! - **`response`**: status codes and in-memory responses
//! - **`writer`**: serializes response heads and chunk framing
//! - **`range`**: `Range` header parsing and multipart/byteranges framing
//! - **`mime`**: MIME type detection based on file extensions
//! - **`escape`**: HTML and URL escaping for generated pages
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────────┐
//!        │  AwaitRequest   │ ← wait for bytes (timeout → Close)
//!        └──────┬──────────┘
//!               │ head parsed (malformed → error reply → Close)
//!               ▼
//!        ┌──────────────────┐
//!        │    Dispatch      │ ← handler chain writes through the Session
//!        └──────┬───────────┘
//!               │ Session::finish flushes, drains the request body
//!               ├─ Keep-Alive → AwaitRequest (same channel)
//!               └─ Close → channel closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lantern::channel::Channel;
//! use lantern::config::Config;
//! use lantern::server::Server;
//!
//! let server = Server::new(Config::default())?;
//! let (client, engine) = tokio::io::duplex(64 * 1024);
//! server.serve_channel(Channel::new(engine, "test")).await?;
//! ```

pub mod connection;
pub mod escape;
pub mod mime;
pub mod parser;
pub mod range;
pub mod request;
pub mod response;
pub mod session;
pub mod writer;
