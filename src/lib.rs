//! Lantern - embeddable HTTP server engine
//!
//! Core library: transport-independent channels, the keep-alive session
//! engine, request handlers and the static file server built on them.

pub mod channel;
pub mod config;
pub mod container;
pub mod handler;
pub mod http;
pub mod server;
