//! Transport-independent byte channels.
//!
//! The engine never touches sockets directly. A [`Channel`] wraps any
//! bidirectional byte stream (a TCP connection, a Unix socket, an in-memory
//! `tokio::io::duplex` pipe) and a [`ChannelSwitch`] produces channels from
//! a listening endpoint.
//!
//! ```text
//!   ChannelSwitch::accept ──► Channel (Open) ──close()──► Channel (Closed)
//! ```

pub mod switch;

pub use switch::{ChannelSwitch, TcpSwitch};

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Read-side buffer between the transport and the connection.
const CHANNEL_BUFFER_SIZE: usize = 8192;

/// Any stream a [`Channel`] can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closed,
}

/// Outcome of [`Channel::wait_readable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data or end-of-stream is available; the next read will not block.
    Ready,
    TimedOut,
}

/// An open byte stream bound to one peer.
pub struct Channel {
    io: BufReader<Box<dyn Transport>>,
    peer: String,
    state: ChannelState,
    /// Deadline for each write, flush and close; unbounded when unset.
    write_timeout: Option<Duration>,
}

/// Runs `op`, turning an expired deadline into `TimedOut`.
async fn within<T>(limit: Option<Duration>, op: impl Future<Output = io::Result<T>>) -> io::Result<T> {
    let Some(limit) = limit else {
        return op.await;
    };
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "peer stopped reading")),
    }
}

impl Channel {
    pub fn new<T>(transport: T, peer: impl Into<String>) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            io: BufReader::with_capacity(CHANNEL_BUFFER_SIZE, Box::new(transport)),
            peer: peer.into(),
            state: ChannelState::Open,
            write_timeout: None,
        }
    }

    /// Bounds every later write, flush and close by `limit`.
    pub fn set_write_timeout(&mut self, limit: Duration) {
        self.write_timeout = Some(limit);
    }

    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?.to_string();
        stream.set_nodelay(true)?;
        Ok(Self::new(stream, peer))
    }

    /// Identity of the remote end (`ip:port` for TCP).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    fn ensure_open(&self) -> io::Result<()> {
        match self.state {
            ChannelState::Open => Ok(()),
            ChannelState::Closed => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "channel is closed",
            )),
        }
    }

    /// Reads at least one byte. `Ok(0)` means the peer closed the stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        self.io.read(buf).await
    }

    /// Writes all of `data`; short writes are retried until done, failed or
    /// past the write timeout.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        within(self.write_timeout, self.io.write_all(data)).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        within(self.write_timeout, self.io.flush()).await
    }

    /// Waits until a read would not block, without consuming anything.
    pub async fn wait_readable(&mut self, timeout: Duration) -> io::Result<Readiness> {
        self.ensure_open()?;
        match tokio::time::timeout(timeout, self.io.fill_buf()).await {
            Ok(Ok(_)) => Ok(Readiness::Ready),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(Readiness::TimedOut),
        }
    }

    /// Shuts the transport down. Calling it again is a no-op.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.state == ChannelState::Closed {
            return Ok(());
        }
        self.state = ChannelState::Closed;

        if let Err(e) = within(self.write_timeout, self.io.flush()).await {
            debug!(peer = %self.peer, error = %e, "Flush before close failed");
        }
        match within(self.write_timeout, self.io.get_mut().shutdown()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("peer", &self.peer)
            .field("state", &self.state)
            .finish()
    }
}
