use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use super::Channel;

/// A listening endpoint that hands out [`Channel`]s.
pub trait ChannelSwitch: Send {
    /// Waits for the next peer.
    ///
    /// `WouldBlock` and `Interrupted` errors are transient and the caller
    /// simply tries again.
    fn accept(&mut self) -> impl Future<Output = io::Result<Channel>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

pub struct TcpSwitch {
    listener: TcpListener,
}

impl TcpSwitch {
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listener }
    }
}

impl ChannelSwitch for TcpSwitch {
    async fn accept(&mut self) -> io::Result<Channel> {
        let (stream, _peer) = self.listener.accept().await?;
        Channel::from_tcp(stream)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
