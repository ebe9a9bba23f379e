use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, TryAcquireError};
use tracing::{error, info, warn};

use crate::channel::ChannelSwitch;
use crate::server::Server;

/// Pause before polling for a free slot again.
const SATURATED_BACKOFF: Duration = Duration::from_millis(10);
/// Pause after a hard accept failure.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts channels and serves each one on its own task.
///
/// At most `max_connections` connections are in flight. A slot is taken
/// before accepting, so a saturated server leaves new peers in the listen
/// backlog instead of accepting and stalling them.
pub async fn run<S: ChannelSwitch>(server: Arc<Server>, mut switch: S) -> anyhow::Result<()> {
    let slots = Arc::new(Semaphore::new(server.config().server.max_connections.max(1)));
    let mut saturated = false;

    loop {
        let permit = match Arc::clone(&slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                if !saturated {
                    warn!("All connection slots busy, waiting");
                    saturated = true;
                }
                tokio::time::sleep(SATURATED_BACKOFF).await;
                continue;
            }
            Err(TryAcquireError::Closed) => return Ok(()),
        };
        saturated = false;

        let channel = match switch.accept().await {
            Ok(channel) => channel,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => continue,
            Err(e) => {
                error!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let peer = channel.peer().to_string();
        info!("Accepted connection from {}", peer);

        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let _slot = permit;
            if let Err(e) = server.serve_channel(channel).await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
