//! The keepalive ping task.
//!
//! When no frame has been read for `idle`, send a PING with an opaque
//! payload; if no ACK returns within another `idle`, mark the connection
//! closing with `outcome="ping-timeout"` so the pool retries pending work
//! elsewhere.

use std::{sync::Arc, time::Duration};

use h2::{client::PingPong, Ping};
use tokio::sync::Notify;

use super::Shared;

/// Default idle interval before a keepalive PING is sent, and the grace
/// period allowed for the matching PONG.
pub(super) const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(30);

pub(super) async fn run(
    mut ping_pong: PingPong,
    shared: Arc<Shared>,
    idle: Duration,
    closing_notify: Arc<Notify>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(idle) => {}
            _ = closing_notify.notified() => return,
        }

        if is_closing(&shared) {
            return;
        }

        log::trace!(target: "aapns::connection", "sending keepalive PING");
        let ping = Ping::opaque();
        match tokio::time::timeout(idle, ping_pong.ping(ping)).await {
            Ok(Ok(())) => {
                log::trace!(target: "aapns::connection", "keepalive PONG received");
                continue;
            }
            Ok(Err(err)) => {
                log::warn!(target: "aapns::connection", "keepalive ping failed: {err}");
            }
            Err(_elapsed) => {
                log::warn!(target: "aapns::connection", "keepalive PONG timed out");
            }
        }

        shared.mark_closing("ping-timeout", &closing_notify);
        return;
    }
}

fn is_closing(shared: &Shared) -> bool {
    shared.closing.load(std::sync::atomic::Ordering::SeqCst)
}
