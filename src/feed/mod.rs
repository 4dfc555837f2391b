//! Live feed driver — owns the WebSocket subscription to the backend's push
//! channel and keeps it alive for the lifetime of the owning view.
//!
//! The transition rules live in [`state::FeedConn`]; this module executes
//! them: dial, read frames, merge decoded messages into the store, and sleep
//! the fixed reconnect delay after any disconnect.  The client never sends a
//! frame and acknowledges nothing.
//!
//! The feed is a convenience layer: when it is down, the pull path remains
//! the source of truth, so no failure here is ever surfaced as fatal.

pub mod state;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info};

use crate::events::{EventBroadcaster, MailboxEvent};
use crate::mailbox::SharedMailbox;
use state::{FeedCommand, FeedConn};

/// Fixed reconnect delay between disconnect and the next dial attempt.
pub const RECONNECT_DELAY_MS: u64 = 5000;

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Handle to the background feed task.  The owning view calls
/// [`FeedHandle::shutdown`] on teardown; dropping the handle closes the
/// shutdown channel and reads as teardown too.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Request teardown.  Idempotent — repeated calls are harmless, and no
    /// feed event mutates shared state after the first one is observed.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Request teardown and wait for the task to finish.
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Start the feed against `url` (a `ws://` or `wss://` endpoint), merging
/// every decoded message into `mailbox` and announcing it on `broadcaster`.
pub fn spawn(
    url: String,
    mailbox: SharedMailbox,
    broadcaster: Arc<EventBroadcaster>,
) -> FeedHandle {
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(run(url, mailbox, broadcaster, rx));
    FeedHandle { shutdown: tx, task }
}

// ─── Driver loop ──────────────────────────────────────────────────────────────

async fn run(
    url: String,
    mailbox: SharedMailbox,
    broadcaster: Arc<EventBroadcaster>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut conn = FeedConn::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Wait out a pending reconnect before dialing again.
        if conn.reconnect_pending() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(Duration::from_millis(RECONNECT_DELAY_MS)) => {}
            }
            if !opens_socket(&conn.on_reconnect_due()) {
                break;
            }
        } else if !opens_socket(&conn.establish()) {
            break;
        }

        info!(url = %url, "feed: connecting");
        let dialed = tokio::select! {
            _ = shutdown.changed() => break,
            result = connect_async(&url) => result,
        };

        match dialed {
            Ok((socket, _)) => {
                conn.on_open();
                info!("feed: connected");
                broadcaster.broadcast(MailboxEvent::FeedConnected);
                read_frames(&mut conn, socket, &mailbox, &broadcaster, &mut shutdown).await;
                if conn.is_torn_down() {
                    break;
                }
            }
            Err(e) => conn.on_transport_error(&e),
        }

        if conn.on_close() == Some(FeedCommand::ScheduleReconnect) {
            info!("feed: disconnected, reconnecting in {RECONNECT_DELAY_MS}ms");
            broadcaster.broadcast(MailboxEvent::FeedDisconnected);
        }
    }

    conn.teardown();
    debug!("feed: stopped");
}

fn opens_socket(commands: &[FeedCommand]) -> bool {
    commands.contains(&FeedCommand::OpenSocket)
}

/// Read frames until the socket closes, errors out, or teardown is
/// requested.  Decoded messages are merged into the store before observers
/// hear about them, so a subscriber reading the store sees the new entry.
async fn read_frames(
    conn: &mut FeedConn,
    socket: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mailbox: &SharedMailbox,
    broadcaster: &Arc<EventBroadcaster>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let (_sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                conn.teardown();
                return;
            }
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(message) = conn.on_frame(&text) {
                        let message = *message;
                        debug!(id = %message.id, "feed: message received");
                        mailbox.write().await.merge_incoming(message.clone());
                        broadcaster.broadcast(MailboxEvent::MessageArrived(Box::new(message)));
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => return,
                // Pings, pongs, binary frames — nothing for us in these
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    conn.on_transport_error(&e);
                    return;
                }
            }
        }
    }
}
