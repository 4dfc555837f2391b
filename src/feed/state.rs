// SPDX-License-Identifier: MIT
//! Feed connection transition rules, kept free of any socket so every rule
//! is testable by injecting synthetic events.
//!
//! The driver in `feed::run` owns the actual WebSocket and executes the
//! [`FeedCommand`]s these methods return.

use tracing::{debug, warn};

use crate::mailbox::Message;

/// Lifecycle of the push subscription.  No terminal state — the connection
/// loops `Disconnected → Connecting → Open → Disconnected → …` until the
/// owning view tears it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Open,
}

/// Side effect the driver must perform for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCommand {
    /// Dial a new socket to the feed endpoint.
    OpenSocket,
    /// Arm the fixed-delay reconnect timer.
    ScheduleReconnect,
    /// Disarm the pending reconnect timer.
    CancelReconnect,
}

/// Explicit state machine for the live feed.
///
/// Invariants: at most one socket is ever being dialed or open (`establish`
/// is a no-op while `Connecting`/`Open`), at most one reconnect timer is
/// armed at a time, and nothing mutates shared state after `teardown`.
#[derive(Debug)]
pub struct FeedConn {
    state: FeedState,
    reconnect_pending: bool,
    torn_down: bool,
}

impl Default for FeedConn {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedConn {
    pub fn new() -> Self {
        Self {
            state: FeedState::Disconnected,
            reconnect_pending: false,
            torn_down: false,
        }
    }

    /// Request a connection.  No-op while already `Connecting` or `Open` —
    /// this is what prevents duplicate sockets when the caller re-enters.
    /// A pending reconnect timer is disarmed before dialing.
    pub fn establish(&mut self) -> Vec<FeedCommand> {
        if self.torn_down || self.state != FeedState::Disconnected {
            return Vec::new();
        }
        let mut commands = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            commands.push(FeedCommand::CancelReconnect);
        }
        self.state = FeedState::Connecting;
        commands.push(FeedCommand::OpenSocket);
        commands
    }

    /// The socket opened.
    pub fn on_open(&mut self) {
        if self.torn_down {
            return;
        }
        self.state = FeedState::Open;
    }

    /// An inbound payload arrived.  Returns the decoded message to deliver,
    /// or `None` for a malformed frame — which is dropped and logged while
    /// the connection stays `Open`.
    pub fn on_frame(&mut self, payload: &str) -> Option<Box<Message>> {
        if self.torn_down || self.state != FeedState::Open {
            debug!("feed: dropping frame received outside Open state");
            return None;
        }
        match serde_json::from_str::<Message>(payload) {
            Ok(message) => Some(Box::new(message)),
            Err(e) => {
                warn!("feed: undecodable frame dropped: {e}");
                None
            }
        }
    }

    /// A transport-level error surfaced.  Log only — closure is driven by
    /// the close event, not by errors.
    pub fn on_transport_error(&self, error: &dyn std::fmt::Display) {
        warn!("feed: transport error: {error}");
    }

    /// The socket closed.  Enters `Disconnected` and arms exactly one
    /// reconnect timer; returns `None` if one is already armed or the
    /// machine is torn down.
    pub fn on_close(&mut self) -> Option<FeedCommand> {
        if self.torn_down {
            return None;
        }
        self.state = FeedState::Disconnected;
        if self.reconnect_pending {
            return None;
        }
        self.reconnect_pending = true;
        Some(FeedCommand::ScheduleReconnect)
    }

    /// The reconnect timer fired.
    pub fn on_reconnect_due(&mut self) -> Vec<FeedCommand> {
        if self.torn_down {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.establish()
    }

    /// Tear the machine down.  Idempotent; after this every event entry
    /// point is inert, so late callbacks cannot mutate shared state.
    pub fn teardown(&mut self) {
        self.torn_down = true;
        self.reconnect_pending = false;
        self.state = FeedState::Disconnected;
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
