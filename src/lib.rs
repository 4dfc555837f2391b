pub mod client;
pub mod config;
pub mod events;
pub mod feed;
pub mod mailbox;

use std::sync::Arc;

use client::MailboxClient;
use config::Config;
use events::EventBroadcaster;
use mailbox::SharedMailbox;

/// Shared application state passed to every command and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub client: MailboxClient,
    pub mailbox: SharedMailbox,
    pub broadcaster: Arc<EventBroadcaster>,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let client = MailboxClient::new(config.api_url());
        Self {
            config: Arc::new(config),
            client,
            mailbox: mailbox::new_shared(),
            broadcaster: Arc::new(EventBroadcaster::new()),
        }
    }

    /// Start the live feed for this context's mailbox.
    pub fn spawn_feed(&self) -> feed::FeedHandle {
        feed::spawn(
            self.config.feed_url(),
            self.mailbox.clone(),
            self.broadcaster.clone(),
        )
    }
}
