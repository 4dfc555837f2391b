//! HTTP transport for the mailbox collection resource.
//!
//! Request/response only — the live push feed is `crate::feed`.  Every
//! failure is a [`TransportError`]; callers report it and keep their prior
//! state, retrying by re-invoking the operation.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::mailbox::Message;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fetch/delete/clear failure.  Never fatal — the store is left untouched
/// and the operation can simply be retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mailbox request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mailbox endpoint returned {0}")]
    Status(reqwest::StatusCode),
}

/// Client for the backend's mailbox endpoints.
///
/// `base_url` is the collection resource, e.g.
/// `http://127.0.0.1:8080/api/emails`.
#[derive(Clone)]
pub struct MailboxClient {
    http: reqwest::Client,
    base_url: String,
}

impl MailboxClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// GET the full message list.
    pub async fn fetch_all(&self) -> Result<Vec<Message>, TransportError> {
        let resp = self.http.get(&self.base_url).send().await?;
        let resp = ok_status(resp)?;
        let messages: Vec<Message> = resp.json().await?;
        debug!(count = messages.len(), "fetched mailbox");
        Ok(messages)
    }

    /// DELETE one message by id.
    pub async fn remove(&self, id: &str) -> Result<(), TransportError> {
        let url = format!("{}/{id}", self.base_url);
        let resp = self.http.delete(&url).send().await?;
        ok_status(resp)?;
        debug!(id, "deleted message");
        Ok(())
    }

    /// DELETE the whole collection.
    pub async fn clear_all(&self) -> Result<(), TransportError> {
        let resp = self.http.delete(&self.base_url).send().await?;
        ok_status(resp)?;
        debug!("cleared mailbox");
        Ok(())
    }

    /// Deterministic download URL for an attachment.  No metadata call — the
    /// backend serves the bytes directly at this path.
    pub fn attachment_url(&self, message_id: &str, attachment_id: &str) -> String {
        format!("{}/{message_id}/attachments/{attachment_id}", self.base_url)
    }

    /// Download one attachment's bytes.
    pub async fn fetch_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let url = self.attachment_url(message_id, attachment_id);
        let resp = self.http.get(&url).send().await?;
        let resp = ok_status(resp)?;
        Ok(resp.bytes().await?.to_vec())
    }
}

fn ok_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(TransportError::Status(resp.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_url_shape() {
        let client = MailboxClient::new("http://127.0.0.1:8080/api/emails");
        assert_eq!(
            client.attachment_url("msg-1", "att-2"),
            "http://127.0.0.1:8080/api/emails/msg-1/attachments/att-2"
        );
    }
}
