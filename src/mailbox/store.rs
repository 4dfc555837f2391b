// SPDX-License-Identifier: MIT
//! Authoritative in-memory mailbox state.
//!
//! Reconciles three sources of truth — the bulk fetch, the live feed, and
//! local user actions (delete, clear, filter, select) — into one consistent
//! list.  Every mutation re-runs the selection repair pass so the selection
//! always points into the current filtered view.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::mailbox::model::Message;

/// Shared store handle.  Mutations go through short-lived write guards, one
/// per event, so they apply in event-delivery order.
pub type SharedMailbox = Arc<RwLock<MailboxStore>>;

pub fn new_shared() -> SharedMailbox {
    Arc::new(RwLock::new(MailboxStore::new()))
}

// ─── MailboxStore ─────────────────────────────────────────────────────────────

/// Message list, recipient filter, and selection.
///
/// `messages` is most-recent-first after merges.  `filter` keeps the value
/// exactly as entered (casing and whitespace preserved for display);
/// comparisons use the trimmed, lowercased form.  The selection is tracked by
/// message id so it survives reorders.
#[derive(Debug, Default)]
pub struct MailboxStore {
    messages: Vec<Message>,
    filter: String,
    selected_id: Option<String>,
}

impl MailboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list, as after a successful bulk fetch.
    ///
    /// A failed fetch never reaches this method — the caller reports the
    /// error and leaves the store untouched.
    pub fn load(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.repair_selection();
    }

    /// Merge a message pushed by the live feed: drop any existing entry with
    /// the same id, then prepend.  Redelivery of an id therefore never
    /// duplicates — it replaces the entry and promotes it to the front.
    pub fn merge_incoming(&mut self, message: Message) {
        self.messages.retain(|m| m.id != message.id);
        self.messages.insert(0, message);
        self.repair_selection();
    }

    /// Drop the entry with the given id.  Absence is not an error — the
    /// remote delete may have raced a feed redelivery.  Returns whether an
    /// entry was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        let removed = self.messages.len() != before;
        if removed {
            self.repair_selection();
        }
        removed
    }

    /// Empty the list and clear the selection unconditionally.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.selected_id = None;
    }

    /// Set the recipient filter.  The raw value is stored as-is; matching
    /// uses the trimmed, lowercased form.
    pub fn set_filter(&mut self, value: impl Into<String>) {
        self.filter = value.into();
        self.repair_selection();
    }

    /// Select a message by id.  The caller only passes ids taken from the
    /// current filtered view, so membership is not re-checked here.
    pub fn select(&mut self, id: &str) {
        self.selected_id = Some(id.to_string());
    }

    /// The subsequence of messages matching the filter, in list order.
    /// An empty (or whitespace-only) filter is the identity.
    pub fn filtered_view(&self) -> Vec<&Message> {
        let filter = self.normalized_filter();
        if filter.is_empty() {
            return self.messages.iter().collect();
        }
        self.messages
            .iter()
            .filter(|m| m.matches_recipient(&filter))
            .collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selected(&self) -> Option<&Message> {
        let id = self.selected_id.as_deref()?;
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn normalized_filter(&self) -> String {
        self.filter.trim().to_lowercase()
    }

    /// Selection repair, run after every mutation that can change the
    /// filtered view: keep the selection if it is still in the view,
    /// otherwise fall back to the view's first element, or none if the view
    /// is empty.
    fn repair_selection(&mut self) {
        let view = self.filtered_view();
        if let Some(selected) = self.selected_id.as_deref() {
            if view.iter().any(|m| m.id == selected) {
                return;
            }
        }
        self.selected_id = view.first().map(|m| m.id.clone());
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
