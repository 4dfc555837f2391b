// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Message ──────────────────────────────────────────────────────────────────

/// A received mail message as the backend serializes it.
///
/// Ids are opaque strings assigned by the backend and unique within the
/// mailbox. `received_at` stays string-encoded on the struct — the wire value
/// is RFC 3339 but a malformed timestamp must not fail a whole list decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub received_at: String,
    #[serde(default)]
    pub raw_message: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Attachment metadata carried inline on a [`Message`].  The bytes themselves
/// are fetched separately via the derived attachment URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl Message {
    /// All recipient addresses in order: to, then cc, then bcc.
    /// Empty entries are skipped.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
            .filter(|r| !r.is_empty())
    }

    /// True when any recipient equals `filter` case-insensitively.
    /// `filter` must already be trimmed and lowercased.
    pub fn matches_recipient(&self, filter: &str) -> bool {
        self.recipients().any(|r| r.to_lowercase() == filter)
    }

    /// Parse `received_at` as an RFC 3339 instant. `None` on malformed input.
    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.received_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Sender for list display.
    pub fn from_display(&self) -> &str {
        self.from.as_deref().unwrap_or("(unknown sender)")
    }

    /// Subject for list display.
    pub fn subject_display(&self) -> &str {
        self.subject.as_deref().unwrap_or("(no subject)")
    }
}

/// Human-readable byte size: 1024-based, whole bytes below 1 KB, one decimal
/// above.
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
