// SPDX-License-Identifier: MIT

pub mod model;
pub mod store;

pub use model::{format_size, Attachment, Message};
pub use store::{new_shared, MailboxStore, SharedMailbox};
