//! mail2taiga — imports unread IMAP mail as Taiga issues.

pub mod attach;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod poller;
pub mod routing;
pub mod taiga;
pub mod ticket;
