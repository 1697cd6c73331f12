//! Deadline arithmetic, notification composition and rendering, and mail
//! dispatch for Contrato+.
//!
//! A notification flows through the modules in order: [`deadline`] figures
//! out how close a contract is to its end date, [`compose`] turns a contract
//! and a requested kind into a [`compose::NotificationDocument`], [`render`]
//! produces its HTML and plain-text forms, and [`dispatch`] hands the result
//! to the mail transport. Recording the outcome is the database's job.

pub mod compose;
pub mod deadline;
pub mod dispatch;
pub mod render;

pub use compose::{ComposeError, NotificationDocument, Recipients, compose, compose_test_message};
pub use deadline::{ExpiryState, UrgencyTier, expiry_state, remaining_days};
pub use dispatch::{Dispatcher, MailError, Mailer, MailerConfig, OutboundEmail};
pub use render::{RenderedNotification, render_all};
