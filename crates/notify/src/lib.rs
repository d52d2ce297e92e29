//! `medlem-notify` — notification boundary.
//!
//! The engine only knows the [`Mailer`] trait. Delivery failures are the
//! caller's to swallow: approval and credentials notices are best-effort
//! side channels, never part of the transactional path.

pub mod mailer;
pub mod templates;

pub use mailer::{EmailMessage, MailError, Mailer, RecordingMailer, TracingMailer};
