//! Photo Poet event bus and outgoing mail.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`AppEvent`]s.
//! - [`Mailer`]: outgoing email, with an SMTP implementation
//!   ([`EmailDelivery`]) and fallbacks for unconfigured or test setups.

pub mod bus;
pub mod mail;

pub use bus::{AppEvent, EventBus, IdentityChange};
pub use mail::{EmailConfig, EmailDelivery, EmailError, LogMailer, Mailer, OutboxMailer, OutgoingEmail};
