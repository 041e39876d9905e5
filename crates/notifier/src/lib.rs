//! Confirmation email delivery for new registrations.
//!
//! - [`payload`] renders the message from a persisted registration
//! - [`channel`] owns the mail relay session and sends one message
//! - [`dispatcher`] runs detached, bounded-retry delivery tasks

pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod payload;

pub use channel::{DeliveryChannel, MailConfig, MailSession, SmtpChannel};
pub use dispatcher::{DispatchOutcome, DispatchState, Dispatcher, RetryPolicy};
pub use error::NotifyError;
pub use payload::NotificationRequest;
