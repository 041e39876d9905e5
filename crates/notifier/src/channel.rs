//! Delivery channel: the mail relay behind a single `send` operation.
//!
//! A [`MailSession`] is built once at startup from the process-wide
//! credentials and injected into [`SmtpChannel`]. The underlying lettre
//! transport keeps its own connection pool, so one session serves
//! concurrent dispatches without extra locking.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use icvk_common::config::AppConfig;

use crate::error::NotifyError;
use crate::payload::NotificationRequest;

/// Something that can deliver a rendered notification.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver one notification.
    ///
    /// Returns [`NotifyError::Configuration`] when delivery can never work in
    /// this process, and [`NotifyError::Channel`] for failures worth retrying.
    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError>;

    /// Channel name for logging.
    fn name(&self) -> &'static str;
}

/// Mail relay settings resolved from the application config.
#[derive(Clone)]
pub struct MailConfig {
    pub user: String,
    pub password: String,
    pub relay_host: String,
    pub from_name: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("relay_host", &self.relay_host)
            .field("from_name", &self.from_name)
            .finish()
    }
}

impl MailConfig {
    /// Returns `None` when either half of the credentials is absent.
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let user = config.email_user.clone()?;
        let password = config.email_pass.clone()?;

        Some(Self {
            user,
            password,
            relay_host: resolve_relay_host(&config.email_service),
            from_name: config.email_from_name.clone(),
        })
    }
}

/// Map a well-known service alias to its SMTP submission host.
/// Anything else is taken as a literal host name.
pub fn resolve_relay_host(service: &str) -> String {
    match service.trim().to_ascii_lowercase().as_str() {
        "gmail" | "googlemail" => "smtp.gmail.com".to_string(),
        "outlook" | "hotmail" | "outlook365" => "smtp-mail.outlook.com".to_string(),
        "yahoo" => "smtp.mail.yahoo.com".to_string(),
        "zoho" => "smtp.zoho.com".to_string(),
        _ => service.trim().to_string(),
    }
}

/// Authenticated session with the mail relay.
pub struct MailSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    relay_host: String,
}

impl MailSession {
    /// Build the pooled TLS transport. Does not touch the network.
    pub fn connect(config: MailConfig) -> Result<Self, NotifyError> {
        let address: Address = config.user.parse().map_err(|e| {
            NotifyError::Configuration(format!("Invalid sender address '{}': {}", config.user, e))
        })?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay_host)
            .map_err(|e| {
                NotifyError::Configuration(format!(
                    "Failed to create SMTP relay for {}: {}",
                    config.relay_host, e
                ))
            })?
            .credentials(Credentials::new(config.user, config.password))
            .build();

        info!(relay = %config.relay_host, from = %from, "Mail session created");

        Ok(Self {
            transport,
            from,
            relay_host: config.relay_host,
        })
    }

    /// Open a connection and authenticate, without sending anything.
    pub async fn verify(&self) -> Result<(), NotifyError> {
        match self.transport.test_connection().await {
            Ok(true) => {
                info!(relay = %self.relay_host, "Mail relay is ready to take messages");
                Ok(())
            }
            Ok(false) => Err(NotifyError::Channel(format!(
                "Mail relay {} refused the test connection",
                self.relay_host
            ))),
            Err(e) => Err(NotifyError::Channel(format!(
                "Mail relay {} verification failed: {}",
                self.relay_host, e
            ))),
        }
    }

    fn compose(&self, request: &NotificationRequest) -> Result<Message, NotifyError> {
        let to: Mailbox = request.recipient().parse().map_err(|e| {
            NotifyError::Validation(format!("Invalid recipient '{}': {}", request.recipient(), e))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(request.subject())
            .multipart(MultiPart::alternative_plain_html(
                request.text_body().to_string(),
                request.html_body().to_string(),
            ))
            .map_err(|e| NotifyError::Validation(format!("Failed to build email message: {}", e)))
    }

    async fn deliver(&self, request: &NotificationRequest) -> Result<Option<String>, NotifyError> {
        let message = self.compose(request)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Channel(format!("SMTP send failed: {}", e)))?;

        Ok(response.message().next().map(|s| s.to_string()))
    }
}

/// SMTP-backed [`DeliveryChannel`].
///
/// Holds no session when mail credentials were not configured; every send
/// then fails with a configuration error.
#[derive(Clone)]
pub struct SmtpChannel {
    session: Option<Arc<MailSession>>,
}

impl SmtpChannel {
    pub fn new(session: MailSession) -> Self {
        Self {
            session: Some(Arc::new(session)),
        }
    }

    /// A channel that refuses every send.
    pub fn unconfigured() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        let Some(session) = &self.session else {
            return Err(NotifyError::Configuration(
                "Missing EMAIL_USER or EMAIL_PASS".to_string(),
            ));
        };

        debug!(
            to = %request.recipient(),
            subject = %request.subject(),
            relay = %session.relay_host,
            "Sending email via SMTP"
        );

        match session.deliver(request).await {
            Ok(message_id) => {
                info!(to = %request.recipient(), message_id = ?message_id, "Email sent");
                Ok(())
            }
            Err(e) => {
                warn!(to = %request.recipient(), error = %e, "Email send failed");
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
