//! Outbound mail delivery.
//!
//! [`Dispatcher::dispatch`] makes one synchronous attempt and collapses every
//! outcome into a boolean: `true` only when the transport accepted the
//! message for all recipients. Call it from a blocking context.
//!
//! # Environment variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_HOST` | No | SMTP server; when unset, every send fails |
//! | `SMTP_PORT` | No | Port (default: 587) |
//! | `SMTP_USER` | No | Username for authentication |
//! | `SMTP_PASSWORD` | No | Password for authentication |
//! | `SMTP_FROM` | No | Sender address (default: `SMTP_USER`) |
//! | `SMTP_FROM_NAME` | No | Sender display name (default: `CONTRATO+`) |
//! | `SMTP_TLS` | No | `starttls` (default), `tls`, or `none` |
//! | `SMTP_TIMEOUT_SECS` | No | Per-send timeout (default: 15) |

use std::sync::Arc;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::compose::{PRODUCT_NAME, Recipients};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("mail transport is not configured")]
    NotConfigured,

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// A fully rendered message ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

// -- Configuration --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    StartTls,
    Tls,
    None,
}

#[derive(Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl std::fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MailerConfig {
    pub const DEFAULT_PORT: u16 = 587;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    /// `Ok(None)` when `SMTP_HOST` is unset.
    pub fn from_env() -> Result<Option<Self>, MailError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, MailError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(host) = get("SMTP_HOST") else {
            return Ok(None);
        };

        let port = match get("SMTP_PORT") {
            Some(raw) => raw.parse().map_err(|_| MailError::InvalidConfig {
                key: "SMTP_PORT".into(),
                value: raw,
            })?,
            None => Self::DEFAULT_PORT,
        };

        let tls = match get("SMTP_TLS").as_deref() {
            None | Some("starttls") => TlsMode::StartTls,
            Some("tls") => TlsMode::Tls,
            Some("none") => TlsMode::None,
            Some(other) => {
                return Err(MailError::InvalidConfig { key: "SMTP_TLS".into(), value: other.into() });
            }
        };

        let timeout = match get("SMTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|_| MailError::InvalidConfig {
                key: "SMTP_TIMEOUT_SECS".into(),
                value: raw,
            })?),
            None => Self::DEFAULT_TIMEOUT,
        };

        let username = get("SMTP_USER");
        let from_address = get("SMTP_FROM")
            .or_else(|| username.clone())
            .ok_or_else(|| MailError::MissingConfig("SMTP_FROM".into()))?;

        Ok(Some(Self {
            host,
            port,
            password: get("SMTP_PASSWORD"),
            username,
            from_address,
            from_name: get("SMTP_FROM_NAME").unwrap_or_else(|| PRODUCT_NAME.to_string()),
            tls,
            timeout,
        }))
    }
}

// -- SMTP --

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailerConfig) -> Result<Self, MailError> {
        let address: lettre::Address = config
            .from_address
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from_address.clone()))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let builder = match config.tls {
            TlsMode::StartTls => SmtpTransport::starttls_relay(&config.host),
            TlsMode::Tls => SmtpTransport::relay(&config.host),
            TlsMode::None => Ok(SmtpTransport::builder_dangerous(&config.host)),
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        if config.tls == TlsMode::None {
            warn!(host = %config.host, "SMTP transport configured without TLS");
        }

        Ok(Self { transport: builder.build(), from })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(email.subject.as_str());
        for to in &email.to {
            let mailbox: Mailbox = to.parse().map_err(|_| MailError::InvalidAddress(to.clone()))?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(email.text.clone(), email.html.clone()))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| MailError::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Stand-in used when no SMTP host is configured: every attempt fails, so
/// notifications are still recorded (as errors).
pub struct UnconfiguredMailer;

impl Mailer for UnconfiguredMailer {
    fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

// -- Dispatcher --

#[derive(Clone)]
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// SMTP when configured, otherwise an always-failing transport.
    pub fn from_config(config: Option<&MailerConfig>) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = match config {
            Some(config) => {
                info!(host = %config.host, port = config.port, "SMTP mailer configured");
                Arc::new(SmtpMailer::new(config)?)
            }
            None => {
                warn!("SMTP_HOST not set, notification emails will be recorded as failed");
                Arc::new(UnconfiguredMailer)
            }
        };
        Ok(Self::new(mailer))
    }

    pub fn dispatch(&self, recipients: &Recipients, subject: &str, html_body: &str, text_body: &str) -> bool {
        let email = OutboundEmail {
            to: recipients.as_slice().to_vec(),
            subject: subject.to_string(),
            html: html_body.to_string(),
            text: text_body.to_string(),
        };

        match self.mailer.send(&email) {
            Ok(()) => {
                info!(recipients = recipients.len(), "Email accepted by transport");
                true
            }
            Err(e) => {
                error!(recipients = recipients.len(), error = %e, "Failed to send email");
                false
            }
        }
    }
}
