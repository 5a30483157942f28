//! Outbound account mail
//!
//! The auth flows only need two messages: the email confirmation link sent on
//! registration and the password reset link sent on request. Delivery goes
//! through SMTP when `MAIL_HOST` is configured, otherwise the message is only
//! logged.

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid mail address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Which account mail is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailKind {
    Confirmation,
    PasswordReset,
}

impl MailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailKind::Confirmation => "confirmation",
            MailKind::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for MailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mail collaborator used by the auth service
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(
        &self,
        email: &str,
        full_name: &str,
        token: &str,
    ) -> Result<(), MailError>;

    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError>;
}

/// Base URLs embedded in outgoing links
#[derive(Debug, Clone)]
pub struct MailLinks {
    /// Public URL of this API
    pub current_url: String,
    /// Front-end URL
    pub client_url: String,
}

impl MailLinks {
    pub fn new(current_url: impl Into<String>, client_url: impl Into<String>) -> Self {
        Self {
            current_url: current_url.into().trim_end_matches('/').to_string(),
            client_url: client_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// API confirmation link that redirects to the client once consumed
    pub fn confirmation_url(&self, token: &str) -> String {
        let redirect = format!("{}/auth/confirm?token={}", self.client_url, token);
        format!(
            "{}/auth/confirm/{}?redirect={}",
            self.current_url,
            token,
            urlencoding::encode(&redirect)
        )
    }

    pub fn reset_url(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.client_url, token)
    }
}

/// SMTP settings read from `MAIL_*`
#[derive(Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

impl MailConfig {
    /// `None` when `MAIL_HOST` is unset
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("MAIL_HOST").ok().filter(|h| !h.is_empty())?;

        let port = std::env::var("MAIL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);

        let user = std::env::var("MAIL_USER").ok().filter(|u| !u.is_empty());
        let from = std::env::var("MAIL_FROM")
            .ok()
            .or_else(|| user.clone())
            .unwrap_or_else(|| format!("no-reply@{host}"));

        Some(Self {
            host,
            port,
            user,
            password: std::env::var("MAIL_PASSWORD").ok(),
            from,
        })
    }
}

/// SMTP delivery via lettre's pooled async transport
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    links: MailLinks,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, links: MailLinks) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            links,
        })
    }

    async fn deliver(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(
        &self,
        email: &str,
        full_name: &str,
        token: &str,
    ) -> Result<(), MailError> {
        let body = confirmation_body(full_name, &self.links.confirmation_url(token));
        self.deliver(email, "Welcome to my site! Confirm your Email", body)
            .await
    }

    async fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        let body = reset_body(&self.links.reset_url(token));
        self.deliver(email, "Reset your password", body).await
    }
}

/// Stand-in used when SMTP is not configured
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(
        &self,
        email: &str,
        _full_name: &str,
        _token: &str,
    ) -> Result<(), MailError> {
        tracing::info!(to = %email, kind = %MailKind::Confirmation, "SMTP not configured, mail not sent");
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, _token: &str) -> Result<(), MailError> {
        tracing::info!(to = %email, kind = %MailKind::PasswordReset, "SMTP not configured, mail not sent");
        Ok(())
    }
}

fn confirmation_body(full_name: &str, url: &str) -> String {
    format!(
        "Hey {full_name},\n\n\
         Please confirm your email address by following the link below:\n\n\
         {url}\n\n\
         If you did not create an account, you can ignore this email.\n"
    )
}

fn reset_body(url: &str) -> String {
    format!(
        "Someone requested a password reset for your account.\n\n\
         Follow the link below to choose a new password:\n\n\
         {url}\n\n\
         If this wasn't you, you can ignore this email.\n"
    )
}
