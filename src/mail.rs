use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// A rendered outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn welcome(to: &str, name: &str, url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome to the Natours Family!".into(),
            body: format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you! \
                 Upload a profile photo and start exploring: {url}\n",
                first_name(name)
            ),
        }
    }

    pub fn password_reset(to: &str, name: &str, url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your password reset token (valid for only 10 minutes)".into(),
            body: format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new \
                 password and passwordConfirm to: {url}\n\n\
                 If you didn't forget your password, please ignore this email.\n",
                first_name(name)
            ),
        }
    }
}

fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;

    async fn send_welcome(&self, to: &str, name: &str, url: &str) -> anyhow::Result<()> {
        self.send(Email::welcome(to, name, url)).await
    }

    async fn send_password_reset(&self, to: &str, name: &str, url: &str) -> anyhow::Result<()> {
        self.send(Email::password_reset(to, name, url)).await
    }
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let transport = SmtpTransport::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(creds)
            .build();
        Ok(Self {
            transport,
            from: cfg.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;
        // The lettre SMTP transport blocks; keep it off the async workers.
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        info!(to = %email.to, subject = %email.subject, "email sent");
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used when no SMTP host is
/// configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, "email (not sent, no SMTP configured)");
        debug!(body = %email.body, "email body");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use super::*;

    /// Keeps every message; can be told to fail.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Email>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            let mailer = Self::default();
            mailer.failing.store(true, Ordering::Relaxed);
            mailer
        }

        pub fn last(&self) -> Option<Email> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> anyhow::Result<()> {
            if self.failing.load(Ordering::Relaxed) {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}
