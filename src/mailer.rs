use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

/// One outbound HTML message.
#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub html: String,
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port);
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> anyhow::Result<()> {
        let message = build_message(email)?;
        let response = self.transport.send(message).await.context("smtp send")?;
        info!(to = %email.to, code = %response.code(), "email sent");
        Ok(())
    }
}

fn build_message(email: &Email) -> anyhow::Result<Message> {
    let from: Mailbox = email.from.parse().context("invalid 'from' address")?;
    let to: Mailbox = email.to.parse().context("invalid 'to' address")?;
    let mut builder = Message::builder().from(from).to(to).subject(&email.subject);
    if let Some(reply_to) = &email.reply_to {
        let reply_to: Mailbox = reply_to.parse().context("invalid 'reply_to' address")?;
        builder = builder.reply_to(reply_to);
    }
    builder
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .context("build email")
}
