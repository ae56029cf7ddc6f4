// src/notify/email.rs
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use std::sync::Arc;

use super::{Notifier, NotifyError, RenderedBody};
use crate::config::EmailConfig;
use crate::model::{Subscriber, Summary};
use crate::store::Store;

/// Sends one multipart (plain + HTML) message per notification to every subscriber
/// in the store. Subscribers go in Bcc; the sender is the visible recipient.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject_prefix: String,
    store: Arc<dyn Store>,
}

impl EmailNotifier {
    pub fn from_config(cfg: &EmailConfig, store: Arc<dyn Store>) -> Result<Self, NotifyError> {
        if cfg.smtp_host.trim().is_empty() {
            return Err(NotifyError::Build("smtp_host is empty".into()));
        }
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .map_err(|e| NotifyError::Build(format!("invalid smtp host: {e}")))?
            .port(cfg.smtp_port)
            .credentials(creds)
            .build();
        let from: Mailbox = cfg
            .sender()
            .parse()
            .map_err(|e| NotifyError::Build(format!("invalid sender address: {e}")))?;

        Ok(Self {
            mailer,
            from,
            subject_prefix: cfg.subject_prefix.clone(),
            store,
        })
    }

    /// Build the message without sending it. `None` when there is nobody to send to.
    pub fn compose(
        &self,
        subscribers: &[Subscriber],
        title: &str,
        summary: &Summary,
        url: Option<&str>,
    ) -> Result<Option<Message>, NotifyError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.from.clone())
            .subject(format!("{}: {}", self.subject_prefix, title));

        let mut recipients = 0usize;
        for sub in subscribers {
            match sub.email.trim().parse::<Mailbox>() {
                Ok(mb) => {
                    builder = builder.bcc(mb);
                    recipients += 1;
                }
                Err(e) => {
                    tracing::warn!(email = %sub.email, error = %e, "skipping invalid subscriber address");
                }
            }
        }
        if recipients == 0 {
            return Ok(None);
        }

        let body = RenderedBody::new(summary, url);
        let msg = builder
            .multipart(MultiPart::alternative_plain_html(body.plain, body.html))
            .map_err(|e| NotifyError::Build(e.to_string()))?;
        Ok(Some(msg))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn notify(
        &self,
        title: &str,
        summary: &Summary,
        url: Option<&str>,
    ) -> Result<(), NotifyError> {
        let subscribers = self.store.list_subscribers().await?;
        let Some(msg) = self.compose(&subscribers, title, summary, url)? else {
            tracing::debug!(%title, "no subscribers; skipping email");
            return Ok(());
        };

        self.mailer
            .send(msg)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        tracing::info!(%title, recipients = subscribers.len(), "alert email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
